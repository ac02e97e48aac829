//! Credential mounting for multi-stage test pods
//!
//! Credentials that share a secret-manager collection and mount path are
//! fetched by one CSI volume backed by one `SecretProviderClass`. Every name
//! generated here is a valid DNS label and stable across runs, since pods and
//! provider classes created by separate processes must agree on them.

#![deny(missing_docs)]

pub mod binding;
pub mod grouping;
pub mod naming;
pub mod spc;

pub use binding::{CredentialBindings, CredentialMounting};
pub use grouping::{group_credentials, CredentialGroup};
pub use naming::{csi_volume_name, legacy_volume_name, secret_provider_class_name};
pub use spc::{
    build_gcp_secrets_parameter, build_secret_provider_classes, GcpSecret, SecretProviderClass,
    DEFAULT_GSM_PROJECT,
};

/// CSI driver serving secrets-store volumes
pub const SECRETS_STORE_CSI_DRIVER: &str = "secrets-store.csi.k8s.io";

/// Volume attribute naming the provider class a CSI volume reads from
pub const SECRET_PROVIDER_CLASS_ATTRIBUTE: &str = "secretProviderClass";
