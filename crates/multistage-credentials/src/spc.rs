//! Secrets-store CSI `SecretProviderClass` resources
//!
//! Typed structs for the provider classes backing CSI credential volumes.
//! Secrets are fetched from Google Secret Manager, where each credential is
//! stored as `<collection>__<name>`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use multistage_common::crd::CredentialReference;
use multistage_common::kube_utils::{HasApiResource, ObjectMeta};
use multistage_common::{Error, Result, LABEL_MULTI_STAGE_TEST};

use crate::grouping::group_credentials;

/// Secret Manager project holding CI secrets
pub const DEFAULT_GSM_PROJECT: &str = "openshift-ci-secrets";

/// Provider used by every generated class
const GCP_PROVIDER: &str = "gcp";

/// Provider parameter holding the YAML list of secrets
const SECRETS_PARAMETER: &str = "secrets";

// =============================================================================
// SecretProviderClass
// =============================================================================

/// secrets-store.csi.x-k8s.io SecretProviderClass resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretProviderClass {
    /// API version
    #[serde(default = "SecretProviderClass::default_api_version")]
    pub api_version: String,
    /// Resource kind
    #[serde(default = "SecretProviderClass::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: ObjectMeta,
    /// Provider specification
    pub spec: SecretProviderClassSpec,
}

impl HasApiResource for SecretProviderClass {
    const API_VERSION: &'static str = "secrets-store.csi.x-k8s.io/v1";
    const KIND: &'static str = "SecretProviderClass";
}

impl SecretProviderClass {
    fn default_api_version() -> String {
        <Self as HasApiResource>::API_VERSION.to_string()
    }
    fn default_kind() -> String {
        <Self as HasApiResource>::KIND.to_string()
    }

    /// Create a new SecretProviderClass
    pub fn new(metadata: ObjectMeta, spec: SecretProviderClassSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// SecretProviderClass spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SecretProviderClassSpec {
    /// Provider plugin name
    pub provider: String,
    /// Provider-specific parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// One Secret Manager secret written into the mounted directory
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GcpSecret {
    /// Full Secret Manager resource name
    pub resource_name: String,
    /// File name inside the mount path
    pub file_name: String,
}

/// YAML list of the Secret Manager secrets backing `credentials`
pub fn build_gcp_secrets_parameter(
    project: &str,
    credentials: &[CredentialReference],
) -> Result<String> {
    let secrets: Vec<GcpSecret> = credentials
        .iter()
        .map(|credential| GcpSecret {
            resource_name: format!(
                "projects/{}/secrets/{}__{}/versions/latest",
                project, credential.collection, credential.name
            ),
            file_name: credential.name.clone(),
        })
        .collect();

    serde_yaml::to_string(&secrets).map_err(|e| {
        Error::serialization_for_kind(SecretProviderClass::KIND, e.to_string())
    })
}

/// One provider class per credential group, named to match the CSI volumes
/// the pods reference.
pub fn build_secret_provider_classes(
    namespace: &str,
    test_name: &str,
    project: &str,
    credentials: &[CredentialReference],
) -> Result<Vec<SecretProviderClass>> {
    group_credentials(credentials)
        .into_iter()
        .map(|group| {
            let name = group.secret_provider_class_name(namespace);
            debug!(spc = %name, group = %group.key(), members = group.members.len(), "building secret provider class");
            let parameters = BTreeMap::from([(
                SECRETS_PARAMETER.to_string(),
                build_gcp_secrets_parameter(project, &group.members)?,
            )]);
            Ok(SecretProviderClass::new(
                ObjectMeta::new(name, namespace).with_label(LABEL_MULTI_STAGE_TEST, test_name),
                SecretProviderClassSpec {
                    provider: GCP_PROVIDER.to_string(),
                    parameters,
                },
            ))
        })
        .collect()
}
