//! Credential mounting strategies
//!
//! `SecretsStoreCsi` mounts each credential group through one read-only CSI
//! volume; `Legacy` mounts one Kubernetes Secret per credential.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{CSIVolumeSource, SecretVolumeSource, Volume, VolumeMount};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use multistage_common::crd::CredentialReference;

use crate::grouping::group_credentials;
use crate::naming::legacy_volume_name;
use crate::{SECRETS_STORE_CSI_DRIVER, SECRET_PROVIDER_CLASS_ATTRIBUTE};

/// How step credentials reach the primary container
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialMounting {
    /// One CSI volume per `(collection, mount_path)` group
    SecretsStoreCsi,
    /// One Secret volume per credential
    #[default]
    Legacy,
}

/// Volumes for the pod and mounts for the primary container
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CredentialBindings {
    /// Pod volumes
    pub volumes: Vec<Volume>,
    /// Mounts on the primary container
    pub mounts: Vec<VolumeMount>,
}

impl CredentialMounting {
    /// Plan the volumes and mounts for `credentials` in `namespace`
    pub fn bind(&self, namespace: &str, credentials: &[CredentialReference]) -> CredentialBindings {
        match self {
            Self::SecretsStoreCsi => bind_csi(namespace, credentials),
            Self::Legacy => bind_legacy(credentials),
        }
    }
}

fn bind_csi(namespace: &str, credentials: &[CredentialReference]) -> CredentialBindings {
    let mut bindings = CredentialBindings::default();
    for group in group_credentials(credentials) {
        let volume_name = group.volume_name(namespace);
        bindings.volumes.push(Volume {
            name: volume_name.clone(),
            csi: Some(CSIVolumeSource {
                driver: SECRETS_STORE_CSI_DRIVER.to_string(),
                read_only: Some(true),
                volume_attributes: Some(BTreeMap::from([(
                    SECRET_PROVIDER_CLASS_ATTRIBUTE.to_string(),
                    group.secret_provider_class_name(namespace),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        });
        bindings.mounts.push(VolumeMount {
            name: volume_name,
            mount_path: group.mount_path,
            ..Default::default()
        });
    }
    bindings
}

fn bind_legacy(credentials: &[CredentialReference]) -> CredentialBindings {
    let mut bindings = CredentialBindings::default();
    for credential in credentials {
        let volume_name = legacy_volume_name(&credential.namespace, &credential.name);
        bindings.volumes.push(Volume {
            name: volume_name.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(format!("{}-{}", credential.namespace, credential.name)),
                ..Default::default()
            }),
            ..Default::default()
        });
        bindings.mounts.push(VolumeMount {
            name: volume_name,
            mount_path: credential.mount_path.clone(),
            ..Default::default()
        });
    }
    bindings
}
