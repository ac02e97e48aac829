//! Grouping of credentials by collection and mount path

use std::collections::HashMap;

use multistage_common::crd::CredentialReference;

use crate::naming::{csi_volume_name, secret_provider_class_name};

/// Credentials fetched together into one mount path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialGroup {
    /// Secret-manager collection shared by every member
    pub collection: String,
    /// Mount path shared by every member
    pub mount_path: String,
    /// Members in first-seen order
    pub members: Vec<CredentialReference>,
}

impl CredentialGroup {
    /// `collection:mount_path`
    pub fn key(&self) -> String {
        format!("{}:{}", self.collection, self.mount_path)
    }

    /// Name of the CSI volume serving this group in `namespace`
    pub fn volume_name(&self, namespace: &str) -> String {
        csi_volume_name(namespace, &self.collection, &self.mount_path)
    }

    /// Name of the provider class describing this group in `namespace`
    pub fn secret_provider_class_name(&self, namespace: &str) -> String {
        secret_provider_class_name(namespace, &self.collection, &self.mount_path, &self.members)
    }
}

/// Partition credentials by `(collection, mount_path)`.
///
/// Groups appear in the order their first member appears, and members keep
/// their input order.
pub fn group_credentials(credentials: &[CredentialReference]) -> Vec<CredentialGroup> {
    let mut groups: Vec<CredentialGroup> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for credential in credentials {
        let key = (credential.collection.as_str(), credential.mount_path.as_str());
        match index.get(&key) {
            Some(&i) => groups[i].members.push(credential.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(CredentialGroup {
                    collection: credential.collection.clone(),
                    mount_path: credential.mount_path.clone(),
                    members: vec![credential.clone()],
                });
            }
        }
    }

    groups
}
