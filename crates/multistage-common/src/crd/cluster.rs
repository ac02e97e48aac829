//! Test-cluster configuration: claims, profiles, and VPN access

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::LATEST_RELEASE_NAME;

/// A pre-provisioned cluster claimed from a pool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterClaim {
    /// Product installed on the pooled cluster
    pub product: String,
    /// Version of the product
    pub version: String,
    /// CPU architecture of the pooled cluster
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    /// Cloud the pool runs on
    pub cloud: String,
    /// Pool owner
    pub owner: String,
}

/// Renaming of the release under test when a claimed cluster provides it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRelease {
    /// Release imported from the claimed cluster
    pub release_name: String,
    /// Release the claim replaces
    pub override_name: String,
}

impl ClusterClaim {
    /// Release mapping for the test named `test_name`
    pub fn claim_release(&self, test_name: &str) -> ClaimRelease {
        ClaimRelease {
            release_name: format!("{}-{}", test_name, LATEST_RELEASE_NAME),
            override_name: LATEST_RELEASE_NAME.to_string(),
        }
    }
}

/// Cloud credentials and settings used to provision a test cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterProfile {
    /// Profile name (e.g. "aws", "gcp-qe")
    pub name: String,
    /// Cluster type the profile provisions (e.g. "aws", "gcp")
    pub cluster_type: String,
}

/// VPN client sidecar injected next to every step
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct VpnConfig {
    /// Image of the VPN client
    pub image: String,
    /// Commands that bring the connection up
    pub commands: String,
    /// How long the step waits for the connection (Go duration)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<String>,
    /// UID assigned to the test namespace; non-root containers run as it
    pub namespace_uid: i64,
}
