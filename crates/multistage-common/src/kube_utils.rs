//! Kubernetes helpers shared by the compilation crates
//!
//! Typed metadata for generated resources, API resource derivation for
//! non-core kinds, and the hashing/sanitizing used for generated names.

use std::collections::BTreeMap;

use aws_lc_rs::digest;
use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};

use crate::DNS_LABEL_MAX_LENGTH;

// =============================================================================
// ObjectMeta
// =============================================================================

/// Minimal namespaced metadata for resources this workspace generates
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObjectMeta {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create new metadata with no labels
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// HasApiResource Trait
// =============================================================================

/// Trait for types that have a known API group, version, and kind.
///
/// Implement this for custom resource types so their `ApiResource` comes
/// from the same constants used when serializing them.
pub trait HasApiResource {
    /// Full API version (e.g., "secrets-store.csi.x-k8s.io/v1", "v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "SecretProviderClass")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// Build an ApiResource from an api_version and kind
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Split an api_version into (group, version); core resources have an empty group
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Lowercase plural of a kind, as used in API paths
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

// =============================================================================
// Hashing and names
// =============================================================================

/// Hex-encode the first `bytes` bytes of the SHA-256 digest of `input`.
///
/// Stable across processes and toolchains, so safe for persisted names.
pub fn sha256_hex_prefix(input: &str, bytes: usize) -> String {
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    hash.as_ref()
        .iter()
        .take(bytes)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Sanitize a string into a valid K8s DNS label.
///
/// DNS labels: `[a-z0-9]([-a-z0-9]*[a-z0-9])?`, max 63 chars.
pub fn sanitize_dns_label(s: &str) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = sanitized.trim_matches('-');
    if trimmed.len() > DNS_LABEL_MAX_LENGTH {
        trimmed[..DNS_LABEL_MAX_LENGTH]
            .trim_end_matches('-')
            .to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether `s` is a valid K8s DNS label
pub fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= DNS_LABEL_MAX_LENGTH
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}
