//! Deterministic names for credential volumes and provider classes
//!
//! Names are `<namespace>-<hash><suffix>` while that fits in a DNS label,
//! and a longer hash with the same suffix otherwise. The hash covers only
//! the semantic key, so the namespace prefix is purely for readability.

use multistage_common::crd::CredentialReference;
use multistage_common::kube_utils::{sanitize_dns_label, sha256_hex_prefix};
use multistage_common::DNS_LABEL_MAX_LENGTH;

/// Digest bytes kept when the namespace prefix fits
const SHORT_HASH_BYTES: usize = 8;

/// Digest bytes kept for hash-only names
const LONG_HASH_BYTES: usize = 16;

/// Suffix of every generated provider class name
const SPC_SUFFIX: &str = "-spc";

const MEMBER_SEPARATOR: char = '\0';

/// Name of the CSI volume mounting `collection` at `mount_path`.
pub fn csi_volume_name(namespace: &str, collection: &str, mount_path: &str) -> String {
    prefixed_or_hash_only(namespace, &group_key(collection, mount_path), "")
}

/// Name of the `SecretProviderClass` for one credential group.
///
/// Member names are part of the hash input, so two groups sharing a
/// collection and mount path but holding different credentials never share
/// a provider class. Each member is preceded by a NUL byte, which no
/// Kubernetes object name can contain.
pub fn secret_provider_class_name(
    namespace: &str,
    collection: &str,
    mount_path: &str,
    credentials: &[CredentialReference],
) -> String {
    let mut key = group_key(collection, mount_path);
    for credential in credentials {
        key.push(MEMBER_SEPARATOR);
        key.push_str(&credential.name);
    }
    prefixed_or_hash_only(namespace, &key, SPC_SUFFIX)
}

/// Name of the secret volume mounting one credential the legacy way
pub fn legacy_volume_name(namespace: &str, name: &str) -> String {
    sanitize_dns_label(&format!("{}-{}", namespace, name))
}

fn group_key(collection: &str, mount_path: &str) -> String {
    format!("{}-{}", collection, mount_path)
}

fn prefixed_or_hash_only(namespace: &str, key: &str, suffix: &str) -> String {
    let prefix = sanitize_dns_label(namespace);
    if !prefix.is_empty() {
        let name = format!(
            "{}-{}{}",
            prefix,
            sha256_hex_prefix(key, SHORT_HASH_BYTES),
            suffix
        );
        if name.len() <= DNS_LABEL_MAX_LENGTH {
            return name;
        }
    }
    format!("{}{}", sha256_hex_prefix(key, LONG_HASH_BYTES), suffix)
}
