//! Pod metadata, identity, and scheduling overrides

use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, PodDNSConfig, Volume};

use multistage_common::crd::{NodeArchitecture, StepDnsConfig};
use multistage_common::{
    ANNOTATION_SAVE_CONTAINER_LOGS, LABEL_ARCH, LABEL_MULTI_STAGE_TEST, LABEL_PROW_JOB_ID,
};

use super::pod::{add_mount, mount, StepPod};
use super::{HOME_MOUNT_PATH, HOME_VOLUME_NAME, PRIMARY_CONTAINER_NAME};

/// Replace the run label with the test label and keep container logs
pub(crate) fn apply_test_metadata(pod: &mut StepPod, test_name: &str) {
    let labels = pod.metadata.labels.get_or_insert_with(Default::default);
    labels.remove(LABEL_PROW_JOB_ID);
    labels.insert(LABEL_MULTI_STAGE_TEST.to_string(), test_name.to_string());

    pod.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(ANNOTATION_SAVE_CONTAINER_LOGS.to_string(), "true".to_string());
}

/// Run under the test's service account, or with no API credentials at all
pub(crate) fn apply_service_account(pod: &mut StepPod, test_name: &str, needs_kubeconfig: bool) {
    if needs_kubeconfig {
        pod.spec.service_account_name = Some(test_name.to_string());
    } else {
        pod.spec.service_account_name = None;
        pod.spec.automount_service_account_token = Some(false);
    }
}

/// Append the step's DNS settings; custom nameservers disable cluster DNS
pub(crate) fn apply_dns(pod: &mut StepPod, dns: &StepDnsConfig) {
    let config = pod.spec.dns_config.get_or_insert_with(PodDNSConfig::default);
    if !dns.nameservers.is_empty() {
        config
            .nameservers
            .get_or_insert_with(Vec::new)
            .extend(dns.nameservers.iter().cloned());
    }
    if !dns.searches.is_empty() {
        config
            .searches
            .get_or_insert_with(Vec::new)
            .extend(dns.searches.iter().cloned());
    }
    if config.nameservers.as_ref().is_some_and(|n| !n.is_empty()) {
        pod.spec.dns_policy = Some("None".to_string());
    }
}

/// Pin the pod to nodes of `arch`
pub(crate) fn apply_node_architecture(pod: &mut StepPod, arch: NodeArchitecture) {
    pod.spec
        .node_selector
        .get_or_insert_with(Default::default)
        .insert(LABEL_ARCH.to_string(), arch.as_str().to_string());
}

/// Writable home directory for the primary container, plus the caller's
/// secret volumes
pub(crate) fn add_home_volume(pod: &mut StepPod, secret_volumes: &[Volume]) {
    pod.add_volume(Volume {
        name: HOME_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    });
    pod.add_volumes(secret_volumes.iter().cloned());
    if let Some(container) = pod.container_named(PRIMARY_CONTAINER_NAME) {
        add_mount(container, mount(HOME_VOLUME_NAME, HOME_MOUNT_PATH));
    }
}
