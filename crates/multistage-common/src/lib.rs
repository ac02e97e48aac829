//! Common types for multi-stage test compilation: step definitions, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod duration;
pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Image stream holding images built by the pipeline for the current run
pub const PIPELINE_IMAGE_STREAM: &str = "pipeline";

/// Image stream holding the release payload under test
pub const STABLE_IMAGE_STREAM: &str = "stable";

/// Name of the release being tested
pub const LATEST_RELEASE_NAME: &str = "latest";

/// Registry domain serving CI-built helper images
pub const CI_REGISTRY_DOMAIN: &str = "quay-proxy.ci.openshift.org";

/// Label carrying the name of the multi-stage test a resource belongs to
pub const LABEL_MULTI_STAGE_TEST: &str = "ci.openshift.io/multi-stage-test";

/// Label carrying the name of the step a pod runs
pub const LABEL_METADATA_STEP: &str = "ci.openshift.io/metadata.step";

/// Label set by the skeleton generator with the job's run identifier
pub const LABEL_PROW_JOB_ID: &str = "prow.k8s.io/id";

/// Annotation asking the run to keep container logs once a pod completes
pub const ANNOTATION_SAVE_CONTAINER_LOGS: &str = "ci-operator.openshift.io/save-container-logs";

/// Extended resource name requesting a sized `/dev/shm`
pub const SHM_RESOURCE: &str = "ci-operator.openshift.io/shm";

/// Well-known node label holding the node's CPU architecture
pub const LABEL_ARCH: &str = "kubernetes.io/arch";

/// Maximum length of a Kubernetes DNS label
pub const DNS_LABEL_MAX_LENGTH: usize = 63;

/// Stream that hosts the release named `name`.
///
/// The release under test lives in `stable`; every other release is
/// imported into `stable-<name>`.
pub fn release_stream_for(name: &str) -> String {
    if name == LATEST_RELEASE_NAME {
        STABLE_IMAGE_STREAM.to_string()
    } else {
        format!("{}-{}", STABLE_IMAGE_STREAM, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_release_lives_in_stable() {
        assert_eq!(release_stream_for("latest"), "stable");
    }

    #[test]
    fn other_releases_get_suffixed_stream() {
        assert_eq!(release_stream_for("initial"), "stable-initial");
    }
}
