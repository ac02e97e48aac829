//! Base pod generation
//!
//! The decorator pipeline starts from a base pod produced by a `PodSkeleton`.
//! `MinimalPodSkeleton` builds the smallest pod the pipeline needs: one
//! primary container running the step command, a `logs` volume, and the
//! entrypoint options derived from the step's decoration.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, Pod, PodSpec, ResourceRequirements, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;

use multistage_common::LABEL_PROW_JOB_ID;

use crate::decoration::DecorationState;
use crate::error::SkeletonError;

/// Volume holding logs and artifacts of the step
pub const LOGS_VOLUME_NAME: &str = "logs";

/// Where the logs volume is mounted
pub const LOGS_MOUNT_PATH: &str = "/logs";

/// Label marking pods created by the CI system
pub const LABEL_CREATED_BY_CI: &str = "created-by-ci";

/// Maximum length of a DNS subdomain (pod names)
const DNS_SUBDOMAIN_MAX_LENGTH: usize = 253;

/// Everything needed to generate the base pod of one step
#[derive(Clone, Debug)]
pub struct SkeletonRequest<'a> {
    /// Pod name
    pub name: &'a str,
    /// Pod namespace
    pub namespace: &'a str,
    /// Labels to set on the pod
    pub labels: BTreeMap<String, String>,
    /// Node to pin the pod to
    pub node_name: Option<&'a str>,
    /// Name of the primary container
    pub container_name: &'a str,
    /// Command of the primary container
    pub command: Vec<String>,
    /// Image of the primary container
    pub image: &'a str,
    /// Resources of the primary container
    pub resources: ResourceRequirements,
    /// Artifact directory, relative to the artifact root
    pub artifact_dir: &'a str,
    /// Timeout and grace period of the step process
    pub decoration: &'a DecorationState,
    /// Identifier of the CI job run
    pub job_id: Option<&'a str>,
    /// Serialized job specification exposed to the step
    pub raw_spec: Option<&'a str>,
    /// Extra mounts for the primary container
    pub extra_mounts: &'a [VolumeMount],
    /// Propagate the process exit code instead of reporting via the sidecar
    pub propagate_exit_code: bool,
}

/// Produces the base pod the decorator pipeline mutates
pub trait PodSkeleton: Send + Sync {
    /// Generate the base pod for one step
    fn generate(&self, request: SkeletonRequest<'_>) -> Result<Pod, SkeletonError>;
}

/// Skeleton generator with no decoration sidecars
#[derive(Clone, Debug, Default)]
pub struct MinimalPodSkeleton {
    registry: Option<String>,
}

impl MinimalPodSkeleton {
    /// Create a generator that leaves image references untouched
    pub fn new() -> Self {
        Self::default()
    }

    /// Qualify `stream:tag` references as `<registry>/<namespace>/stream:tag`
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    fn image_for(&self, namespace: &str, image: &str) -> String {
        match &self.registry {
            Some(registry) if !image.contains('/') => {
                format!("{}/{}/{}", registry.trim_end_matches('/'), namespace, image)
            }
            _ => image.to_string(),
        }
    }
}

impl PodSkeleton for MinimalPodSkeleton {
    fn generate(&self, request: SkeletonRequest<'_>) -> Result<Pod, SkeletonError> {
        validate_pod_name(request.name)?;
        if request.image.is_empty() {
            return Err(SkeletonError::MissingImage {
                container: request.container_name.to_string(),
            });
        }

        let mut labels = request.labels;
        labels.insert(LABEL_CREATED_BY_CI.to_string(), "true".to_string());
        if let Some(id) = request.job_id {
            labels.insert(LABEL_PROW_JOB_ID.to_string(), id.to_string());
        }

        let artifact_dir = format!("{}/artifacts/{}", LOGS_MOUNT_PATH, request.artifact_dir);
        let entrypoint_options = json!({
            "args": request.command,
            "timeout": request.decoration.timeout.to_string(),
            "grace_period": request.decoration.grace_period.to_string(),
            "artifact_dir": artifact_dir,
            "propagate_exit_code": request.propagate_exit_code,
        });

        let mut env = vec![
            EnvVar {
                name: "ARTIFACT_DIR".to_string(),
                value: Some(artifact_dir),
                ..Default::default()
            },
            EnvVar {
                name: "ENTRYPOINT_OPTIONS".to_string(),
                value: Some(entrypoint_options.to_string()),
                ..Default::default()
            },
        ];
        if let Some(spec) = request.raw_spec {
            env.push(EnvVar {
                name: "JOB_SPEC".to_string(),
                value: Some(spec.to_string()),
                ..Default::default()
            });
        }

        let mut volume_mounts = vec![VolumeMount {
            name: LOGS_VOLUME_NAME.to_string(),
            mount_path: LOGS_MOUNT_PATH.to_string(),
            ..Default::default()
        }];
        volume_mounts.extend(request.extra_mounts.iter().cloned());

        let container = Container {
            name: request.container_name.to_string(),
            image: Some(self.image_for(request.namespace, request.image)),
            command: Some(request.command),
            resources: Some(request.resources),
            env: Some(env),
            volume_mounts: Some(volume_mounts),
            termination_message_policy: Some("FallbackToLogsOnError".to_string()),
            ..Default::default()
        };

        Ok(Pod {
            metadata: ObjectMeta {
                name: Some(request.name.to_string()),
                namespace: Some(request.namespace.to_string()),
                labels: Some(labels),
                annotations: Some(BTreeMap::new()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container],
                volumes: Some(vec![Volume {
                    name: LOGS_VOLUME_NAME.to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                }]),
                node_name: request.node_name.map(str::to_string),
                restart_policy: Some("Never".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

fn validate_pod_name(name: &str) -> Result<(), SkeletonError> {
    let invalid = |reason: &str| SkeletonError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > DNS_SUBDOMAIN_MAX_LENGTH {
        return Err(invalid("name exceeds 253 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "name may only contain lowercase alphanumerics, '-' and '.'",
        ));
    }
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return Err(invalid("name must start and end with an alphanumeric"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use multistage_common::crd::DecorationDefaults;

    fn request<'a>(name: &'a str, decoration: &'a DecorationState) -> SkeletonRequest<'a> {
        SkeletonRequest {
            name,
            namespace: "ci-op-1234",
            labels: BTreeMap::from([("step".to_string(), "e2e".to_string())]),
            node_name: None,
            container_name: "test",
            command: vec!["/bin/bash".to_string(), "-c".to_string(), "make".to_string()],
            image: "pipeline:src",
            resources: ResourceRequirements::default(),
            artifact_dir: "e2e/test",
            decoration,
            job_id: Some("run-1"),
            raw_spec: Some("{}"),
            extra_mounts: &[],
            propagate_exit_code: false,
        }
    }

    #[test]
    fn builds_single_container_pod() {
        let decoration = DecorationState::from(&DecorationDefaults::default());
        let pod = MinimalPodSkeleton::new()
            .generate(request("e2e-test", &decoration))
            .unwrap();

        assert_eq!(pod.metadata.name.as_deref(), Some("e2e-test"));
        let labels = pod.metadata.labels.unwrap();
        assert_eq!(labels[LABEL_PROW_JOB_ID], "run-1");
        assert_eq!(labels["step"], "e2e");

        let spec = pod.spec.unwrap();
        assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
        assert_eq!(spec.containers.len(), 1);
        let container = &spec.containers[0];
        assert_eq!(container.name, "test");
        assert_eq!(container.image.as_deref(), Some("pipeline:src"));

        let env = container.env.as_ref().unwrap();
        let options = env.iter().find(|e| e.name == "ENTRYPOINT_OPTIONS").unwrap();
        let options: serde_json::Value =
            serde_json::from_str(options.value.as_deref().unwrap()).unwrap();
        assert_eq!(options["timeout"], "2h0m0s");
        assert_eq!(options["artifact_dir"], "/logs/artifacts/e2e/test");
        assert!(env.iter().any(|e| e.name == "JOB_SPEC"));
    }

    #[test]
    fn registry_qualifies_stream_references() {
        let decoration = DecorationState::from(&DecorationDefaults::default());
        let pod = MinimalPodSkeleton::new()
            .with_registry("registry.ci.example.com/")
            .generate(request("e2e-test", &decoration))
            .unwrap();
        let image = pod.spec.unwrap().containers[0].image.clone().unwrap();
        assert_eq!(image, "registry.ci.example.com/ci-op-1234/pipeline:src");
    }

    #[test]
    fn rejects_invalid_names() {
        let decoration = DecorationState::from(&DecorationDefaults::default());
        for name in ["", "E2E", "e2e_test", "-e2e", "e2e-"] {
            let err = MinimalPodSkeleton::new()
                .generate(request(name, &decoration))
                .unwrap_err();
            assert!(
                matches!(err, SkeletonError::InvalidName { .. }),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn rejects_missing_image() {
        let decoration = DecorationState::from(&DecorationDefaults::default());
        let mut req = request("e2e-test", &decoration);
        req.image = "";
        let err = MinimalPodSkeleton::new().generate(req).unwrap_err();
        assert_eq!(
            err,
            SkeletonError::MissingImage {
                container: "test".to_string()
            }
        );
    }
}
