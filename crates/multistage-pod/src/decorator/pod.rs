//! Pod under construction

use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::error::SkeletonError;

/// A base pod split into metadata and a spec with at least one container.
///
/// The first container is the primary one; decorators never remove
/// containers, so it stays addressable until `into_pod`.
#[derive(Debug)]
pub(crate) struct StepPod {
    pub(crate) metadata: ObjectMeta,
    pub(crate) spec: PodSpec,
}

impl StepPod {
    pub(crate) fn new(pod: Pod) -> Result<Self, SkeletonError> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        match pod.spec {
            Some(spec) if !spec.containers.is_empty() => Ok(Self {
                metadata: pod.metadata,
                spec,
            }),
            _ => Err(SkeletonError::NoContainers { pod: name }),
        }
    }

    pub(crate) fn into_pod(self) -> Pod {
        Pod {
            metadata: self.metadata,
            spec: Some(self.spec),
            ..Default::default()
        }
    }

    pub(crate) fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub(crate) fn primary(&mut self) -> &mut Container {
        &mut self.spec.containers[0]
    }

    pub(crate) fn container_named(&mut self, name: &str) -> Option<&mut Container> {
        self.spec.containers.iter_mut().find(|c| c.name == name)
    }

    pub(crate) fn add_volume(&mut self, volume: Volume) {
        self.spec.volumes.get_or_insert_with(Vec::new).push(volume);
    }

    pub(crate) fn add_volumes(&mut self, volumes: impl IntoIterator<Item = Volume>) {
        self.spec.volumes.get_or_insert_with(Vec::new).extend(volumes);
    }

    pub(crate) fn add_init_container(&mut self, container: Container) {
        self.spec
            .init_containers
            .get_or_insert_with(Vec::new)
            .push(container);
    }

    pub(crate) fn add_container(&mut self, container: Container) {
        self.spec.containers.push(container);
    }

    pub(crate) fn add_primary_mount(&mut self, mount: VolumeMount) {
        add_mount(self.primary(), mount);
    }

    pub(crate) fn add_primary_env(&mut self, env: impl IntoIterator<Item = EnvVar>) {
        self.primary().env.get_or_insert_with(Vec::new).extend(env);
    }
}

pub(crate) fn add_mount(container: &mut Container, mount: VolumeMount) {
    container.volume_mounts.get_or_insert_with(Vec::new).push(mount);
}

pub(crate) fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

pub(crate) fn mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        ..Default::default()
    }
}
