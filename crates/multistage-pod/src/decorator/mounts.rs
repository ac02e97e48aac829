//! Volumes attached to the primary container

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EmptyDirVolumeSource, SecretVolumeSource, Volume,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::info;

use multistage_common::crd::CredentialReference;
use multistage_credentials::CredentialMounting;

use super::pod::{env_var, mount, StepPod};
use super::{COMMAND_SCRIPT_MOUNT_PATH, SHARED_DIR_MOUNT_PATH};

const DSHM_VOLUME_NAME: &str = "dshm";
const CLI_VOLUME_NAME: &str = "cli";
const CLI_MOUNT_PATH: &str = "/cli";
const COMMAND_SCRIPT_VOLUME_NAME: &str = "commands-script";

/// Memory-backed `/dev/shm` of `size`
pub(crate) fn add_dshm(pod: &mut StepPod, size: Quantity) {
    info!(pod = %pod.metadata.name.as_deref().unwrap_or_default(), "adding dshm volume to pod");
    pod.add_volume(Volume {
        name: DSHM_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource {
            medium: Some("Memory".to_string()),
            size_limit: Some(size),
        }),
        ..Default::default()
    });
    pod.add_primary_mount(mount(DSHM_VOLUME_NAME, "/dev/shm"));
}

/// Copy the `oc` binary from `image_stream`'s cli-artifacts into `/cli`.
///
/// The RHEL8 build is preferred; releases that predate it only ship the
/// plain binary.
pub(crate) fn add_cli_injector(pod: &mut StepPod, image_stream: &str) {
    pod.add_volume(Volume {
        name: CLI_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    });
    let script = format!(
        "ARCH=$(uname -m | sed 's/x86_64/amd64/;s/aarch64/arm64/'); \
         if [[ -e /usr/share/openshift/linux_${{ARCH}}/oc.rhel8 ]]; \
         then /bin/cp /usr/share/openshift/linux_${{ARCH}}/oc.rhel8 {dir}/oc; \
         else /bin/cp /usr/share/openshift/linux_${{ARCH}}/oc {dir}; fi",
        dir = CLI_MOUNT_PATH
    );
    pod.add_init_container(Container {
        name: "inject-cli".to_string(),
        image: Some(format!("{}:cli-artifacts", image_stream)),
        command: Some(vec!["/bin/sh".to_string()]),
        args: Some(vec!["-c".to_string(), script]),
        volume_mounts: Some(vec![mount(CLI_VOLUME_NAME, CLI_MOUNT_PATH)]),
        ..Default::default()
    });
    pod.add_primary_mount(mount(CLI_VOLUME_NAME, CLI_MOUNT_PATH));
    pod.add_primary_env([env_var("CLI_DIR", CLI_MOUNT_PATH)]);
}

/// Directory shared between the steps of a test, backed by a Secret
pub(crate) fn add_shared_dir(pod: &mut StepPod, secret: &str) {
    pod.add_volume(Volume {
        name: secret.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    });
    pod.add_primary_mount(mount(secret, SHARED_DIR_MOUNT_PATH));
    pod.add_primary_env([env_var("SHARED_DIR", SHARED_DIR_MOUNT_PATH)]);
}

/// Mount `credentials` with the chosen strategy
pub(crate) fn add_credentials(
    pod: &mut StepPod,
    strategy: CredentialMounting,
    credentials: &[CredentialReference],
) {
    let bindings = strategy.bind(pod.namespace(), credentials);
    pod.add_volumes(bindings.volumes);
    for m in bindings.mounts {
        pod.add_primary_mount(m);
    }
}

/// Executable step scripts from the test's ConfigMap
pub(crate) fn add_command_script(pod: &mut StepPod, config_map: &str) {
    pod.add_volume(Volume {
        name: COMMAND_SCRIPT_VOLUME_NAME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            default_mode: Some(0o777),
            ..Default::default()
        }),
        ..Default::default()
    });
    pod.add_primary_mount(mount(COMMAND_SCRIPT_VOLUME_NAME, COMMAND_SCRIPT_MOUNT_PATH));
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Pod, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn step_pod() -> StepPod {
        StepPod::new(Pod {
            metadata: ObjectMeta {
                name: Some("e2e-test".to_string()),
                namespace: Some("test-ns".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "test".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap()
    }

    fn volume<'a>(pod: &'a StepPod, name: &str) -> &'a Volume {
        pod.spec
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .find(|v| v.name == name)
            .unwrap()
    }

    #[test]
    fn dshm_is_memory_backed() {
        let mut pod = step_pod();
        add_dshm(&mut pod, Quantity("2G".to_string()));
        let empty_dir = volume(&pod, "dshm").empty_dir.clone().unwrap();
        assert_eq!(empty_dir.medium.as_deref(), Some("Memory"));
        assert_eq!(empty_dir.size_limit, Some(Quantity("2G".to_string())));
        assert_eq!(
            pod.primary().volume_mounts.as_ref().unwrap()[0].mount_path,
            "/dev/shm"
        );
    }

    #[test]
    fn cli_injector_copies_oc() {
        let mut pod = step_pod();
        add_cli_injector(&mut pod, "stable-initial");
        let init = &pod.spec.init_containers.as_ref().unwrap()[0];
        assert_eq!(init.image.as_deref(), Some("stable-initial:cli-artifacts"));
        let script = &init.args.as_ref().unwrap()[1];
        assert!(script.contains("oc.rhel8 /cli/oc;"), "{script}");
        assert!(script.contains("linux_${ARCH}/oc /cli; fi"), "{script}");
        let env = pod.primary().env.clone().unwrap();
        assert_eq!(env[0].name, "CLI_DIR");
    }

    #[test]
    fn shared_dir_uses_test_secret() {
        let mut pod = step_pod();
        add_shared_dir(&mut pod, "e2e");
        let secret = volume(&pod, "e2e").secret.clone().unwrap();
        assert_eq!(secret.secret_name.as_deref(), Some("e2e"));
        let env = pod.primary().env.clone().unwrap();
        assert_eq!(
            env[0].value.as_deref(),
            Some("/var/run/secrets/ci.openshift.io/multi-stage")
        );
    }

    #[test]
    fn csi_credentials_use_pod_namespace() {
        let mut pod = step_pod();
        let creds = vec![CredentialReference {
            name: "cred1".to_string(),
            collection: "coll1".to_string(),
            mount_path: "/tmp/cred1".to_string(),
            ..Default::default()
        }];
        add_credentials(&mut pod, CredentialMounting::SecretsStoreCsi, &creds);
        assert!(pod.spec.volumes.as_ref().unwrap()[0].csi.is_some());
        assert_eq!(
            pod.primary().volume_mounts.as_ref().unwrap()[0].name,
            "test-ns-3b8b9081288110be"
        );
    }

    #[test]
    fn command_script_is_executable() {
        let mut pod = step_pod();
        add_command_script(&mut pod, "e2e-commands");
        let config_map = volume(&pod, "commands-script").config_map.clone().unwrap();
        assert_eq!(config_map.name, "e2e-commands");
        assert_eq!(config_map.default_mode, Some(0o777));
    }
}
