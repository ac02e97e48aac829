//! Test-cluster access: claimed clusters, kubeconfig paths, and profiles

use k8s_openapi::api::core::v1::{EnvVar, SecretVolumeSource, Volume, VolumeMount};

use multistage_common::crd::ClusterProfile;

use super::pod::{env_var, mount, StepPod};
use super::{CLUSTER_PROFILE_VOLUME_NAME, SHARED_DIR_MOUNT_PATH};
use crate::error::StepError;

/// Where the cluster profile secret is mounted
pub const CLUSTER_PROFILE_MOUNT_PATH: &str = "/var/run/secrets/ci.openshift.io/cluster-profile";

/// Secret holding the admin kubeconfig of a claimed cluster
pub const HIVE_ADMIN_KUBECONFIG_SECRET: &str = "hive-admin-kubeconfig";

/// Secret holding the admin password of a claimed cluster
pub const HIVE_ADMIN_PASSWORD_SECRET: &str = "hive-admin-password";

/// Directory the caller mounts per-test secrets under
const CLAIM_SECRETS_DIR: &str = "/secrets";

/// Mount path the caller uses for the per-test copy of `secret`
pub fn claim_secret_mount_path(test_name: &str, secret: &str) -> String {
    format!("{}/{}-{}", CLAIM_SECRETS_DIR, test_name, secret)
}

/// Environment and mounts exposing a claimed cluster to the primary
/// container.
///
/// The secrets are already mounted for the pod by the caller; they are
/// looked up by their expected mount path and re-mounted on the primary
/// container.
pub(crate) fn claim_pod_params(
    step: &str,
    test_name: &str,
    secret_mounts: &[VolumeMount],
) -> Result<(Vec<EnvVar>, Vec<VolumeMount>), StepError> {
    let mut env = Vec::new();
    let mut mounts = Vec::new();

    for (secret, variable, key) in [
        (HIVE_ADMIN_KUBECONFIG_SECRET, "KUBECONFIG", "kubeconfig"),
        (HIVE_ADMIN_PASSWORD_SECRET, "KUBEADMIN_PASSWORD_FILE", "password"),
    ] {
        let mount_path = claim_secret_mount_path(test_name, secret);
        let found = secret_mounts
            .iter()
            .find(|m| m.mount_path == mount_path)
            .ok_or_else(|| StepError::MissingClaimMount {
                step: step.to_string(),
                mount_path: mount_path.clone(),
                secret: format!("{}-{}", test_name, secret),
            })?;
        env.push(env_var(variable, format!("{}/{}", found.mount_path, key)));
        mounts.push(found.clone());
    }

    Ok((env, mounts))
}

/// Paths of the test cluster's kubeconfig files in the shared directory
pub(crate) fn kubeconfig_env() -> Vec<EnvVar> {
    vec![
        env_var("KUBECONFIG", format!("{}/kubeconfig", SHARED_DIR_MOUNT_PATH)),
        env_var(
            "KUBECONFIGMINIMAL",
            format!("{}/kubeconfig-minimal", SHARED_DIR_MOUNT_PATH),
        ),
        env_var(
            "KUBEADMIN_PASSWORD_FILE",
            format!("{}/kubeadmin-password", SHARED_DIR_MOUNT_PATH),
        ),
    ]
}

/// Mount the cluster profile secret and describe it to the step
pub(crate) fn add_cluster_profile(pod: &mut StepPod, secret_name: &str, profile: &ClusterProfile) {
    pod.add_volume(Volume {
        name: CLUSTER_PROFILE_VOLUME_NAME.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    });
    pod.add_primary_mount(mount(CLUSTER_PROFILE_VOLUME_NAME, CLUSTER_PROFILE_MOUNT_PATH));
    pod.add_primary_env([
        env_var("CLUSTER_PROFILE_NAME", profile.name.as_str()),
        env_var("CLUSTER_TYPE", profile.cluster_type.as_str()),
        env_var("CLUSTER_PROFILE_DIR", CLUSTER_PROFILE_MOUNT_PATH),
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim_mounts(test: &str) -> Vec<VolumeMount> {
        [HIVE_ADMIN_KUBECONFIG_SECRET, HIVE_ADMIN_PASSWORD_SECRET]
            .iter()
            .map(|secret| VolumeMount {
                name: format!("{}-{}", test, secret),
                mount_path: claim_secret_mount_path(test, secret),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn claim_params_point_into_mounted_secrets() {
        let (env, mounts) = claim_pod_params("install", "e2e", &claim_mounts("e2e")).unwrap();
        assert_eq!(env[0].name, "KUBECONFIG");
        assert_eq!(
            env[0].value.as_deref(),
            Some("/secrets/e2e-hive-admin-kubeconfig/kubeconfig")
        );
        assert_eq!(
            env[1].value.as_deref(),
            Some("/secrets/e2e-hive-admin-password/password")
        );
        assert_eq!(mounts.len(), 2);
    }

    #[test]
    fn missing_claim_mount_is_an_error() {
        let mut mounts = claim_mounts("e2e");
        mounts.pop();
        let err = claim_pod_params("install", "e2e", &mounts).unwrap_err();
        match err {
            StepError::MissingClaimMount {
                step, mount_path, ..
            } => {
                assert_eq!(step, "install");
                assert_eq!(mount_path, "/secrets/e2e-hive-admin-password");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn kubeconfig_env_lives_in_shared_dir() {
        let env = kubeconfig_env();
        assert_eq!(env.len(), 3);
        assert_eq!(
            env[0].value.as_deref(),
            Some("/var/run/secrets/ci.openshift.io/multi-stage/kubeconfig")
        );
    }
}
