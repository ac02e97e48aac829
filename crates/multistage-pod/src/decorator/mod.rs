//! Per-step decorator pipeline
//!
//! A step's base pod comes from the skeleton generator; everything specific
//! to multi-stage tests (identity, cluster access, shared directory,
//! credentials, VPN) is layered on here in a fixed order.

mod cluster;
mod env;
mod metadata;
mod mounts;
mod pod;
mod wrapper;

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Capabilities, Pod, SELinuxOptions};
use tracing::debug;

use multistage_common::crd::{ClaimRelease, LiteralStep};
use multistage_common::{release_stream_for, LABEL_METADATA_STEP, PIPELINE_IMAGE_STREAM};

use crate::compiler::{GeneratePodOptions, MultiStageCompiler, StepInputs};
use crate::decoration::DecorationState;
use crate::dependencies::{dependency_parts, env_for_dependencies};
use crate::error::{StepError, StepFailure};
use crate::quantity::{resources_for, split_shm};
use crate::security::partition_security_contexts;
use crate::skeleton::SkeletonRequest;

pub use cluster::{
    claim_secret_mount_path, CLUSTER_PROFILE_MOUNT_PATH, HIVE_ADMIN_KUBECONFIG_SECRET,
    HIVE_ADMIN_PASSWORD_SECRET,
};

use pod::StepPod;

/// Name of the container running the step's commands
pub const PRIMARY_CONTAINER_NAME: &str = "test";

/// Name of the VPN client sidecar
pub const VPN_CONTAINER_NAME: &str = "vpn-client";

/// Where the test's shared directory is mounted
pub const SHARED_DIR_MOUNT_PATH: &str = "/var/run/secrets/ci.openshift.io/multi-stage";

/// Where step scripts are mounted when a step runs as a script
pub const COMMAND_SCRIPT_MOUNT_PATH: &str = "/var/run/configmaps/ci.openshift.io/multi-stage";

/// Prepended to inline commands
pub const COMMAND_PREFIX: &str = "#!/bin/bash\nset -eu\n";

const HOME_VOLUME_NAME: &str = "home";
const HOME_MOUNT_PATH: &str = "/alabama";
const CLUSTER_PROFILE_VOLUME_NAME: &str = "cluster-profile";

/// Secret holding the cluster profile of `test_name`
pub fn cluster_profile_secret_name(test_name: &str) -> String {
    format!("{}-cluster-profile", test_name)
}

/// ConfigMap holding the step scripts of `test_name`
pub fn command_config_map_name(test_name: &str) -> String {
    format!("{}-commands", test_name)
}

/// Image the primary container runs: a pipeline link for `from_image`,
/// otherwise the (claim-aware) `stream:tag` of `from`
fn step_image(step: &LiteralStep, claim_release: Option<&ClaimRelease>) -> String {
    if let Some(link) = step.from_image_tag() {
        return format!("{}:{}", PIPELINE_IMAGE_STREAM, link);
    }
    let (stream, tag) = dependency_parts(&step.from, claim_release);
    format!("{}:{}", stream, tag)
}

fn step_command(step: &LiteralStep) -> Vec<String> {
    if step.runs_as_script() {
        vec![format!("{}/{}", COMMAND_SCRIPT_MOUNT_PATH, step.as_)]
    } else {
        vec![
            "/bin/bash".to_string(),
            "-c".to_string(),
            format!("{}{}", COMMAND_PREFIX, step.commands),
        ]
    }
}

fn vpn_capabilities() -> Capabilities {
    Capabilities {
        add: Some(vec!["NET_ADMIN".to_string()]),
        drop: Some(vec!["ALL".to_string()]),
    }
}

// TODO: container_runtime_t grants far more than tun access; switch to a
// dedicated SELinux type once one is shipped with the cluster policy.
fn vpn_se_linux() -> SELinuxOptions {
    SELinuxOptions {
        user: Some("system_u".to_string()),
        role: Some("system_r".to_string()),
        type_: Some("container_runtime_t".to_string()),
        level: Some("s0".to_string()),
    }
}

impl MultiStageCompiler<'_> {
    /// Compile one step into a pod.
    ///
    /// Any error discards the step's pod; the errors are attributed to the
    /// step by name.
    pub(crate) async fn compile_step(
        &self,
        step: &LiteralStep,
        decoration: &DecorationState,
        claim_release: Option<&ClaimRelease>,
        inputs: &StepInputs,
        options: GeneratePodOptions,
    ) -> Result<Pod, StepFailure> {
        let name = format!("{}-{}", self.test_name, step.as_);

        // 1. Image, resources, and command
        let image = step_image(step, claim_release);
        let resources = resources_for(&step.resources).map_err(|message| StepError::Resources {
            step: step.as_.clone(),
            message,
        })?;
        let (resources, shm) = split_shm(resources);
        let artifact_dir = format!("{}/{}", self.test_name, step.as_);

        // 2. Base pod
        let mut pod = self
            .skeleton
            .generate(SkeletonRequest {
                name: &name,
                namespace: &self.job.namespace,
                labels: BTreeMap::from([(LABEL_METADATA_STEP.to_string(), step.as_.clone())]),
                node_name: self.job.node_name.as_deref(),
                container_name: PRIMARY_CONTAINER_NAME,
                command: step_command(step),
                image: &image,
                resources,
                artifact_dir: &artifact_dir,
                decoration,
                job_id: self.job.prow_job_id.as_deref(),
                raw_spec: self.job.raw_spec.as_deref(),
                extra_mounts: &inputs.secret_mounts,
                propagate_exit_code: options.observer,
            })
            .and_then(StepPod::new)
            .map_err(|source| StepError::Skeleton {
                step: step.as_.clone(),
                source,
            })?;

        // 3. Identity and scheduling
        let needs_kubeconfig = !step.no_kubeconfig.unwrap_or(false) || options.observer;
        metadata::apply_test_metadata(&mut pod, self.test_name);
        metadata::apply_service_account(&mut pod, self.test_name, needs_kubeconfig);
        pod.spec.termination_grace_period_seconds =
            Some(decoration.termination_grace_period_seconds());
        if let Some(dns) = &step.dns_config {
            metadata::apply_dns(&mut pod, dns);
        }
        if let Some(arch) = step.node_architecture {
            metadata::apply_node_architecture(&mut pod, arch);
        }
        metadata::add_home_volume(&mut pod, &inputs.secret_volumes);

        // 4. Entrypoint wrapper and VPN sidecar
        wrapper::add_entrypoint_wrapper(&mut pod, self.vpn, !needs_kubeconfig, options.observer);
        if let Some(vpn) = self.vpn {
            wrapper::add_vpn_client(&mut pod, vpn);
        }

        // 5. Environment
        pod.add_primary_env(env::identity_env(self.job, self.test_name));
        pod.add_primary_env(inputs.env.iter().cloned());
        pod.add_primary_env(env::parameter_env(&step.environment, &self.env_overrides));
        let (dependency_env, errors) =
            env_for_dependencies(self.resolver, &self.job.namespace, step, claim_release).await;
        if !errors.is_empty() {
            return Err(StepFailure { errors });
        }
        pod.add_primary_env(dependency_env);

        if let Some(owner) = &self.job.owner {
            pod.metadata
                .owner_references
                .get_or_insert_with(Vec::new)
                .push(owner.into());
        }

        // 6. Cluster access
        if self.cluster_claim.is_some() && self.cluster_profile.is_some() {
            return Err(StepError::ClusterConfigConflict {
                step: step.as_.clone(),
            }
            .into());
        }
        if self.cluster_claim.is_some() {
            let (claim_env, claim_mounts) =
                cluster::claim_pod_params(&step.as_, self.test_name, &inputs.secret_mounts)?;
            pod.add_primary_env(claim_env);
            for m in claim_mounts {
                pod.add_primary_mount(m);
            }
        } else if needs_kubeconfig {
            pod.add_primary_env(cluster::kubeconfig_env());
        }

        // 7. Volumes
        if let Some(size) = shm {
            mounts::add_dshm(&mut pod, size);
        }
        if let Some(profile) = self.cluster_profile {
            cluster::add_cluster_profile(
                &mut pod,
                &cluster_profile_secret_name(self.test_name),
                profile,
            );
        }
        if !step.cli.is_empty() {
            let cli = format!("{}:cli", release_stream_for(&step.cli));
            let (stream, _) = dependency_parts(&cli, claim_release);
            mounts::add_cli_injector(&mut pod, &stream);
        }
        mounts::add_shared_dir(&mut pod, self.test_name);
        mounts::add_credentials(&mut pod, options.credential_mounting, &step.credentials);
        if step.runs_as_script() {
            mounts::add_command_script(&mut pod, &command_config_map_name(self.test_name));
        }

        // 8. Security contexts
        let mut pod = pod.into_pod();
        if let Some(vpn) = self.vpn {
            partition_security_contexts(
                &mut pod,
                VPN_CONTAINER_NAME,
                vpn.namespace_uid,
                &vpn_capabilities(),
                &vpn_se_linux(),
            );
        }

        debug!(test = %self.test_name, step = %step.as_, pod = %name, "compiled step pod");
        Ok(pod)
    }
}
