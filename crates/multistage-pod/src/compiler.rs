//! MultiStageCompiler: configuration shared by every step of one test
//!
//! The compiler holds borrowed, read-only configuration. Each call to
//! `generate_pods` or `generate_observers` (see `driver`) compiles a batch of
//! steps against it, so independent batches may be compiled concurrently.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};

use multistage_common::crd::{ClusterClaim, ClusterProfile, ExecutionFlags, JobContext, VpnConfig};
use multistage_credentials::CredentialMounting;

use crate::dependencies::ImageResolver;
use crate::events::{EventRecorder, NoopRecorder};
use crate::skeleton::PodSkeleton;

/// Caller-provided additions shared by every step in a batch
#[derive(Clone, Debug, Default)]
pub struct StepInputs {
    /// Environment appended after the identity variables
    pub env: Vec<EnvVar>,
    /// Secret volumes added to every pod
    pub secret_volumes: Vec<Volume>,
    /// Mounts of `secret_volumes` for the primary container
    pub secret_mounts: Vec<VolumeMount>,
}

/// Per-batch compilation options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeneratePodOptions {
    /// Compile the steps as observers
    pub observer: bool,
    /// How step credentials are mounted
    pub credential_mounting: CredentialMounting,
}

/// Compiles the steps of one multi-stage test into pods.
///
/// ```rust,ignore
/// let generated = MultiStageCompiler::new("e2e", &job, &skeleton, &resolver)
///     .with_flags(flags)
///     .with_cluster_profile(&profile)
///     .with_recorder(&recorder)
///     .generate_pods(&steps, &inputs, options)
///     .await;
/// ```
pub struct MultiStageCompiler<'a> {
    pub(crate) test_name: &'a str,
    pub(crate) job: &'a JobContext,
    pub(crate) skeleton: &'a dyn PodSkeleton,
    pub(crate) resolver: &'a dyn ImageResolver,
    pub(crate) recorder: &'a dyn EventRecorder,
    pub(crate) flags: ExecutionFlags,
    pub(crate) cluster_claim: Option<&'a ClusterClaim>,
    pub(crate) cluster_profile: Option<&'a ClusterProfile>,
    pub(crate) vpn: Option<&'a VpnConfig>,
    pub(crate) env_overrides: BTreeMap<String, String>,
}

impl<'a> MultiStageCompiler<'a> {
    /// Create a compiler with required collaborators
    pub fn new(
        test_name: &'a str,
        job: &'a JobContext,
        skeleton: &'a dyn PodSkeleton,
        resolver: &'a dyn ImageResolver,
    ) -> Self {
        Self {
            test_name,
            job,
            skeleton,
            resolver,
            recorder: &NoopRecorder,
            flags: ExecutionFlags::default(),
            cluster_claim: None,
            cluster_profile: None,
            vpn: None,
            env_overrides: BTreeMap::new(),
        }
    }

    /// Set execution flags.
    pub fn with_flags(mut self, flags: ExecutionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Run steps against a cluster claimed from a pool.
    pub fn with_cluster_claim(mut self, claim: &'a ClusterClaim) -> Self {
        self.cluster_claim = Some(claim);
        self
    }

    /// Provision the test cluster with a cluster profile.
    pub fn with_cluster_profile(mut self, profile: &'a ClusterProfile) -> Self {
        self.cluster_profile = Some(profile);
        self
    }

    /// Route step traffic through a VPN client sidecar.
    pub fn with_vpn(mut self, vpn: &'a VpnConfig) -> Self {
        self.vpn = Some(vpn);
        self
    }

    /// Set parameter overrides that take precedence over step defaults.
    pub fn with_env_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.env_overrides = overrides;
        self
    }

    /// Send compilation events to `recorder`.
    pub fn with_recorder(mut self, recorder: &'a dyn EventRecorder) -> Self {
        self.recorder = recorder;
        self
    }
}
