//! Compiles multi-stage test steps into decorated Kubernetes pods
//!
//! Each step becomes one pod built from a base skeleton and a fixed sequence
//! of decorators. Steps that fail to compile contribute attributed errors
//! and no pod; the rest of the batch still compiles.
//!
//! # Usage
//!
//! ```rust,ignore
//! let generated = MultiStageCompiler::new(test_name, &job, &skeleton, &resolver)
//!     .with_flags(flags)
//!     .with_cluster_profile(&profile)
//!     .generate_pods(&steps, &inputs, GeneratePodOptions::default())
//!     .await;
//! ```

#![deny(missing_docs)]

mod compiler;
pub mod decoration;
mod decorator;
pub mod dependencies;
mod driver;
pub mod error;
pub mod events;
pub mod quantity;
pub mod security;
pub mod skeleton;

pub use compiler::{GeneratePodOptions, MultiStageCompiler, StepInputs};
pub use decoration::{DecorationState, TERMINATION_GRACE_RATIO};
pub use decorator::{
    claim_secret_mount_path, cluster_profile_secret_name, command_config_map_name,
    CLUSTER_PROFILE_MOUNT_PATH, COMMAND_PREFIX, COMMAND_SCRIPT_MOUNT_PATH,
    HIVE_ADMIN_KUBECONFIG_SECRET, HIVE_ADMIN_PASSWORD_SECRET, PRIMARY_CONTAINER_NAME,
    SHARED_DIR_MOUNT_PATH, VPN_CONTAINER_NAME,
};
pub use dependencies::{ImageResolver, KubeImageResolver, StaticImageResolver};
pub use driver::GeneratedPods;
pub use error::{AggregateError, ResolveError, SkeletonError, StepError, StepFailure};
pub use events::{ChannelRecorder, EventRecorder, NoopRecorder, StepEvent};
pub use security::partition_security_contexts;
pub use skeleton::{MinimalPodSkeleton, PodSkeleton, SkeletonRequest};
