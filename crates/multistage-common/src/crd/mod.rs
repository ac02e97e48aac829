//! Input types for multi-stage test compilation

mod cluster;
mod job;
mod step;

pub use cluster::{ClaimRelease, ClusterClaim, ClusterProfile, VpnConfig};
pub use job::{DecorationDefaults, ExecutionFlags, JobContext, OwnerRef};
pub use step::{
    CredentialReference, ImageStreamTagReference, LiteralStep, NodeArchitecture, Observer,
    StepDependency, StepDnsConfig, StepParameter, StepResources,
};
