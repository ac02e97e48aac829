//! Per-run job context and execution policy

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::duration::StepDuration;

/// Identity of the run that owns the generated pods
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct JobContext {
    /// Namespace the pods are created in
    pub namespace: String,
    /// Hash of the job name, exposed to steps
    #[serde(default)]
    pub job_name_hash: String,
    /// Hash unique to this run, exposed to steps
    #[serde(default)]
    pub unique_hash: String,
    /// Identifier of the CI job run, stamped on pods by the skeleton generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prow_job_id: Option<String>,
    /// Node to pin pods to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Serialized job specification handed to the skeleton generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_spec: Option<String>,
    /// Object the generated pods are garbage-collected with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerRef>,
    /// Decoration defaults applied when a step leaves them unset
    #[serde(default)]
    pub decoration: DecorationDefaults,
}

/// Owner of the generated pods
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    /// API version of the owner
    pub api_version: String,
    /// Kind of the owner
    pub kind: String,
    /// Name of the owner
    pub name: String,
    /// UID of the owner
    pub uid: String,
    /// Whether the owner is the managing controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
}

impl From<&OwnerRef> for OwnerReference {
    fn from(owner: &OwnerRef) -> Self {
        OwnerReference {
            api_version: owner.api_version.clone(),
            kind: owner.kind.clone(),
            name: owner.name.clone(),
            uid: owner.uid.clone(),
            controller: owner.controller,
            block_owner_deletion: None,
        }
    }
}

/// Process timeout and grace period used when a step sets neither
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DecorationDefaults {
    /// Default process timeout
    #[serde(default = "DecorationDefaults::default_timeout")]
    pub timeout: StepDuration,
    /// Default process grace period
    #[serde(default = "DecorationDefaults::default_grace_period")]
    pub grace_period: StepDuration,
}

impl DecorationDefaults {
    fn default_timeout() -> StepDuration {
        StepDuration::from_secs(2 * 60 * 60)
    }

    fn default_grace_period() -> StepDuration {
        StepDuration::from_secs(15)
    }
}

impl Default for DecorationDefaults {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            grace_period: Self::default_grace_period(),
        }
    }
}

/// Policy controlling which steps are skipped or tolerated
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ExecutionFlags {
    /// Track best-effort steps so their failure is tolerated
    #[serde(default)]
    pub allow_best_effort_post_steps: bool,
    /// Allow `optional_on_success` steps to be skipped
    #[serde(default)]
    pub allow_skip_on_success: bool,
    /// An earlier phase of the test failed
    #[serde(default)]
    pub has_prev_errs: bool,
}

impl ExecutionFlags {
    /// Whether an `optional_on_success` step should be skipped
    pub fn skips_optional_steps(&self) -> bool {
        self.allow_skip_on_success && !self.has_prev_errs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoration_defaults_match_entrypoint() {
        let defaults = DecorationDefaults::default();
        assert_eq!(defaults.timeout.as_duration().as_secs(), 7200);
        assert_eq!(defaults.grace_period.as_duration().as_secs(), 15);
    }

    #[test]
    fn optional_steps_skip_only_without_previous_errors() {
        let flags = ExecutionFlags {
            allow_skip_on_success: true,
            ..Default::default()
        };
        assert!(flags.skips_optional_steps());

        let failed = ExecutionFlags {
            has_prev_errs: true,
            ..flags
        };
        assert!(!failed.skips_optional_steps());
        assert!(!ExecutionFlags::default().skips_optional_steps());
    }

    #[test]
    fn owner_ref_converts_to_owner_reference() {
        let owner = OwnerRef {
            api_version: "ci.openshift.io/v1".to_string(),
            kind: "TestRun".to_string(),
            name: "run-1".to_string(),
            uid: "uid-1".to_string(),
            controller: Some(true),
        };
        let reference = OwnerReference::from(&owner);
        assert_eq!(reference.kind, "TestRun");
        assert_eq!(reference.controller, Some(true));
    }
}
