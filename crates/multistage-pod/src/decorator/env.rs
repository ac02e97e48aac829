//! Step environment

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::EnvVar;

use multistage_common::crd::{JobContext, StepParameter};

use super::pod::env_var;

/// Variables identifying the test and its run
pub(crate) fn identity_env(job: &JobContext, test_name: &str) -> Vec<EnvVar> {
    vec![
        env_var("NAMESPACE", job.namespace.as_str()),
        env_var("JOB_NAME_SAFE", test_name.replace('_', "-")),
        env_var("JOB_NAME_HASH", job.job_name_hash.as_str()),
        env_var("UNIQUE_HASH", job.unique_hash.as_str()),
    ]
}

/// One variable per parameter: the test's override, else the default, else
/// empty
pub(crate) fn parameter_env(
    parameters: &[StepParameter],
    overrides: &BTreeMap<String, String>,
) -> Vec<EnvVar> {
    parameters
        .iter()
        .map(|param| {
            let value = overrides
                .get(&param.name)
                .or(param.default.as_ref())
                .cloned()
                .unwrap_or_default();
            env_var(&param.name, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, default: Option<&str>) -> StepParameter {
        StepParameter {
            name: name.to_string(),
            default: default.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn identity_sanitizes_job_name() {
        let job = JobContext {
            namespace: "ci-op-1234".to_string(),
            job_name_hash: "abc12".to_string(),
            unique_hash: "def34".to_string(),
            ..Default::default()
        };
        let env = identity_env(&job, "e2e_aws_upgrade");
        let names: Vec<&str> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["NAMESPACE", "JOB_NAME_SAFE", "JOB_NAME_HASH", "UNIQUE_HASH"]);
        assert_eq!(env[1].value.as_deref(), Some("e2e-aws-upgrade"));
    }

    #[test]
    fn override_beats_default_beats_empty() {
        let overrides = BTreeMap::from([("SUITE".to_string(), "serial".to_string())]);
        let env = parameter_env(
            &[
                param("SUITE", Some("parallel")),
                param("REGION", Some("us-east-1")),
                param("EXTRA", None),
            ],
            &overrides,
        );
        assert_eq!(env[0].value.as_deref(), Some("serial"));
        assert_eq!(env[1].value.as_deref(), Some("us-east-1"));
        assert_eq!(env[2].value.as_deref(), Some(""));
    }
}
