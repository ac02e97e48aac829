//! Test definition files
//!
//! A test definition is a YAML document describing one multi-stage test:
//! the job it runs in, its cluster access, and its pre, test, and post
//! phases. Steps are written exactly as the job configuration writes them.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use multistage_common::crd::{
    ClusterClaim, ClusterProfile, ExecutionFlags, JobContext, LiteralStep, Observer, VpnConfig,
};
use multistage_common::Error as CommonError;
use multistage_credentials::{CredentialMounting, DEFAULT_GSM_PROJECT};
use multistage_pod::dependencies::dependency_parts;
use multistage_pod::StaticImageResolver;

use crate::{Error, Result};

/// One multi-stage test and the context it runs in
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct TestDefinition {
    /// Test name; prefixes every pod name
    pub name: String,
    /// Run the test belongs to
    pub job: JobContext,
    /// Skip and best-effort policy for post steps
    #[serde(default)]
    pub flags: ExecutionFlags,
    /// Cluster claimed from a pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_claim: Option<ClusterClaim>,
    /// Profile used to provision the test cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_profile: Option<ClusterProfile>,
    /// VPN client injected next to every step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpn: Option<VpnConfig>,
    /// Parameter overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// How step credentials are mounted
    #[serde(default)]
    pub credential_mounting: CredentialMounting,
    /// Secret Manager project backing CSI-mounted credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsm_project: Option<String>,
    /// Pull specs for `stream:tag` (or bare pipeline tag) references, used
    /// when rendering without a cluster
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, String>,
    /// Setup steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre: Vec<LiteralStep>,
    /// Test steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<LiteralStep>,
    /// Teardown steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<LiteralStep>,
    /// Observers running alongside the steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observers: Vec<Observer>,
}

/// Phase of a multi-stage test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Test,
    Post,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Pre, Phase::Test, Phase::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Test => "test",
            Phase::Post => "post",
        }
    }
}

impl TestDefinition {
    /// Read and validate the definition at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::config(path, e.to_string()))?;
        Self::from_yaml(&data).map_err(|e| match e {
            Error::Yaml(e) => Error::config(path, e.to_string()),
            other => other,
        })
    }

    /// Parse and validate a definition
    pub fn from_yaml(data: &str) -> Result<Self> {
        let definition: Self = serde_yaml::from_str(data)?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CommonError::validation_for_field("name", "test name is empty").into());
        }
        if self.job.namespace.is_empty() {
            return Err(
                CommonError::validation_for_field("job.namespace", "job namespace is empty")
                    .into(),
            );
        }
        if self.cluster_claim.is_some() && self.cluster_profile.is_some() {
            return Err(CommonError::validation(
                "cannot set both cluster_profile and cluster_claim in a test",
            )
            .into());
        }

        let mut seen = HashSet::new();
        let steps = Phase::ALL.into_iter().flat_map(move |phase| {
            self.steps(phase)
                .iter()
                .enumerate()
                .map(move |(i, step)| (format!("{}[{}].as", phase.as_str(), i), step.as_.as_str()))
        });
        let observers = self
            .observers
            .iter()
            .enumerate()
            .map(|(i, o)| (format!("observers[{}].name", i), o.name.as_str()));
        for (field, name) in steps.chain(observers) {
            if name.is_empty() {
                return Err(CommonError::validation_for_field(field, "step has no name").into());
            }
            if !seen.insert(name) {
                return Err(CommonError::validation_for_field(
                    field,
                    format!("duplicate step name: {}", name),
                )
                .into());
            }
        }
        Ok(())
    }

    /// Steps of `phase`
    pub fn steps(&self, phase: Phase) -> &[LiteralStep] {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Test => &self.test,
            Phase::Post => &self.post,
        }
    }

    /// Every step of every phase, in execution order
    pub fn all_steps(&self) -> impl Iterator<Item = &LiteralStep> {
        Phase::ALL.into_iter().flat_map(move |phase| self.steps(phase))
    }

    /// Flags for `phase`; skip and best-effort policy only applies to post
    /// steps
    pub fn flags_for(&self, phase: Phase) -> ExecutionFlags {
        match phase {
            Phase::Post => self.flags,
            Phase::Pre | Phase::Test => ExecutionFlags::default(),
        }
    }

    /// Secret Manager project, preferring `explicit`
    pub fn gsm_project<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit
            .or(self.gsm_project.as_deref())
            .unwrap_or(DEFAULT_GSM_PROJECT)
    }

    /// Resolver serving the definition's `images` table
    pub fn image_resolver(&self) -> StaticImageResolver {
        let mut resolver = StaticImageResolver::new();
        for (reference, pull_spec) in &self.images {
            let (stream, tag) = dependency_parts(reference, None);
            resolver.insert(stream, tag, pull_spec.as_str());
        }
        resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multistage_pod::ImageResolver;

    const DEFINITION: &str = r#"
name: e2e-aws
job:
  namespace: ci-op-1234
  job_name_hash: 5e8c9
  unique_hash: a1b2c
flags:
  allow_skip_on_success: true
cluster_profile:
  name: aws
  cluster_type: aws
credential_mounting: secrets-store-csi
images:
  src: registry/ci-op-1234/pipeline@sha256:src
  stable:installer: registry/ci-op-1234/stable@sha256:installer
pre:
  - as: ipi-install
    from: installer
    commands: openshift-install create cluster
test:
  - as: e2e
    from: src
    commands: make e2e
post:
  - as: gather
    from: cli
    commands: gather
    optional_on_success: true
  - as: deprovision
    from: installer
    commands: openshift-install destroy cluster
observers:
  - name: watcher
    from: cli
    commands: watch
"#;

    #[test]
    fn parses_full_definition() {
        let definition = TestDefinition::from_yaml(DEFINITION).unwrap();
        assert_eq!(definition.name, "e2e-aws");
        assert_eq!(definition.job.namespace, "ci-op-1234");
        assert_eq!(
            definition.credential_mounting,
            CredentialMounting::SecretsStoreCsi
        );
        let names: Vec<&str> = definition.all_steps().map(|s| s.as_.as_str()).collect();
        assert_eq!(names, vec!["ipi-install", "e2e", "gather", "deprovision"]);
        assert_eq!(definition.observers[0].name, "watcher");
    }

    #[test]
    fn skip_policy_only_applies_to_post() {
        let definition = TestDefinition::from_yaml(DEFINITION).unwrap();
        assert!(!definition.flags_for(Phase::Test).allow_skip_on_success);
        assert!(definition.flags_for(Phase::Post).allow_skip_on_success);
    }

    #[test]
    fn duplicate_step_names_are_rejected() {
        let yaml = r#"
name: e2e
job:
  namespace: ci-op-1
pre:
  - as: setup
    from: src
test:
  - as: setup
    from: src
"#;
        let err = TestDefinition::from_yaml(yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error: test[0].as: duplicate step name: setup"
        );
    }

    #[test]
    fn claim_and_profile_are_exclusive() {
        let yaml = r#"
name: e2e
job:
  namespace: ci-op-1
cluster_profile:
  name: aws
  cluster_type: aws
cluster_claim:
  product: ocp
  version: "4.16"
  cloud: aws
  owner: dpp
"#;
        assert!(matches!(
            TestDefinition::from_yaml(yaml),
            Err(Error::Common(CommonError::Validation { field: None, .. }))
        ));
    }

    #[test]
    fn gsm_project_prefers_explicit_value() {
        let mut definition = TestDefinition::from_yaml(DEFINITION).unwrap();
        assert_eq!(definition.gsm_project(None), DEFAULT_GSM_PROJECT);
        definition.gsm_project = Some("from-file".to_string());
        assert_eq!(definition.gsm_project(None), "from-file");
        assert_eq!(definition.gsm_project(Some("from-flag")), "from-flag");
    }

    #[tokio::test]
    async fn images_table_feeds_resolver() {
        let definition = TestDefinition::from_yaml(DEFINITION).unwrap();
        let resolver = definition.image_resolver();
        assert_eq!(
            resolver.resolve("ci-op-1234", "pipeline", "src").await.unwrap(),
            "registry/ci-op-1234/pipeline@sha256:src"
        );
        assert_eq!(
            resolver
                .resolve("ci-op-1234", "stable", "installer")
                .await
                .unwrap(),
            "registry/ci-op-1234/stable@sha256:installer"
        );
    }
}
