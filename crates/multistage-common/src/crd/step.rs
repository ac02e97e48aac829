//! Step definitions
//!
//! A `LiteralStep` is one fully-resolved unit of a multi-stage test: the
//! image to run, the commands, and every knob that changes the generated pod.
//! Field names follow the snake_case job configuration format.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::duration::StepDuration;

// =============================================================================
// References
// =============================================================================

/// Reference to an image stream tag built or imported by the pipeline
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ImageStreamTagReference {
    /// Namespace of the image stream
    pub namespace: String,
    /// Image stream name
    pub name: String,
    /// Tag within the stream
    pub tag: String,
}

/// A secret value to mount into the step's primary container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct CredentialReference {
    /// Namespace holding the secret (legacy mounting)
    #[serde(default)]
    pub namespace: String,
    /// Secret name
    pub name: String,
    /// Directory the secret is mounted at
    pub mount_path: String,
    /// Secret-manager collection the secret belongs to (CSI mounting)
    #[serde(default)]
    pub collection: String,
}

/// An image the step needs exposed through an environment variable
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct StepDependency {
    /// `stream:tag` (or bare pipeline tag) of the image
    pub name: String,
    /// Environment variable receiving the pull spec
    pub env: String,
    /// Fully-qualified pull spec that bypasses resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_spec: Option<String>,
}

impl StepDependency {
    /// The explicit pull spec, if one was given
    pub fn explicit_pull_spec(&self) -> Option<&str> {
        self.pull_spec.as_deref().filter(|s| !s.is_empty())
    }
}

/// A parameter the step reads from its environment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct StepParameter {
    /// Variable name
    pub name: String,
    /// Value used when the test does not override it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub documentation: String,
}

/// Resource requests and limits as unparsed quantity strings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct StepResources {
    /// Minimum resources required
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
    /// Maximum resources allowed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
}

/// DNS settings merged into the step's pod
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct StepDnsConfig {
    /// Nameserver IPs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,
    /// Search domains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub searches: Vec<String>,
}

/// CPU architecture a step must be scheduled on
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeArchitecture {
    /// x86_64
    Amd64,
    /// aarch64
    Arm64,
    /// POWER little-endian
    Ppc64le,
    /// IBM Z
    S390x,
}

impl NodeArchitecture {
    /// Value of the `kubernetes.io/arch` node label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::Ppc64le => "ppc64le",
            Self::S390x => "s390x",
        }
    }
}

impl fmt::Display for NodeArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LiteralStep
// =============================================================================

/// A fully-resolved step of a multi-stage test
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct LiteralStep {
    /// Step name, unique within the test
    #[serde(rename = "as")]
    pub as_: String,
    /// Pipeline image (or `stream:tag`) to run
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,
    /// Image stream tag to run instead of `from`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_image: Option<ImageStreamTagReference>,
    /// Shell commands (or script body when `run_as_script` is set)
    #[serde(default)]
    pub commands: String,
    /// Run the commands from a mounted script instead of `bash -c`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_script: Option<bool>,
    /// Resource requests and limits
    #[serde(default)]
    pub resources: StepResources,
    /// Time the step process may run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<StepDuration>,
    /// Time between SIGINT and SIGKILL for the step process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<StepDuration>,
    /// Parameters the step reads
    #[serde(default, rename = "env", skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<StepParameter>,
    /// Images exposed to the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<StepDependency>,
    /// Secrets mounted into the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialReference>,
    /// DNS overrides
    #[serde(default, rename = "dnsConfig", skip_serializing_if = "Option::is_none")]
    pub dns_config: Option<StepDnsConfig>,
    /// Node architecture constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_architecture: Option<NodeArchitecture>,
    /// Skip the step when every earlier step succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_on_success: Option<bool>,
    /// Failure of the step does not fail the test
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_effort: Option<bool>,
    /// Do not expose the test cluster kubeconfig
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_kubeconfig: Option<bool>,
    /// Release whose `oc` binary is injected into the step
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cli: String,
}

impl LiteralStep {
    /// Whether the commands are delivered as a mounted script
    pub fn runs_as_script(&self) -> bool {
        self.run_as_script.unwrap_or(false)
    }

    /// Whether the step may be skipped after a successful test
    pub fn is_optional_on_success(&self) -> bool {
        self.optional_on_success.unwrap_or(false)
    }

    /// Whether the step is best-effort
    pub fn is_best_effort(&self) -> bool {
        self.best_effort.unwrap_or(false)
    }

    /// Pipeline tag for `from_image`, if set
    pub fn from_image_tag(&self) -> Option<String> {
        self.from_image
            .as_ref()
            .map(|r| format!("{}-{}-{}", r.namespace, r.name, r.tag))
    }
}

// =============================================================================
// Observer
// =============================================================================

/// A passive step that runs alongside the test for its whole duration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Observer {
    /// Observer name
    pub name: String,
    /// Pipeline image to run
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,
    /// Image stream tag to run instead of `from`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_image: Option<ImageStreamTagReference>,
    /// Shell commands
    #[serde(default)]
    pub commands: String,
    /// Resource requests and limits
    #[serde(default)]
    pub resources: StepResources,
    /// Time the observer may run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<StepDuration>,
    /// Time between SIGINT and SIGKILL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<StepDuration>,
    /// Parameters the observer reads
    #[serde(default, rename = "env", skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<StepParameter>,
}

impl From<&Observer> for LiteralStep {
    fn from(observer: &Observer) -> Self {
        Self {
            as_: observer.name.clone(),
            from: observer.from.clone(),
            from_image: observer.from_image.clone(),
            commands: observer.commands.clone(),
            resources: observer.resources.clone(),
            timeout: observer.timeout,
            grace_period: observer.grace_period,
            environment: observer.environment.clone(),
            ..Default::default()
        }
    }
}
