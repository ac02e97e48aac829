//! Step-scoped compilation errors
//!
//! A failing step never stops its siblings: every `StepError` is attributed
//! to the step that raised it and collected into one `AggregateError` that
//! lists every failure.

use std::fmt;

use thiserror::Error;

/// Failure to produce a base pod
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SkeletonError {
    /// The pod name is not a valid DNS subdomain
    #[error("invalid pod name '{name}': {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// No image was given for the primary container
    #[error("no image for container '{container}'")]
    MissingImage {
        /// Container lacking an image
        container: String,
    },

    /// The generated pod has no primary container
    #[error("pod '{pod}' has no containers")]
    NoContainers {
        /// Pod name
        pod: String,
    },
}

/// Failure to resolve an image stream tag to a pull spec
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The tag is not known to the resolver
    #[error("image {stream}:{tag} not found in namespace {namespace}")]
    NotFound {
        /// Namespace searched
        namespace: String,
        /// Image stream
        stream: String,
        /// Tag
        tag: String,
    },

    /// The tag exists but carries no image reference
    #[error("image {stream}:{tag} has no docker image reference")]
    MissingReference {
        /// Image stream
        stream: String,
        /// Tag
        tag: String,
    },

    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

/// Why one step could not be compiled
#[derive(Debug, Error)]
pub enum StepError {
    /// Resource requests or limits did not parse
    #[error("step {step}: invalid resources: {message}")]
    Resources {
        /// Owning step
        step: String,
        /// Offending quantity
        message: String,
    },

    /// The base pod could not be generated
    #[error("step {step}: failed to generate pod: {source}")]
    Skeleton {
        /// Owning step
        step: String,
        /// Underlying error
        #[source]
        source: SkeletonError,
    },

    /// A dependency image could not be resolved
    #[error("could not determine image pull spec for image {dependency} on step {step}: {source}")]
    DependencyResolution {
        /// Owning step
        step: String,
        /// Dependency name as declared
        dependency: String,
        /// Underlying error
        #[source]
        source: ResolveError,
    },

    /// Both a cluster claim and a cluster profile were configured
    #[error("step {step}: cannot set both cluster_profile and cluster_claim in a test")]
    ClusterConfigConflict {
        /// Owning step
        step: String,
    },

    /// A cluster-claim secret was not mounted by the caller
    #[error("step {step}: failed to get cluster claim pod params: no mount at {mount_path} for secret {secret}")]
    MissingClaimMount {
        /// Owning step
        step: String,
        /// Expected mount path
        mount_path: String,
        /// Secret expected there
        secret: String,
    },
}

impl StepError {
    /// Name of the step this error belongs to
    pub fn step(&self) -> &str {
        match self {
            Self::Resources { step, .. }
            | Self::Skeleton { step, .. }
            | Self::DependencyResolution { step, .. }
            | Self::ClusterConfigConflict { step }
            | Self::MissingClaimMount { step, .. } => step,
        }
    }
}

/// Every error raised while compiling one step
#[derive(Debug)]
pub struct StepFailure {
    /// Errors in the order they were raised
    pub errors: Vec<StepError>,
}

impl From<StepError> for StepFailure {
    fn from(error: StepError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// All step failures of one compilation pass
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<StepError>,
}

impl AggregateError {
    /// Wrap the collected errors; `None` when nothing failed
    pub fn from_errors(errors: Vec<StepError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// Underlying errors in step order
    pub fn errors(&self) -> &[StepError] {
        &self.errors
    }

    /// Number of failures
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no failure was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume into the underlying errors
    pub fn into_errors(self) -> Vec<StepError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.errors.as_slice() {
            return write!(f, "{}", only);
        }
        write!(f, "{} steps failed:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_attribution() {
        let err = StepError::ClusterConfigConflict {
            step: "e2e-install".to_string(),
        };
        assert_eq!(err.step(), "e2e-install");
        assert!(err.to_string().contains("cluster_profile and cluster_claim"));
    }

    #[test]
    fn dependency_error_names_image_and_step() {
        let err = StepError::DependencyResolution {
            step: "e2e-test".to_string(),
            dependency: "stable:installer".to_string(),
            source: ResolveError::NotFound {
                namespace: "ci-op-1".to_string(),
                stream: "stable".to_string(),
                tag: "installer".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("image stable:installer on step e2e-test"), "{msg}");
    }

    #[test]
    fn aggregate_lists_every_failure() {
        let errors = vec![
            StepError::Resources {
                step: "a".to_string(),
                message: "bad".to_string(),
            },
            StepError::ClusterConfigConflict {
                step: "b".to_string(),
            },
        ];
        let agg = AggregateError::from_errors(errors).unwrap();
        let msg = agg.to_string();
        assert_eq!(msg.lines().count(), 3);
        assert!(msg.contains("step a: invalid resources: bad"));
        assert!(msg.contains("step b:"));
    }

    #[test]
    fn single_failure_displays_alone() {
        let agg = AggregateError::from_errors(vec![StepError::ClusterConfigConflict {
            step: "only".to_string(),
        }])
        .unwrap();
        assert_eq!(agg.len(), 1);
        assert!(agg.to_string().starts_with("step only:"));
    }

    #[test]
    fn no_errors_no_aggregate() {
        assert!(AggregateError::from_errors(Vec::new()).is_none());
    }
}
