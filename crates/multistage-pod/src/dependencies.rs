//! Dependency image resolution
//!
//! Steps declare the images they need as `stream:tag` (or a bare pipeline
//! tag). Each one is resolved to a pull spec through an `ImageResolver` and
//! exposed to the step as an environment variable.

use std::collections::HashMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::EnvVar;
use kube::api::{Api, DynamicObject};
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use multistage_common::crd::{ClaimRelease, LiteralStep};
use multistage_common::kube_utils::HasApiResource;
use multistage_common::{release_stream_for, PIPELINE_IMAGE_STREAM};

use crate::error::{ResolveError, StepError};

/// Looks up the pull spec of an image stream tag
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Pull spec of `stream:tag` in `namespace`
    async fn resolve(&self, namespace: &str, stream: &str, tag: &str)
        -> Result<String, ResolveError>;
}

/// Split a dependency name into `(stream, tag)`.
///
/// A bare name is a tag of the pipeline stream. When a claimed cluster
/// provides the release under test, references to the overridden release's
/// stream are redirected to the claimed release's stream.
pub fn dependency_parts(name: &str, claim_release: Option<&ClaimRelease>) -> (String, String) {
    let Some((stream, tag)) = name.split_once(':') else {
        return (PIPELINE_IMAGE_STREAM.to_string(), name.to_string());
    };

    let stream = match claim_release {
        Some(claim) if stream == release_stream_for(&claim.override_name) => {
            release_stream_for(&claim.release_name)
        }
        _ => stream.to_string(),
    };
    (stream, tag.to_string())
}

/// Environment bindings for every dependency of `step`.
///
/// Explicit pull specs are used verbatim, even when they point somewhere
/// the resolver cannot reach. Failures are collected and resolution
/// continues with the next dependency.
pub async fn env_for_dependencies(
    resolver: &dyn ImageResolver,
    namespace: &str,
    step: &LiteralStep,
    claim_release: Option<&ClaimRelease>,
) -> (Vec<EnvVar>, Vec<StepError>) {
    let mut env = Vec::new();
    let mut errors = Vec::new();

    for dependency in &step.dependencies {
        let pull_spec = match dependency.explicit_pull_spec() {
            Some(spec) => spec.to_string(),
            None => {
                let (stream, tag) = dependency_parts(&dependency.name, claim_release);
                match resolver.resolve(namespace, &stream, &tag).await {
                    Ok(spec) => spec,
                    Err(source) => {
                        errors.push(StepError::DependencyResolution {
                            step: step.as_.clone(),
                            dependency: dependency.name.clone(),
                            source,
                        });
                        continue;
                    }
                }
            }
        };
        debug!(step = %step.as_, env = %dependency.env, pull_spec = %pull_spec, "resolved dependency");
        env.push(EnvVar {
            name: dependency.env.clone(),
            value: Some(pull_spec),
            ..Default::default()
        });
    }

    (env, errors)
}

// =============================================================================
// Resolvers
// =============================================================================

/// Resolver backed by a fixed `(stream, tag) -> pull spec` table
#[derive(Clone, Debug, Default)]
pub struct StaticImageResolver {
    images: HashMap<(String, String), String>,
}

impl StaticImageResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the pull spec of `stream:tag`
    pub fn with_image(
        mut self,
        stream: impl Into<String>,
        tag: impl Into<String>,
        pull_spec: impl Into<String>,
    ) -> Self {
        self.insert(stream, tag, pull_spec);
        self
    }

    /// Register the pull spec of `stream:tag`
    pub fn insert(
        &mut self,
        stream: impl Into<String>,
        tag: impl Into<String>,
        pull_spec: impl Into<String>,
    ) {
        self.images
            .insert((stream.into(), tag.into()), pull_spec.into());
    }
}

#[async_trait]
impl ImageResolver for StaticImageResolver {
    async fn resolve(
        &self,
        namespace: &str,
        stream: &str,
        tag: &str,
    ) -> Result<String, ResolveError> {
        self.images
            .get(&(stream.to_string(), tag.to_string()))
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                namespace: namespace.to_string(),
                stream: stream.to_string(),
                tag: tag.to_string(),
            })
    }
}

/// image.openshift.io ImageStreamTag, read as a dynamic object
enum ImageStreamTag {}

impl HasApiResource for ImageStreamTag {
    const API_VERSION: &'static str = "image.openshift.io/v1";
    const KIND: &'static str = "ImageStreamTag";
}

/// Resolver reading `ImageStreamTag` objects from the cluster
#[derive(Clone)]
pub struct KubeImageResolver {
    client: Client,
}

impl KubeImageResolver {
    /// Create a resolver using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageResolver for KubeImageResolver {
    async fn resolve(
        &self,
        namespace: &str,
        stream: &str,
        tag: &str,
    ) -> Result<String, ResolveError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &ImageStreamTag::api_resource());
        let name = format!("{}:{}", stream, tag);

        let Some(ist) = api.get_opt(&name).await? else {
            return Err(ResolveError::NotFound {
                namespace: namespace.to_string(),
                stream: stream.to_string(),
                tag: tag.to_string(),
            });
        };

        ist.data
            .get("image")
            .and_then(|image| image.get("dockerImageReference"))
            .and_then(|reference| reference.as_str())
            .map(str::to_string)
            .ok_or_else(|| ResolveError::MissingReference {
                stream: stream.to_string(),
                tag: tag.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use multistage_common::crd::StepDependency;

    fn claim() -> ClaimRelease {
        ClaimRelease {
            release_name: "e2e-latest".to_string(),
            override_name: "latest".to_string(),
        }
    }

    fn dep(name: &str, env: &str, pull_spec: Option<&str>) -> StepDependency {
        StepDependency {
            name: name.to_string(),
            env: env.to_string(),
            pull_spec: pull_spec.map(str::to_string),
        }
    }

    // =========================================================================
    // dependency_parts
    // =========================================================================

    #[test]
    fn bare_name_is_pipeline_tag() {
        assert_eq!(
            dependency_parts("src", None),
            ("pipeline".to_string(), "src".to_string())
        );
    }

    #[test]
    fn stream_and_tag_are_split() {
        assert_eq!(
            dependency_parts("stable:installer", None),
            ("stable".to_string(), "installer".to_string())
        );
    }

    #[test]
    fn claim_redirects_release_under_test() {
        assert_eq!(
            dependency_parts("stable:installer", Some(&claim())),
            ("stable-e2e-latest".to_string(), "installer".to_string())
        );
        assert_eq!(
            dependency_parts("stable-initial:installer", Some(&claim())),
            ("stable-initial".to_string(), "installer".to_string())
        );
    }

    // =========================================================================
    // env_for_dependencies
    // =========================================================================

    #[tokio::test]
    async fn explicit_pull_spec_skips_resolution() {
        let mut resolver = MockImageResolver::new();
        resolver.expect_resolve().never();

        let step = LiteralStep {
            as_: "e2e".to_string(),
            dependencies: vec![dep("stable:cli", "CLI", Some("quay.io/external/cli:v1"))],
            ..Default::default()
        };
        let (env, errors) = env_for_dependencies(&resolver, "ci-op-1", &step, None).await;
        assert!(errors.is_empty());
        assert_eq!(env[0].name, "CLI");
        assert_eq!(env[0].value.as_deref(), Some("quay.io/external/cli:v1"));
    }

    #[tokio::test]
    async fn resolves_through_resolver() {
        let mut resolver = MockImageResolver::new();
        resolver
            .expect_resolve()
            .with(eq("ci-op-1"), eq("stable"), eq("installer"))
            .times(1)
            .returning(|_, _, _| Ok("registry/ci-op-1/stable@sha256:abc".to_string()));

        let step = LiteralStep {
            as_: "e2e".to_string(),
            dependencies: vec![dep("stable:installer", "INSTALLER", None)],
            ..Default::default()
        };
        let (env, errors) = env_for_dependencies(&resolver, "ci-op-1", &step, None).await;
        assert!(errors.is_empty());
        assert_eq!(
            env[0].value.as_deref(),
            Some("registry/ci-op-1/stable@sha256:abc")
        );
    }

    #[tokio::test]
    async fn failures_do_not_stop_remaining_dependencies() {
        let resolver = StaticImageResolver::new().with_image("pipeline", "src", "src@sha256:1");

        let step = LiteralStep {
            as_: "e2e".to_string(),
            dependencies: vec![
                dep("stable:missing", "MISSING", None),
                dep("src", "SRC", None),
                dep("stable:gone", "GONE", None),
            ],
            ..Default::default()
        };
        let (env, errors) = env_for_dependencies(&resolver, "ci-op-1", &step, None).await;

        assert_eq!(env.len(), 1);
        assert_eq!(env[0].name, "SRC");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.step() == "e2e"));
        assert!(errors[0].to_string().contains("stable:missing"));
        assert!(errors[1].to_string().contains("stable:gone"));
    }

    #[tokio::test]
    async fn static_resolver_reports_missing_tag() {
        let err = StaticImageResolver::new()
            .resolve("ns", "stable", "cli")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }
}
