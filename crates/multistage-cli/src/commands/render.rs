//! Render command: compile every phase of a test definition into pods

use clap::Args;
use k8s_openapi::api::core::v1::{Pod, SecretVolumeSource, Volume, VolumeMount};
use kube::Client;
use tracing::{info, warn};

use multistage_pod::{
    claim_secret_mount_path, AggregateError, ChannelRecorder, EventRecorder, GeneratePodOptions,
    ImageResolver, KubeImageResolver, MinimalPodSkeleton, MultiStageCompiler, NoopRecorder,
    PodSkeleton, StepInputs, HIVE_ADMIN_KUBECONFIG_SECRET, HIVE_ADMIN_PASSWORD_SECRET,
};

use super::{format_manifests, DefinitionArgs};
use crate::config::{Phase, TestDefinition};
use crate::Result;

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub definition: DefinitionArgs,

    /// Registry qualifying `stream:tag` images as `<registry>/<namespace>/stream:tag`
    #[arg(long, env = "MULTISTAGE_REGISTRY")]
    pub registry: Option<String>,

    /// Resolve dependency images from ImageStreamTags in the cluster instead
    /// of the definition's `images` table
    #[arg(long)]
    pub kube: bool,

    /// Print compilation events to stderr as JSON lines
    #[arg(long)]
    pub events: bool,
}

pub async fn run(args: RenderArgs) -> Result<()> {
    let definition = args.definition.load()?;

    let mut skeleton = MinimalPodSkeleton::new();
    if let Some(registry) = &args.registry {
        skeleton = skeleton.with_registry(registry.as_str());
    }

    let resolver: Box<dyn ImageResolver> = if args.kube {
        let client = Client::try_default()
            .await
            .map_err(multistage_common::Error::from)?;
        Box::new(KubeImageResolver::new(client))
    } else {
        Box::new(definition.image_resolver())
    };

    let (pods, error) = if args.events {
        let (recorder, mut events) = ChannelRecorder::new();
        let rendered = render_pods(&definition, &skeleton, resolver.as_ref(), &recorder).await;
        drop(recorder);
        while let Ok(event) = events.try_recv() {
            eprintln!("{}", serde_json::to_string(&event)?);
        }
        rendered
    } else {
        render_pods(&definition, &skeleton, resolver.as_ref(), &NoopRecorder).await
    };

    print!("{}", format_manifests(&pods, args.definition.output)?);
    match error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Compile every phase and the observers of `definition`.
///
/// Pods of steps that compiled are returned alongside the errors of the
/// steps that did not.
pub async fn render_pods(
    definition: &TestDefinition,
    skeleton: &dyn PodSkeleton,
    resolver: &dyn ImageResolver,
    recorder: &dyn EventRecorder,
) -> (Vec<Pod>, Option<AggregateError>) {
    let inputs = claim_inputs(definition);
    let options = GeneratePodOptions {
        credential_mounting: definition.credential_mounting,
        ..Default::default()
    };

    let mut pods = Vec::new();
    let mut errors = Vec::new();

    for phase in Phase::ALL {
        let generated = compiler(definition, skeleton, resolver, recorder)
            .with_flags(definition.flags_for(phase))
            .generate_pods(definition.steps(phase), &inputs, options)
            .await;
        info!(phase = phase.as_str(), pods = generated.pods.len(), "rendered phase");
        if let Some(best_effort) = &generated.best_effort {
            if !best_effort.is_empty() {
                info!(phase = phase.as_str(), steps = ?best_effort, "best-effort steps");
            }
        }
        pods.extend(generated.pods);
        if let Some(error) = generated.error {
            warn!(phase = phase.as_str(), failed = error.len(), "some steps failed to compile");
            errors.extend(error.into_errors());
        }
    }

    match compiler(definition, skeleton, resolver, recorder)
        .generate_observers(&definition.observers, &inputs, options)
        .await
    {
        Ok(observers) => pods.extend(observers),
        Err(error) => errors.extend(error.into_errors()),
    }

    (pods, AggregateError::from_errors(errors))
}

fn compiler<'a>(
    definition: &'a TestDefinition,
    skeleton: &'a dyn PodSkeleton,
    resolver: &'a dyn ImageResolver,
    recorder: &'a dyn EventRecorder,
) -> MultiStageCompiler<'a> {
    let mut compiler = MultiStageCompiler::new(&definition.name, &definition.job, skeleton, resolver)
        .with_env_overrides(definition.env.clone())
        .with_recorder(recorder);
    if let Some(claim) = &definition.cluster_claim {
        compiler = compiler.with_cluster_claim(claim);
    }
    if let Some(profile) = &definition.cluster_profile {
        compiler = compiler.with_cluster_profile(profile);
    }
    if let Some(vpn) = &definition.vpn {
        compiler = compiler.with_vpn(vpn);
    }
    compiler
}

/// Admin credential secrets of a claimed cluster, mounted where the step
/// compiler expects them
fn claim_inputs(definition: &TestDefinition) -> StepInputs {
    let mut inputs = StepInputs::default();
    if definition.cluster_claim.is_none() {
        return inputs;
    }
    for secret in [HIVE_ADMIN_KUBECONFIG_SECRET, HIVE_ADMIN_PASSWORD_SECRET] {
        let name = format!("{}-{}", definition.name, secret);
        inputs.secret_volumes.push(Volume {
            name: name.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(name.clone()),
                ..Default::default()
            }),
            ..Default::default()
        });
        inputs.secret_mounts.push(VolumeMount {
            name,
            mount_path: claim_secret_mount_path(&definition.name, secret),
            ..Default::default()
        });
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use multistage_pod::{StaticImageResolver, StepEvent};

    const DEFINITION: &str = r#"
name: e2e
job:
  namespace: ci-op-1234
flags:
  allow_skip_on_success: true
  allow_best_effort_post_steps: true
pre:
  - as: setup
    from: src
    commands: setup
    optional_on_success: true
test:
  - as: run
    from: src
    commands: run
post:
  - as: gather
    from: src
    commands: gather
    optional_on_success: true
  - as: teardown
    from: src
    commands: teardown
    best_effort: true
observers:
  - name: watcher
    from: src
    commands: watch
"#;

    fn names(pods: &[Pod]) -> Vec<&str> {
        pods.iter()
            .filter_map(|p| p.metadata.name.as_deref())
            .collect()
    }

    #[tokio::test]
    async fn renders_phases_then_observers() {
        let definition = TestDefinition::from_yaml(DEFINITION).unwrap();
        let (pods, error) = render_pods(
            &definition,
            &MinimalPodSkeleton::new(),
            &StaticImageResolver::new(),
            &NoopRecorder,
        )
        .await;

        assert!(error.is_none());
        assert_eq!(
            names(&pods),
            vec!["e2e-setup", "e2e-run", "e2e-teardown", "e2e-watcher"]
        );
    }

    #[tokio::test]
    async fn claim_inputs_satisfy_claimed_steps() {
        let yaml = r#"
name: e2e
job:
  namespace: ci-op-1234
cluster_claim:
  product: ocp
  version: "4.16"
  cloud: aws
  owner: dpp
test:
  - as: run
    from: src
    commands: run
"#;
        let definition = TestDefinition::from_yaml(yaml).unwrap();
        let (pods, error) = render_pods(
            &definition,
            &MinimalPodSkeleton::new(),
            &StaticImageResolver::new(),
            &NoopRecorder,
        )
        .await;
        assert!(error.is_none(), "{error:?}");
        let volumes = pods[0].spec.as_ref().unwrap().volumes.as_ref().unwrap();
        assert!(volumes.iter().any(|v| v.name == "e2e-hive-admin-kubeconfig"));
    }

    #[tokio::test]
    async fn events_report_skips_and_pods() {
        let definition = TestDefinition::from_yaml(DEFINITION).unwrap();
        let (recorder, mut events) = ChannelRecorder::new();
        render_pods(
            &definition,
            &MinimalPodSkeleton::new(),
            &StaticImageResolver::new(),
            &recorder,
        )
        .await;
        drop(recorder);

        let mut skipped = Vec::new();
        let mut generated = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                StepEvent::StepSkipped { step, .. } => skipped.push(step),
                StepEvent::PodGenerated { .. } => generated += 1,
                StepEvent::StepFailed { .. } => panic!("unexpected failure"),
            }
        }
        assert_eq!(skipped, vec!["gather"]);
        assert_eq!(generated, 4);
    }
}
