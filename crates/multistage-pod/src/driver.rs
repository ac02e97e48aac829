//! Step driver
//!
//! Walks a test's steps in order, applies the skip policy, and collects the
//! compiled pods and per-step errors of one pass.

use std::collections::BTreeSet;

use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info, warn};

use multistage_common::crd::{LiteralStep, Observer};

use crate::compiler::{GeneratePodOptions, MultiStageCompiler, StepInputs};
use crate::decoration::DecorationState;
use crate::error::{AggregateError, StepError};
use crate::events::StepEvent;

/// Outcome of compiling one batch of steps
#[derive(Debug)]
pub struct GeneratedPods {
    /// Pods of the steps that compiled, in step order
    pub pods: Vec<Pod>,
    /// Pod names of best-effort steps; `None` unless best-effort tracking is
    /// enabled
    pub best_effort: Option<BTreeSet<String>>,
    /// Errors of the steps that failed to compile
    pub error: Option<AggregateError>,
    /// Decoration of the last step that was attempted, or the job defaults
    pub decoration: DecorationState,
}

impl GeneratedPods {
    /// Pods, or the aggregated error if any step failed
    pub fn into_result(self) -> Result<Vec<Pod>, AggregateError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.pods),
        }
    }
}

impl MultiStageCompiler<'_> {
    /// Compile `steps` into pods.
    ///
    /// A failing step contributes its errors and no pod; compilation moves
    /// on to the next step.
    pub async fn generate_pods(
        &self,
        steps: &[LiteralStep],
        inputs: &StepInputs,
        options: GeneratePodOptions,
    ) -> GeneratedPods {
        let mut best_effort = self
            .flags
            .allow_best_effort_post_steps
            .then(BTreeSet::new);
        let claim_release = self
            .cluster_claim
            .map(|claim| claim.claim_release(self.test_name));
        let mut decoration = DecorationState::from(&self.job.decoration);
        let mut pods = Vec::with_capacity(steps.len());
        let mut errors = Vec::new();

        for step in steps {
            let name = format!("{}-{}", self.test_name, step.as_);
            if step.is_optional_on_success() && self.flags.skips_optional_steps() {
                info!(step = %name, "skipping optional step");
                self.recorder.record(StepEvent::StepSkipped {
                    test: self.test_name.to_string(),
                    step: step.as_.clone(),
                    timestamp: Utc::now(),
                });
                continue;
            }

            decoration = DecorationState::for_step(step, &self.job.decoration);
            let compiled = self
                .compile_step(step, &decoration, claim_release.as_ref(), inputs, options)
                .await;

            // Steps whose resources do not parse never reach the best-effort set.
            let resources_parsed = match &compiled {
                Ok(_) => true,
                Err(failure) => !failure
                    .errors
                    .iter()
                    .any(|e| matches!(e, StepError::Resources { .. })),
            };
            if let Some(names) = best_effort.as_mut() {
                if step.is_best_effort() && resources_parsed {
                    names.insert(name.clone());
                }
            }

            match compiled {
                Ok(pod) => {
                    self.recorder.record(StepEvent::PodGenerated {
                        test: self.test_name.to_string(),
                        step: step.as_.clone(),
                        pod: name,
                        timestamp: Utc::now(),
                    });
                    pods.push(pod);
                }
                Err(failure) => {
                    for error in &failure.errors {
                        warn!(step = %name, error = %error, "failed to compile step");
                        self.recorder.record(StepEvent::StepFailed {
                            test: self.test_name.to_string(),
                            step: step.as_.clone(),
                            message: error.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                    errors.extend(failure.errors);
                }
            }
        }

        debug!(
            test = %self.test_name,
            pods = pods.len(),
            failed = errors.len(),
            "generated step pods"
        );
        GeneratedPods {
            pods,
            best_effort,
            error: AggregateError::from_errors(errors),
            decoration,
        }
    }

    /// Compile observers into pods.
    ///
    /// Observers always run in observer mode and receive none of the
    /// caller's extra environment.
    pub async fn generate_observers(
        &self,
        observers: &[Observer],
        inputs: &StepInputs,
        options: GeneratePodOptions,
    ) -> Result<Vec<Pod>, AggregateError> {
        let steps: Vec<LiteralStep> = observers.iter().map(LiteralStep::from).collect();
        let inputs = StepInputs {
            env: Vec::new(),
            ..inputs.clone()
        };
        let options = GeneratePodOptions {
            observer: true,
            ..options
        };
        self.generate_pods(&steps, &inputs, options)
            .await
            .into_result()
    }
}
