//! Process timeout and grace period for decorated steps

use std::time::Duration;

use multistage_common::crd::{DecorationDefaults, LiteralStep};
use multistage_common::duration::StepDuration;

/// Pod termination window relative to the process grace period (5/4).
///
/// The pod outlives its test process so that log and artifact upload can
/// finish after the process is killed.
pub const TERMINATION_GRACE_RATIO: f64 = 5.0 / 4.0;

/// Timeout and grace period applied to one step's process.
///
/// Each attempted step produces its own state; the driver keeps the last one
/// and reports it for the whole pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecorationState {
    /// Time the process may run
    pub timeout: StepDuration,
    /// Time between SIGINT and SIGKILL
    pub grace_period: StepDuration,
}

impl From<&DecorationDefaults> for DecorationState {
    fn from(defaults: &DecorationDefaults) -> Self {
        Self {
            timeout: defaults.timeout,
            grace_period: defaults.grace_period,
        }
    }
}

impl DecorationState {
    /// Step overrides on top of the job defaults
    pub fn for_step(step: &LiteralStep, defaults: &DecorationDefaults) -> Self {
        Self {
            timeout: step.timeout.unwrap_or(defaults.timeout),
            grace_period: step.grace_period.unwrap_or(defaults.grace_period),
        }
    }

    /// Pod-level `terminationGracePeriodSeconds`
    pub fn termination_grace_period_seconds(&self) -> i64 {
        let grace: Duration = self.grace_period.as_duration();
        (grace.as_secs_f64() * TERMINATION_GRACE_RATIO) as i64
    }
}
