//! Compilation events
//!
//! Events are fire-and-forget notifications for observability. They are
//! never consulted when compiling and never persisted here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

/// Something that happened while compiling a test's steps
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepEvent {
    /// A pod was compiled for a step
    #[serde(rename_all = "camelCase")]
    PodGenerated {
        /// Test the step belongs to
        test: String,
        /// Step name
        step: String,
        /// Generated pod name
        pod: String,
        /// When the pod was generated
        timestamp: DateTime<Utc>,
    },
    /// An optional step was skipped
    #[serde(rename_all = "camelCase")]
    StepSkipped {
        /// Test the step belongs to
        test: String,
        /// Step name
        step: String,
        /// When the step was skipped
        timestamp: DateTime<Utc>,
    },
    /// A step failed to compile
    #[serde(rename_all = "camelCase")]
    StepFailed {
        /// Test the step belongs to
        test: String,
        /// Step name
        step: String,
        /// Failure description
        message: String,
        /// When the failure happened
        timestamp: DateTime<Utc>,
    },
}

impl StepEvent {
    /// Step the event concerns
    pub fn step(&self) -> &str {
        match self {
            Self::PodGenerated { step, .. }
            | Self::StepSkipped { step, .. }
            | Self::StepFailed { step, .. } => step,
        }
    }
}

/// Receives compilation events
pub trait EventRecorder: Send + Sync {
    /// Submit an event; must not block
    fn record(&self, event: StepEvent);
}

/// Recorder that drops every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRecorder;

impl EventRecorder for NoopRecorder {
    fn record(&self, _event: StepEvent) {}
}

/// Recorder forwarding events to an unbounded channel
#[derive(Clone, Debug)]
pub struct ChannelRecorder {
    tx: mpsc::UnboundedSender<StepEvent>,
}

impl ChannelRecorder {
    /// Create a recorder and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StepEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventRecorder for ChannelRecorder {
    fn record(&self, event: StepEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!(step = %e.0.step(), "event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skipped(step: &str) -> StepEvent {
        StepEvent::StepSkipped {
            test: "e2e".to_string(),
            step: step.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn channel_recorder_forwards_in_order() {
        let (recorder, mut rx) = ChannelRecorder::new();
        recorder.record(skipped("a"));
        recorder.record(skipped("b"));
        drop(recorder);

        let mut steps = Vec::new();
        while let Some(event) = rx.recv().await {
            steps.push(event.step().to_string());
        }
        assert_eq!(steps, vec!["a", "b"]);
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (recorder, rx) = ChannelRecorder::new();
        drop(rx);
        recorder.record(skipped("a"));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let value = serde_json::to_value(skipped("gather")).unwrap();
        assert_eq!(value["type"], "stepSkipped");
        assert_eq!(value["step"], "gather");
    }
}
