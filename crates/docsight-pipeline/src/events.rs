//! Progress events for workflow runs.
//!
//! A run publishes [`WorkflowEvent`]s on a [`broadcast`] channel. Observers
//! subscribe to an [`EventEmitter`] and never block the run; an event sent
//! while nobody listens is lost.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum WorkflowEvent {
    WorkflowStarted {
        workflow: String,
        run_id: String,
        stage_count: usize,
    },
    /// Last event of every run, including runs that degraded.
    WorkflowCompleted {
        workflow: String,
        run_id: String,
        completed_stages: Vec<String>,
        failed_stages: Vec<String>,
        duration_ms: u64,
    },
    StageStarted {
        workflow: String,
        stage_id: String,
    },
    StageCompleted {
        stage_id: String,
        duration_ms: u64,
    },
    /// The stage returned an error and its fallback was applied.
    StageFailed {
        stage_id: String,
        error: String,
    },
    RouteSelected {
        from_stage: String,
        route: String,
        to_stage: String,
    },
}

/// Cloneable publisher of [`WorkflowEvent`]s. Clones share one channel.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventEmitter {
    /// Slow subscribers lag once more than `capacity` events are queued.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: WorkflowEvent) {
        // Err only means there are no receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitter_sends_and_receives() {
        let emitter = EventEmitter::new(16);
        let mut rx = emitter.subscribe();

        emitter.emit(WorkflowEvent::WorkflowStarted {
            workflow: "rag".into(),
            run_id: "r1".into(),
            stage_count: 6,
        });

        match rx.recv().await.unwrap() {
            WorkflowEvent::WorkflowStarted {
                workflow,
                stage_count,
                ..
            } => {
                assert_eq!(workflow, "rag");
                assert_eq!(stage_count, 6);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let emitter = EventEmitter::new(16);
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();

        emitter.emit(WorkflowEvent::StageFailed {
            stage_id: "retrieve".into(),
            error: "index offline".into(),
        });

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                WorkflowEvent::StageFailed { stage_id, .. } => assert_eq!(stage_id, "retrieve"),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let emitter = EventEmitter::default();
        assert_eq!(emitter.subscriber_count(), 0);
        emitter.emit(WorkflowEvent::StageCompleted {
            stage_id: "finalize".into(),
            duration_ms: 1,
        });
    }

    #[test]
    fn events_serialize_with_variant_name() {
        let json = serde_json::to_string(&WorkflowEvent::RouteSelected {
            from_stage: "classify_query".into(),
            route: "error".into(),
            to_stage: "handle_error".into(),
        })
        .unwrap();
        assert!(json.contains(r#""event":"RouteSelected""#));
        assert!(json.contains("handle_error"));
    }
}
