//! Domain event sink
//!
//! Events are published for observers outside the core (notifiers,
//! dashboards). Nothing in this crate consumes them back.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::{execution::CorrelationToken, models::Verdict};

/// Event emitted along the dispatch / grading pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ExecutionRequested { token: CorrelationToken },
    ExecutionOutcomeArrived { token: CorrelationToken, kind: String },
    SolutionResultRecorded { token: CorrelationToken, verdict: Verdict },
    ExecutionFaulted { token: CorrelationToken, reason: String },
}

/// Publish-only capability
#[cfg_attr(test, mockall::automock)]
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// In-process fan-out over a tokio broadcast channel
pub struct BroadcastPublisher {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: DomainEvent) {
        // No subscribers is not an error
        if self.tx.send(event).is_err() {
            tracing::trace!("Domain event dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();
        let token = CorrelationToken::new(Uuid::new_v4(), Uuid::new_v4());

        publisher.publish(DomainEvent::ExecutionRequested { token });

        assert_eq!(
            rx.recv().await.unwrap(),
            DomainEvent::ExecutionRequested { token }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = BroadcastPublisher::new(8);
        let token = CorrelationToken::new(Uuid::new_v4(), Uuid::new_v4());
        publisher.publish(DomainEvent::ExecutionFaulted {
            token,
            reason: "sandbox unavailable".to_string(),
        });
    }
}
