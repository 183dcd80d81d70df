//! Trait abstractions for the session runtime's outbound side

use super::CourtEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Destination for court events.
///
/// Emission is fire-and-forget: a sink never blocks the runtime and never
/// reports failure back to it.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CourtEvent);
}

impl EventSink for broadcast::Sender<CourtEvent> {
    fn emit(&self, event: CourtEvent) {
        // No subscribers is fine
        let _ = self.send(event);
    }
}

// ============================================================================
// Arc<T> implementations for shared ownership
// ============================================================================

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: CourtEvent) {
        (**self).emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_sink_tolerates_no_subscribers() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        tx.emit(CourtEvent::error("nobody listening", false));
    }

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscribers() {
        let (tx, mut rx) = broadcast::channel(4);
        tx.emit(CourtEvent::error("boom", true));
        assert_eq!(rx.recv().await.unwrap(), CourtEvent::error("boom", true));
    }
}
