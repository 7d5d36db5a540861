//! Event broadcaster for job progress updates.
//!
//! Uses tokio::sync::broadcast to fan-out events to WebSocket clients and any
//! in-process watchers.

use tokio::sync::broadcast;

use crate::models::{WsEvent, WsEventMessage};

/// Default capacity for the broadcast channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Event broadcaster that distributes events to all connected WebSocket clients.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<WsEventMessage>,
}

impl EventBroadcaster {
    /// Create a new EventBroadcaster with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new EventBroadcaster with a specific capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive events.
    /// Returns a receiver that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<WsEventMessage> {
        self.sender.subscribe()
    }

    /// Broadcast an event to all subscribers.
    /// Returns the number of receivers that received the event.
    /// If there are no subscribers, returns 0 (does not error).
    pub fn send(&self, event: WsEventMessage) -> usize {
        // Ignore errors when there are no subscribers
        self.sender.send(event).unwrap_or(0)
    }

    /// Wrap `event` with the current timestamp and broadcast it.
    pub fn publish(&self, event: WsEvent) -> usize {
        let job_id = event.job_id();
        let receivers = self.send(WsEventMessage::new(event));
        tracing::trace!(%job_id, receivers, "Event published");
        receivers
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, JobPhase};

    fn job() -> Job {
        Job::new("https://example.com".to_string(), None, None)
    }

    #[tokio::test]
    async fn test_broadcast_to_multiple_receivers() {
        let broadcaster = EventBroadcaster::new();

        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();

        let count = broadcaster.publish(WsEvent::job_created(&job()));
        assert_eq!(count, 2);

        // Both receivers should get the event
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn test_no_subscribers_no_error() {
        let broadcaster = EventBroadcaster::new();

        // Should not panic or error, just return 0
        let count = broadcaster.publish(WsEvent::progress_updated(&job()));
        assert_eq!(count, 0);
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        let mut job = job();
        broadcaster.publish(WsEvent::job_created(&job));
        job.advance(JobPhase::Crawling).unwrap();
        broadcaster.publish(WsEvent::phase_changed(&job));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first.event, WsEvent::JobCreated(_)));
        match second.event {
            WsEvent::PhaseChanged(payload) => {
                assert_eq!(payload.phase, JobPhase::Crawling);
                assert_eq!(payload.job_id, job.id);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_message_serializes_with_type_and_timestamp() {
        let message = WsEventMessage::new(WsEvent::job_created(&job()));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "job_created");
        assert_eq!(value["payload"]["url"], "https://example.com");
        assert!(value["timestamp"].is_string());
    }
}
