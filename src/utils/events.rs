use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::models::request::{RequestStatus, RequestType};

/// Outbound event published after a request mutation commits. Consumers
/// (realtime push, audit sinks) subscribe to the broadcast channel; the
/// core never waits on them.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEvent {
    pub event_id: Uuid,
    pub event: &'static str,
    pub request_id: i32,
    pub request_type: RequestType,
    pub status: RequestStatus,
}

pub const REQUEST_CREATED: &str = "request_created";
pub const REQUEST_UPDATE: &str = "request_update";

pub type EventSender = broadcast::Sender<RequestEvent>;

pub fn create_event_channel() -> EventSender {
    let (tx, _rx) = broadcast::channel(256);
    tx
}

/// Fire-and-forget publish. A send error only means nobody is listening
/// right now, which is not a failure of the transition.
pub fn publish(
    events: &EventSender,
    event: &'static str,
    request_id: i32,
    request_type: RequestType,
    status: RequestStatus,
) {
    let event = RequestEvent {
        event_id: Uuid::new_v4(),
        event,
        request_id,
        request_type,
        status,
    };
    if let Err(err) = events.send(event) {
        tracing::debug!("No subscribers for request event: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let tx = create_event_channel();
        publish(
            &tx,
            REQUEST_UPDATE,
            1,
            RequestType::Venue,
            RequestStatus::Approved,
        );
    }

    #[test]
    fn subscribers_receive_published_events() {
        tokio_test::block_on(async {
            let tx = create_event_channel();
            let mut rx = tx.subscribe();
            publish(
                &tx,
                REQUEST_CREATED,
                42,
                RequestType::Transport,
                RequestStatus::Pending,
            );
            let event = rx.recv().await.unwrap();
            assert_eq!(event.request_id, 42);
            assert_eq!(event.event, REQUEST_CREATED);
        });
    }
}
