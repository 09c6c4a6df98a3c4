//! Event listener: subscribes to a configured query and enqueues each
//! received event verbatim.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::gateway::ChainGateway;
use crate::queue::QueueSender;
use crate::supervisor::SupervisorHandle;
use crate::types::{EventRecord, WorkItem};

/// Subscriber identity used for the event subscription.
pub const SUBSCRIBER: &str = "indexer-events";

/// Listens for events matching `query` until the stream closes or
/// shutdown begins.
pub async fn run(
    gateway: Arc<dyn ChainGateway>,
    queue: QueueSender,
    query: String,
    supervisor: SupervisorHandle,
) {
    let mut subscription = match gateway.subscribe_events(SUBSCRIBER, &query).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!(query, error = %e, "failed to subscribe to events");
            supervisor.fatal(e);
            return;
        }
    };

    info!(query, "listening for new events");

    loop {
        let event = tokio::select! {
            () = supervisor.shutdown().cancelled() => break,
            event = subscription.recv() => match event {
                Some(event) => event,
                None => {
                    warn!(query, "event stream closed; listener exiting");
                    break;
                }
            }
        };

        debug!(event_query = %event.query, "enqueued new event");
        let record = EventRecord {
            query: event.query,
            payload: event.data,
            received_at: Utc::now(),
        };

        let sent = tokio::select! {
            () = supervisor.shutdown().cancelled() => break,
            sent = queue.send(WorkItem::Event(record)) => sent,
        };
        if sent.is_err() {
            break;
        }
    }

    subscription.cancel();
}
