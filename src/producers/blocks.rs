//! New-block listener: subscribes to new-block events and enqueues each
//! announced height.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::gateway::ChainGateway;
use crate::queue::QueueSender;
use crate::supervisor::SupervisorHandle;
use crate::types::WorkItem;

/// Subscriber identity used for the new-block subscription.
pub const SUBSCRIBER: &str = "indexer-blocks";

/// Listens for new blocks until the stream closes or shutdown begins.
///
/// Subscription setup failure is fatal and escalated; a stream that the
/// node closes is terminal for this producer only.
pub async fn run(
    gateway: Arc<dyn ChainGateway>,
    queue: QueueSender,
    supervisor: SupervisorHandle,
) {
    let mut subscription = match gateway.subscribe_new_blocks(SUBSCRIBER).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!(error = %e, "failed to subscribe to new blocks");
            supervisor.fatal(e);
            return;
        }
    };

    info!("listening for new block events");

    loop {
        let event = tokio::select! {
            () = supervisor.shutdown().cancelled() => break,
            event = subscription.recv() => match event {
                Some(event) => event,
                None => {
                    warn!("new block stream closed; listener exiting");
                    break;
                }
            }
        };

        let Some(height) = event.new_block_height() else {
            warn!("new block event without a header height; skipping");
            continue;
        };

        let sent = tokio::select! {
            () = supervisor.shutdown().cancelled() => break,
            sent = queue.send(WorkItem::Height(height)) => sent,
        };
        if sent.is_err() {
            break;
        }
        debug!(height, "enqueued new block");
    }

    subscription.cancel();
}
