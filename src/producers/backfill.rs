//! Backfill sweeper: enqueues every height from `start_height` up to the
//! chain tip observed at startup.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::gateway::ChainGateway;
use crate::queue::QueueSender;
use crate::supervisor::SupervisorHandle;
use crate::types::WorkItem;

/// Sweeps `[start_height, latest_height]` in ascending order and returns.
///
/// The tip is sampled exactly once; heights minted after the sweep began
/// are the new-block listener's job. A failure to read the tip is fatal
/// and escalated to the supervisor.
pub async fn run(
    gateway: Arc<dyn ChainGateway>,
    queue: QueueSender,
    start_height: i64,
    supervisor: SupervisorHandle,
) {
    let latest_height = match gateway.latest_height().await {
        Ok(height) => height,
        Err(e) => {
            error!(error = %e, "failed to get latest block from the node");
            supervisor.fatal(e);
            return;
        }
    };

    info!(start_height, latest_height, "syncing missing blocks");

    for height in start_height..=latest_height {
        tokio::select! {
            () = supervisor.shutdown().cancelled() => return,
            sent = queue.send(WorkItem::Height(height)) => {
                if sent.is_err() {
                    return;
                }
                debug!(height, "enqueued missing block");
            }
        }
    }
}
