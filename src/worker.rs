//! Workers: drain the queue, assemble block dossiers, commit.
//!
//! Workers are stateless and interchangeable; everything they need is a
//! shared handle. Failures on the data path are logged and the item is
//! dropped — the chain is replayable by height, so an operator can
//! re-backfill anything that was missed.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::gateway::ChainGateway;
use crate::queue::QueueReceiver;
use crate::storage::Database;
use crate::types::{tx_hash, BlockDossier, EventRecord, WorkItem};
use crate::utils::error::Result;

/// One member of the worker pool.
pub struct Worker {
    id: usize,
    gateway: Arc<dyn ChainGateway>,
    database: Arc<dyn Database>,
    queue: QueueReceiver,
    shutdown: CancellationToken,
}

impl Worker {
    #[must_use]
    pub fn new(
        id: usize,
        gateway: Arc<dyn ChainGateway>,
        database: Arc<dyn Database>,
        queue: QueueReceiver,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            gateway,
            database,
            queue,
            shutdown,
        }
    }

    /// Runs until shutdown begins or the queue closes. An item already
    /// received is always finished; it is never interrupted mid-commit.
    pub async fn run(self) {
        loop {
            let item = tokio::select! {
                () = self.shutdown.cancelled() => break,
                item = self.queue.recv() => match item {
                    Some(item) => item,
                    None => break,
                }
            };

            match item {
                WorkItem::Height(height) => {
                    if let Err(e) = self.process_height(height).await {
                        error!(worker = self.id, height, error = %e, "failed to export block; dropping");
                    }
                }
                WorkItem::Event(event) => {
                    if let Err(e) = self.process_event(&event).await {
                        error!(worker = self.id, query = %event.query, error = %e, "failed to export event; dropping");
                    }
                }
            }
        }
        debug!(worker = self.id, "worker stopped");
    }

    /// Fetches, assembles and commits the dossier for one height.
    async fn process_height(&self, height: i64) -> Result<()> {
        debug!(worker = self.id, height, "processing block");

        let block = self.gateway.block(height).await?;
        let validators = self.gateway.validators(height).await?;

        let mut transactions = Vec::with_capacity(block.txs.len());
        for raw in &block.txs {
            let hash = tx_hash(raw);
            let mut record = self.gateway.tx_by_hash(&hash).await?;
            // Normalise to the enclosing block: position alignment comes
            // from iterating the block's own tx array.
            record.height = block.height;
            record.timestamp = block.timestamp;
            transactions.push(record);
        }

        let dossier = BlockDossier {
            height: block.height,
            timestamp: block.timestamp,
            proposer: block.proposer,
            hash: block.hash,
            tx_count: i64::try_from(transactions.len()).unwrap_or(i64::MAX),
            validators,
            transactions,
        };

        self.database.save_block(&dossier).await
    }

    async fn process_event(&self, event: &EventRecord) -> Result<()> {
        debug!(worker = self.id, query = %event.query, "processing event");
        self.database.save_event(event).await
    }
}
