//! Unified client over the chain node's push and pull surfaces.
//!
//! The [`ChainGateway`] trait is the pipeline's view of the node: pull
//! queries by height or hash, plus event subscriptions that deliver a
//! receive-only stream and a cancel guard. [`NodeGateway`] is the
//! production implementation; tests script their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{TxRecord, ValidatorRecord};
use crate::utils::error::Result;

mod node;

pub use node::NodeGateway;

/// Header fields and raw transactions of one block, as returned by the
/// node's pull surface.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockInfo {
    /// Block height.
    pub height: i64,
    /// Header timestamp.
    pub timestamp: DateTime<Utc>,
    /// Proposer address from the header.
    pub proposer: String,
    /// Block hash, uppercase hex.
    pub hash: String,
    /// Raw transaction bytes, in block order.
    pub txs: Vec<Vec<u8>>,
}

/// One event delivered by a subscription stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainEvent {
    /// The query the event matched.
    pub query: String,
    /// Opaque event payload.
    pub data: Value,
}

impl ChainEvent {
    /// Extracts the block height from a new-block event payload, if present.
    #[must_use]
    pub fn new_block_height(&self) -> Option<i64> {
        let height = self.data.pointer("/value/block/header/height")?;
        match height {
            Value::String(raw) => raw.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

/// A live event subscription: a receive-only stream paired with a cancel
/// guard.
///
/// Callers must cancel on exit; failing to do so leaks the subscription on
/// the node. The guard also cancels when dropped, so early returns do not
/// leak.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChainEvent>,
    guard: SubscriptionGuard,
}

impl Subscription {
    /// Couples an event stream with its cancellation token.
    #[must_use]
    pub fn new(events: mpsc::UnboundedReceiver<ChainEvent>, cancel: CancellationToken) -> Self {
        Self {
            events,
            guard: SubscriptionGuard { cancel },
        }
    }

    /// Receives the next event.
    ///
    /// Returns `None` once the stream has closed. A close without a prior
    /// [`Subscription::cancel`] call is terminal: the consuming producer
    /// logs and exits.
    pub async fn recv(&mut self) -> Option<ChainEvent> {
        self.events.recv().await
    }

    /// Cancels the subscription.
    pub fn cancel(&self) {
        self.guard.cancel.cancel();
    }
}

struct SubscriptionGuard {
    cancel: CancellationToken,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Capability set the pipeline consumes from the chain node.
///
/// Implementations must be safe for concurrent use by all producers and
/// workers.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Returns the latest block height on the active chain.
    async fn latest_height(&self) -> Result<i64>;

    /// Queries a block by height.
    async fn block(&self, height: i64) -> Result<BlockInfo>;

    /// Queries the execution results of a block by height.
    async fn block_results(&self, height: i64) -> Result<Value>;

    /// Fetches a transaction by its uppercase hex hash through the REST
    /// surface, decoded by the configured codec.
    async fn tx_by_hash(&self, hash: &str) -> Result<TxRecord>;

    /// Returns the validator set at the given height, in node order.
    async fn validators(&self, height: i64) -> Result<Vec<ValidatorRecord>>;

    /// Returns the genesis state.
    async fn genesis(&self) -> Result<Value>;

    /// Subscribes to new-block events with the given subscriber identity.
    async fn subscribe_new_blocks(&self, subscriber: &str) -> Result<Subscription>;

    /// Subscribes to events matching `query` with the given subscriber
    /// identity.
    async fn subscribe_events(&self, subscriber: &str, query: &str) -> Result<Subscription>;

    /// Stops the gateway, tearing down any live subscriptions.
    async fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_block_height_from_string_payload() {
        let event = ChainEvent {
            query: "tm.event = 'NewBlock'".into(),
            data: json!({
                "type": "tendermint/event/NewBlock",
                "value": {"block": {"header": {"height": "42"}}}
            }),
        };
        assert_eq!(event.new_block_height(), Some(42));
    }

    #[test]
    fn new_block_height_from_numeric_payload() {
        let event = ChainEvent {
            query: "tm.event = 'NewBlock'".into(),
            data: json!({"value": {"block": {"header": {"height": 7}}}}),
        };
        assert_eq!(event.new_block_height(), Some(7));
    }

    #[test]
    fn new_block_height_missing_is_none() {
        let event = ChainEvent {
            query: "q".into(),
            data: json!({"value": {}}),
        };
        assert_eq!(event.new_block_height(), None);
    }

    #[tokio::test]
    async fn subscription_guard_cancels_on_drop() {
        let token = CancellationToken::new();
        let (_tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::new(rx, token.clone());
        assert!(!token.is_cancelled());
        drop(sub);
        assert!(token.is_cancelled());
    }
}
