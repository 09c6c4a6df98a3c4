//! Core data types flowing through the ingestion pipeline.
//!
//! Work items travel from producers to workers over the bounded queue;
//! block dossiers are assembled worker-locally and handed to the
//! persistence port in one piece.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A unit of work enqueued by a producer and drained by exactly one worker.
///
/// Items are owned values and carry no references back into the producer
/// that created them.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A block height to fetch, assemble and persist.
    Height(i64),
    /// A runtime event received from an event subscription, persisted verbatim.
    Event(EventRecord),
}

/// Everything the indexer persists for one block height, assembled by a
/// worker before a single atomic commit.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDossier {
    /// Block height, `>= 1`.
    pub height: i64,
    /// Timestamp from the block header.
    pub timestamp: DateTime<Utc>,
    /// Proposer address from the block header.
    pub proposer: String,
    /// Block hash, rendered as uppercase hex.
    pub hash: String,
    /// Number of transactions in the block.
    pub tx_count: i64,
    /// Validator set at this height, in the order the node returned it.
    pub validators: Vec<ValidatorRecord>,
    /// Transactions, position-aligned with the block's tx array.
    pub transactions: Vec<TxRecord>,
}

/// A single transaction row.
#[derive(Debug, Clone, PartialEq)]
pub struct TxRecord {
    /// Transaction hash: uppercase hex, 64 characters, no prefix.
    pub hash: String,
    /// Height of the enclosing block.
    pub height: i64,
    /// Timestamp copied from the enclosing block.
    pub timestamp: DateTime<Utc>,
    /// Gas requested by the transaction.
    pub gas_wanted: i64,
    /// Gas actually consumed.
    pub gas_used: i64,
    /// Message array as produced by the codec; the core does not interpret it.
    pub messages: Value,
    /// Fee object as produced by the codec.
    pub fee: Value,
    /// Signature array as produced by the codec.
    pub signatures: Value,
    /// Transaction memo, at most [`MEMO_MAX_CHARS`] characters.
    pub memo: String,
}

/// Maximum number of characters stored for a transaction memo.
pub const MEMO_MAX_CHARS: usize = 256;

/// One entry of a block's validator set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorRecord {
    /// Validator address.
    pub address: String,
    /// Voting power at this height, `>= 0`.
    pub voting_power: i64,
}

/// A runtime event received from a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// The subscription query that produced the event.
    pub query: String,
    /// Opaque event payload.
    pub payload: Value,
    /// When the indexer received the event.
    pub received_at: DateTime<Utc>,
}

/// Computes the canonical transaction hash for raw tx bytes: uppercase hex
/// SHA-256, 64 characters, no prefix.
#[must_use]
pub fn tx_hash(raw: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_hash_is_uppercase_sha256() {
        // SHA-256("") is a well-known digest.
        assert_eq!(
            tx_hash(b""),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
        assert_eq!(tx_hash(b"").len(), 64);
    }

    #[test]
    fn tx_hash_has_no_prefix() {
        let hash = tx_hash(b"some tx bytes");
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash.to_uppercase());
    }
}
