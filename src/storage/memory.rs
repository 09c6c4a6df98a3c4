//! In-memory persistence backend.
//!
//! Keeps the same row model as the SQL schema in RAM behind a single
//! lock, so every dossier commit is atomic and idempotent exactly like
//! the PostgreSQL implementation. Useful for tests and short-lived runs;
//! all data is lost when the process exits.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Database;
use crate::types::{BlockDossier, EventRecord, TxRecord};
use crate::utils::error::Result;

/// One row of the `block` table.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRow {
    pub height: i64,
    pub timestamp: DateTime<Utc>,
    pub proposer: String,
    pub hash: String,
    pub tx_count: i64,
}

#[derive(Default)]
struct Store {
    blocks: BTreeMap<i64, BlockRow>,
    transactions: HashMap<String, TxRecord>,
    validators: BTreeMap<(i64, String), i64>,
    events: Vec<EventRecord>,
}

/// In-memory implementation of the persistence port.
#[derive(Default)]
pub struct MemoryDatabase {
    inner: Mutex<Store>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted block rows.
    pub fn block_count(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }

    /// Looks up a block row by height.
    pub fn block(&self, height: i64) -> Option<BlockRow> {
        self.inner.lock().unwrap().blocks.get(&height).cloned()
    }

    /// All persisted heights, ascending.
    pub fn heights(&self) -> Vec<i64> {
        self.inner.lock().unwrap().blocks.keys().copied().collect()
    }

    /// Number of persisted transaction rows.
    pub fn transaction_count(&self) -> usize {
        self.inner.lock().unwrap().transactions.len()
    }

    /// Looks up a transaction row by hash.
    pub fn transaction(&self, hash: &str) -> Option<TxRecord> {
        self.inner.lock().unwrap().transactions.get(hash).cloned()
    }

    /// Validator rows for one height as `(address, voting_power)` pairs,
    /// ordered by address.
    pub fn validators_at(&self, height: i64) -> Vec<(String, i64)> {
        self.inner
            .lock()
            .unwrap()
            .validators
            .range((height, String::new())..(height + 1, String::new()))
            .map(|((_, address), power)| (address.clone(), *power))
            .collect()
    }

    /// Total number of validator rows.
    pub fn validator_count(&self) -> usize {
        self.inner.lock().unwrap().validators.len()
    }

    /// All persisted events, in arrival order.
    pub fn events(&self) -> Vec<EventRecord> {
        self.inner.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn save_block(&self, dossier: &BlockDossier) -> Result<()> {
        // One lock acquisition makes the whole commit atomic.
        let mut store = self.inner.lock().unwrap();

        store.blocks.insert(
            dossier.height,
            BlockRow {
                height: dossier.height,
                timestamp: dossier.timestamp,
                proposer: dossier.proposer.clone(),
                hash: dossier.hash.clone(),
                tx_count: dossier.tx_count,
            },
        );
        for record in &dossier.transactions {
            store
                .transactions
                .insert(record.hash.clone(), record.clone());
        }
        for validator in &dossier.validators {
            store.validators.insert(
                (dossier.height, validator.address.clone()),
                validator.voting_power,
            );
        }
        Ok(())
    }

    async fn save_event(&self, event: &EventRecord) -> Result<()> {
        self.inner.lock().unwrap().events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dossier(height: i64) -> BlockDossier {
        let timestamp = DateTime::parse_from_rfc3339("2020-03-14T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        BlockDossier {
            height,
            timestamp,
            proposer: "proposer".into(),
            hash: format!("{height:064X}"),
            tx_count: 1,
            validators: vec![crate::types::ValidatorRecord {
                address: "val-1".into(),
                voting_power: 10,
            }],
            transactions: vec![TxRecord {
                hash: format!("{:064X}", height + 1000),
                height,
                timestamp,
                gas_wanted: 100,
                gas_used: 90,
                messages: json!([]),
                fee: json!({}),
                signatures: json!([]),
                memo: String::new(),
            }],
        }
    }

    #[tokio::test]
    async fn save_block_is_idempotent() {
        let db = MemoryDatabase::new();
        let d = dossier(5);
        db.save_block(&d).await.unwrap();
        db.save_block(&d).await.unwrap();

        assert_eq!(db.block_count(), 1);
        assert_eq!(db.transaction_count(), 1);
        assert_eq!(db.validator_count(), 1);
    }

    #[tokio::test]
    async fn re_saving_a_height_replaces_rows() {
        let db = MemoryDatabase::new();
        let mut d = dossier(5);
        db.save_block(&d).await.unwrap();

        d.proposer = "someone-else".into();
        db.save_block(&d).await.unwrap();

        assert_eq!(db.block(5).unwrap().proposer, "someone-else");
        assert_eq!(db.block_count(), 1);
    }

    #[tokio::test]
    async fn validators_are_scoped_by_height() {
        let db = MemoryDatabase::new();
        db.save_block(&dossier(1)).await.unwrap();
        db.save_block(&dossier(2)).await.unwrap();

        assert_eq!(db.validators_at(1), vec![("val-1".to_string(), 10)]);
        assert_eq!(db.validators_at(2), vec![("val-1".to_string(), 10)]);
        assert_eq!(db.validators_at(3), Vec::new());
    }

    #[tokio::test]
    async fn events_accumulate_in_order() {
        let db = MemoryDatabase::new();
        for i in 0..3 {
            db.save_event(&EventRecord {
                query: format!("q{i}"),
                payload: json!({"i": i}),
                received_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        let events = db.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].query, "q0");
        assert_eq!(events[2].query, "q2");
    }
}
