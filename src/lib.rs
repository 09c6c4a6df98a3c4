//! Tendermint chain indexer.
//!
//! Follows a Tendermint-based chain, extracts blocks, transactions,
//! validator sets and selected runtime events, and persists them into
//! PostgreSQL so downstream consumers can query chain history by height,
//! hash, address or event type.
//!
//! # Architecture
//!
//! The indexer is an ingestion pipeline built around a bounded work queue:
//!
//! 1. **Producers** — a backfill sweeper, a new-block listener and an
//!    event listener enqueue work items.
//! 2. **Work queue** — bounded, multi-producer multi-consumer; a full
//!    queue is the only backpressure signal.
//! 3. **Worker pool** — fixed-size; each worker resolves an item against
//!    the node RPC and the REST gateway, assembles a block dossier and
//!    commits it atomically.
//! 4. **Supervisor** — owns all task lifetimes, traps SIGINT/SIGTERM and
//!    orders the shutdown: producers, queue, workers, gateway.
//!
//! Delivery is at-least-once; commits are idempotent on `(height,
//! tx_hash)`, so overlap between backfill and live producers is harmless.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tendermint_indexer::{
//!     IndexerConfig, JsonTxCodec, NodeGateway, PostgresDatabase, Supervisor,
//! };
//!
//! # async fn example() -> tendermint_indexer::Result<()> {
//! let config = IndexerConfig::from_file("config.toml")?;
//! config.validate()?;
//!
//! let gateway = NodeGateway::new(
//!     &config.rpc_node,
//!     &config.client_node,
//!     Arc::new(JsonTxCodec),
//! )?;
//! let database = PostgresDatabase::connect(&config.database_url).await?;
//! database.initialize().await?;
//!
//! let supervisor = Supervisor::new(config, Arc::new(gateway), Arc::new(database));
//! supervisor.run().await
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use codec::{JsonTxCodec, TxCodec};
pub use config::IndexerConfig;
pub use gateway::{BlockInfo, ChainEvent, ChainGateway, NodeGateway, Subscription};
pub use queue::{QueueReceiver, QueueSender, QUEUE_CAPACITY};
pub use storage::{Database, MemoryDatabase, PostgresDatabase};
pub use supervisor::{State, Supervisor, SupervisorHandle};
pub use types::{
    tx_hash, BlockDossier, EventRecord, TxRecord, ValidatorRecord, WorkItem, MEMO_MAX_CHARS,
};
pub use utils::error::{IndexerError, Result};
pub use worker::Worker;

pub mod codec;
pub mod config;
pub mod gateway;
pub mod producers;
pub mod queue;
pub mod storage;
pub mod supervisor;
pub mod types;
pub mod utils;
pub mod worker;
