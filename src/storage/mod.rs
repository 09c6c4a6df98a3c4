//! Persistence port and its implementations.
//!
//! Workers commit through the [`Database`] trait; [`PostgresDatabase`] is
//! the production sink and [`MemoryDatabase`] satisfies the same
//! atomicity and idempotence contract without a server, for tests and
//! short-lived runs.

use async_trait::async_trait;

use crate::types::{BlockDossier, EventRecord};
use crate::utils::error::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryDatabase;
pub use postgres::PostgresDatabase;

/// Transactional sink consumed by workers.
///
/// Implementations must be safe for concurrent use by the whole worker
/// pool and must uphold two guarantees:
///
/// - **Atomicity**: a dossier is committed in one transaction; a
///   partially-written dossier is never visible.
/// - **Idempotence**: rows are keyed by `height` (block), `hash`
///   (transaction) and `(height, address)` (validator); re-saving the
///   same height replaces rows instead of inserting duplicates.
#[async_trait]
pub trait Database: Send + Sync {
    /// Atomically upserts a block, its transactions and its validator set.
    async fn save_block(&self, dossier: &BlockDossier) -> Result<()>;

    /// Persists one received event.
    async fn save_event(&self, event: &EventRecord) -> Result<()>;
}
