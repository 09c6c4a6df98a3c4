//! PostgreSQL persistence backed by a `sqlx` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::Database;
use crate::types::{BlockDossier, EventRecord};
use crate::utils::error::Result;

/// PostgreSQL implementation of the persistence port.
///
/// # Example
///
/// ```no_run
/// use tendermint_indexer::PostgresDatabase;
///
/// # async fn example() -> tendermint_indexer::Result<()> {
/// let database = PostgresDatabase::connect("postgresql://localhost/indexer").await?;
/// database.initialize().await?;
/// # Ok(())
/// # }
/// ```
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// Opens a connection pool against the given database URL.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IndexerError::Database`] if the pool cannot be
    /// established.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Creates the schema if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IndexerError::Database`] if any statement fails.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS block (
                height BIGINT PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL,
                proposer TEXT NOT NULL,
                hash TEXT NOT NULL UNIQUE,
                tx_count BIGINT NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS transaction (
                hash VARCHAR(64) PRIMARY KEY,
                height BIGINT NOT NULL REFERENCES block (height),
                timestamp TIMESTAMPTZ NOT NULL,
                gas_wanted BIGINT NOT NULL DEFAULT 0,
                gas_used BIGINT NOT NULL DEFAULT 0,
                messages JSONB NOT NULL DEFAULT '[]',
                fee JSONB NOT NULL DEFAULT '{}',
                signatures JSONB NOT NULL DEFAULT '[]',
                memo VARCHAR(256) NOT NULL DEFAULT ''
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_transaction_height
            ON transaction (height)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS validator (
                height BIGINT NOT NULL,
                address TEXT NOT NULL,
                voting_power BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (height, address)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS event (
                received_at TIMESTAMPTZ NOT NULL,
                query TEXT NOT NULL,
                payload JSONB NOT NULL DEFAULT '{}'
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes the connection pool.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn save_block(&self, dossier: &BlockDossier) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO block (height, timestamp, proposer, hash, tx_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (height) DO UPDATE SET
                timestamp = EXCLUDED.timestamp,
                proposer = EXCLUDED.proposer,
                hash = EXCLUDED.hash,
                tx_count = EXCLUDED.tx_count
            ",
        )
        .bind(dossier.height)
        .bind(dossier.timestamp)
        .bind(&dossier.proposer)
        .bind(&dossier.hash)
        .bind(dossier.tx_count)
        .execute(&mut *tx)
        .await?;

        for record in &dossier.transactions {
            sqlx::query(
                r"
                INSERT INTO transaction
                    (hash, height, timestamp, gas_wanted, gas_used,
                     messages, fee, signatures, memo)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (hash) DO UPDATE SET
                    height = EXCLUDED.height,
                    timestamp = EXCLUDED.timestamp,
                    gas_wanted = EXCLUDED.gas_wanted,
                    gas_used = EXCLUDED.gas_used,
                    messages = EXCLUDED.messages,
                    fee = EXCLUDED.fee,
                    signatures = EXCLUDED.signatures,
                    memo = EXCLUDED.memo
                ",
            )
            .bind(&record.hash)
            .bind(record.height)
            .bind(record.timestamp)
            .bind(record.gas_wanted)
            .bind(record.gas_used)
            .bind(&record.messages)
            .bind(&record.fee)
            .bind(&record.signatures)
            .bind(&record.memo)
            .execute(&mut *tx)
            .await?;
        }

        for validator in &dossier.validators {
            sqlx::query(
                r"
                INSERT INTO validator (height, address, voting_power)
                VALUES ($1, $2, $3)
                ON CONFLICT (height, address) DO UPDATE SET
                    voting_power = EXCLUDED.voting_power
                ",
            )
            .bind(dossier.height)
            .bind(&validator.address)
            .bind(validator.voting_power)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_event(&self, event: &EventRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO event (received_at, query, payload)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(event.received_at)
        .bind(&event.query)
        .bind(&event.payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
