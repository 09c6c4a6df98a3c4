//! Configuration for the indexer.
//!
//! Configuration is read from a TOML file and can be overridden key by key
//! with CLI flags. Validation happens before any component starts so a bad
//! config never reaches the running pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{IndexerError, Result};

fn default_start_height() -> i64 {
    1
}

fn default_worker_count() -> i64 {
    1
}

fn default_true() -> bool {
    true
}

fn default_event_query() -> String {
    "tm.event = 'proposer_reward'".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Indexer configuration.
///
/// All boolean toggles default to `true`; `start_height` and
/// `worker_count` default to 1. The node endpoints and the database URL
/// have no defaults and must be present in the file or supplied as flags.
///
/// # Example
///
/// ```
/// let config: tendermint_indexer::IndexerConfig = toml::from_str(
///     r#"
///     rpc_node = "http://localhost:26657"
///     client_node = "http://localhost:1317"
///     database_url = "postgresql://localhost/indexer"
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.start_height, 1);
/// assert!(config.parse_old_blocks);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// First height for the backfill sweep.
    #[serde(default = "default_start_height")]
    pub start_height: i64,

    /// Number of workers draining the queue concurrently.
    #[serde(default = "default_worker_count")]
    pub worker_count: i64,

    /// Enable the backfill sweeper.
    #[serde(default = "default_true")]
    pub parse_old_blocks: bool,

    /// Enable the new-block listener.
    #[serde(default = "default_true")]
    pub listen_new_blocks: bool,

    /// Enable the event listener.
    #[serde(default = "default_true")]
    pub listen_events: bool,

    /// Query string for the event listener subscription.
    #[serde(default = "default_event_query")]
    pub event_query: String,

    /// Log verbosity; any `tracing` filter directive is accepted.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format: "json" or "text".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Base URL of the node RPC endpoint (e.g. `http://localhost:26657`).
    pub rpc_node: String,

    /// Base URL of the REST gateway (e.g. `http://localhost:1317`).
    pub client_node: String,

    /// PostgreSQL connection URL.
    pub database_url: String,
}

impl IndexerConfig {
    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Io`] if the file cannot be read and
    /// [`IndexerError::Config`] if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| {
            IndexerError::Config(format!(
                "failed to parse {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Validates field values that serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.start_height < 1 {
            return Err(IndexerError::Config(format!(
                "start_height must be >= 1, got {}",
                self.start_height
            )));
        }
        if self.worker_count < 1 {
            return Err(IndexerError::Config(format!(
                "worker_count must be >= 1, got {}",
                self.worker_count
            )));
        }
        if self.log_format != "json" && self.log_format != "text" {
            return Err(IndexerError::Config(format!(
                "invalid logging format: {}",
                self.log_format
            )));
        }
        if self.rpc_node.is_empty() {
            return Err(IndexerError::Config("rpc_node must not be empty".into()));
        }
        if self.client_node.is_empty() {
            return Err(IndexerError::Config("client_node must not be empty".into()));
        }
        if self.database_url.is_empty() {
            return Err(IndexerError::Config("database_url must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> IndexerConfig {
        toml::from_str(
            r#"
            rpc_node = "http://localhost:26657"
            client_node = "http://localhost:1317"
            database_url = "postgresql://localhost/indexer"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = minimal();
        assert_eq!(config.start_height, 1);
        assert_eq!(config.worker_count, 1);
        assert!(config.parse_old_blocks);
        assert!(config.listen_new_blocks);
        assert!(config.listen_events);
        assert_eq!(config.event_query, "tm.event = 'proposer_reward'");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let result: std::result::Result<IndexerConfig, _> =
            toml::from_str(r#"rpc_node = "http://localhost:26657""#);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_log_format_fails_validation() {
        let mut config = minimal();
        config.log_format = "yaml".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid logging format"));
    }

    #[test]
    fn zero_workers_fails_validation() {
        let mut config = minimal();
        config.worker_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn start_height_below_one_fails_validation() {
        let mut config = minimal();
        config.start_height = 0;
        assert!(config.validate().is_err());
    }
}
