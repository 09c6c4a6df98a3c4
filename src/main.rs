//! CLI entry point: `tendermint-indexer parse <config-file>`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use tendermint_indexer::utils::logging::init_logging;
use tendermint_indexer::{
    IndexerConfig, JsonTxCodec, NodeGateway, PostgresDatabase, Result, Supervisor,
};

#[derive(Debug, Parser)]
#[command(name = "tendermint-indexer", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start parsing a blockchain using the provided config file.
    Parse(ParseArgs),
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Path to the TOML configuration file.
    config_file: PathBuf,

    /// Sync missing or failed blocks starting from a given height.
    #[arg(long)]
    start_height: Option<i64>,

    /// Number of workers to run concurrently.
    #[arg(long)]
    worker_count: Option<i64>,

    /// Parse old and missing blocks.
    #[arg(long)]
    parse_old_blocks: Option<bool>,

    /// Listen to new blocks.
    #[arg(long)]
    listen_new_blocks: Option<bool>,

    /// Listen to new events.
    #[arg(long)]
    listen_events: Option<bool>,

    /// Query string for the event listener subscription.
    #[arg(long)]
    event_query: Option<String>,

    /// Logging level.
    #[arg(long)]
    log_level: Option<String>,

    /// Logging format; must be either json or text.
    #[arg(long)]
    log_format: Option<String>,

    /// Node RPC base URL.
    #[arg(long)]
    rpc_node: Option<String>,

    /// REST gateway base URL.
    #[arg(long)]
    client_node: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long)]
    database_url: Option<String>,
}

impl ParseArgs {
    fn apply(&self, config: &mut IndexerConfig) {
        if let Some(v) = self.start_height {
            config.start_height = v;
        }
        if let Some(v) = self.worker_count {
            config.worker_count = v;
        }
        if let Some(v) = self.parse_old_blocks {
            config.parse_old_blocks = v;
        }
        if let Some(v) = self.listen_new_blocks {
            config.listen_new_blocks = v;
        }
        if let Some(v) = self.listen_events {
            config.listen_events = v;
        }
        if let Some(v) = &self.event_query {
            config.event_query = v.clone();
        }
        if let Some(v) = &self.log_level {
            config.log_level = v.clone();
        }
        if let Some(v) = &self.log_format {
            config.log_format = v.clone();
        }
        if let Some(v) = &self.rpc_node {
            config.rpc_node = v.clone();
        }
        if let Some(v) = &self.client_node {
            config.client_node = v.clone();
        }
        if let Some(v) = &self.database_url {
            config.database_url = v.clone();
        }
    }
}

async fn run_parse(args: &ParseArgs) -> Result<()> {
    let mut config = IndexerConfig::from_file(&args.config_file)?;
    args.apply(&mut config);
    config.validate()?;
    init_logging(&config.log_level, &config.log_format)?;

    let gateway = NodeGateway::new(
        &config.rpc_node,
        &config.client_node,
        Arc::new(JsonTxCodec),
    )?;
    let database = PostgresDatabase::connect(&config.database_url).await?;
    database.initialize().await?;

    let supervisor = Supervisor::new(config, Arc::new(gateway), Arc::new(database));
    supervisor.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Parse(args) => run_parse(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
