//! Lifecycle supervisor: startup, signal capture, ordered shutdown.
//!
//! The supervisor is a plain value owning the producer and worker
//! lifetimes; there is no process-wide mutable state. Producers escalate
//! fatal errors through a [`SupervisorHandle`], which trips the shared
//! shutdown token. Shutdown order: producers first, then the queue closes,
//! then workers, then the gateway.

use std::sync::{Arc, Mutex};

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::IndexerConfig;
use crate::gateway::ChainGateway;
use crate::producers;
use crate::queue::{self, QUEUE_CAPACITY};
use crate::storage::Database;
use crate::utils::error::{IndexerError, Result};
use crate::worker::Worker;

/// Lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Components are being constructed.
    Starting,
    /// Producers and workers are live.
    Running,
    /// A signal or fatal error arrived; tasks are being wound down.
    Draining,
    /// Everything has returned and the gateway is stopped.
    Stopped,
}

/// Shared handle given to producers and to tests.
///
/// Cloning is cheap; all clones observe the same shutdown token, fatal
/// slot and state stream.
#[derive(Clone)]
pub struct SupervisorHandle {
    shutdown: CancellationToken,
    fatal: Arc<Mutex<Option<IndexerError>>>,
    state: watch::Receiver<State>,
}

impl SupervisorHandle {
    /// The shutdown token observed by every producer and worker.
    #[must_use]
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Records a fatal error and begins shutdown. The first error wins;
    /// later ones are logged and discarded.
    pub fn fatal(&self, err: IndexerError) {
        {
            let mut slot = self.fatal.lock().unwrap();
            if slot.is_none() {
                *slot = Some(err);
            } else {
                error!(error = %err, "additional fatal error during shutdown");
            }
        }
        self.shutdown.cancel();
    }

    /// Requests a clean shutdown, as a termination signal would.
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        *self.state.borrow()
    }
}

/// Owns the ingestion pipeline from start to ordered stop.
pub struct Supervisor {
    config: IndexerConfig,
    gateway: Arc<dyn ChainGateway>,
    database: Arc<dyn Database>,
    shutdown: CancellationToken,
    fatal: Arc<Mutex<Option<IndexerError>>>,
    state: watch::Sender<State>,
}

impl Supervisor {
    /// Creates a supervisor over an already-bootstrapped gateway and
    /// database.
    #[must_use]
    pub fn new(
        config: IndexerConfig,
        gateway: Arc<dyn ChainGateway>,
        database: Arc<dyn Database>,
    ) -> Self {
        let (state, _) = watch::channel(State::Starting);
        Self {
            config,
            gateway,
            database,
            shutdown: CancellationToken::new(),
            fatal: Arc::new(Mutex::new(None)),
            state,
        }
    }

    /// Returns a handle for fatal escalation, shutdown requests and state
    /// observation.
    #[must_use]
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            shutdown: self.shutdown.clone(),
            fatal: self.fatal.clone(),
            state: self.state.subscribe(),
        }
    }

    fn set_state(&self, state: State) {
        self.state.send_replace(state);
        debug!(?state, "lifecycle state changed");
    }

    /// Runs the pipeline until a termination signal or a fatal producer
    /// error, then performs the ordered shutdown.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error if one initiated the shutdown;
    /// signal-initiated shutdown returns `Ok(())`.
    pub async fn run(self) -> Result<()> {
        // Register traps before going live so no signal is missed.
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let worker_count = usize::try_from(self.config.worker_count).map_err(|_| {
            IndexerError::Config(format!(
                "worker_count {} out of range",
                self.config.worker_count
            ))
        })?;

        let (queue_tx, queue_rx) = queue::bounded(QUEUE_CAPACITY);
        let handle = self.handle();

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let worker = Worker::new(
                id,
                self.gateway.clone(),
                self.database.clone(),
                queue_rx.clone(),
                self.shutdown.clone(),
            );
            debug!(number = id + 1, "starting worker");
            workers.push(tokio::spawn(worker.run()));
        }

        let mut producer_tasks = Vec::new();
        if self.config.parse_old_blocks {
            producer_tasks.push((
                "backfill",
                tokio::spawn(producers::backfill::run(
                    self.gateway.clone(),
                    queue_tx.clone(),
                    self.config.start_height,
                    handle.clone(),
                )),
            ));
        }
        if self.config.listen_new_blocks {
            producer_tasks.push((
                "new-blocks",
                tokio::spawn(producers::blocks::run(
                    self.gateway.clone(),
                    queue_tx.clone(),
                    handle.clone(),
                )),
            ));
        }
        if self.config.listen_events {
            producer_tasks.push((
                "events",
                tokio::spawn(producers::events::run(
                    self.gateway.clone(),
                    queue_tx.clone(),
                    self.config.event_query.clone(),
                    handle.clone(),
                )),
            ));
        }
        // The supervisor's own sender goes away now: the queue closes as
        // soon as the last producer returns.
        drop(queue_tx);

        self.set_state(State::Running);
        info!(
            workers = worker_count,
            backfill = self.config.parse_old_blocks,
            new_blocks = self.config.listen_new_blocks,
            events = self.config.listen_events,
            "indexer running"
        );

        tokio::select! {
            _ = sigint.recv() => info!(signal = "SIGINT", "caught signal; shutting down"),
            _ = sigterm.recv() => info!(signal = "SIGTERM", "caught signal; shutting down"),
            () = self.shutdown.cancelled() => {}
        }
        self.shutdown.cancel();
        self.set_state(State::Draining);

        for (name, task) in producer_tasks {
            if task.await.is_err() {
                error!(producer = name, "producer task panicked");
            }
        }
        // All senders are gone; workers drain out on cancellation or close.
        for task in workers {
            if task.await.is_err() {
                error!("worker task panicked");
            }
        }
        self.gateway.stop().await;
        self.set_state(State::Stopped);

        let fatal = self.fatal.lock().unwrap().take();
        match fatal {
            Some(err) => {
                error!(error = %err, "shutdown caused by fatal error");
                Err(err)
            }
            None => {
                info!("shutdown complete");
                Ok(())
            }
        }
    }
}
