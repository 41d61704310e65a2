//! Main runtime orchestration.
//!
//! The runtime coordinates component lifecycle:
//! - Start order: store → apply loop → replication engine → leader
//! - Shutdown order: leader → replication engine → apply loop (drain) → store

use crate::core::config::Config;
use crate::kv::apply_loop::{ApplyLoop, ApplyStats, Committed, SharedStore};
use crate::kv::leader::LeaderSignal;
use crate::kv::processor::OperationProcessor;
use crate::kv::replication::LocalReplicator;
use crate::kv::store::{Store, StoreSnapshot, StoreStats};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How long `stop` waits for the apply loop to drain.
const APPLY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Component health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// Component is starting.
    Starting,
    /// Component is healthy and operational.
    Healthy,
    /// Component has failed.
    Failed,
    /// Component is stopping.
    Stopping,
    /// Component has stopped.
    Stopped,
}

/// Health status aggregated from all components.
#[derive(Debug, Clone)]
pub struct RuntimeHealth {
    /// Apply loop health.
    pub apply_loop: ComponentHealth,
    /// Replication engine health.
    pub replication: ComponentHealth,
}

impl Default for RuntimeHealth {
    fn default() -> Self {
        Self {
            apply_loop: ComponentHealth::Starting,
            replication: ComponentHealth::Starting,
        }
    }
}

impl RuntimeHealth {
    /// Check if the runtime is ready to serve requests.
    pub fn is_ready(&self) -> bool {
        matches!(
            (self.apply_loop, self.replication),
            (ComponentHealth::Healthy, ComponentHealth::Healthy)
        )
    }

    /// Check if the runtime is alive (not failed).
    pub fn is_alive(&self) -> bool {
        !matches!(
            (self.apply_loop, self.replication),
            (ComponentHealth::Failed, _) | (_, ComponentHealth::Failed)
        )
    }
}

/// Single-node runtime holding all component handles.
pub struct Runtime {
    /// Configuration.
    config: Arc<Config>,

    /// Store shared by the apply loop and readers.
    store: SharedStore,

    /// Leader signal published by the replication engine.
    leader: LeaderSignal,

    /// Replication engine (once started).
    engine: Option<Arc<LocalReplicator>>,

    /// Apply loop task handle.
    apply_handle: Option<JoinHandle<u64>>,

    /// Apply loop counters (once started).
    apply_stats: Option<Arc<ApplyStats>>,

    /// Runtime health status.
    health: RuntimeHealth,

    /// Whether the runtime is running.
    running: Arc<AtomicBool>,

    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,

    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
}

impl Runtime {
    /// Create a new runtime with an empty store.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_store(config, Store::new())
    }

    /// Create a runtime starting from a snapshot.
    pub fn from_snapshot(config: Config, snapshot: &StoreSnapshot) -> Result<Self> {
        let store = snapshot.restore().context("failed to restore snapshot")?;
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Store) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(RwLock::new(store)),
            leader: LeaderSignal::new(),
            engine: None,
            apply_handle: None,
            apply_stats: None,
            health: RuntimeHealth::default(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the shared store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Get the leader signal.
    pub fn leader(&self) -> &LeaderSignal {
        &self.leader
    }

    /// Get the current health status.
    pub fn health(&self) -> &RuntimeHealth {
        &self.health
    }

    /// Check if the runtime is ready to serve requests.
    pub fn is_ready(&self) -> bool {
        self.health.is_ready()
    }

    /// Check if the runtime is alive.
    pub fn is_alive(&self) -> bool {
        self.health.is_alive()
    }

    /// Check if the runtime is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Current store statistics.
    pub fn store_stats(&self) -> StoreStats {
        self.store.read().stats()
    }

    /// Apply loop counters, once started.
    pub fn apply_stats(&self) -> Option<Arc<ApplyStats>> {
        self.apply_stats.clone()
    }

    /// Take a snapshot of the store.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.read().snapshot()
    }

    /// Build an operation processor bound to this runtime.
    pub fn processor(&self) -> Result<OperationProcessor> {
        let engine = self
            .engine
            .clone()
            .context("runtime not started: no replication engine")?;

        Ok(OperationProcessor::new(
            Arc::clone(&self.store),
            engine,
            self.leader
                .gate(self.config.replication.leader_wait_timeout()),
            self.config.reads.default_consistency,
        ))
    }

    /// Initialize and start all runtime components.
    ///
    /// Components are started in order:
    /// 1. Apply loop consuming the commit stream
    /// 2. Replication engine producing it
    /// 3. Leader publication
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            anyhow::bail!("runtime already started");
        }

        tracing::info!(
            node_id = %self.config.node.node_id,
            index = self.store.read().current_index(),
            "starting kvs runtime"
        );

        let (commits_tx, commits_rx) = mpsc::channel(self.config.replication.commit_queue_depth);

        // 1. Apply loop
        self.start_apply_loop(commits_rx);

        // 2. Replication engine
        self.engine = Some(Arc::new(LocalReplicator::new(
            commits_tx,
            self.leader.clone(),
        )));
        self.health.replication = ComponentHealth::Healthy;
        tracing::info!(
            queue_depth = self.config.replication.commit_queue_depth,
            "replication engine started"
        );

        // 3. A single node leads itself
        self.leader.set_leader(self.config.node.node_id.clone());

        self.running.store(true, Ordering::Release);
        tracing::info!("kvs runtime started");

        Ok(())
    }

    fn start_apply_loop(&mut self, commits: mpsc::Receiver<Committed>) {
        let apply_loop = ApplyLoop::new(Arc::clone(&self.store));
        self.apply_stats = Some(apply_loop.stats());
        self.apply_handle = Some(tokio::spawn(apply_loop.run(commits)));
        self.health.apply_loop = ComponentHealth::Healthy;
        tracing::debug!("apply loop spawned");
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop all runtime components.
    ///
    /// Mutations already in the commit stream are applied before the apply
    /// loop exits; new submissions fail as unavailable.
    pub async fn stop(&mut self) -> Result<()> {
        tracing::info!("stopping kvs runtime");
        self.running.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        // 1. Leader
        self.leader.shut_down();

        // 2. Replication engine
        if let Some(engine) = self.engine.take() {
            self.health.replication = ComponentHealth::Stopping;
            engine.close().await;
        }
        self.health.replication = ComponentHealth::Stopped;

        // 3. Apply loop
        self.stop_apply_loop().await?;

        let stats = self.store_stats();
        tracing::info!(
            index = stats.current_index,
            keys = stats.key_count,
            "kvs runtime stopped"
        );
        Ok(())
    }

    async fn stop_apply_loop(&mut self) -> Result<()> {
        let Some(handle) = self.apply_handle.take() else {
            self.health.apply_loop = ComponentHealth::Stopped;
            return Ok(());
        };

        self.health.apply_loop = ComponentHealth::Stopping;
        match tokio::time::timeout(APPLY_DRAIN_TIMEOUT, handle).await {
            Ok(Ok(last_applied)) => {
                tracing::debug!(last_applied, "apply loop stopped");
                self.health.apply_loop = ComponentHealth::Stopped;
                Ok(())
            }
            Ok(Err(e)) => {
                self.health.apply_loop = ComponentHealth::Failed;
                Err(e).context("apply loop task panicked")
            }
            Err(_) => {
                tracing::warn!("apply loop drain timed out");
                self.health.apply_loop = ComponentHealth::Failed;
                anyhow::bail!("apply loop did not drain within {:?}", APPLY_DRAIN_TIMEOUT)
            }
        }
    }
}
