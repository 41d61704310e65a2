//! Leader availability and read consistency.
//!
//! The replication engine publishes who the current leader is through a
//! [`LeaderSignal`]. A [`LeaderGate`] subscribes to it and gates every
//! operation that must not be answered without a leader: all writes and
//! consistent reads. Stale reads bypass the gate and are served from local
//! state immediately.

use crate::core::error::{KvError, KvResult, UnavailableReason};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Read consistency requested for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadConsistency {
    /// Wait for a confirmed leader before reading.
    #[default]
    Consistent,
    /// Read local state immediately.
    Stale,
}

impl ReadConsistency {
    /// Check if this read must pass the leader gate.
    pub fn requires_leader(&self) -> bool {
        matches!(self, Self::Consistent)
    }
}

impl std::fmt::Display for ReadConsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Consistent => write!(f, "consistent"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

impl std::str::FromStr for ReadConsistency {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consistent" => Ok(Self::Consistent),
            "stale" => Ok(Self::Stale),
            other => Err(KvError::validation(format!(
                "unknown read consistency: {}",
                other
            ))),
        }
    }
}

/// What the leader signal currently publishes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LeaderState {
    /// No leader is known yet.
    #[default]
    Unknown,
    /// The named node leads.
    Elected(String),
    /// The node is stopping; no leader will appear.
    ShuttingDown,
}

impl LeaderState {
    /// The elected leader, if any.
    pub fn leader(&self) -> Option<&str> {
        match self {
            Self::Elected(leader) => Some(leader),
            _ => None,
        }
    }

    fn is_settled(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Publisher side of the leader signal, owned by the replication engine.
#[derive(Debug, Clone)]
pub struct LeaderSignal {
    tx: Arc<watch::Sender<LeaderState>>,
}

impl LeaderSignal {
    /// Create a signal with no leader.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LeaderState::Unknown);
        Self { tx: Arc::new(tx) }
    }

    /// Publish the current leader.
    pub fn set_leader(&self, leader: impl Into<String>) {
        let leader = leader.into();
        tracing::info!(leader = %leader, "leader elected");
        self.tx.send_replace(LeaderState::Elected(leader));
    }

    /// Publish that no leader is known.
    ///
    /// Has no effect once the signal is shutting down.
    pub fn clear(&self) {
        let lost = self.tx.send_if_modified(|state| {
            if matches!(state, LeaderState::Elected(_)) {
                *state = LeaderState::Unknown;
                true
            } else {
                false
            }
        });
        if lost {
            tracing::info!("leader lost");
        }
    }

    /// Publish that the node is stopping.
    ///
    /// Pending and future gate checks fail with `ShuttingDown` instead of
    /// waiting for a leader.
    pub fn shut_down(&self) {
        if self.tx.send_replace(LeaderState::ShuttingDown) != LeaderState::ShuttingDown {
            tracing::info!("leader signal shut down");
        }
    }

    /// Current published state.
    pub fn state(&self) -> LeaderState {
        self.tx.borrow().clone()
    }

    /// The currently known leader.
    pub fn leader(&self) -> Option<String> {
        self.tx.borrow().leader().map(str::to_string)
    }

    /// Check if a leader is currently known.
    pub fn has_leader(&self) -> bool {
        self.tx.borrow().leader().is_some()
    }

    /// Check if the signal has been shut down.
    pub fn is_shutting_down(&self) -> bool {
        matches!(*self.tx.borrow(), LeaderState::ShuttingDown)
    }

    /// Build a gate that waits up to `wait_timeout` for a leader.
    pub fn gate(&self, wait_timeout: Duration) -> LeaderGate {
        LeaderGate {
            rx: self.tx.subscribe(),
            wait_timeout,
            stats: Arc::new(GateStats::new()),
        }
    }
}

impl Default for LeaderSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer side of the leader signal.
#[derive(Debug, Clone)]
pub struct LeaderGate {
    rx: watch::Receiver<LeaderState>,
    wait_timeout: Duration,
    stats: Arc<GateStats>,
}

impl LeaderGate {
    /// Check if a leader is currently known.
    pub fn has_leader(&self) -> bool {
        self.rx.borrow().leader().is_some()
    }

    /// The configured wait for a leader.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Wait until a leader is known.
    ///
    /// Fails with `ShuttingDown` as soon as the signal is shut down or its
    /// publisher is gone, with `NoLeader` immediately when the wait is zero,
    /// and with `LeaderWaitTimeout` when the wait elapses.
    pub async fn confirm(&self) -> KvResult<()> {
        self.stats.checks.fetch_add(1, Ordering::Relaxed);

        let current = self.rx.borrow().clone();
        match current {
            LeaderState::Elected(_) => return self.pass(),
            LeaderState::ShuttingDown => return self.fail(UnavailableReason::ShuttingDown),
            LeaderState::Unknown => {}
        }

        if self.wait_timeout.is_zero() {
            return self.fail(UnavailableReason::NoLeader);
        }

        let mut rx = self.rx.clone();
        let waited = tokio::time::timeout(self.wait_timeout, rx.wait_for(LeaderState::is_settled))
            .await
            .map(|changed| changed.map(|state| (*state).clone()));

        match waited {
            Ok(Ok(LeaderState::Elected(_))) => self.pass(),
            Ok(_) => self.fail(UnavailableReason::ShuttingDown),
            Err(_) => {
                tracing::warn!(
                    wait_ms = self.wait_timeout.as_millis() as u64,
                    "no leader within wait"
                );
                self.fail(UnavailableReason::LeaderWaitTimeout)
            }
        }
    }

    fn pass(&self) -> KvResult<()> {
        self.stats.passes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn fail(&self, reason: UnavailableReason) -> KvResult<()> {
        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        Err(KvError::unavailable(reason))
    }

    /// Get gate statistics.
    pub fn stats(&self) -> &GateStats {
        &self.stats
    }
}

/// Leader gate counters.
#[derive(Debug, Default)]
pub struct GateStats {
    checks: AtomicU64,
    passes: AtomicU64,
    failures: AtomicU64,
}

impl GateStats {
    /// Create new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total gate checks.
    pub fn checks(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }

    /// Checks that found a leader.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Checks that failed as unavailable.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
