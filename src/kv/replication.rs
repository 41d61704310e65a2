//! Replication engine boundary.
//!
//! Consensus, durability and leader election live outside this crate. The
//! core only needs an engine that accepts a mutation, orders it into the
//! commit stream, and resolves once that mutation has been applied locally.
//! [`LocalReplicator`] is the single-node engine: the commit log is the
//! in-process channel feeding the apply loop.

use super::apply_loop::Committed;
use super::command::{ApplyResult, Mutation};
use super::leader::{LeaderSignal, LeaderState};
use crate::core::error::{KvError, KvResult, UnavailableReason};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot, Mutex};

/// An engine that totally orders mutations and delivers them, committed,
/// to the apply loop.
pub trait ReplicationEngine: Send + Sync {
    /// Submit a mutation and wait until it has been committed and applied.
    ///
    /// An `Err` means the mutation must be treated as not applied by the
    /// caller; the engine never reports success before the apply loop has
    /// produced a result.
    fn submit(
        &self,
        mutation: Mutation,
    ) -> Pin<Box<dyn Future<Output = KvResult<ApplyResult>> + Send + '_>>;

    /// Last log index handed to the commit stream.
    fn last_log_index(&self) -> u64;
}

/// Log tail of the local engine: next index and the commit stream.
struct LogTail {
    last_index: u64,
    commits: Option<mpsc::Sender<Committed>>,
}

/// Single-node replication engine.
///
/// Submissions are serialized while appending so log indexes enter the
/// commit stream in order.
pub struct LocalReplicator {
    tail: Mutex<LogTail>,
    leader: LeaderSignal,
    last_index: AtomicU64,
}

impl LocalReplicator {
    /// Create an engine appending to `commits`.
    pub fn new(commits: mpsc::Sender<Committed>, leader: LeaderSignal) -> Self {
        Self {
            tail: Mutex::new(LogTail {
                last_index: 0,
                commits: Some(commits),
            }),
            leader,
            last_index: AtomicU64::new(0),
        }
    }

    /// Stop accepting submissions and close the commit stream.
    ///
    /// Mutations already appended are still applied.
    pub async fn close(&self) {
        let mut tail = self.tail.lock().await;
        if tail.commits.take().is_some() {
            tracing::debug!(last_index = tail.last_index, "commit stream closed");
        }
    }

    async fn append(&self, mutation: Mutation) -> KvResult<oneshot::Receiver<ApplyResult>> {
        match self.leader.state() {
            LeaderState::Elected(_) => {}
            LeaderState::ShuttingDown => {
                return Err(KvError::unavailable(UnavailableReason::ShuttingDown))
            }
            LeaderState::Unknown => return Err(KvError::unavailable(UnavailableReason::NoLeader)),
        }

        let mut tail = self.tail.lock().await;
        let commits = tail
            .commits
            .clone()
            .ok_or_else(|| KvError::unavailable(UnavailableReason::ShuttingDown))?;

        let log_index = tail.last_index + 1;
        let (done_tx, done_rx) = oneshot::channel();
        commits
            .send(Committed::new(log_index, mutation).with_completion(done_tx))
            .await
            .map_err(|_| KvError::replication("commit stream closed"))?;

        tail.last_index = log_index;
        self.last_index.store(log_index, Ordering::Release);
        Ok(done_rx)
    }
}

impl ReplicationEngine for LocalReplicator {
    fn submit(
        &self,
        mutation: Mutation,
    ) -> Pin<Box<dyn Future<Output = KvResult<ApplyResult>> + Send + '_>> {
        Box::pin(async move {
            let kind = mutation.kind();
            let done = self.append(mutation).await?;
            done.await.map_err(|_| {
                tracing::warn!(kind, "mutation dropped before apply");
                KvError::replication("apply loop stopped before the mutation was applied")
            })
        })
    }

    fn last_log_index(&self) -> u64 {
        self.last_index.load(Ordering::Acquire)
    }
}
