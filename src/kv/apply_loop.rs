//! Commit stream processing and apply loop.
//!
//! The apply loop is the only writer of the store. It consumes committed
//! mutations from a single channel, in commit order, and applies each one
//! under the store's write lock. Readers take the read lock, so they see the
//! store either entirely before or entirely after any mutation.

use super::command::{ApplyResult, Mutation};
use super::store::Store;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Store handle shared between the apply loop and readers.
pub type SharedStore = Arc<RwLock<Store>>;

/// A mutation delivered back by the replication engine as committed.
#[derive(Debug)]
pub struct Committed {
    /// Position in the commit log.
    pub log_index: u64,
    /// The mutation to apply.
    pub mutation: Mutation,
    /// Completion for the submitter, if it is waiting on this node.
    pub done: Option<oneshot::Sender<ApplyResult>>,
}

impl Committed {
    /// Create a committed record without a waiting submitter.
    pub fn new(log_index: u64, mutation: Mutation) -> Self {
        Self {
            log_index,
            mutation,
            done: None,
        }
    }

    /// Attach a completion channel.
    pub fn with_completion(mut self, done: oneshot::Sender<ApplyResult>) -> Self {
        self.done = Some(done);
        self
    }
}

/// Counters updated by the apply loop.
#[derive(Debug, Default)]
pub struct ApplyStats {
    applied: AtomicU64,
    conflicts: AtomicU64,
    last_applied: AtomicU64,
}

impl ApplyStats {
    /// Create new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed mutations applied.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Number of CAS mutations rejected at apply time.
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Log index of the last applied mutation.
    pub fn last_applied(&self) -> u64 {
        self.last_applied.load(Ordering::Acquire)
    }

    fn record(&self, log_index: u64, result: &ApplyResult) {
        self.applied.fetch_add(1, Ordering::Relaxed);
        if !result.success {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
        }
        self.last_applied.store(log_index, Ordering::Release);
    }
}

/// Single consumer of the commit stream.
pub struct ApplyLoop {
    store: SharedStore,
    last_applied: u64,
    stats: Arc<ApplyStats>,
}

impl ApplyLoop {
    /// Create an apply loop over a shared store.
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            last_applied: 0,
            stats: Arc::new(ApplyStats::new()),
        }
    }

    /// Get the shared store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Get a handle to the apply counters.
    pub fn stats(&self) -> Arc<ApplyStats> {
        Arc::clone(&self.stats)
    }

    /// Get the last applied log index.
    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// Apply a committed mutation at the given log index.
    ///
    /// Must be called in strictly increasing log order.
    pub fn apply(&mut self, mutation: Mutation, log_index: u64) -> ApplyResult {
        debug_assert!(
            log_index > self.last_applied,
            "apply order violation: {} <= {}",
            log_index,
            self.last_applied
        );

        let result = {
            let mut store = self.store.write();
            match mutation {
                Mutation::Put { key, value, flags } => Self::apply_put(&mut store, key, value, flags),
                Mutation::CasPut {
                    key,
                    value,
                    flags,
                    index,
                } => Self::apply_cas_put(&mut store, key, value, flags, index),
                Mutation::Delete { key } => Self::apply_delete(&mut store, &key),
                Mutation::CasDelete { key, index } => Self::apply_cas_delete(&mut store, &key, index),
                Mutation::DeleteTree { prefix } => Self::apply_delete_tree(&mut store, &prefix),
            }
        };

        self.last_applied = log_index;
        self.stats.record(log_index, &result);

        if result.success {
            tracing::debug!(log_index, index = result.index, affected = result.affected, "applied");
        } else {
            tracing::debug!(log_index, index = result.index, "cas precondition failed");
        }

        result
    }

    fn apply_put(store: &mut Store, key: String, value: Vec<u8>, flags: u64) -> ApplyResult {
        let index = store.put(key, value, flags);
        ApplyResult::success(index, 1)
    }

    fn apply_cas_put(
        store: &mut Store,
        key: String,
        value: Vec<u8>,
        flags: u64,
        expected: u64,
    ) -> ApplyResult {
        if store.cas_put(key, value, flags, expected) {
            ApplyResult::success(store.current_index(), 1)
        } else {
            ApplyResult::failed(store.current_index())
        }
    }

    fn apply_delete(store: &mut Store, key: &str) -> ApplyResult {
        let removed = store.delete(key).map_or(0, |_| 1);
        ApplyResult::success(store.current_index(), removed)
    }

    fn apply_cas_delete(store: &mut Store, key: &str, expected: u64) -> ApplyResult {
        if store.cas_delete(key, expected) {
            ApplyResult::success(store.current_index(), 1)
        } else {
            ApplyResult::failed(store.current_index())
        }
    }

    fn apply_delete_tree(store: &mut Store, prefix: &str) -> ApplyResult {
        let removed = store.delete_prefix(prefix);
        ApplyResult::success(store.current_index(), removed)
    }

    /// Drain the commit stream until every sender is gone.
    ///
    /// Returns the last applied log index.
    pub async fn run(mut self, mut commits: mpsc::Receiver<Committed>) -> u64 {
        tracing::debug!("apply loop started");

        while let Some(committed) = commits.recv().await {
            let result = self.apply(committed.mutation, committed.log_index);
            if let Some(done) = committed.done {
                // The submitter may have given up waiting; the mutation is
                // applied regardless.
                let _ = done.send(result);
            }
        }

        tracing::info!(last_applied = self.last_applied, "apply loop drained");
        self.last_applied
    }
}
