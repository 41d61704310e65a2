//! Operation processor.
//!
//! Single entry point for decoded requests. Mutations are handed to the
//! replication engine and answered with the result the apply loop produced
//! for them; reads run against the shared store under its read lock, after
//! the leader gate for consistent reads.

use super::apply_loop::SharedStore;
use super::command::Mutation;
use super::leader::{LeaderGate, ReadConsistency};
use super::replication::ReplicationEngine;
use super::request::{Operation, RawRequest, Request};
use super::store::{Entry, Store};
use crate::core::error::{KvError, KvResult};
use serde::Serialize;
use std::sync::Arc;

/// Metadata attached to every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryMeta {
    /// Clock value observed together with the data.
    pub index: u64,
    /// Whether a leader was known when the read was served.
    pub known_leader: bool,
    /// Consistency the read was served with.
    pub consistency: ReadConsistency,
}

/// Read result with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Read<T> {
    /// Entries or keys read from the store.
    pub data: T,
    /// Index and leader state observed with `data`.
    pub meta: QueryMeta,
}

/// Outcome of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    /// False only when a CAS precondition did not hold.
    pub success: bool,
    /// Clock value after the mutation was applied.
    pub index: u64,
    /// Number of keys written or removed.
    pub affected: usize,
}

/// Discriminated response, one shape per operation family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Response {
    /// Put, CasPut, Delete, CasDelete and RecursiveDelete.
    Write(WriteOutcome),
    /// Get and RecursiveGet; `None` when nothing matched.
    Entries(Read<Option<Vec<Entry>>>),
    /// ListKeys.
    Keys(Read<Vec<String>>),
}

impl Response {
    /// Read metadata, if this is a read response.
    pub fn meta(&self) -> Option<&QueryMeta> {
        match self {
            Self::Write(_) => None,
            Self::Entries(read) => Some(&read.meta),
            Self::Keys(read) => Some(&read.meta),
        }
    }

    /// Write outcome, if this is a write response.
    pub fn write_outcome(&self) -> Option<&WriteOutcome> {
        match self {
            Self::Write(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Dispatches operations to the replication engine or the store.
#[derive(Clone)]
pub struct OperationProcessor {
    store: SharedStore,
    engine: Arc<dyn ReplicationEngine>,
    gate: LeaderGate,
    default_consistency: ReadConsistency,
}

impl OperationProcessor {
    /// Create a processor.
    pub fn new(
        store: SharedStore,
        engine: Arc<dyn ReplicationEngine>,
        gate: LeaderGate,
        default_consistency: ReadConsistency,
    ) -> Self {
        Self {
            store,
            engine,
            gate,
            default_consistency,
        }
    }

    /// Consistency used when a request does not specify one.
    pub fn default_consistency(&self) -> ReadConsistency {
        self.default_consistency
    }

    /// Get the leader gate.
    pub fn gate(&self) -> &LeaderGate {
        &self.gate
    }

    /// Decode and process a raw request.
    pub async fn handle(&self, raw: RawRequest) -> KvResult<Response> {
        let request = Request::decode(raw).map_err(|e| {
            tracing::debug!(error = %e, "request rejected");
            e
        })?;
        self.process(request).await
    }

    /// Process a decoded request.
    pub async fn process(&self, request: Request) -> KvResult<Response> {
        let consistency = request.consistency.unwrap_or(self.default_consistency);
        let kind = request.operation.kind();

        match request.operation {
            Operation::Get { key } => {
                let read = self
                    .read(consistency, |store| store.get(&key).map(|e| vec![e.clone()]))
                    .await?;
                Ok(Response::Entries(read))
            }
            Operation::RecursiveGet { prefix } => {
                let read = self
                    .read(consistency, |store| {
                        let entries = store.prefix().list(&prefix);
                        (!entries.is_empty()).then_some(entries)
                    })
                    .await?;
                Ok(Response::Entries(read))
            }
            Operation::ListKeys { prefix, separator } => {
                let read = self
                    .read(consistency, |store| {
                        store.prefix().keys(&prefix, separator.as_deref())
                    })
                    .await?;
                Ok(Response::Keys(read))
            }
            operation => {
                let mutation = operation
                    .into_mutation()
                    .ok_or_else(|| KvError::internal(format!("{} is not a mutation", kind)))?;
                self.write(mutation).await.map(Response::Write)
            }
        }
    }

    async fn read<T>(
        &self,
        consistency: ReadConsistency,
        f: impl FnOnce(&Store) -> T,
    ) -> KvResult<Read<T>> {
        if consistency.requires_leader() {
            self.gate.confirm().await?;
        }

        let known_leader = self.gate.has_leader();
        let store = self.store.read();
        let data = f(&*store);
        let index = store.current_index();
        drop(store);

        Ok(Read {
            data,
            meta: QueryMeta {
                index,
                known_leader,
                consistency,
            },
        })
    }

    async fn write(&self, mutation: Mutation) -> KvResult<WriteOutcome> {
        self.gate.confirm().await?;

        let kind = mutation.kind();
        let result = self.engine.submit(mutation).await.map_err(|e| {
            if !e.is_retriable() {
                tracing::warn!(kind, error = %e, "mutation not committed");
            }
            e
        })?;

        Ok(WriteOutcome {
            success: result.success,
            index: result.index,
            affected: result.affected,
        })
    }
}
