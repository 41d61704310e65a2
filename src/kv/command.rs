//! Replicated mutations.
//!
//! A [`Mutation`] is the unit the replication engine orders and makes
//! durable. It carries everything needed to apply it deterministically, so
//! every replica applying the same committed sequence reaches the same
//! store and the same clock value.

use serde::{Deserialize, Serialize};

/// A state-changing operation as recorded in the commit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Unconditional upsert.
    Put {
        key: String,
        value: Vec<u8>,
        flags: u64,
    },

    /// Upsert guarded by the key's modify index (0 = must not exist).
    CasPut {
        key: String,
        value: Vec<u8>,
        flags: u64,
        index: u64,
    },

    /// Unconditional removal of one key.
    Delete { key: String },

    /// Removal guarded by the key's modify index.
    CasDelete { key: String, index: u64 },

    /// Removal of every key under a prefix.
    DeleteTree { prefix: String },
}

impl Mutation {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::CasPut { .. } => "cas_put",
            Self::Delete { .. } => "delete",
            Self::CasDelete { .. } => "cas_delete",
            Self::DeleteTree { .. } => "delete_tree",
        }
    }

    /// The key or prefix this mutation targets.
    pub fn target(&self) -> &str {
        match self {
            Self::Put { key, .. }
            | Self::CasPut { key, .. }
            | Self::Delete { key }
            | Self::CasDelete { key, .. } => key,
            Self::DeleteTree { prefix } => prefix,
        }
    }

    /// Check if this mutation carries a compare-and-swap precondition.
    pub fn is_conditional(&self) -> bool {
        matches!(self, Self::CasPut { .. } | Self::CasDelete { .. })
    }

    /// Encode for the commit log.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode a commit log record.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind(), self.target())
    }
}

/// Result of applying a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Store index after application.
    pub index: u64,
    /// Whether the mutation took effect (false only on CAS mismatch).
    pub success: bool,
    /// Number of keys written or removed.
    pub affected: usize,
}

impl ApplyResult {
    /// Create a successful result.
    pub fn success(index: u64, affected: usize) -> Self {
        Self {
            index,
            success: true,
            affected,
        }
    }

    /// Create a failed result (CAS precondition not met).
    pub fn failed(index: u64) -> Self {
        Self {
            index,
            success: false,
            affected: 0,
        }
    }
}
