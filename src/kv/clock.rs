//! Version clock and index fencing.
//!
//! A single monotone counter is shared by the whole key space. Every
//! committed mutation that changes the store draws exactly one value from
//! it; that value becomes the entry's `ModifyIndex` (and `CreateIndex` on
//! creation). Reads are stamped with the last issued value.

use serde::{Deserialize, Serialize};

/// The global version counter for a store.
///
/// Only the store may advance the clock; callers outside the crate can
/// observe it but never draw from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionClock {
    current: u64,
}

impl VersionClock {
    /// Create a clock that has not issued any index yet.
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// Create a clock resuming after `current` (snapshot restore).
    pub const fn starting_at(current: u64) -> Self {
        Self { current }
    }

    /// The last issued index, or 0 if none was issued.
    pub const fn current(&self) -> u64 {
        self.current
    }

    /// Issue the next index.
    pub(crate) fn next(&mut self) -> u64 {
        debug_assert!(self.current < u64::MAX, "version clock exhausted");
        self.current += 1;
        self.current
    }

    /// Capture the current value as a read fence.
    pub const fn fence(&self) -> IndexFence {
        IndexFence::new(self.current)
    }
}

/// The clock value observed by a read.
///
/// Callers compare fences across responses to detect staleness or to
/// continue a blocking query from a known point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexFence {
    /// The observed clock value.
    pub index: u64,
}

impl IndexFence {
    /// Create a new fence.
    pub const fn new(index: u64) -> Self {
        Self { index }
    }

    /// Check if this fence is at or after the given index.
    pub const fn is_at_or_after(&self, index: u64) -> bool {
        self.index >= index
    }

    /// Get the index value.
    pub const fn get(&self) -> u64 {
        self.index
    }
}

impl std::fmt::Display for IndexFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "index:{}", self.index)
    }
}

impl From<u64> for IndexFence {
    fn from(index: u64) -> Self {
        Self::new(index)
    }
}
