//! Versioned key-value store.
//!
//! The store owns every entry and the version clock. Mutations are applied
//! one at a time by the apply loop; each successful mutation draws exactly
//! one index from the clock, failed compare-and-swap attempts draw none.
//! Keys are kept in byte-lexicographic order so prefix scans and key
//! folding can walk a contiguous range.

use super::clock::{IndexFence, VersionClock};
use super::prefix::PrefixIndex;
use crate::core::error::{KvError, KvResult};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// A version-stamped value bound to a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// The key (non-empty).
    pub key: String,

    /// Opaque value bytes.
    pub value: Vec<u8>,

    /// Opaque caller flags, returned verbatim.
    pub flags: u64,

    /// Index assigned when the key was created.
    pub create_index: u64,

    /// Index of the most recent mutation; the CAS token.
    pub modify_index: u64,
}

impl Entry {
    /// Create a freshly created entry stamped with `index`.
    pub fn new(key: String, value: Vec<u8>, flags: u64, index: u64) -> Self {
        Self {
            key,
            value,
            flags,
            create_index: index,
            modify_index: index,
        }
    }

    /// Check if the entry matches a CAS token.
    pub fn matches_index(&self, expected: u64) -> bool {
        self.modify_index == expected
    }
}

/// The key space.
#[derive(Debug, Default)]
pub struct Store {
    clock: VersionClock,
    entries: BTreeMap<String, Entry>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            clock: VersionClock::new(),
            entries: BTreeMap::new(),
        }
    }

    /// The last index issued by this store's clock.
    pub fn current_index(&self) -> u64 {
        self.clock.current()
    }

    /// The current index as a read fence.
    pub fn fence(&self) -> IndexFence {
        self.clock.fence()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Check if a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Sorted, prefix-queryable view over the key space.
    pub fn prefix(&self) -> PrefixIndex<'_> {
        PrefixIndex::new(&self.entries)
    }

    /// Unconditional upsert.
    ///
    /// Returns the new modify index. An existing key keeps its create index.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>, flags: u64) -> u64 {
        let key = key.into();
        debug_assert!(!key.is_empty(), "empty key reached the store");

        let index = self.clock.next();
        match self.entries.entry(key) {
            btree_map::Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                debug_assert!(index > entry.modify_index);
                entry.value = value;
                entry.flags = flags;
                entry.modify_index = index;
            }
            btree_map::Entry::Vacant(slot) => {
                let key = slot.key().clone();
                slot.insert(Entry::new(key, value, flags, index));
            }
        }
        index
    }

    /// Conditional upsert.
    ///
    /// `expected == 0` only creates; any other value requires the key to be
    /// present with that modify index. A mismatch changes nothing.
    pub fn cas_put(
        &mut self,
        key: impl Into<String>,
        value: Vec<u8>,
        flags: u64,
        expected: u64,
    ) -> bool {
        let key = key.into();
        let admitted = match self.entries.get(&key) {
            None => expected == 0,
            Some(entry) => expected != 0 && entry.matches_index(expected),
        };

        if admitted {
            self.put(key, value, flags);
        }
        admitted
    }

    /// Remove a key if present.
    ///
    /// Returns the removed entry. Removing an absent key is a no-op and does
    /// not advance the clock.
    pub fn delete(&mut self, key: &str) -> Option<Entry> {
        let removed = self.entries.remove(key)?;
        self.clock.next();
        Some(removed)
    }

    /// Remove a key only if its modify index equals `expected`.
    pub fn cas_delete(&mut self, key: &str, expected: u64) -> bool {
        let admitted = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.matches_index(expected));

        if admitted {
            self.delete(key);
        }
        admitted
    }

    /// Remove every key under `prefix` as one mutation.
    ///
    /// Returns the number of keys removed. The clock advances once when at
    /// least one key matched.
    pub fn delete_prefix(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .prefix()
            .scan(prefix)
            .map(|entry| entry.key.clone())
            .collect();

        if doomed.is_empty() {
            return 0;
        }

        for key in &doomed {
            self.entries.remove(key);
        }
        self.clock.next();
        doomed.len()
    }

    /// Get statistics about the store.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            current_index: self.clock.current(),
            key_count: self.entries.len(),
        }
    }
}

/// Statistics for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Last issued index.
    pub current_index: u64,
    /// Number of live keys.
    pub key_count: usize,
}

/// Point-in-time image of a store, used by the replication engine to
/// truncate its log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Clock value at snapshot time.
    pub index: u64,
    /// All entries in key order.
    pub entries: Vec<Entry>,
}

impl StoreSnapshot {
    /// Capture a store.
    pub fn from_store(store: &Store) -> Self {
        Self {
            index: store.clock.current(),
            entries: store.entries.values().cloned().collect(),
        }
    }

    /// Rebuild a store; the clock resumes after the snapshot index.
    ///
    /// Rejects snapshots whose entries are out of key order, repeat a key,
    /// or carry an index the clock has not issued yet.
    pub fn restore(&self) -> KvResult<Store> {
        let mut entries = BTreeMap::new();
        let mut previous: Option<&str> = None;

        for entry in &self.entries {
            if entry.key.is_empty() {
                return Err(invalid_snapshot("entry with an empty key"));
            }
            if previous.is_some_and(|prev| prev >= entry.key.as_str()) {
                return Err(invalid_snapshot(format!(
                    "key {:?} is duplicated or out of order",
                    entry.key
                )));
            }
            if entry.create_index == 0 || entry.create_index > entry.modify_index {
                return Err(invalid_snapshot(format!(
                    "key {:?} has create index {} and modify index {}",
                    entry.key, entry.create_index, entry.modify_index
                )));
            }
            if entry.modify_index > self.index {
                return Err(invalid_snapshot(format!(
                    "key {:?} was modified at {}, after snapshot index {}",
                    entry.key, entry.modify_index, self.index
                )));
            }

            previous = Some(entry.key.as_str());
            entries.insert(entry.key.clone(), entry.clone());
        }

        Ok(Store {
            clock: VersionClock::starting_at(self.index),
            entries,
        })
    }

    /// Number of entries in this snapshot.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl Store {
    /// Create a snapshot of the current state.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::from_store(self)
    }

    /// Serialize the store to bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(&self.snapshot())
    }

    /// Deserialize and validate a store from bytes.
    pub fn deserialize(bytes: &[u8]) -> KvResult<Self> {
        let snapshot: StoreSnapshot = bincode::deserialize(bytes)
            .map_err(|e| invalid_snapshot(format!("decode failed: {}", e)))?;
        snapshot.restore()
    }
}

fn invalid_snapshot(detail: impl std::fmt::Display) -> KvError {
    KvError::internal(format!("invalid snapshot: {}", detail))
}
