//! Hierarchical namespace over the flat key space.
//!
//! Keys are flat strings; hierarchy is a convention where a separator
//! (usually `/`) splits a key into folders. Because the store keeps keys
//! sorted, every key sharing a prefix lives in one contiguous range, so a
//! prefix scan is a range walk that stops at the first non-matching key.
//!
//! Key folding collapses all keys below a folder into a single marker
//! ending with the separator:
//!
//! ```text
//! bar, baz, foo/sub1, foo/sub2, zip   --("", "/")-->   bar, baz, foo/, zip
//! ```

use super::store::Entry;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Separator used by folder helpers.
pub const DEFAULT_SEPARATOR: &str = "/";

/// Sorted, prefix-queryable view over a store's entries.
///
/// Borrowing the view keeps the store immutable for its lifetime, so every
/// listing produced from one view reflects a single clock value.
#[derive(Debug, Clone, Copy)]
pub struct PrefixIndex<'a> {
    entries: &'a BTreeMap<String, Entry>,
}

impl<'a> PrefixIndex<'a> {
    pub(crate) fn new(entries: &'a BTreeMap<String, Entry>) -> Self {
        Self { entries }
    }

    /// Iterate entries whose key starts with `prefix`, in key order.
    pub fn scan<'p>(&self, prefix: &'p str) -> impl Iterator<Item = &'a Entry> + 'p
    where
        'a: 'p,
    {
        let entries: &'a BTreeMap<String, Entry> = self.entries;
        entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry)
    }

    /// Copy out every entry under `prefix`, sorted by key.
    pub fn list(&self, prefix: &str) -> Vec<Entry> {
        self.scan(prefix).cloned().collect()
    }

    /// Count keys under `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.scan(prefix).count()
    }

    /// Check if any key starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.scan(prefix).next().is_some()
    }

    /// List keys under `prefix`, folded at `separator`.
    ///
    /// With no separator (or an empty one) every matching key is returned
    /// unchanged.
    pub fn keys(&self, prefix: &str, separator: Option<&str>) -> Vec<String> {
        fold_keys(
            self.scan(prefix).map(|entry| entry.key.as_str()),
            prefix,
            separator,
        )
    }
}

/// Fold a sorted key sequence at the first separator after `prefix`.
///
/// Keys not starting with `prefix` are skipped. A key whose remainder
/// contains the separator becomes `prefix + remainder[..=separator]`;
/// other keys are kept whole. Keys folding to the same marker are
/// contiguous in sorted input, so duplicates are suppressed by comparing
/// against the last emitted item and the output stays sorted.
pub fn fold_keys<'k, I>(sorted_keys: I, prefix: &str, separator: Option<&str>) -> Vec<String>
where
    I: IntoIterator<Item = &'k str>,
{
    let separator = separator.filter(|sep| !sep.is_empty());
    let mut folded: Vec<String> = Vec::new();

    for key in sorted_keys {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };

        let item = match separator.and_then(|sep| rest.find(sep).map(|pos| pos + sep.len())) {
            Some(end) => &key[..prefix.len() + end],
            None => key,
        };

        if folded.last().map(String::as_str) != Some(item) {
            folded.push(item.to_string());
        }
    }

    folded
}

/// Check if a key names a folder marker.
pub fn is_folder(key: &str) -> bool {
    key.ends_with(DEFAULT_SEPARATOR)
}

/// Split a key into its path segments, ignoring a trailing separator.
pub fn key_parts(key: &str) -> Vec<&str> {
    let trimmed = key.strip_suffix(DEFAULT_SEPARATOR).unwrap_or(key);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split(DEFAULT_SEPARATOR).collect()
}

/// The folder prefix containing `key`.
///
/// Top-level keys live in the root folder, which is the empty prefix.
pub fn parent_key(key: &str) -> String {
    let mut parts = key_parts(key);
    parts.pop();
    if parts.is_empty() {
        return String::new();
    }
    let mut parent = parts.join(DEFAULT_SEPARATOR);
    parent.push_str(DEFAULT_SEPARATOR);
    parent
}
