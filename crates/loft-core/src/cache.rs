//! Artifact cache keyed by feature name.
//!
//! Stores the last computed output per feature together with the input hash
//! that produced it. Entries are invalidated only for correctness: there is
//! no capacity limit and no LRU, and an entry survives until a newer result
//! replaces it, it is explicitly invalidated, or the store is cleared.
//! Nothing is persisted across process restarts.

use std::time::SystemTime;

use rustc_hash::FxHashMap;

/// A computed output the engine can cache.
///
/// The engine treats artifacts as opaque blobs; the only thing it ever asks
/// of one is its approximate in-memory size, reported through
/// [`crate::Engine::stats`].
pub trait Artifact {
    /// Approximate size of the artifact in bytes.
    fn size_bytes(&self) -> usize;
}

impl Artifact for Vec<u8> {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl Artifact for String {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

/// Unit artifacts are useful in tests and for hosts that track outputs
/// elsewhere and only want the bookkeeping.
impl Artifact for () {
    fn size_bytes(&self) -> usize {
        0
    }
}

/// One cached output.
#[derive(Debug, Clone)]
pub struct CacheEntry<A> {
    /// The computed output, opaque to the engine.
    pub artifact: A,
    /// Input hash of the feature at the time the artifact was produced.
    pub input_hash: u64,
    /// When the entry was stored. Informational only, never used for
    /// eviction.
    pub created_at: SystemTime,
}

/// Mapping from feature name to its last computed output.
#[derive(Debug)]
pub struct CacheStore<A> {
    entries: FxHashMap<String, CacheEntry<A>>,
}

impl<A: Artifact> CacheStore<A> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Store an artifact, replacing any previous entry for the feature.
    pub fn insert(&mut self, name: String, artifact: A, input_hash: u64) {
        self.entries.insert(
            name,
            CacheEntry {
                artifact,
                input_hash,
                created_at: SystemTime::now(),
            },
        );
    }

    /// Look up a single entry.
    pub fn get(&self, name: &str) -> Option<&CacheEntry<A>> {
        self.entries.get(name)
    }

    /// Look up many entries at once. Names without an entry are simply
    /// absent from the result.
    pub fn get_many<'a, S>(&'a self, names: &[S]) -> FxHashMap<&'a str, &'a CacheEntry<A>>
    where
        S: AsRef<str>,
    {
        names
            .iter()
            .filter_map(|name| self.entries.get_key_value(name.as_ref()))
            .map(|(name, entry)| (name.as_str(), entry))
            .collect()
    }

    /// Input hash recorded for a feature's entry, if one exists.
    pub fn entry_input_hash(&self, name: &str) -> Option<u64> {
        self.entries.get(name).map(|entry| entry.input_hash)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove one entry.
    pub fn remove(&mut self, name: &str) -> Option<CacheEntry<A>> {
        self.entries.remove(name)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries, including ones for features no longer declared.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total artifact size across all entries.
    pub fn size_bytes(&self) -> usize {
        self.entries
            .values()
            .map(|entry| entry.artifact.size_bytes())
            .sum()
    }
}

impl<A: Artifact> Default for CacheStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut store: CacheStore<Vec<u8>> = CacheStore::new();
        store.insert("a".to_string(), vec![1, 2, 3], 42);

        let entry = store.get("a").unwrap();
        assert_eq!(entry.artifact, vec![1, 2, 3]);
        assert_eq!(entry.input_hash, 42);
        assert!(store.get("b").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut store: CacheStore<Vec<u8>> = CacheStore::new();
        store.insert("a".to_string(), vec![1], 1);
        store.insert("a".to_string(), vec![2, 2], 2);

        assert_eq!(store.len(), 1);
        let entry = store.get("a").unwrap();
        assert_eq!(entry.artifact, vec![2, 2]);
        assert_eq!(entry.input_hash, 2);
    }

    #[test]
    fn test_get_many_skips_missing() {
        let mut store: CacheStore<String> = CacheStore::new();
        store.insert("a".to_string(), "mesh".to_string(), 1);
        store.insert("b".to_string(), "solid".to_string(), 2);

        let found = store.get_many(&["a", "missing", "b"]);
        assert_eq!(found.len(), 2);
        assert!(found.contains_key("a"));
        assert!(found.contains_key("b"));
        assert!(!found.contains_key("missing"));
    }

    #[test]
    fn test_size_accounting() {
        let mut store: CacheStore<Vec<u8>> = CacheStore::new();
        store.insert("a".to_string(), vec![0; 100], 1);
        store.insert("b".to_string(), vec![0; 28], 2);
        assert_eq!(store.size_bytes(), 128);

        store.remove("a");
        assert_eq!(store.size_bytes(), 28);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.size_bytes(), 0);
    }
}
