//! Change detection between analysis passes.
//!
//! Compares a freshly built graph against the graph and cache retained from
//! the previous pass and classifies every feature as dirty (must re-execute)
//! or clean (the cached artifact is still valid). Dirtiness propagates
//! forward through dependents, so editing one feature re-executes everything
//! downstream of it.

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHashSet;

use crate::cache::{Artifact, CacheStore};
use crate::graph::DependencyGraph;

/// Outcome of one classification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Features whose cached artifact is no longer valid.
    pub dirty: FxHashSet<String>,
    /// Features guaranteed to have a valid, reusable cache entry.
    pub clean: FxHashSet<String>,
}

/// Combine a node's own code hash with the code hashes of its direct
/// dependencies.
///
/// Dependency hashes are sorted before mixing so the result does not depend
/// on the order references appear in the initializer, only on which
/// dependencies exist and what their code is.
fn input_hash(code_hash: u64, mut dependency_hashes: Vec<u64>) -> u64 {
    let mut hasher = DefaultHasher::new();
    code_hash.hash(&mut hasher);
    dependency_hashes.sort_unstable();
    for hash in dependency_hashes {
        hash.hash(&mut hasher);
    }
    hasher.finish()
}

/// Classify every feature in `graph` as dirty or clean.
///
/// Computes `input_hash` for every node, then seeds the dirty set with
/// features that are new, whose own code changed, or whose cache entry is
/// missing or stale, and finally floods dirtiness forward through
/// dependents. Mutates the nodes' `input_hash` and `dirty` fields in place.
///
/// A feature comes out clean only when its cache entry was produced from
/// exactly the inputs it has now.
pub fn classify<A: Artifact>(
    graph: &mut DependencyGraph,
    prior: &DependencyGraph,
    cache: &CacheStore<A>,
) -> Classification {
    let names: Vec<String> = graph.declaration_order().to_vec();

    // Input hashes first. Dependency code hashes are stable per node, so
    // order does not matter here.
    for name in &names {
        let dependency_hashes: Vec<u64> = graph
            .dependencies(name)
            .iter()
            .filter_map(|dep| graph.node(dep))
            .map(|node| node.code_hash)
            .collect();

        if let Some(node) = graph.node(name) {
            let hash = input_hash(node.code_hash, dependency_hashes);
            if let Some(node) = graph.node_mut(name) {
                node.input_hash = hash;
            }
        }
    }

    // Seed pass: conditions that dirty a feature on its own.
    let mut dirty: FxHashSet<String> = FxHashSet::default();
    for name in &names {
        let Some(node) = graph.node(name) else {
            continue;
        };

        let code_changed = match prior.node(name) {
            None => true,
            Some(prior_node) => prior_node.code_hash != node.code_hash,
        };

        let cache_valid = cache
            .entry_input_hash(name)
            .is_some_and(|hash| hash == node.input_hash);

        if code_changed || !cache_valid {
            dirty.insert(name.clone());
        }
    }

    // Forward propagation through dependents. Visited bookkeeping doubles as
    // the dirty set, which also terminates on cycles.
    let mut queue: VecDeque<String> = dirty.iter().cloned().collect();
    while let Some(name) = queue.pop_front() {
        for dependent in graph.dependents(&name) {
            if dirty.insert(dependent.clone()) {
                queue.push_back(dependent);
            }
        }
    }

    let mut clean: FxHashSet<String> = FxHashSet::default();
    for name in &names {
        let is_dirty = dirty.contains(name);
        if let Some(node) = graph.node_mut(name) {
            node.dirty = is_dirty;
        }
        if !is_dirty {
            clean.insert(name.clone());
        }
    }

    tracing::debug!(
        total = names.len(),
        dirty = dirty.len(),
        clean = clean.len(),
        "classified features"
    );

    Classification { dirty, clean }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn build(source: &str) -> DependencyGraph {
        DependencyGraph::from_script(&parse(source).unwrap())
    }

    fn cache() -> CacheStore<Vec<u8>> {
        CacheStore::new()
    }

    /// Run a full pass and fill the cache as if every dirty feature had been
    /// executed.
    fn execute_all(graph: &mut DependencyGraph, cache: &mut CacheStore<Vec<u8>>) {
        for name in graph.declaration_order().to_vec() {
            let hash = graph.node(&name).unwrap().input_hash;
            cache.insert(name.clone(), vec![0u8; 8], hash);
            graph.node_mut(&name).unwrap().dirty = false;
        }
    }

    #[test]
    fn test_everything_dirty_on_first_pass() {
        let mut graph = build("a = box(1, 1, 1)\nb = move(a, 1, 0, 0)");
        let result = classify(&mut graph, &DependencyGraph::new(), &cache());
        assert_eq!(result.dirty.len(), 2);
        assert!(result.clean.is_empty());
        assert!(graph.node("a").unwrap().dirty);
        assert!(graph.node("b").unwrap().dirty);
    }

    #[test]
    fn test_everything_clean_when_nothing_changed() {
        let source = "a = box(1, 1, 1)\nb = move(a, 1, 0, 0)";
        let mut store = cache();

        let mut first = build(source);
        classify(&mut first, &DependencyGraph::new(), &store);
        execute_all(&mut first, &mut store);

        let mut second = build(source);
        let result = classify(&mut second, &first, &store);
        assert!(result.dirty.is_empty());
        assert_eq!(result.clean.len(), 2);
    }

    #[test]
    fn test_editing_a_leaf_dirties_only_the_leaf() {
        let mut store = cache();
        let mut first = build("a = box(1, 1, 1)\nb = move(a, 1, 0, 0)");
        classify(&mut first, &DependencyGraph::new(), &store);
        execute_all(&mut first, &mut store);

        let mut second = build("a = box(1, 1, 1)\nb = move(a, 2, 0, 0)");
        let result = classify(&mut second, &first, &store);
        assert!(result.dirty.contains("b"));
        assert!(result.clean.contains("a"));
    }

    #[test]
    fn test_editing_a_root_dirties_dependents() {
        let mut store = cache();
        let mut first = build("a = box(1, 1, 1)\nb = move(a, 1, 0, 0)\nc = shell(b, 1)");
        classify(&mut first, &DependencyGraph::new(), &store);
        execute_all(&mut first, &mut store);

        let mut second = build("a = box(2, 1, 1)\nb = move(a, 1, 0, 0)\nc = shell(b, 1)");
        let result = classify(&mut second, &first, &store);
        assert_eq!(result.dirty.len(), 3);
        assert!(result.clean.is_empty());
    }

    #[test]
    fn test_missing_cache_entry_dirties_even_without_edit() {
        let source = "a = box(1, 1, 1)\nb = move(a, 1, 0, 0)";
        let mut store = cache();
        let mut first = build(source);
        classify(&mut first, &DependencyGraph::new(), &store);
        execute_all(&mut first, &mut store);
        store.remove("a");

        let mut second = build(source);
        let result = classify(&mut second, &first, &store);
        // `a` has no artifact, and `b` is downstream of it.
        assert_eq!(result.dirty.len(), 2);
    }

    #[test]
    fn test_input_hash_independent_of_dependency_order() {
        let store = cache();
        let mut g1 = build("p = disc(1)\nq = disc(2)\nx = union(p, q)");
        let mut g2 = build("q = disc(2)\np = disc(1)\nx = union(p, q)");
        classify(&mut g1, &DependencyGraph::new(), &store);
        classify(&mut g2, &DependencyGraph::new(), &store);
        // `x` has the same code and the same dependency set in both scripts;
        // the order `p` and `q` are declared in must not leak into its hash.
        assert_eq!(
            g1.node("x").unwrap().input_hash,
            g2.node("x").unwrap().input_hash
        );
    }

    #[test]
    fn test_hashes_are_deterministic() {
        let source = "a = box(1, 1, 1)\nb = move(a, 1, 0, 0)";
        let mut g1 = build(source);
        let mut g2 = build(source);
        classify(&mut g1, &DependencyGraph::new(), &cache());
        classify(&mut g2, &DependencyGraph::new(), &cache());
        for name in ["a", "b"] {
            assert_eq!(
                g1.node(name).unwrap().code_hash,
                g2.node(name).unwrap().code_hash
            );
            assert_eq!(
                g1.node(name).unwrap().input_hash,
                g2.node(name).unwrap().input_hash
            );
        }
    }

    #[test]
    fn test_cycle_terminates() {
        let store = cache();
        let mut graph = build("a = wrap(b)\nb = wrap(a)");
        let result = classify(&mut graph, &DependencyGraph::new(), &store);
        assert_eq!(result.dirty.len(), 2);
    }
}
