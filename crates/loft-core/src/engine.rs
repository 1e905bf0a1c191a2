//! The incremental execution engine.
//!
//! [`Engine`] owns the state that survives between analysis cycles: the
//! graph from the previous pass and the artifact cache. The host feeds it
//! raw script text on every edit and receives an [`AnalysisResult`] plus an
//! [`ExecutionPlan`]; an external executor computes artifacts for the dirty
//! features and hands them back through [`Engine::update_cache`].
//!
//! The engine is synchronous and single-threaded. It is the host's job to
//! serialize calls: analyzing again before a plan's results have been
//! applied classifies against a stale cache. Each engine instance is fully
//! independent, so a host can keep one per open document.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cache::{Artifact, CacheEntry, CacheStore};
use crate::detect;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::schedule::{self, ExecutionPlan};
use crate::script::{self, SourceRange};

/// Snapshot of one feature after analysis.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeatureSummary {
    pub name: String,
    /// Features this one reads, in declaration order.
    pub dependencies: Vec<String>,
    /// Features that read this one, in declaration order.
    pub dependents: Vec<String>,
    pub code_hash: u64,
    pub input_hash: u64,
    pub source_range: SourceRange,
    pub dirty: bool,
    pub execution_order: usize,
}

/// Result of one analysis cycle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
    /// Every analyzed feature, keyed by name.
    pub nodes: FxHashMap<String, FeatureSummary>,
    /// All feature names, dependencies before dependents (declaration order
    /// under the cycle fallback).
    pub execution_order: Vec<String>,
    /// Features that must re-execute, in execution order.
    pub dirty_features: Vec<String>,
    /// Features served from cache, in execution order.
    pub clean_features: Vec<String>,
    /// Features the topological sort could not place. Non-empty means the
    /// script has a dependency cycle and the order above is declaration
    /// order; the host should surface this as a warning.
    pub cyclic: Vec<String>,
}

impl AnalysisResult {
    /// Whether the analyzed script contains a dependency cycle.
    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }

    /// Derive the execution plan for this cycle without re-analyzing.
    pub fn execution_plan(&self) -> ExecutionPlan {
        ExecutionPlan::partition(&self.execution_order, |name| {
            self.nodes.get(name).is_some_and(|node| node.dirty)
        })
    }
}

/// Dependency and cache status of a single feature.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeatureInfo {
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub is_dirty: bool,
    pub is_cached: bool,
}

/// Engine counters for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EngineStats {
    /// Features in the current graph.
    pub total_features: usize,
    /// Current features that have a cache entry.
    pub cached_features: usize,
    /// Current features marked dirty.
    pub dirty_features: usize,
    /// Total artifact size across the whole store, including entries for
    /// features no longer declared.
    pub cache_size_bytes: usize,
}

/// Incremental dependency-analysis engine, generic over the artifact type.
pub struct Engine<A> {
    graph: DependencyGraph,
    cache: CacheStore<A>,
}

impl<A: Artifact> Engine<A> {
    /// Create an engine with an empty graph and cache.
    pub fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
            cache: CacheStore::new(),
        }
    }

    /// Analyze script source and classify every feature.
    ///
    /// On success the analyzed graph replaces the previous one. On a parse
    /// error nothing changes: the previous graph and cache stay in effect
    /// so the host keeps a usable model while the user fixes the script.
    pub fn analyze(&mut self, source: &str) -> Result<AnalysisResult> {
        let parsed = script::parse(source)?;
        let mut graph = DependencyGraph::from_script(&parsed);

        let classification = detect::classify(&mut graph, &self.graph, &self.cache);
        let schedule = schedule::schedule(&mut graph);

        let mut nodes: FxHashMap<String, FeatureSummary> = FxHashMap::default();
        for name in graph.declaration_order() {
            let Some(node) = graph.node(name) else {
                continue;
            };
            nodes.insert(
                name.clone(),
                FeatureSummary {
                    name: node.name.clone(),
                    dependencies: graph.dependencies(name),
                    dependents: graph.dependents(name),
                    code_hash: node.code_hash,
                    input_hash: node.input_hash,
                    source_range: node.source_range,
                    dirty: node.dirty,
                    execution_order: node.execution_order,
                },
            );
        }

        let dirty_features: Vec<String> = schedule
            .order
            .iter()
            .filter(|name| classification.dirty.contains(name.as_str()))
            .cloned()
            .collect();
        let clean_features: Vec<String> = schedule
            .order
            .iter()
            .filter(|name| classification.clean.contains(name.as_str()))
            .cloned()
            .collect();

        tracing::debug!(
            features = graph.len(),
            dirty = dirty_features.len(),
            cyclic = schedule.cyclic.len(),
            "analysis complete"
        );

        self.graph = graph;

        Ok(AnalysisResult {
            nodes,
            execution_order: schedule.order,
            dirty_features,
            clean_features,
            cyclic: schedule.cyclic,
        })
    }

    /// Analyze and derive the execution plan in one call.
    ///
    /// Hosts holding a fresh [`AnalysisResult`] can call
    /// [`AnalysisResult::execution_plan`] instead and skip the re-analysis.
    pub fn create_execution_plan(&mut self, source: &str) -> Result<ExecutionPlan> {
        let analysis = self.analyze(source)?;
        Ok(analysis.execution_plan())
    }

    /// Apply executor results.
    ///
    /// Each artifact is stored under the feature's current input hash and
    /// the feature's dirty flag is cleared. Results for names not in the
    /// current graph are ignored; they are stale output from a plan built
    /// against an earlier script revision.
    pub fn update_cache<I>(&mut self, results: I)
    where
        I: IntoIterator<Item = (String, A)>,
    {
        for (name, artifact) in results {
            let Some(input_hash) = self.graph.node(&name).map(|node| node.input_hash) else {
                tracing::debug!(feature = %name, "ignoring result for unknown feature");
                continue;
            };
            self.cache.insert(name.clone(), artifact, input_hash);
            if let Some(node) = self.graph.node_mut(&name) {
                node.dirty = false;
            }
        }
    }

    /// Cached entries for the given features; names without an entry are
    /// simply absent.
    pub fn cached<'a, S>(&'a self, names: &[S]) -> FxHashMap<&'a str, &'a CacheEntry<A>>
    where
        S: AsRef<str>,
    {
        self.cache.get_many(names)
    }

    /// Drop the cached artifact for a feature and everything downstream of
    /// it, marking those features dirty. Returns the invalidated names.
    ///
    /// Safe on cyclic graphs and idempotent. A name that is neither a
    /// current feature nor a cache entry is a no-op returning the empty set.
    pub fn invalidate(&mut self, name: &str) -> FxHashSet<String> {
        let mut invalidated: FxHashSet<String> = FxHashSet::default();

        if self.graph.contains(name) {
            let mut queue: VecDeque<String> = VecDeque::from([name.to_string()]);
            while let Some(current) = queue.pop_front() {
                if !invalidated.insert(current.clone()) {
                    continue;
                }
                self.cache.remove(&current);
                if let Some(node) = self.graph.node_mut(&current) {
                    node.dirty = true;
                }
                for dependent in self.graph.dependents(&current) {
                    queue.push_back(dependent);
                }
            }
        } else if self.cache.remove(name).is_some() {
            // Stale entry left over from an earlier script revision.
            invalidated.insert(name.to_string());
        }

        if !invalidated.is_empty() {
            tracing::debug!(feature = %name, count = invalidated.len(), "invalidated");
        }
        invalidated
    }

    /// Drop every cache entry and mark every feature dirty.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.graph.mark_all_dirty();
        tracing::debug!("cache cleared");
    }

    /// Dependency and cache status for one feature, or `None` if the name
    /// is not in the current graph.
    pub fn feature_info(&self, name: &str) -> Option<FeatureInfo> {
        let node = self.graph.node(name)?;
        Some(FeatureInfo {
            dependencies: self.graph.dependencies(name),
            dependents: self.graph.dependents(name),
            is_dirty: node.dirty,
            is_cached: self.cache.contains(name),
        })
    }

    /// Counters over the current graph and cache.
    pub fn stats(&self) -> EngineStats {
        let mut cached_features = 0;
        let mut dirty_features = 0;
        for name in self.graph.declaration_order() {
            if self.cache.contains(name) {
                cached_features += 1;
            }
            if self.graph.node(name).is_some_and(|node| node.dirty) {
                dirty_features += 1;
            }
        }

        EngineStats {
            total_features: self.graph.len(),
            cached_features,
            dirty_features,
            cache_size_bytes: self.cache.size_bytes(),
        }
    }

    /// The graph from the most recent successful analysis.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

impl<A: Artifact> Default for Engine<A> {
    fn default() -> Self {
        Self::new()
    }
}
