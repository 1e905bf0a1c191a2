//! Types for the dependency graph.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::script::{Decl, Script, SourceRange};

/// Hash of a piece of canonical source text.
///
/// `DefaultHasher` with default keys is stable across runs, which keeps
/// hashes reproducible for identical input.
pub(crate) fn text_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Per-feature metadata tracked by the graph.
///
/// A node's identity is its declaration name; the graph is rebuilt wholesale
/// on every analysis pass, so nodes are compared across passes by name and
/// hash, never by pointer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeatureNode {
    /// Declaration name, unique within one analysis pass.
    pub name: String,
    /// Hash of the canonical initializer text.
    pub code_hash: u64,
    /// Hash of this node's code plus the code of everything it depends on.
    /// Zero until change detection runs.
    pub input_hash: u64,
    /// Line span of the declaration in the original script.
    pub source_range: SourceRange,
    /// Whether this feature must be re-executed in the current plan.
    pub dirty: bool,
    /// Position in the execution order. Assigned by scheduling.
    pub execution_order: usize,
}

/// The feature dependency graph for one analysis pass.
pub struct DependencyGraph {
    /// Directed graph, edges from producer to consumer.
    graph: DiGraph<String, ()>,
    /// Feature name to graph index.
    indices: FxHashMap<String, NodeIndex>,
    /// Feature metadata by name.
    nodes: FxHashMap<String, FeatureNode>,
    /// Names in declaration order.
    order: Vec<String>,
    /// Name to declaration position.
    positions: FxHashMap<String, usize>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            indices: FxHashMap::default(),
            nodes: FxHashMap::default(),
            order: Vec::new(),
            positions: FxHashMap::default(),
        }
    }

    /// Build the graph for a parsed script.
    ///
    /// First pass collects one node per declaration; when a name is declared
    /// more than once the later declaration wins. Second pass resolves each
    /// initializer's references against the declared names: references to
    /// anything else (library calls, undeclared names) contribute no edge,
    /// and self-references are ignored. The resulting dependents relation is
    /// the exact transpose of dependencies, with no dangling edges.
    pub fn from_script(script: &Script) -> Self {
        let mut graph = Self::new();

        let decls = dedup_decls(script);
        for decl in &decls {
            graph.add_feature(FeatureNode {
                name: decl.name.clone(),
                code_hash: text_hash(&decl.init.to_string()),
                input_hash: 0,
                source_range: decl.range,
                dirty: false,
                execution_order: 0,
            });
        }

        for decl in &decls {
            let mut refs = FxHashSet::default();
            decl.init.collect_refs(&mut refs);

            let mut refs: Vec<String> = refs.into_iter().collect();
            refs.sort_unstable();

            for referenced in refs {
                if referenced != decl.name && graph.contains(&referenced) {
                    graph.add_dependency(&referenced, &decl.name);
                }
            }
        }

        graph
    }

    fn add_feature(&mut self, node: FeatureNode) {
        let name = node.name.clone();
        let idx = self.graph.add_node(name.clone());
        self.indices.insert(name.clone(), idx);
        self.positions.insert(name.clone(), self.order.len());
        self.order.push(name.clone());
        self.nodes.insert(name, node);
    }

    /// Add an edge `producer -> consumer`. Both ends must already be nodes.
    fn add_dependency(&mut self, producer: &str, consumer: &str) {
        if let (Some(&from), Some(&to)) = (self.indices.get(producer), self.indices.get(consumer)) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no features.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a feature with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Get a feature's metadata.
    pub fn node(&self, name: &str) -> Option<&FeatureNode> {
        self.nodes.get(name)
    }

    pub(crate) fn node_mut(&mut self, name: &str) -> Option<&mut FeatureNode> {
        self.nodes.get_mut(name)
    }

    /// Flag every feature for re-execution.
    pub(crate) fn mark_all_dirty(&mut self) {
        for node in self.nodes.values_mut() {
            node.dirty = true;
        }
    }

    /// Feature names in declaration order.
    pub fn declaration_order(&self) -> &[String] {
        &self.order
    }

    /// Declaration position of a feature.
    pub fn declaration_position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Direct dependencies of a feature, in declaration order.
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Direct dependents of a feature, in declaration order.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Number of direct dependencies.
    pub fn dependency_count(&self, name: &str) -> usize {
        self.indices
            .get(name)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
            })
            .unwrap_or(0)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };

        let mut neighbors: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        neighbors.sort_by_key(|n| self.positions.get(n).copied());
        neighbors
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve duplicate declarations, keeping the later one in place.
fn dedup_decls(script: &Script) -> Vec<&Decl> {
    let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
    let mut slots: Vec<Option<&Decl>> = Vec::with_capacity(script.decls.len());

    for decl in &script.decls {
        if let Some(&slot) = seen.get(decl.name.as_str()) {
            tracing::warn!(
                feature = %decl.name,
                "duplicate declaration, keeping the later one"
            );
            slots[slot] = None;
        }
        seen.insert(decl.name.as_str(), slots.len());
        slots.push(Some(decl));
    }

    slots.into_iter().flatten().collect()
}
