//! Topological scheduling of feature execution.
//!
//! Produces a single linear order in which one executor runs features, with
//! every dependency placed before its dependents. Kahn's algorithm, with
//! ties broken by declaration position so the order is stable across runs.
//!
//! A cyclic graph does not fail scheduling: the order falls back to plain
//! declaration order and the unsortable features are reported so the host
//! can warn the user. Incremental reuse is not guaranteed inside a cycle.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::graph::DependencyGraph;

/// Result of topologically sorting a graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Schedule {
    /// Every feature name, dependencies before dependents. Falls back to
    /// declaration order when the graph has a cycle.
    pub order: Vec<String>,
    /// Features the sort could not place: members of cycles and everything
    /// downstream of them, in declaration order. Empty for a DAG.
    pub cyclic: Vec<String>,
}

impl Schedule {
    /// Whether the graph contained a cycle.
    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Ordered partition of a schedule for one analysis cycle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionPlan {
    /// Dirty features in execution order. The executor must respect this
    /// order: dependencies run before dependents.
    pub to_execute: Vec<String>,
    /// Clean features whose cached artifact can be served as-is. Order is
    /// informational.
    pub to_reuse: Vec<String>,
}

impl ExecutionPlan {
    /// Split an ordered feature list into execute/reuse halves.
    pub(crate) fn partition<F>(order: &[String], mut is_dirty: F) -> Self
    where
        F: FnMut(&str) -> bool,
    {
        let mut to_execute = Vec::new();
        let mut to_reuse = Vec::new();

        for name in order {
            if is_dirty(name) {
                to_execute.push(name.clone());
            } else {
                to_reuse.push(name.clone());
            }
        }

        Self {
            to_execute,
            to_reuse,
        }
    }

    /// Whether nothing needs to execute.
    pub fn is_fully_cached(&self) -> bool {
        self.to_execute.is_empty()
    }
}

/// Topologically sort `graph` and stamp each node's `execution_order`.
pub fn schedule(graph: &mut DependencyGraph) -> Schedule {
    let names = graph.declaration_order().to_vec();

    let mut in_degree: FxHashMap<String, usize> = names
        .iter()
        .map(|name| (name.clone(), graph.dependency_count(name)))
        .collect();

    let mut queue: VecDeque<String> = names
        .iter()
        .filter(|name| in_degree.get(name.as_str()).copied() == Some(0))
        .cloned()
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(names.len());
    while let Some(name) = queue.pop_front() {
        // Dependents come back in declaration order, so equal-depth nodes
        // keep their source ordering.
        for dependent in graph.dependents(&name) {
            if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
        order.push(name);
    }

    let schedule = if order.len() < names.len() {
        let cyclic: Vec<String> = names
            .iter()
            .filter(|name| !order.contains(name))
            .cloned()
            .collect();
        tracing::warn!(
            features = ?cyclic,
            "dependency cycle detected, falling back to declaration order"
        );
        Schedule {
            order: names.clone(),
            cyclic,
        }
    } else {
        Schedule {
            order,
            cyclic: Vec::new(),
        }
    };

    for (position, name) in schedule.order.iter().enumerate() {
        if let Some(node) = graph.node_mut(name) {
            node.execution_order = position;
        }
    }

    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn build(source: &str) -> DependencyGraph {
        DependencyGraph::from_script(&parse(source).unwrap())
    }

    #[test]
    fn test_linear_chain() {
        let mut graph = build("a = s()\nb = f(a)\nc = f(b)");
        let schedule = schedule(&mut graph);
        assert_eq!(schedule.order, vec!["a", "b", "c"]);
        assert!(!schedule.has_cycle());
    }

    #[test]
    fn test_reversed_declaration_order_still_sorts() {
        let mut graph = build("c = f(b)\nb = f(a)\na = s()");
        let schedule = schedule(&mut graph);
        assert_eq!(schedule.order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_ties_break_by_declaration() {
        let mut graph = build("a = s()\nb = f(a)\nc = g(a)\nd = h(b, c)");
        let schedule = schedule(&mut graph);
        assert_eq!(schedule.order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_independent_features_keep_declaration_order() {
        let mut graph = build("x = s()\na = s()\nm = s()");
        let schedule = schedule(&mut graph);
        assert_eq!(schedule.order, vec!["x", "a", "m"]);
    }

    #[test]
    fn test_execution_order_stamped_on_nodes() {
        let mut graph = build("b = f(a)\na = s()");
        schedule(&mut graph);
        assert_eq!(graph.node("a").unwrap().execution_order, 0);
        assert_eq!(graph.node("b").unwrap().execution_order, 1);
    }

    #[test]
    fn test_cycle_falls_back_to_declaration_order() {
        let mut graph = build("a = wrap(b)\nb = wrap(a)\nc = s()");
        let schedule = schedule(&mut graph);
        assert_eq!(schedule.order, vec!["a", "b", "c"]);
        assert_eq!(schedule.cyclic, vec!["a", "b"]);
        assert!(schedule.has_cycle());
    }

    #[test]
    fn test_cycle_downstream_is_reported() {
        let mut graph = build("a = wrap(b)\nb = wrap(a)\nd = f(b)");
        let schedule = schedule(&mut graph);
        // `d` is not itself cyclic but can never be freed by the sort.
        assert_eq!(schedule.cyclic, vec!["a", "b", "d"]);
        assert_eq!(schedule.order, vec!["a", "b", "d"]);
    }

    #[test]
    fn test_plan_partition() {
        let order = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let plan = ExecutionPlan::partition(&order, |name| name == "b");
        assert_eq!(plan.to_execute, vec!["b"]);
        assert_eq!(plan.to_reuse, vec!["a", "c"]);
        assert!(!plan.is_fully_cached());
    }
}
