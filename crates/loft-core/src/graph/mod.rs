//! Dependency graph over feature declarations.
//!
//! This module provides:
//! - Graph construction from a parsed script (one node per declaration)
//! - Reference resolution between declarations
//! - Dependency and dependent lookups backed by a directed graph
//!
//! Edges run from producer to consumer: if `b = move(a, 1, 0, 0)` then the
//! graph holds `a -> b`.

mod types;

pub use types::{DependencyGraph, FeatureNode};
