//! Core engine for the Loft parametric modeling environment.
//!
//! Loft scripts are flat sequences of named, geometry-producing feature
//! declarations. Re-running a whole script on every keystroke is expensive,
//! so this crate re-executes incrementally: it analyzes the declarations,
//! builds the dependency graph between them, detects what actually changed
//! via content hashing, and produces an execution plan that reuses cached
//! artifacts for everything unaffected.
//!
//! This crate provides:
//! - Script parsing (lexer, recursive descent parser, typed expression tree)
//! - Dependency graph construction and reference resolution
//! - Change detection with transitive dirtiness propagation
//! - Topological scheduling with a stable, declaration-biased order
//! - An artifact cache with targeted and full invalidation
//!
//! Geometry itself is computed elsewhere: the embedding application hands
//! [`ExecutionPlan::to_execute`] to its compute backend and feeds results
//! back through [`Engine::update_cache`].

pub mod cache;
pub mod detect;
pub mod engine;
pub mod error;
pub mod graph;
pub mod schedule;
pub mod script;

pub use cache::{Artifact, CacheEntry, CacheStore};
pub use detect::Classification;
pub use engine::{AnalysisResult, Engine, EngineStats, FeatureInfo, FeatureSummary};
pub use error::{Error, ParseError, Result};
pub use graph::{DependencyGraph, FeatureNode};
pub use schedule::{ExecutionPlan, Schedule};
pub use script::{BinaryOp, Decl, Expr, Script, SourceRange};
