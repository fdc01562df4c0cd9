//! # qopt-core: Cascades Query Optimizer Core
//!
//! This crate implements the core data structures and algorithms for a Cascades-style
//! cost-based query optimizer targeting a distributed analytical engine.
//!
//! ## Module Overview
//!
//! - **`types`**: The scalar type system shared by constants and column references.
//! - **`scalar`**: Scalar operator trees (column refs, constants, predicates, calls).
//! - **`operator`**: Logical and physical relational operators plus `OptExpression` trees.
//! - **`utils`**: Algorithms over scalar operator trees -- conjunct decomposition,
//!   balanced compound construction, constant casting, correlation detection.
//! - **`memo`**: The Memo table -- groups of logically-equivalent expressions with
//!   structural-fingerprint deduplication.
//! - **`pattern`**: Declarative operator-shape patterns used to gate rule application.
//! - **`rule`**: The Rule trait, rule type tags, and the RuleRegistry.
//! - **`context`**: Per-request optimizer state (statistics, topology, session, CTEs).
//! - **`statistics`**: Statistics collaborator interface with an in-memory backend.
//! - **`topology`**: Cluster topology collaborator interface and OLAP replica metadata.
//! - **`distribution`**: Distribution specs and distributed-join feasibility checks.
//! - **`properties`**: Required/provided physical property sets.
//! - **`cost`**: Cost model trait and the default CPU/memory/network-weighted model.
//! - **`search`**: The explore/implement/cost search driver.

pub mod context;
pub mod cost;
pub mod distribution;
pub mod error;
pub mod memo;
pub mod operator;
pub mod pattern;
pub mod properties;
pub mod rule;
pub mod scalar;
pub mod search;
pub mod statistics;
pub mod topology;
pub mod types;
pub mod utils;
