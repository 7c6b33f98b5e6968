// src/graph/mod.rs

//! Logical dataflow graph consumed by the planner.
//!
//! - [`model`] holds the immutable operator/stream topology.
//! - [`builder`] constructs it and enforces the structural rules
//!   (known endpoints, at least one endpoint per stream, inline only
//!   between two operators).

pub mod builder;
pub mod model;

pub use builder::{LogicalGraphBuilder, OperatorSpec, StreamSpec};
pub use model::{LogicalGraph, LogicalOperator, LogicalStream, OperatorId, Properties, StreamId};
