// src/graph/model.rs

//! The logical application graph: operators, the streams between them and
//! adapter streams that cross the application boundary.
//!
//! A [`LogicalGraph`] is immutable once built; see
//! [`LogicalGraphBuilder`](crate::graph::LogicalGraphBuilder).

use std::collections::{BTreeMap, HashMap};

/// Free-form key/value properties attached to operators and streams.
pub type Properties = BTreeMap<String, String>;

/// Index of a logical operator inside its [`LogicalGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorId(pub(crate) usize);

/// Index of a logical stream inside its [`LogicalGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub(crate) usize);

/// A user-authored operator before physical expansion.
#[derive(Debug, Clone)]
pub struct LogicalOperator {
    pub(crate) id: OperatorId,
    pub(crate) name: String,
    pub(crate) class: Option<String>,
    pub(crate) properties: Properties,
    pub(crate) inputs: Vec<StreamId>,
    pub(crate) outputs: Vec<StreamId>,
    pub(crate) min_tuples: Option<u64>,
    pub(crate) max_tuples: Option<u64>,
}

impl LogicalOperator {
    pub fn id(&self) -> OperatorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Implementation class the container instantiates for this operator.
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Input streams, in the order they were attached.
    pub fn inputs(&self) -> &[StreamId] {
        &self.inputs
    }

    /// Output streams, in the order they were attached.
    pub fn outputs(&self) -> &[StreamId] {
        &self.outputs
    }

    /// Lower bound on tuples per heartbeat before a load warning is logged.
    pub fn min_tuples(&self) -> Option<u64> {
        self.min_tuples
    }

    /// Upper bound on tuples per heartbeat before a load warning is logged.
    pub fn max_tuples(&self) -> Option<u64> {
        self.max_tuples
    }
}

/// A directed edge between logical operators.
///
/// A missing source marks an input adapter, a missing target an output
/// adapter. The builder guarantees that at least one endpoint is present and
/// that `inline` is only set when both are.
#[derive(Debug, Clone)]
pub struct LogicalStream {
    pub(crate) id: StreamId,
    pub(crate) name: String,
    pub(crate) source: Option<OperatorId>,
    pub(crate) target: Option<OperatorId>,
    pub(crate) inline: bool,
    pub(crate) class: Option<String>,
    pub(crate) properties: Properties,
}

impl LogicalStream {
    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<OperatorId> {
        self.source
    }

    pub fn target(&self) -> Option<OperatorId> {
        self.target
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// Implementation class of the adapter wrapping a boundary stream.
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn is_input_adapter(&self) -> bool {
        self.source.is_none()
    }

    pub fn is_output_adapter(&self) -> bool {
        self.target.is_none()
    }
}

/// Fully constructed logical topology. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct LogicalGraph {
    pub(crate) operators: Vec<LogicalOperator>,
    pub(crate) streams: Vec<LogicalStream>,
    pub(crate) operator_names: HashMap<String, OperatorId>,
    pub(crate) stream_names: HashMap<String, StreamId>,
}

impl LogicalGraph {
    /// Operators in insertion order.
    pub fn operators(&self) -> impl Iterator<Item = &LogicalOperator> {
        self.operators.iter()
    }

    /// Streams in insertion order.
    pub fn streams(&self) -> impl Iterator<Item = &LogicalStream> {
        self.streams.iter()
    }

    pub fn operator(&self, id: OperatorId) -> &LogicalOperator {
        &self.operators[id.0]
    }

    pub fn stream(&self, id: StreamId) -> &LogicalStream {
        &self.streams[id.0]
    }

    pub fn operator_by_name(&self, name: &str) -> Option<&LogicalOperator> {
        self.operator_names.get(name).map(|id| self.operator(*id))
    }

    pub fn stream_by_name(&self, name: &str) -> Option<&LogicalStream> {
        self.stream_names.get(name).map(|id| self.stream(*id))
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}
