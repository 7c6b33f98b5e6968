// src/graph/builder.rs

//! Programmatic construction of a [`LogicalGraph`].

use tracing::error;

use crate::errors::{PlannerError, Result};
use crate::graph::model::{
    LogicalGraph, LogicalOperator, LogicalStream, OperatorId, Properties, StreamId,
};

/// Description of an operator to add to a graph.
#[derive(Debug, Clone, Default)]
pub struct OperatorSpec {
    pub name: String,
    pub class: Option<String>,
    pub properties: Properties,
    pub min_tuples: Option<u64>,
    pub max_tuples: Option<u64>,
}

impl OperatorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn min_tuples(mut self, min: u64) -> Self {
        self.min_tuples = Some(min);
        self
    }

    pub fn max_tuples(mut self, max: u64) -> Self {
        self.max_tuples = Some(max);
        self
    }
}

/// Description of a stream to add to a graph. Endpoints refer to operators
/// by name and must already have been added.
#[derive(Debug, Clone, Default)]
pub struct StreamSpec {
    pub name: String,
    pub source: Option<String>,
    pub target: Option<String>,
    pub inline: bool,
    pub class: Option<String>,
    pub properties: Properties,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn source(mut self, operator: impl Into<String>) -> Self {
        self.source = Some(operator.into());
        self
    }

    pub fn target(mut self, operator: impl Into<String>) -> Self {
        self.target = Some(operator.into());
        self
    }

    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Incrementally builds a [`LogicalGraph`], wiring stream ids into the
/// input/output lists of their endpoint operators.
#[derive(Debug, Default)]
pub struct LogicalGraphBuilder {
    graph: LogicalGraph,
}

impl LogicalGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_operator(&mut self, spec: OperatorSpec) -> Result<OperatorId> {
        if self.graph.operator_names.contains_key(&spec.name) {
            return Err(PlannerError::Graph(format!(
                "duplicate operator '{}'",
                spec.name
            )));
        }

        let id = OperatorId(self.graph.operators.len());
        self.graph.operator_names.insert(spec.name.clone(), id);
        self.graph.operators.push(LogicalOperator {
            id,
            name: spec.name,
            class: spec.class,
            properties: spec.properties,
            inputs: Vec::new(),
            outputs: Vec::new(),
            min_tuples: spec.min_tuples,
            max_tuples: spec.max_tuples,
        });
        Ok(id)
    }

    pub fn add_stream(&mut self, spec: StreamSpec) -> Result<StreamId> {
        if self.graph.stream_names.contains_key(&spec.name) {
            return Err(PlannerError::Graph(format!(
                "duplicate stream '{}'",
                spec.name
            )));
        }

        let source = spec
            .source
            .as_deref()
            .map(|name| self.resolve(&spec.name, name))
            .transpose()?;
        let target = spec
            .target
            .as_deref()
            .map(|name| self.resolve(&spec.name, name))
            .transpose()?;

        if source.is_none() && target.is_none() {
            return Err(PlannerError::Graph(format!(
                "stream '{}' has neither source nor target",
                spec.name
            )));
        }

        let mut inline = spec.inline;
        if inline && (source.is_none() || target.is_none()) {
            error!(stream = %spec.name, "invalid inline setting on boundary stream; treating as not inline");
            inline = false;
        }

        let id = StreamId(self.graph.streams.len());
        if let Some(src) = source {
            self.graph.operators[src.0].outputs.push(id);
        }
        if let Some(tgt) = target {
            self.graph.operators[tgt.0].inputs.push(id);
        }

        self.graph.stream_names.insert(spec.name.clone(), id);
        self.graph.streams.push(LogicalStream {
            id,
            name: spec.name,
            source,
            target,
            inline,
            class: spec.class,
            properties: spec.properties,
        });
        Ok(id)
    }

    pub fn build(self) -> LogicalGraph {
        self.graph
    }

    fn resolve(&self, stream: &str, operator: &str) -> Result<OperatorId> {
        self.graph
            .operator_names
            .get(operator)
            .copied()
            .ok_or_else(|| {
                PlannerError::Graph(format!(
                    "stream '{}' refers to unknown operator '{}'",
                    stream, operator
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_wired_into_endpoint_operators() {
        let mut b = LogicalGraphBuilder::new();
        let a = b.add_operator(OperatorSpec::new("A").class("a.Impl")).unwrap();
        let c = b.add_operator(OperatorSpec::new("C").class("c.Impl")).unwrap();
        let s = b
            .add_stream(StreamSpec::new("s1").source("A").target("C"))
            .unwrap();
        let graph = b.build();

        assert_eq!(graph.operator(a).outputs(), &[s]);
        assert_eq!(graph.operator(c).inputs(), &[s]);
        assert_eq!(graph.stream(s).source(), Some(a));
        assert_eq!(graph.stream(s).target(), Some(c));
    }

    #[test]
    fn inline_flag_is_dropped_on_boundary_streams() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A")).unwrap();
        let s = b
            .add_stream(StreamSpec::new("in").target("A").inline(true))
            .unwrap();
        let graph = b.build();

        assert!(!graph.stream(s).is_inline());
        assert!(graph.stream(s).is_input_adapter());
    }

    #[test]
    fn rejects_stream_without_endpoints_and_unknown_operators() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A")).unwrap();

        assert!(matches!(
            b.add_stream(StreamSpec::new("void")),
            Err(PlannerError::Graph(_))
        ));
        assert!(matches!(
            b.add_stream(StreamSpec::new("s").source("A").target("Z")),
            Err(PlannerError::Graph(msg)) if msg.contains("'Z'")
        ));
        assert!(matches!(
            b.add_operator(OperatorSpec::new("A")),
            Err(PlannerError::Graph(_))
        ));
    }
}
