// src/plan/expander.rs

//! Lazy expansion of the logical graph into physical instances and edges.
//!
//! Everything materialized here is memoized for the lifetime of the plan:
//! one instance per (operator, partition) pair, one adapter per boundary
//! stream and one edge list per logical stream.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{PlannerError, Result};
use crate::graph::{LogicalGraph, LogicalStream, OperatorId, StreamId};
use crate::plan::partition::{PartitionKey, PartitionPlan};
use crate::plan::physical::{
    BufferServerAddress, PhysicalId, PhysicalKind, PhysicalOperator, PhysicalStream,
    ADAPTER_IS_INPUT_PROPERTY, ADAPTER_STREAM_CLASS_PROPERTY,
};

/// Physical instances of one logical operator, in partition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalOperators {
    instances: Vec<PhysicalOperator>,
}

impl PhysicalOperators {
    pub fn iter(&self) -> impl Iterator<Item = &PhysicalOperator> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instance bound to `partition` (`None` for the unpartitioned one).
    pub fn get(&self, partition: Option<&PartitionKey>) -> Option<&PhysicalOperator> {
        self.instances
            .iter()
            .find(|op| op.partition.as_ref() == partition)
    }

    /// The only instance, if there is exactly one.
    pub fn single(&self) -> Option<&PhysicalOperator> {
        match self.instances.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Memoizing physical plan over a logical graph.
#[derive(Debug)]
pub struct PhysicalPlan {
    graph: Arc<LogicalGraph>,
    partitions: PartitionPlan,
    next_id: u32,
    operators: HashMap<OperatorId, PhysicalOperators>,
    adapters: HashMap<StreamId, PhysicalOperator>,
    streams: HashMap<StreamId, Vec<PhysicalStream>>,
    /// Every materialized instance by id, adapters included.
    owners: HashMap<PhysicalId, InstanceOwner>,
    output_adapters: HashSet<PhysicalId>,
}

#[derive(Debug, Clone, Copy)]
enum InstanceOwner {
    Operator(OperatorId),
    Adapter(StreamId),
}

impl PhysicalPlan {
    pub fn new(graph: Arc<LogicalGraph>, partitions: PartitionPlan) -> Self {
        Self {
            graph,
            partitions,
            next_id: 0,
            operators: HashMap::new(),
            adapters: HashMap::new(),
            streams: HashMap::new(),
            owners: HashMap::new(),
            output_adapters: HashSet::new(),
        }
    }

    pub fn graph(&self) -> &LogicalGraph {
        &self.graph
    }

    pub fn partitions(&self) -> &PartitionPlan {
        &self.partitions
    }

    /// Partition key → instance mapping for `operator`, materialized on
    /// first use.
    pub fn physical_operators(&mut self, operator: OperatorId) -> Result<&PhysicalOperators> {
        if !self.operators.contains_key(&operator) {
            let instances = self.materialize_operator(operator)?;
            self.operators.insert(operator, instances);
        }
        Ok(&self.operators[&operator])
    }

    /// Physical edges of `stream`, materialized on first use.
    ///
    /// The buffer server of the first caller is kept for the stream's
    /// lifetime.
    pub fn physical_streams(
        &mut self,
        stream: StreamId,
        buffer_server: &BufferServerAddress,
    ) -> Result<&[PhysicalStream]> {
        if !self.streams.contains_key(&stream) {
            let edges = self.materialize_stream(stream, buffer_server)?;
            self.streams.insert(stream, edges);
        }
        Ok(&self.streams[&stream])
    }

    /// Adapter wrapping a boundary stream, if it was created already.
    pub fn adapter(&self, stream: StreamId) -> Option<&PhysicalOperator> {
        self.adapters.get(&stream)
    }

    /// Look up any materialized instance.
    pub fn operator(&self, id: PhysicalId) -> Option<&PhysicalOperator> {
        match self.owners.get(&id)? {
            InstanceOwner::Operator(op) => self.operators.get(op)?.iter().find(|p| p.id == id),
            InstanceOwner::Adapter(stream) => self.adapters.get(stream),
        }
    }

    pub fn is_output_adapter(&self, id: PhysicalId) -> bool {
        self.output_adapters.contains(&id)
    }

    /// Flag the memoized edge `source -> target` of `stream` as inline.
    ///
    /// Returns the updated edge, or `None` if no such edge exists.
    pub fn mark_inline(
        &mut self,
        stream: StreamId,
        source: PhysicalId,
        target: PhysicalId,
    ) -> Option<&PhysicalStream> {
        let edge = self
            .streams
            .get_mut(&stream)?
            .iter_mut()
            .find(|e| e.source == source && e.target == target)?;
        if !edge.inline {
            debug!(stream = %edge.name, %source, %target, "co-located adapter; stream made inline");
            edge.inline = true;
        }
        Some(&*edge)
    }

    fn next_id(&mut self) -> PhysicalId {
        self.next_id += 1;
        PhysicalId::new(self.next_id)
    }

    fn materialize_operator(&mut self, operator: OperatorId) -> Result<PhysicalOperators> {
        let graph = Arc::clone(&self.graph);
        let logical = graph.operator(operator);
        let class = logical
            .class()
            .ok_or_else(|| PlannerError::MissingClass {
                kind: "operator",
                id: logical.name().to_string(),
            })?
            .to_string();

        let keys: Vec<Option<PartitionKey>> = match self.partitions.partitions_of(operator) {
            Some(keys) => keys.iter().cloned().map(Some).collect(),
            None => vec![None],
        };

        let mut instances = Vec::with_capacity(keys.len());
        for partition in keys {
            let id = self.next_id();
            self.owners.insert(id, InstanceOwner::Operator(operator));
            instances.push(PhysicalOperator {
                id,
                logical_name: logical.name().to_string(),
                kind: PhysicalKind::Operator {
                    logical: operator,
                    class: class.clone(),
                },
                properties: logical.properties().clone(),
                partition,
            });
        }

        debug!(operator = %logical.name(), instances = instances.len(), "materialized physical operators");
        Ok(PhysicalOperators { instances })
    }

    fn adapter_for(&mut self, stream: &LogicalStream) -> Result<PhysicalId> {
        if let Some(adapter) = self.adapters.get(&stream.id()) {
            return Ok(adapter.id);
        }

        let stream_class = stream
            .class()
            .ok_or_else(|| PlannerError::MissingClass {
                kind: "stream",
                id: stream.name().to_string(),
            })?
            .to_string();
        let is_input = stream.is_input_adapter();

        let mut properties = stream.properties().clone();
        properties.insert(ADAPTER_STREAM_CLASS_PROPERTY.to_string(), stream_class.clone());
        properties.insert(ADAPTER_IS_INPUT_PROPERTY.to_string(), is_input.to_string());

        let kind = if is_input {
            PhysicalKind::InputAdapter {
                stream: stream.id(),
                stream_class,
            }
        } else {
            PhysicalKind::OutputAdapter {
                stream: stream.id(),
                stream_class,
            }
        };

        let id = self.next_id();
        if !is_input {
            self.output_adapters.insert(id);
        }
        self.owners.insert(id, InstanceOwner::Adapter(stream.id()));
        self.adapters.insert(
            stream.id(),
            PhysicalOperator {
                id,
                logical_name: stream.name().to_string(),
                kind,
                properties,
                partition: None,
            },
        );
        debug!(stream = %stream.name(), adapter = %id, is_input, "created adapter");
        Ok(id)
    }

    fn materialize_stream(
        &mut self,
        stream_id: StreamId,
        buffer_server: &BufferServerAddress,
    ) -> Result<Vec<PhysicalStream>> {
        let graph = Arc::clone(&self.graph);
        let stream = graph.stream(stream_id);

        let edge = |source: PhysicalId,
                    target: PhysicalId,
                    inline: bool,
                    channel_type: Option<String>,
                    partition_filter: Option<PartitionKey>| PhysicalStream {
            stream: stream_id,
            name: stream.name().to_string(),
            source,
            target,
            inline,
            buffer_server: buffer_server.clone(),
            channel_type,
            partition_filter,
            properties: stream.properties().clone(),
        };

        let mut edges = Vec::new();
        match (stream.source(), stream.target()) {
            (Some(source), Some(target)) => {
                self.physical_operators(source)?;
                self.physical_operators(target)?;
                let publishers = &self.operators[&source];
                let subscribers = &self.operators[&target];
                // Channel type is the upstream operator so that several
                // logical downstream operators can share it.
                let channel = graph.operator(source).name().to_string();
                for publisher in publishers.iter() {
                    for subscriber in subscribers.iter() {
                        edges.push(edge(
                            publisher.id,
                            subscriber.id,
                            stream.is_inline(),
                            Some(channel.clone()),
                            subscriber.partition.clone(),
                        ));
                    }
                }
            }
            (None, Some(target)) => {
                let adapter = self.adapter_for(stream)?;
                let subscribers = self.physical_operators(target)?;
                if let Some(only) = subscribers.single() {
                    edges.push(edge(adapter, only.id, true, None, None));
                } else {
                    for subscriber in subscribers.iter() {
                        edges.push(edge(
                            adapter,
                            subscriber.id,
                            false,
                            Some(stream.name().to_string()),
                            subscriber.partition.clone(),
                        ));
                    }
                }
            }
            (Some(source), None) => {
                let adapter = self.adapter_for(stream)?;
                let publishers = self.physical_operators(source)?;
                if let Some(only) = publishers.single() {
                    edges.push(edge(only.id, adapter, true, None, None));
                } else {
                    for publisher in publishers.iter() {
                        edges.push(edge(
                            publisher.id,
                            adapter,
                            false,
                            Some(stream.name().to_string()),
                            None,
                        ));
                    }
                }
            }
            (None, None) => {
                return Err(PlannerError::InvariantViolation(format!(
                    "stream '{}' has neither source nor target",
                    stream.name()
                )));
            }
        }

        debug!(stream = %stream.name(), edges = edges.len(), "materialized physical streams");
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LogicalGraphBuilder, OperatorSpec, StreamSpec};
    use crate::plan::partition::{PropertyPartitionResolver, PARTITION_KEYS_PROPERTY};

    fn addr() -> BufferServerAddress {
        BufferServerAddress::new("localhost", 9000)
    }

    fn plan_for(b: LogicalGraphBuilder) -> PhysicalPlan {
        let graph = Arc::new(b.build());
        let partitions = PartitionPlan::from_graph(&graph, &PropertyPartitionResolver);
        PhysicalPlan::new(graph, partitions)
    }

    fn stream_id(plan: &PhysicalPlan, name: &str) -> StreamId {
        plan.graph().stream_by_name(name).unwrap().id()
    }

    fn op_id(plan: &PhysicalPlan, name: &str) -> OperatorId {
        plan.graph().operator_by_name(name).unwrap().id()
    }

    #[test]
    fn operators_are_materialized_once() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("a.Impl")).unwrap();
        let mut plan = plan_for(b);
        let a = op_id(&plan, "A");

        let first = plan.physical_operators(a).unwrap().clone();
        let second = plan.physical_operators(a).unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first.single().unwrap().partition, None);
    }

    #[test]
    fn missing_operator_class_is_fatal() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A")).unwrap();
        let mut plan = plan_for(b);
        let a = op_id(&plan, "A");

        assert!(matches!(
            plan.physical_operators(a),
            Err(PlannerError::MissingClass { kind: "operator", ref id }) if id == "A"
        ));
    }

    #[test]
    fn partitioned_source_and_target_produce_cross_product() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("in").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(
            StreamSpec::new("to_a")
                .source("in")
                .target("A")
                .property(PARTITION_KEYS_PROPERTY, "a1,a2"),
        )
        .unwrap();
        b.add_stream(
            StreamSpec::new("ab")
                .source("A")
                .target("B")
                .property(PARTITION_KEYS_PROPERTY, "b1,b2,b3"),
        )
        .unwrap();
        let mut plan = plan_for(b);
        let ab = stream_id(&plan, "ab");

        let edges = plan.physical_streams(ab, &addr()).unwrap().to_vec();

        assert_eq!(edges.len(), 6);
        assert!(edges.iter().all(|e| e.channel_type.as_deref() == Some("A")));
        assert!(edges.iter().all(|e| e.partition_filter.is_some()));
        let sources: HashSet<_> = edges.iter().map(|e| e.source).collect();
        let targets: HashSet<_> = edges.iter().map(|e| e.target).collect();
        assert_eq!((sources.len(), targets.len()), (2, 3));
    }

    #[test]
    fn input_adapter_to_single_subscriber_is_inline() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_stream(StreamSpec::new("in").target("A").class("io.Reader"))
            .unwrap();
        let mut plan = plan_for(b);
        let input = stream_id(&plan, "in");

        let edges = plan.physical_streams(input, &addr()).unwrap().to_vec();
        let adapter = plan.adapter(input).unwrap().clone();

        assert_eq!(edges.len(), 1);
        assert!(edges[0].inline);
        assert_eq!(edges[0].source, adapter.id);
        assert!(matches!(adapter.kind, PhysicalKind::InputAdapter { ref stream_class, .. } if stream_class == "io.Reader"));
        assert_eq!(adapter.properties[ADAPTER_IS_INPUT_PROPERTY], "true");
        assert!(!plan.is_output_adapter(adapter.id));
    }

    #[test]
    fn output_adapter_from_partitioned_source_fans_in() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_stream(
            StreamSpec::new("in")
                .target("A")
                .class("io.Reader")
                .property(PARTITION_KEYS_PROPERTY, "p1,p2"),
        )
        .unwrap();
        b.add_stream(StreamSpec::new("out").source("A").class("io.Writer"))
            .unwrap();
        let mut plan = plan_for(b);
        let out = stream_id(&plan, "out");
        let input = stream_id(&plan, "in");

        let out_edges = plan.physical_streams(out, &addr()).unwrap().to_vec();
        let in_edges = plan.physical_streams(input, &addr()).unwrap().to_vec();
        let writer = plan.adapter(out).unwrap().id;

        assert_eq!(out_edges.len(), 2);
        assert!(out_edges.iter().all(|e| !e.inline && e.target == writer));
        assert!(out_edges.iter().all(|e| e.partition_filter.is_none()));
        assert!(out_edges.iter().all(|e| e.channel_type.as_deref() == Some("out")));
        assert!(plan.is_output_adapter(writer));

        assert_eq!(in_edges.len(), 2);
        assert!(in_edges.iter().all(|e| !e.inline && e.partition_filter.is_some()));
    }

    #[test]
    fn boundary_stream_without_class_is_fatal() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_stream(StreamSpec::new("out").source("A")).unwrap();
        let mut plan = plan_for(b);
        let out = stream_id(&plan, "out");

        assert!(matches!(
            plan.physical_streams(out, &addr()),
            Err(PlannerError::MissingClass { kind: "stream", .. })
        ));
    }

    #[test]
    fn first_buffer_server_wins_and_edges_are_stable() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(StreamSpec::new("ab").source("A").target("B"))
            .unwrap();
        let mut plan = plan_for(b);
        let ab = stream_id(&plan, "ab");

        let first = plan.physical_streams(ab, &addr()).unwrap().to_vec();
        let other = BufferServerAddress::new("elsewhere", 1);
        let second = plan.physical_streams(ab, &other).unwrap().to_vec();

        assert_eq!(first, second);
        assert_eq!(second[0].buffer_server, addr());
    }

    #[test]
    fn mark_inline_updates_the_memoized_edge() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(StreamSpec::new("ab").source("A").target("B"))
            .unwrap();
        let mut plan = plan_for(b);
        let ab = stream_id(&plan, "ab");
        let edge = plan.physical_streams(ab, &addr()).unwrap()[0].clone();

        assert!(plan.mark_inline(ab, edge.source, edge.target).unwrap().inline);
        assert!(plan.physical_streams(ab, &addr()).unwrap()[0].inline);
        assert!(plan.mark_inline(ab, edge.target, edge.source).is_none());
        assert_eq!(plan.operator(edge.source).unwrap().logical_name, "A");
    }
}
