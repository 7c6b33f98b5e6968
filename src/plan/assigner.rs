// src/plan/assigner.rs

//! Container assignment: the scheduling state machine over deployment
//! groups.
//!
//! Group lifecycle: `Pending` → (`PartiallyAssigned`, partitioned groups
//! only) → `Assigned`. A call to [`ContainerAssigner::assign`] validates the
//! whole binding for the selected group and resolves its streams before
//! committing anything, so a failed call leaves the scheduling state as it
//! was.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{PlannerError, Result};
use crate::graph::{LogicalGraph, OperatorId, StreamId};
use crate::plan::assignment::Placement;
use crate::plan::expander::PhysicalPlan;
use crate::plan::grouper::{DeploymentGroup, GroupId};
use crate::plan::partition::PartitionKey;
use crate::plan::physical::{BufferServerAddress, PhysicalId, PhysicalOperator, PhysicalStream};

/// Public view of a group's deployment progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    /// Some, but not all, partitions were handed out.
    PartiallyAssigned,
    Assigned,
}

/// Edges of one container, deduplicated by (source instance, stream).
///
/// A later put replaces the earlier value in place.
#[derive(Debug, Default)]
struct StreamSet {
    edges: Vec<PhysicalStream>,
    index: HashMap<(PhysicalId, StreamId), usize>,
}

impl StreamSet {
    fn put(&mut self, edge: PhysicalStream) {
        let key = (edge.source, edge.stream);
        match self.index.get(&key) {
            Some(&pos) => self.edges[pos] = edge,
            None => {
                self.index.insert(key, self.edges.len());
                self.edges.push(edge);
            }
        }
    }
}

/// Assigns deployment groups, one container at a time.
#[derive(Debug)]
pub struct ContainerAssigner {
    graph: Arc<LogicalGraph>,
    groups: Vec<DeploymentGroup>,
    group_of: HashMap<OperatorId, GroupId>,
    /// Groups not yet fully assigned, in creation order.
    pending: Vec<GroupId>,
    /// Partition keys not yet handed out, per partitioned operator.
    remaining: HashMap<OperatorId, VecDeque<PartitionKey>>,
    partition_totals: HashMap<OperatorId, usize>,
    /// Instances bound to some container.
    bound: HashSet<PhysicalId>,
}

impl ContainerAssigner {
    pub fn new(graph: Arc<LogicalGraph>, groups: Vec<DeploymentGroup>, plan: &PhysicalPlan) -> Self {
        let mut group_of = HashMap::new();
        let mut remaining = HashMap::new();
        let mut partition_totals = HashMap::new();
        for group in &groups {
            for op in group.members() {
                group_of.insert(*op, group.id());
                if let Some(keys) = plan.partitions().partitions_of(*op) {
                    remaining.insert(*op, keys.iter().cloned().collect::<VecDeque<_>>());
                    partition_totals.insert(*op, keys.len());
                }
            }
        }
        let pending = groups.iter().map(DeploymentGroup::id).collect();

        Self {
            graph,
            groups,
            group_of,
            pending,
            remaining,
            partition_totals,
            bound: HashSet::new(),
        }
    }

    pub fn groups(&self) -> &[DeploymentGroup] {
        &self.groups
    }

    pub fn group_state(&self, group: GroupId) -> Option<GroupState> {
        let grp = self.groups.get(group)?;
        if !self.pending.contains(&group) {
            return Some(GroupState::Assigned);
        }
        let started = grp.members().iter().any(|op| {
            match (self.remaining.get(op), self.partition_totals.get(op)) {
                (Some(left), Some(total)) => left.len() < *total,
                _ => false,
            }
        });
        Some(if started {
            GroupState::PartiallyAssigned
        } else {
            GroupState::Pending
        })
    }

    /// Containers still needed: one per pending unpartitioned group, one per
    /// outstanding partition for partitioned groups.
    pub fn required_container_count(&self) -> usize {
        self.pending
            .iter()
            .map(|gid| {
                self.groups[*gid]
                    .members()
                    .iter()
                    .filter_map(|op| self.remaining.get(op).map(VecDeque::len))
                    .max()
                    .unwrap_or(1)
            })
            .sum()
    }

    /// Pick the next group: the first pending one whose non-inline upstream
    /// groups are all assigned, else the first pending one.
    fn find_deployable_group(&self) -> Option<GroupId> {
        for gid in &self.pending {
            let group = &self.groups[*gid];
            let blocked_by = group.members().iter().find_map(|op| {
                self.graph.operator(*op).inputs().iter().find_map(|sid| {
                    let stream = self.graph.stream(*sid);
                    let source = stream.source()?;
                    if stream.is_inline() {
                        return None;
                    }
                    let source_group = self.group_of.get(&source)?;
                    (source_group != gid && self.pending.contains(source_group))
                        .then_some(source)
                })
            });

            match blocked_by {
                None => return Some(*gid),
                Some(source) => debug!(
                    group = ?group.names(&self.graph),
                    dependency = %self.graph.operator(source).name(),
                    "skipping group; input dependency not deployed yet"
                ),
            }
        }
        self.pending.first().copied()
    }

    /// Choose instances and edges for a new container.
    pub fn assign(
        &mut self,
        plan: &mut PhysicalPlan,
        buffer_server: &BufferServerAddress,
    ) -> Result<Placement> {
        if self.pending.is_empty() {
            return Err(PlannerError::NoWork);
        }
        let gid = self.find_deployable_group().ok_or_else(|| {
            PlannerError::NoDeployableGroup {
                pending: self
                    .pending
                    .iter()
                    .map(|g| self.groups[*g].names(&self.graph))
                    .collect(),
            }
        })?;
        let group = self.groups[gid].clone();

        let partitioned: Vec<OperatorId> = group
            .members()
            .iter()
            .copied()
            .filter(|op| self.remaining.contains_key(op))
            .collect();
        if partitioned.len() > 1 {
            return Err(PlannerError::MultiplePartitionedOperators {
                group: group.names(&self.graph),
            });
        }

        let bound = self.bind_group(plan, &group)?;
        let (operators, streams, demoted) = self.resolve_streams(plan, bound, buffer_server)?;

        // Everything validated; commit.
        for op in &partitioned {
            if let Some(keys) = self.remaining.get_mut(op) {
                keys.pop_front();
            }
        }
        let fully_assigned = partitioned
            .iter()
            .all(|op| self.remaining.get(op).is_none_or(VecDeque::is_empty));
        if fully_assigned {
            self.pending.retain(|g| *g != gid);
            info!(group = ?group.names(&self.graph), "deployment group fully assigned");
        } else {
            debug!(group = ?group.names(&self.graph), "deployment group partially assigned");
        }

        self.bound.extend(operators.iter().map(|op| op.id));
        for (stream, source, target) in demoted {
            plan.mark_inline(stream, source, target);
        }

        Ok(Placement { operators, streams })
    }

    /// Instances of the group's operators for this round: the next partition
    /// of the partitioned operator, the single instance of every other one
    /// unless an earlier partition round already bound it.
    fn bind_group(
        &self,
        plan: &mut PhysicalPlan,
        group: &DeploymentGroup,
    ) -> Result<Vec<PhysicalOperator>> {
        let mut bound = Vec::with_capacity(group.members().len());

        for op in group.members() {
            let name = self.graph.operator(*op).name();
            let instances = plan.physical_operators(*op)?;

            if let Some(keys) = self.remaining.get(op) {
                let key = keys.front().ok_or_else(|| {
                    PlannerError::InvariantViolation(format!(
                        "operator '{name}' is pending but has no partitions left"
                    ))
                })?;
                let instance = instances.get(Some(key)).ok_or_else(|| {
                    PlannerError::InvariantViolation(format!(
                        "operator '{name}' has no instance for partition key {key}"
                    ))
                })?;
                debug!(operator = %name, partition = %key, instance = %instance.id, "binding partition");
                bound.push(instance.clone());
            } else {
                let instance = instances.single().ok_or_else(|| {
                    PlannerError::InvariantViolation(format!(
                        "there should be a single instance for unpartitioned operator '{name}', found {}",
                        instances.len()
                    ))
                })?;
                if self.bound.contains(&instance.id) {
                    debug!(operator = %name, instance = %instance.id, "instance already deployed by an earlier partition round");
                } else {
                    bound.push(instance.clone());
                }
            }
        }

        Ok(bound)
    }

    /// Resolve the edges of every bound instance and pull in adapters that
    /// were not deployed yet.
    ///
    /// Returns the container's instances, its edges and the edges that must
    /// become inline in the shared plan.
    #[allow(clippy::type_complexity)]
    fn resolve_streams(
        &self,
        plan: &mut PhysicalPlan,
        bound: Vec<PhysicalOperator>,
        buffer_server: &BufferServerAddress,
    ) -> Result<(
        Vec<PhysicalOperator>,
        Vec<PhysicalStream>,
        Vec<(StreamId, PhysicalId, PhysicalId)>,
    )> {
        let mut operators = bound.clone();
        let mut in_container: HashSet<PhysicalId> = bound.iter().map(|op| op.id).collect();
        let mut streams = StreamSet::default();
        let mut demoted = Vec::new();

        for instance in &bound {
            let Some(op) = instance.logical_operator() else {
                continue;
            };
            let logical = self.graph.operator(op);

            for sid in logical.inputs() {
                let stream = self.graph.stream(*sid);
                let edges = plan.physical_streams(*sid, buffer_server)?.to_vec();
                for edge in edges.iter().filter(|e| e.target == instance.id) {
                    streams.put(edge.clone());
                    if stream.is_input_adapter()
                        && !self.bound.contains(&edge.source)
                        && in_container.insert(edge.source)
                    {
                        // Input adapter: deploy with its first subscriber.
                        let adapter = self.adapter(plan, *sid)?;
                        debug!(stream = %stream.name(), adapter = %adapter.id, "co-locating input adapter");
                        operators.push(adapter);
                    }
                }
            }

            for sid in logical.outputs() {
                let stream = self.graph.stream(*sid);
                let edges = plan.physical_streams(*sid, buffer_server)?.to_vec();
                for edge in edges.iter().filter(|e| e.source == instance.id) {
                    streams.put(edge.clone());
                    if stream.is_output_adapter()
                        && !self.bound.contains(&edge.target)
                        && in_container.insert(edge.target)
                    {
                        // Output adapter: deploy with its first publisher and
                        // subscribe it to every partition.
                        let adapter = self.adapter(plan, *sid)?;
                        debug!(stream = %stream.name(), adapter = %adapter.id, "co-locating output adapter");
                        operators.push(adapter);
                        for other in &edges {
                            let mut other = other.clone();
                            if in_container.contains(&other.source) && !other.inline {
                                other.inline = true;
                                demoted.push((other.stream, other.source, other.target));
                            }
                            streams.put(other);
                        }
                    }
                }
            }
        }

        // Inline only holds when both endpoints share this container.
        let mut edges = streams.edges;
        for edge in edges.iter_mut().filter(|e| e.inline) {
            if !(in_container.contains(&edge.source) && in_container.contains(&edge.target)) {
                debug!(stream = %edge.name, source = %edge.source, target = %edge.target, "endpoints in different containers; stream kept remote");
                edge.inline = false;
            }
        }

        Ok((operators, edges, demoted))
    }

    fn adapter(&self, plan: &PhysicalPlan, stream: StreamId) -> Result<PhysicalOperator> {
        plan.adapter(stream).cloned().ok_or_else(|| {
            PlannerError::InvariantViolation(format!(
                "adapter for stream '{}' referenced before creation",
                self.graph.stream(stream).name()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LogicalGraphBuilder, OperatorSpec, StreamSpec};
    use crate::plan::grouper::Grouper;
    use crate::plan::partition::{PartitionPlan, PropertyPartitionResolver, PARTITION_KEYS_PROPERTY};

    fn setup(b: LogicalGraphBuilder) -> (ContainerAssigner, PhysicalPlan) {
        let graph = Arc::new(b.build());
        let partitions = PartitionPlan::from_graph(&graph, &PropertyPartitionResolver);
        let plan = PhysicalPlan::new(Arc::clone(&graph), partitions);
        let groups = Grouper::from_graph(&graph).groups();
        (ContainerAssigner::new(graph, groups, &plan), plan)
    }

    fn addr(port: u16) -> BufferServerAddress {
        BufferServerAddress::new("localhost", port)
    }

    fn names(placement: &Placement) -> Vec<String> {
        placement
            .operators
            .iter()
            .map(|op| op.logical_name.clone())
            .collect()
    }

    #[test]
    fn upstream_group_is_preferred_over_creation_order() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("sink").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("source").class("Impl")).unwrap();
        b.add_stream(StreamSpec::new("s").source("source").target("sink"))
            .unwrap();
        let (mut assigner, mut plan) = setup(b);

        let first = assigner.assign(&mut plan, &addr(1)).unwrap();
        let second = assigner.assign(&mut plan, &addr(2)).unwrap();

        assert_eq!(names(&first), vec!["source"]);
        assert_eq!(names(&second), vec!["sink"]);
        assert!(matches!(
            assigner.assign(&mut plan, &addr(3)),
            Err(PlannerError::NoWork)
        ));
    }

    #[test]
    fn dependency_cycle_falls_back_to_first_pending_group() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(StreamSpec::new("ab").source("A").target("B"))
            .unwrap();
        b.add_stream(StreamSpec::new("ba").source("B").target("A"))
            .unwrap();
        let (mut assigner, mut plan) = setup(b);

        // A's input is visited first, so B's group was created first.
        let first = assigner.assign(&mut plan, &addr(1)).unwrap();
        assert_eq!(names(&first), vec!["B"]);
    }

    #[test]
    fn partitioned_group_moves_through_partial_state() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(
            StreamSpec::new("in")
                .target("B")
                .class("io.Reader")
                .property(PARTITION_KEYS_PROPERTY, "k1,k2"),
        )
        .unwrap();
        let (mut assigner, mut plan) = setup(b);

        assert_eq!(assigner.group_state(0), Some(GroupState::Pending));
        assert_eq!(assigner.required_container_count(), 2);

        let first = assigner.assign(&mut plan, &addr(1)).unwrap();
        assert_eq!(assigner.group_state(0), Some(GroupState::PartiallyAssigned));
        assert_eq!(assigner.required_container_count(), 1);
        // The reader adapter travels with the first partition.
        assert_eq!(names(&first), vec!["B", "in"]);
        assert_eq!(first.operators[0].partition, Some(PartitionKey::from("k1")));

        let second = assigner.assign(&mut plan, &addr(2)).unwrap();
        assert_eq!(assigner.group_state(0), Some(GroupState::Assigned));
        assert_eq!(assigner.required_container_count(), 0);
        assert_eq!(names(&second), vec!["B"]);
        assert_eq!(second.operators[0].partition, Some(PartitionKey::from("k2")));
        assert_eq!(second.streams.len(), 1);
        assert!(!second.streams[0].inline);
    }

    #[test]
    fn two_partitioned_operators_in_one_group_are_rejected_without_mutation() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(
            StreamSpec::new("in")
                .target("A")
                .class("io.Reader")
                .property(PARTITION_KEYS_PROPERTY, "a1,a2"),
        )
        .unwrap();
        b.add_stream(
            StreamSpec::new("ab")
                .source("A")
                .target("B")
                .inline(true)
                .property(PARTITION_KEYS_PROPERTY, "b1,b2"),
        )
        .unwrap();
        let (mut assigner, mut plan) = setup(b);
        let before = assigner.required_container_count();

        let err = assigner.assign(&mut plan, &addr(1)).unwrap_err();

        assert!(matches!(err, PlannerError::MultiplePartitionedOperators { .. }));
        assert_eq!(assigner.required_container_count(), before);
        assert_eq!(assigner.group_state(0), Some(GroupState::Pending));
    }

    #[test]
    fn output_adapter_is_deployed_once_and_made_inline_with_its_publisher() {
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
        let (mut assigner, mut plan) = setup(b);

        let first = assigner.assign(&mut plan, &addr(1)).unwrap();
        let second = assigner.assign(&mut plan, &addr(2)).unwrap();

        let writer = plan
            .adapter(plan.graph().stream_by_name("out").unwrap().id())
            .unwrap()
            .id;
        assert!(first.operators.iter().any(|op| op.id == writer));
        assert!(!second.operators.iter().any(|op| op.id == writer));

        let out_edges: Vec<_> = first.streams.iter().filter(|e| e.name == "out").collect();
        assert_eq!(out_edges.len(), 2);
        let local = first.operators[0].id;
        for edge in out_edges {
            assert_eq!(edge.inline, edge.source == local);
        }
        // The second partition still publishes through the buffer server.
        let remote: Vec<_> = second.streams.iter().filter(|e| e.name == "out").collect();
        assert_eq!(remote.len(), 1);
        assert!(!remote[0].inline);
    }

    #[test]
    fn inline_edge_to_a_later_partition_is_delivered_as_remote() {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(
            StreamSpec::new("ab")
                .source("A")
                .target("B")
                .inline(true)
                .property(PARTITION_KEYS_PROPERTY, "k1,k2"),
        )
        .unwrap();
        let (mut assigner, mut plan) = setup(b);

        let first = assigner.assign(&mut plan, &addr(1)).unwrap();
        let second = assigner.assign(&mut plan, &addr(2)).unwrap();

        assert_eq!(names(&first), vec!["A", "B"]);
        let a = first.operators[0].id;
        assert_eq!(first.streams.len(), 1);
        assert_eq!(first.streams[0].target, first.operators[1].id);
        assert!(first.streams[0].inline);

        // A stays in the first container; B(k2) reads from it remotely.
        assert_eq!(names(&second), vec!["B"]);
        assert_eq!(second.streams.len(), 1);
        assert_eq!(second.streams[0].source, a);
        assert_eq!(second.streams[0].target, second.operators[0].id);
        assert!(!second.streams[0].inline);
    }
}
