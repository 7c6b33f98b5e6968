// src/plan/grouper.rs

//! Clusters logical operators connected by inline streams into deployment
//! groups.

use std::collections::HashMap;

use tracing::debug;

use crate::graph::{LogicalGraph, OperatorId, StreamId};

/// Position of a group in creation order.
pub type GroupId = usize;

/// Operators that must be co-located in one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentGroup {
    id: GroupId,
    members: Vec<OperatorId>,
}

impl DeploymentGroup {
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Member operators in the order they joined the group.
    pub fn members(&self) -> &[OperatorId] {
        &self.members
    }

    pub fn contains(&self, operator: OperatorId) -> bool {
        self.members.contains(&operator)
    }

    /// Member names, for logs and error messages.
    pub fn names(&self, graph: &LogicalGraph) -> Vec<String> {
        self.members
            .iter()
            .map(|id| graph.operator(*id).name().to_string())
            .collect()
    }
}

/// Mutable grouping state.
///
/// Slots are kept in creation order; a slot becomes `None` once its members
/// were merged into an earlier-chosen group.
#[derive(Debug, Default)]
pub struct Grouper {
    slots: Vec<Option<Vec<OperatorId>>>,
    membership: HashMap<OperatorId, usize>,
}

impl Grouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group every operator of `graph`, visiting operators in insertion order
    /// and, per operator, its input streams before its output streams.
    pub fn from_graph(graph: &LogicalGraph) -> Self {
        let mut grouper = Self::new();
        for op in graph.operators() {
            grouper.group(graph, op.inputs());
            grouper.group(graph, op.outputs());
            // Operators without any stream still need a slot of their own.
            grouper.group_operators(&[op.id()]);
        }
        grouper
    }

    /// Register the endpoints of `streams`, merging inline endpoints.
    pub fn group(&mut self, graph: &LogicalGraph, streams: &[StreamId]) {
        for stream_id in streams {
            let stream = graph.stream(*stream_id);
            match (stream.source(), stream.target()) {
                (Some(source), Some(target)) if stream.is_inline() => {
                    self.group_operators(&[source, target]);
                }
                (source, target) => {
                    if let Some(source) = source {
                        self.group_operators(&[source]);
                    }
                    if let Some(target) = target {
                        self.group_operators(&[target]);
                    }
                }
            }
        }
    }

    /// Put `operators` into one group: the first existing group among them,
    /// else a new one.
    fn group_operators(&mut self, operators: &[OperatorId]) {
        let chosen = match operators
            .iter()
            .find_map(|op| self.membership.get(op).copied())
        {
            Some(slot) => slot,
            None => {
                self.slots.push(Some(Vec::new()));
                self.slots.len() - 1
            }
        };

        for op in operators {
            match self.membership.get(op).copied() {
                Some(slot) if slot == chosen => {}
                Some(other) => self.merge(other, chosen),
                None => {
                    self.membership.insert(*op, chosen);
                    if let Some(members) = self.slots[chosen].as_mut() {
                        members.push(*op);
                    }
                }
            }
        }
    }

    fn merge(&mut self, from: usize, into: usize) {
        let moved = self.slots[from].take().unwrap_or_default();
        debug!(from, into, moved = moved.len(), "merging deployment groups");
        for op in &moved {
            self.membership.insert(*op, into);
        }
        if let Some(members) = self.slots[into].as_mut() {
            members.extend(moved);
        }
    }

    /// Finished groups in creation order, ids renumbered densely.
    pub fn groups(&self) -> Vec<DeploymentGroup> {
        self.slots
            .iter()
            .flatten()
            .enumerate()
            .map(|(id, members)| DeploymentGroup {
                id,
                members: members.clone(),
            })
            .collect()
    }
}
