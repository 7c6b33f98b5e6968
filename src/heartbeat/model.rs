// src/heartbeat/model.rs

//! Heartbeat reports, responses and per-instance status.

use crate::plan::{ContainerId, PhysicalId};

/// Lifecycle state an instance reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Starting,
    Active,
    /// Nothing left to process; the instance may be shut down.
    Idle,
}

/// One instance's report inside a container heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHeartbeat {
    pub node_id: PhysicalId,
    pub state: InstanceState,
    /// Tuples processed since the previous heartbeat.
    pub tuples_processed: u64,
    /// Bytes processed since the previous heartbeat.
    pub bytes_processed: u64,
}

impl InstanceHeartbeat {
    pub fn new(node_id: PhysicalId, state: InstanceState) -> Self {
        Self {
            node_id,
            state,
            tuples_processed: 0,
            bytes_processed: 0,
        }
    }

    pub fn with_counts(mut self, tuples: u64, bytes: u64) -> Self {
        self.tuples_processed = tuples;
        self.bytes_processed = bytes;
        self
    }
}

/// Periodic report from a container about all its instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeartbeat {
    pub container_id: ContainerId,
    pub instances: Vec<InstanceHeartbeat>,
}

/// Per-instance directive piggybacked on a heartbeat response.
///
/// Nothing issues requests yet; the list in [`HeartbeatResponse`] is always
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceRequest {}

/// Directive sent back to a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub shutdown: bool,
    pub requests: Vec<InstanceRequest>,
}

/// Per-heartbeat tuple count limits of an operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThroughputBounds {
    pub min_tuples: Option<u64>,
    pub max_tuples: Option<u64>,
}

/// Live state of one deployed instance.
#[derive(Debug, Clone)]
pub(crate) struct NodeStatus {
    pub(crate) logical_name: String,
    pub(crate) last_heartbeat: Option<InstanceHeartbeat>,
    pub(crate) tuples_total: u64,
    pub(crate) bytes_total: u64,
    pub(crate) output_adapter: bool,
    pub(crate) bounds: ThroughputBounds,
}

impl NodeStatus {
    pub(crate) fn new(logical_name: String, output_adapter: bool, bounds: ThroughputBounds) -> Self {
        Self {
            logical_name,
            last_heartbeat: None,
            tuples_total: 0,
            bytes_total: 0,
            output_adapter,
            bounds,
        }
    }

    /// Idle or an output adapter.
    pub(crate) fn is_quiescent(&self) -> bool {
        self.output_adapter
            || self
                .last_heartbeat
                .as_ref()
                .is_some_and(|hb| hb.state == InstanceState::Idle)
    }

    pub(crate) fn snapshot(&self) -> NodeStatusSnapshot {
        NodeStatusSnapshot {
            logical_name: self.logical_name.clone(),
            last_state: self.last_heartbeat.as_ref().map(|hb| hb.state),
            tuples_total: self.tuples_total,
            bytes_total: self.bytes_total,
            output_adapter: self.output_adapter,
            quiescent: self.is_quiescent(),
        }
    }
}

/// Read-only copy of an instance's tracked state, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatusSnapshot {
    pub logical_name: String,
    /// `None` until the first heartbeat arrives.
    pub last_state: Option<InstanceState>,
    pub tuples_total: u64,
    pub bytes_total: u64,
    pub output_adapter: bool,
    pub quiescent: bool,
}
