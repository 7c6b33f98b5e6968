// src/manager.rs

//! The deployment manager: one shared planner per application.
//!
//! Wires the grouper, the physical plan, the container assigner and the
//! heartbeat tracker together behind the operations containers call. It is
//! `Send + Sync` and meant to be shared through an `Arc`:
//!
//! - assignment state and the physical plan caches live behind one mutex, so
//!   every assignment is a single critical section;
//! - heartbeats go through the tracker's own locks and never wait on an
//!   assignment in progress;
//! - finished assignments are kept under a separate read-write lock for
//!   re-query.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::errors::{PlannerError, Result};
use crate::graph::{LogicalGraph, OperatorId, StreamId};
use crate::heartbeat::{
    ContainerHeartbeat, HeartbeatResponse, HeartbeatTracker, NodeStatusSnapshot, ThroughputBounds,
};
use crate::plan::{
    BufferServerAddress, ContainerAssigner, ContainerAssignment, ContainerId, DeploymentGroup,
    GroupId, GroupState, Grouper, PartitionPlan, PartitionResolver, PhysicalId, PhysicalOperator,
    PhysicalOperators, PhysicalPlan, PhysicalStream, Window, DEFAULT_WINDOW_SIZE_MILLIS,
};

/// Tunables of a [`DeploymentManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    pub window_size_millis: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            window_size_millis: DEFAULT_WINDOW_SIZE_MILLIS,
        }
    }
}

#[derive(Debug)]
struct Planning {
    assigner: ContainerAssigner,
    plan: PhysicalPlan,
}

#[derive(Debug)]
pub struct DeploymentManager {
    graph: Arc<LogicalGraph>,
    planning: Mutex<Planning>,
    tracker: HeartbeatTracker,
    assignments: RwLock<HashMap<ContainerId, Arc<ContainerAssignment>>>,
    window: Window,
}

impl DeploymentManager {
    /// Plan `graph`, aligning the window start to the current time.
    pub fn new(
        graph: impl Into<Arc<LogicalGraph>>,
        resolver: &dyn PartitionResolver,
        config: PlannerConfig,
    ) -> Self {
        let now_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self::with_start_time(graph, resolver, config, now_millis)
    }

    /// Like [`DeploymentManager::new`] with an explicit epoch time in millis.
    pub fn with_start_time(
        graph: impl Into<Arc<LogicalGraph>>,
        resolver: &dyn PartitionResolver,
        config: PlannerConfig,
        now_millis: u64,
    ) -> Self {
        let graph = graph.into();
        let partitions = PartitionPlan::from_graph(&graph, resolver);
        let plan = PhysicalPlan::new(Arc::clone(&graph), partitions);
        let groups = Grouper::from_graph(&graph).groups();
        debug!(
            operators = graph.operator_count(),
            streams = graph.stream_count(),
            groups = groups.len(),
            "planned deployment groups"
        );
        let assigner = ContainerAssigner::new(Arc::clone(&graph), groups, &plan);
        let window = Window::aligned(config.window_size_millis, now_millis);

        Self {
            graph,
            planning: Mutex::new(Planning { assigner, plan }),
            tracker: HeartbeatTracker::new(),
            assignments: RwLock::new(HashMap::new()),
            window,
        }
    }

    pub fn graph(&self) -> &LogicalGraph {
        &self.graph
    }

    pub fn window(&self) -> Window {
        self.window
    }

    fn planning(&self) -> MutexGuard<'_, Planning> {
        self.planning.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Containers still needed to deploy everything that is pending.
    pub fn required_container_count(&self) -> usize {
        self.planning().assigner.required_container_count()
    }

    pub fn groups(&self) -> Vec<DeploymentGroup> {
        self.planning().assigner.groups().to_vec()
    }

    pub fn group_state(&self, group: GroupId) -> Option<GroupState> {
        self.planning().assigner.group_state(group)
    }

    /// Hand the next deployable group to a newly registered container.
    ///
    /// A container that already received an assignment gets the stored one
    /// back.
    pub fn assign_container(
        &self,
        container_id: impl Into<ContainerId>,
        buffer_server: &BufferServerAddress,
    ) -> Result<Arc<ContainerAssignment>> {
        let container_id = container_id.into();
        let mut planning = self.planning();

        if let Some(existing) = self.stored_assignment(&container_id) {
            debug!(container = %container_id, "container already assigned; returning stored assignment");
            return Ok(existing);
        }

        let Planning { assigner, plan } = &mut *planning;
        let placement = assigner.assign(plan, buffer_server)?;

        for op in &placement.operators {
            let bounds = op
                .logical_operator()
                .map(|id| {
                    let logical = self.graph.operator(id);
                    ThroughputBounds {
                        min_tuples: logical.min_tuples(),
                        max_tuples: logical.max_tuples(),
                    }
                })
                .unwrap_or_default();
            self.tracker.register(op, bounds);
        }

        let assignment = Arc::new(ContainerAssignment::new(
            container_id.clone(),
            placement,
            self.window,
        ));
        info!(
            container = %container_id,
            %buffer_server,
            operators = ?assignment.operators.iter().map(|op| op.logical_name.as_str()).collect::<Vec<_>>(),
            streams = assignment.streams.len(),
            remaining = assigner.required_container_count(),
            "assigned container"
        );

        self.assignments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(container_id, Arc::clone(&assignment));
        Ok(assignment)
    }

    fn stored_assignment(&self, container_id: &str) -> Option<Arc<ContainerAssignment>> {
        self.assignments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(container_id)
            .cloned()
    }

    /// Re-query the assignment handed to `container_id`.
    pub fn assignment(&self, container_id: &str) -> Result<Arc<ContainerAssignment>> {
        self.stored_assignment(container_id)
            .ok_or_else(|| PlannerError::UnknownContainer(container_id.to_string()))
    }

    /// Ids of every container that received an assignment.
    pub fn assigned_containers(&self) -> Vec<ContainerId> {
        let mut ids: Vec<_> = self
            .assignments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn process_heartbeat(&self, heartbeat: &ContainerHeartbeat) -> HeartbeatResponse {
        self.tracker.process_heartbeat(heartbeat)
    }

    pub fn is_application_idle(&self) -> bool {
        self.tracker.is_application_idle()
    }

    /// Tracked state of a deployed instance.
    pub fn node_status(&self, id: PhysicalId) -> Option<NodeStatusSnapshot> {
        self.tracker.snapshot(id)
    }

    pub fn physical_operators(&self, operator: OperatorId) -> Result<PhysicalOperators> {
        self.planning().plan.physical_operators(operator).cloned()
    }

    pub fn physical_streams(
        &self,
        stream: StreamId,
        buffer_server: &BufferServerAddress,
    ) -> Result<Vec<PhysicalStream>> {
        self.planning()
            .plan
            .physical_streams(stream, buffer_server)
            .map(<[PhysicalStream]>::to_vec)
    }

    /// Any instance materialized so far, adapters included.
    pub fn physical_operator(&self, id: PhysicalId) -> Option<PhysicalOperator> {
        self.planning().plan.operator(id).cloned()
    }
}
