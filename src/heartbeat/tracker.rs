// src/heartbeat/tracker.rs

//! Liveness tracking of deployed instances.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use crate::heartbeat::model::{
    ContainerHeartbeat, HeartbeatResponse, InstanceHeartbeat, NodeStatus, NodeStatusSnapshot,
    ThroughputBounds,
};
use crate::plan::{PhysicalId, PhysicalOperator};

/// Status of every deployed instance, keyed by physical id.
///
/// Registration takes the map's write lock; heartbeats only take the read
/// lock plus the entry's own mutex, so containers reporting concurrently do
/// not serialize on each other.
#[derive(Debug, Default)]
pub struct HeartbeatTracker {
    nodes: RwLock<HashMap<PhysicalId, Mutex<NodeStatus>>>,
}

impl HeartbeatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly assigned instance. Re-registering keeps the
    /// existing status.
    pub fn register(&self, operator: &PhysicalOperator, bounds: ThroughputBounds) {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        nodes.entry(operator.id).or_insert_with(|| {
            Mutex::new(NodeStatus::new(
                operator.logical_name.clone(),
                operator.is_output_adapter(),
                bounds,
            ))
        });
    }

    pub fn tracked_count(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn snapshot(&self, id: PhysicalId) -> Option<NodeStatusSnapshot> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let status = nodes
            .get(&id)?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Some(status.snapshot())
    }

    /// Record a container's reports and decide whether it may shut down.
    pub fn process_heartbeat(&self, heartbeat: &ContainerHeartbeat) -> HeartbeatResponse {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut container_idle = true;

        for report in &heartbeat.instances {
            let Some(entry) = nodes.get(&report.node_id) else {
                warn!(
                    node = %report.node_id,
                    container = %heartbeat.container_id,
                    "heartbeat for unknown node"
                );
                continue;
            };
            let mut status = entry.lock().unwrap_or_else(PoisonError::into_inner);

            info!(
                node = %report.node_id,
                logical = %status.logical_name,
                state = ?report.state,
                tuples = report.tuples_processed,
                bytes = report.bytes_processed,
                tuples_total = status.tuples_total,
                bytes_total = status.bytes_total,
                container = %heartbeat.container_id,
                "node heartbeat"
            );

            status.last_heartbeat = Some(report.clone());
            if !status.is_quiescent() {
                container_idle = false;
                status.tuples_total += report.tuples_processed;
                status.bytes_total += report.bytes_processed;
                check_node_load(&status, report);
            }
        }

        let shutdown = container_idle && all_quiescent(&nodes);
        if shutdown {
            info!(container = %heartbeat.container_id, "requesting shutdown for container");
        }

        HeartbeatResponse {
            shutdown,
            requests: Vec::new(),
        }
    }

    /// True when every tracked instance is idle or an output adapter.
    ///
    /// Vacuously true before anything was registered.
    pub fn is_application_idle(&self) -> bool {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        all_quiescent(&nodes)
    }
}

fn all_quiescent(nodes: &HashMap<PhysicalId, Mutex<NodeStatus>>) -> bool {
    nodes.values().all(|entry| {
        entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_quiescent()
    })
}

fn check_node_load(status: &NodeStatus, report: &InstanceHeartbeat) {
    let ThroughputBounds {
        min_tuples,
        max_tuples,
    } = status.bounds;
    let tuples = report.tuples_processed;

    if let Some(min) = min_tuples.filter(|min| tuples < *min) {
        warn!(node = %report.node_id, logical = %status.logical_name, tuples, min, "node processed fewer tuples than configured minimum");
    }
    if let Some(max) = max_tuples.filter(|max| tuples > *max) {
        warn!(node = %report.node_id, logical = %status.logical_name, tuples, max, "node processed more tuples than configured maximum");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{OperatorId, StreamId};
    use crate::heartbeat::model::{InstanceHeartbeat, InstanceState};
    use crate::plan::PhysicalKind;

    fn operator(id: u32) -> PhysicalOperator {
        PhysicalOperator {
            id: PhysicalId::new(id),
            logical_name: format!("op{id}"),
            kind: PhysicalKind::Operator {
                logical: OperatorId(0),
                class: "Impl".into(),
            },
            properties: Default::default(),
            partition: None,
        }
    }

    fn writer(id: u32) -> PhysicalOperator {
        PhysicalOperator {
            id: PhysicalId::new(id),
            logical_name: "out".into(),
            kind: PhysicalKind::OutputAdapter {
                stream: StreamId(0),
                stream_class: "io.Writer".into(),
            },
            properties: Default::default(),
            partition: None,
        }
    }

    fn heartbeat(container: &str, reports: Vec<InstanceHeartbeat>) -> ContainerHeartbeat {
        ContainerHeartbeat {
            container_id: container.into(),
            instances: reports,
        }
    }

    #[test]
    fn idle_container_waits_for_rest_of_application() {
        let tracker = HeartbeatTracker::new();
        tracker.register(&operator(1), ThroughputBounds::default());
        tracker.register(&operator(2), ThroughputBounds::default());

        let idle = InstanceHeartbeat::new(PhysicalId::new(1), InstanceState::Idle);
        let rsp = tracker.process_heartbeat(&heartbeat("c1", vec![idle.clone()]));
        assert!(!rsp.shutdown);
        assert!(rsp.requests.is_empty());

        let other = InstanceHeartbeat::new(PhysicalId::new(2), InstanceState::Idle);
        assert!(tracker.process_heartbeat(&heartbeat("c2", vec![other])).shutdown);
        assert!(tracker.process_heartbeat(&heartbeat("c1", vec![idle])).shutdown);
    }

    #[test]
    fn counters_only_grow_for_active_instances() {
        let tracker = HeartbeatTracker::new();
        tracker.register(&operator(1), ThroughputBounds::default());
        let id = PhysicalId::new(1);

        tracker.process_heartbeat(&heartbeat(
            "c1",
            vec![InstanceHeartbeat::new(id, InstanceState::Active).with_counts(10, 100)],
        ));
        tracker.process_heartbeat(&heartbeat(
            "c1",
            vec![InstanceHeartbeat::new(id, InstanceState::Idle).with_counts(5, 50)],
        ));

        let snap = tracker.snapshot(id).unwrap();
        assert_eq!((snap.tuples_total, snap.bytes_total), (10, 100));
        assert_eq!(snap.last_state, Some(InstanceState::Idle));
        assert!(snap.quiescent);
    }

    #[test]
    fn output_adapters_are_always_quiescent() {
        let tracker = HeartbeatTracker::new();
        tracker.register(&writer(7), ThroughputBounds::default());

        assert!(tracker.is_application_idle());
        let rsp = tracker.process_heartbeat(&heartbeat(
            "c1",
            vec![InstanceHeartbeat::new(PhysicalId::new(7), InstanceState::Active).with_counts(3, 3)],
        ));
        assert!(rsp.shutdown);
        assert_eq!(tracker.snapshot(PhysicalId::new(7)).unwrap().tuples_total, 0);
    }

    #[test]
    fn unknown_nodes_are_skipped() {
        let tracker = HeartbeatTracker::new();
        tracker.register(&operator(1), ThroughputBounds::default());

        let rsp = tracker.process_heartbeat(&heartbeat(
            "c1",
            vec![InstanceHeartbeat::new(PhysicalId::new(99), InstanceState::Active)],
        ));

        // The unknown report does not make the container busy, but the
        // registered instance has not reported yet.
        assert!(!rsp.shutdown);
        assert_eq!(tracker.tracked_count(), 1);
        assert!(tracker.snapshot(PhysicalId::new(99)).is_none());
    }

    #[test]
    fn re_registration_keeps_existing_status() {
        let tracker = HeartbeatTracker::new();
        let op = operator(1);
        tracker.register(&op, ThroughputBounds::default());
        tracker.process_heartbeat(&heartbeat(
            "c1",
            vec![InstanceHeartbeat::new(op.id, InstanceState::Active).with_counts(4, 8)],
        ));

        tracker.register(&op, ThroughputBounds::default());

        assert_eq!(tracker.snapshot(op.id).unwrap().tuples_total, 4);
    }
}
