// src/plan/assignment.rs

//! Deployment descriptors handed to containers.

use crate::plan::physical::{PhysicalId, PhysicalOperator, PhysicalStream};

/// Identity of a worker container, as issued by the resource manager.
pub type ContainerId = String;

/// Default streaming window length.
pub const DEFAULT_WINDOW_SIZE_MILLIS: u64 = 500;

/// Global window timing shared by every container of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub size_millis: u64,
    /// Epoch millis of the first window, a multiple of `size_millis`.
    pub start_millis: u64,
}

impl Window {
    /// Align `now_millis` down to the previous window boundary.
    pub fn aligned(size_millis: u64, now_millis: u64) -> Self {
        let size_millis = size_millis.max(1);
        Self {
            size_millis,
            start_millis: now_millis - now_millis % size_millis,
        }
    }
}

/// Instances and edges chosen for one container, before window timing is
/// attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub operators: Vec<PhysicalOperator>,
    pub streams: Vec<PhysicalStream>,
}

/// Everything a container needs to start its share of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAssignment {
    pub container_id: ContainerId,
    pub operators: Vec<PhysicalOperator>,
    pub streams: Vec<PhysicalStream>,
    pub window_size_millis: u64,
    pub window_start_millis: u64,
}

impl ContainerAssignment {
    pub fn new(container_id: ContainerId, placement: Placement, window: Window) -> Self {
        Self {
            container_id,
            operators: placement.operators,
            streams: placement.streams,
            window_size_millis: window.size_millis,
            window_start_millis: window.start_millis,
        }
    }

    pub fn operator_ids(&self) -> impl Iterator<Item = PhysicalId> + '_ {
        self.operators.iter().map(|op| op.id)
    }

    pub fn hosts(&self, id: PhysicalId) -> bool {
        self.operators.iter().any(|op| op.id == id)
    }
}
