// src/heartbeat/mod.rs

//! Heartbeat processing and application idleness.
//!
//! An instance is quiescent when its last report was `Idle` or when it is an
//! output adapter. A container may shut down once all its reported instances
//! and every other tracked instance are quiescent.

pub mod model;
pub mod tracker;

pub use model::{
    ContainerHeartbeat, HeartbeatResponse, InstanceHeartbeat, InstanceRequest, InstanceState,
    NodeStatusSnapshot, ThroughputBounds,
};
pub use tracker::HeartbeatTracker;
