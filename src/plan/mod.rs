// src/plan/mod.rs

//! Deployment planning.
//!
//! - [`grouper`] clusters inline-connected operators into deployment groups.
//! - [`partition`] decides which partition keys each operator expands to.
//! - [`physical`] defines physical instances and edges.
//! - [`expander`] materializes them lazily and memoizes the result.
//! - [`assigner`] hands groups out to containers in dependency order.
//! - [`assignment`] holds the descriptors sent to containers.

pub mod assigner;
pub mod assignment;
pub mod expander;
pub mod grouper;
pub mod partition;
pub mod physical;

pub use assigner::{ContainerAssigner, GroupState};
pub use assignment::{ContainerAssignment, ContainerId, Placement, Window, DEFAULT_WINDOW_SIZE_MILLIS};
pub use expander::{PhysicalOperators, PhysicalPlan};
pub use grouper::{DeploymentGroup, GroupId, Grouper};
pub use partition::{
    PartitionKey, PartitionPlan, PartitionResolver, Partitioning, PropertyPartitionResolver,
    PARTITION_KEYS_PROPERTY,
};
pub use physical::{BufferServerAddress, PhysicalId, PhysicalKind, PhysicalOperator, PhysicalStream};
