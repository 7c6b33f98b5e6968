// src/transport/mod.rs

//! Delivery of planner decisions to containers.
//!
//! - [`backend`] provides the `ContainerBackend` trait the runtime talks to
//!   and a channel-backed implementation.
//! - [`local`] simulates containers in-process for the `streamplan` binary.

pub mod backend;
pub mod local;

pub use backend::{ChannelBackend, ContainerBackend, ContainerMessage};
pub use local::{spawn_local_containers, LocalContainerOptions};
