// src/engine/mod.rs

//! Event-driven shell around the [`DeploymentManager`](crate::manager::DeploymentManager).
//!
//! Containers register and heartbeat through [`RuntimeEvent`]s. The pure core
//! state machine lives in [`core`]; the async/IO shell that reads events and
//! talks to containers is implemented in [`runtime`].

use crate::heartbeat::ContainerHeartbeat;
use crate::plan::{BufferServerAddress, ContainerId};

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Exit once nothing is left to deploy and every assigned container has
    /// been told to shut down.
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the container transport.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A container started and asks for work.
    ContainerRegistered {
        container_id: ContainerId,
        buffer_server: BufferServerAddress,
    },
    /// Periodic status report from a container.
    Heartbeat(ContainerHeartbeat),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
