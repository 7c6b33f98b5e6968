// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::errors::PlannerError;
use crate::heartbeat::{ContainerHeartbeat, HeartbeatResponse};
use crate::manager::DeploymentManager;
use crate::plan::{BufferServerAddress, ContainerAssignment, ContainerId};

use super::RuntimeOptions;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send the assignment to its container.
    Deploy(Arc<ContainerAssignment>),
    /// Answer a heartbeat.
    Respond {
        container_id: ContainerId,
        response: HeartbeatResponse,
    },
    /// Give a container back; there is nothing for it to run.
    Release {
        container_id: ContainerId,
        reason: String,
    },
    /// Request that the process exits.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Assign work to a newly registered container.
///
/// Failures are not fatal to the runtime: the container is released with the
/// error as reason.
pub fn handle_container_registered(
    manager: &DeploymentManager,
    container_id: ContainerId,
    buffer_server: BufferServerAddress,
) -> CoreStep {
    let command = match manager.assign_container(container_id.clone(), &buffer_server) {
        Ok(assignment) => CoreCommand::Deploy(assignment),
        Err(PlannerError::NoWork) => {
            info!(container = %container_id, "no work left; releasing container");
            CoreCommand::Release {
                container_id,
                reason: PlannerError::NoWork.to_string(),
            }
        }
        Err(err) => {
            error!(container = %container_id, error = %err, "container assignment failed");
            CoreCommand::Release {
                container_id,
                reason: err.to_string(),
            }
        }
    };

    CoreStep::running(vec![command])
}

/// Record a heartbeat and answer it.
///
/// `shut_down` collects containers that were told to shut down; with
/// `exit_when_idle` the core exits once it covers every assigned container.
pub fn handle_heartbeat(
    manager: &DeploymentManager,
    shut_down: &mut HashSet<ContainerId>,
    options: &RuntimeOptions,
    heartbeat: ContainerHeartbeat,
) -> CoreStep {
    if manager.assignment(&heartbeat.container_id).is_err() {
        warn!(container = %heartbeat.container_id, "heartbeat from container without assignment");
    }

    let response = manager.process_heartbeat(&heartbeat);
    if response.shutdown {
        shut_down.insert(heartbeat.container_id.clone());
    }

    let mut commands = vec![CoreCommand::Respond {
        container_id: heartbeat.container_id,
        response,
    }];

    let mut keep_running = true;
    if options.exit_when_idle && deployment_finished(manager, shut_down) {
        info!("all containers told to shut down; application finished");
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}

fn deployment_finished(manager: &DeploymentManager, shut_down: &HashSet<ContainerId>) -> bool {
    if manager.required_container_count() > 0 {
        return false;
    }
    manager
        .assigned_containers()
        .iter()
        .all(|id| shut_down.contains(id))
}
