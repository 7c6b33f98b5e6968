// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! Consumes [`RuntimeEvent`]s, drives the shared [`DeploymentManager`] and
//! returns the commands the IO shell should carry out. No channels, no Tokio
//! types and no IO, so it can be unit tested directly.

use std::collections::HashSet;
use std::sync::Arc;

use crate::engine::event_handlers::{handle_container_registered, handle_heartbeat, CoreStep};
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::manager::DeploymentManager;
use crate::plan::ContainerId;

#[derive(Debug)]
pub struct CoreRuntime {
    manager: Arc<DeploymentManager>,
    shut_down: HashSet<ContainerId>,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(manager: Arc<DeploymentManager>, options: RuntimeOptions) -> Self {
        Self {
            manager,
            shut_down: HashSet::new(),
            options,
        }
    }

    pub fn manager(&self) -> &DeploymentManager {
        &self.manager
    }

    /// Whether `container_id` was told to shut down (for tests).
    pub fn is_shut_down(&self, container_id: &str) -> bool {
        self.shut_down.contains(container_id)
    }

    /// Handle a single runtime event.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::ContainerRegistered {
                container_id,
                buffer_server,
            } => handle_container_registered(&self.manager, container_id, buffer_server),
            RuntimeEvent::Heartbeat(heartbeat) => {
                handle_heartbeat(&self.manager, &mut self.shut_down, &self.options, heartbeat)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CoreCommand;
    use crate::graph::{LogicalGraphBuilder, OperatorSpec, StreamSpec};
    use crate::heartbeat::{ContainerHeartbeat, InstanceHeartbeat, InstanceState};
    use crate::manager::PlannerConfig;
    use crate::plan::{BufferServerAddress, PropertyPartitionResolver};

    fn core(exit_when_idle: bool) -> CoreRuntime {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(StreamSpec::new("ab").source("A").target("B").inline(true))
            .unwrap();
        let manager = DeploymentManager::new(
            b.build(),
            &PropertyPartitionResolver,
            PlannerConfig::default(),
        );
        CoreRuntime::new(Arc::new(manager), RuntimeOptions { exit_when_idle })
    }

    fn register(id: &str) -> RuntimeEvent {
        RuntimeEvent::ContainerRegistered {
            container_id: id.into(),
            buffer_server: BufferServerAddress::new("localhost", 9000),
        }
    }

    #[test]
    fn registration_deploys_then_releases_surplus_containers() {
        let mut core = core(false);

        let first = core.step(register("c1"));
        assert!(first.keep_running);
        assert!(matches!(&first.commands[..], [CoreCommand::Deploy(a)] if a.operators.len() == 2));

        let second = core.step(register("c2"));
        assert!(matches!(
            &second.commands[..],
            [CoreCommand::Release { container_id, .. }] if container_id == "c2"
        ));
    }

    #[test]
    fn exits_when_idle_once_every_container_is_shut_down() {
        let mut core = core(true);
        let step = core.step(register("c1"));
        let Some(CoreCommand::Deploy(assignment)) = step.commands.first() else {
            panic!("expected a deployment, got {:?}", step.commands);
        };

        let heartbeat = ContainerHeartbeat {
            container_id: "c1".into(),
            instances: assignment
                .operator_ids()
                .map(|id| InstanceHeartbeat::new(id, InstanceState::Idle))
                .collect(),
        };
        let step = core.step(RuntimeEvent::Heartbeat(heartbeat));

        assert!(!step.keep_running);
        assert!(core.is_shut_down("c1"));
        assert!(matches!(
            &step.commands[..],
            [CoreCommand::Respond { response, .. }, CoreCommand::RequestExit] if response.shutdown
        ));
    }

    #[test]
    fn shutdown_request_stops_the_loop() {
        let mut core = core(false);
        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(!step.keep_running);
        assert!(step.commands.is_empty());
    }
}
