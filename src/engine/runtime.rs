// src/engine/runtime.rs

//! Async shell around [`CoreRuntime`](crate::engine::CoreRuntime): reads
//! events from a channel and hands the resulting commands to a
//! [`ContainerBackend`].

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::transport::{ContainerBackend, ContainerMessage};

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Feeds `RuntimeEvent`s to the [`CoreRuntime`] and delivers the resulting
/// commands through a [`ContainerBackend`].
pub struct Runtime<B: ContainerBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
}

impl<B: ContainerBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: ContainerBackend> Runtime<B> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop. Returns when the channel closes or the core asks to
    /// stop.
    pub async fn run(mut self) -> Result<()> {
        info!(
            pending = self.core.manager().required_container_count(),
            "streamplan runtime started"
        );

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        let message = match command {
            CoreCommand::Deploy(assignment) => ContainerMessage::Deploy(assignment),
            CoreCommand::Respond {
                container_id,
                response,
            } => ContainerMessage::HeartbeatResponse {
                container_id,
                response,
            },
            CoreCommand::Release {
                container_id,
                reason,
            } => ContainerMessage::Release {
                container_id,
                reason,
            },
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
                return Ok(());
            }
        };
        self.backend.deliver(message).await
    }
}
