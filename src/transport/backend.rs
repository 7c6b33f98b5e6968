// src/transport/backend.rs

//! Pluggable container transport.
//!
//! The runtime hands every outgoing message to a `ContainerBackend`. The
//! binary uses [`ChannelBackend`] to feed its in-process containers; tests
//! can record messages instead.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::errors::{Error, Result};
use crate::heartbeat::HeartbeatResponse;
use crate::plan::{ContainerAssignment, ContainerId};

/// Message from the planner to one container.
#[derive(Debug, Clone)]
pub enum ContainerMessage {
    Deploy(Arc<ContainerAssignment>),
    HeartbeatResponse {
        container_id: ContainerId,
        response: HeartbeatResponse,
    },
    Release {
        container_id: ContainerId,
        reason: String,
    },
}

impl ContainerMessage {
    pub fn container_id(&self) -> &str {
        match self {
            ContainerMessage::Deploy(assignment) => &assignment.container_id,
            ContainerMessage::HeartbeatResponse { container_id, .. }
            | ContainerMessage::Release { container_id, .. } => container_id,
        }
    }
}

/// Trait abstracting how messages reach containers.
pub trait ContainerBackend: Send {
    fn deliver(
        &mut self,
        message: ContainerMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Forwards every message over an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelBackend {
    tx: mpsc::Sender<ContainerMessage>,
}

impl ChannelBackend {
    pub fn new(tx: mpsc::Sender<ContainerMessage>) -> Self {
        Self { tx }
    }
}

impl ContainerBackend for ChannelBackend {
    fn deliver(
        &mut self,
        message: ContainerMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.tx.clone();

        Box::pin(async move {
            tx.send(message).await.map_err(Error::from)?;
            Ok(())
        })
    }
}
