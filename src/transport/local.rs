// src/transport/local.rs

//! In-process stand-ins for worker containers.
//!
//! Each simulated container registers once, then reports all of its
//! instances as idle on every heartbeat tick until it is told to shut down
//! or is released.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::heartbeat::{ContainerHeartbeat, InstanceHeartbeat, InstanceState};
use crate::plan::{BufferServerAddress, ContainerId, PhysicalId};
use crate::transport::ContainerMessage;

/// How the simulated containers are laid out.
#[derive(Debug, Clone)]
pub struct LocalContainerOptions {
    pub count: usize,
    pub buffer_host: String,
    /// Container `i` (0-based) gets buffer server port `base_port + i`.
    pub base_port: u16,
    pub heartbeat_interval: Duration,
}

/// Spawn `options.count` simulated containers.
///
/// Returns the sender to wire into a
/// [`ChannelBackend`](crate::transport::ChannelBackend) and the handle of
/// the simulation task. Once every container was shut down or released,
/// the simulation asks the runtime to stop.
pub fn spawn_local_containers(
    options: LocalContainerOptions,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> (mpsc::Sender<ContainerMessage>, JoinHandle<()>) {
    // Room for one reply per registration, so registering never waits on
    // replies nobody reads yet.
    let (tx, rx) = mpsc::channel::<ContainerMessage>(options.count + 32);
    let handle = tokio::spawn(run_local_containers(options, rx, runtime_tx));
    (tx, handle)
}

async fn run_local_containers(
    options: LocalContainerOptions,
    mut rx: mpsc::Receiver<ContainerMessage>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    info!(count = options.count, "local containers starting");

    let mut outstanding: BTreeSet<ContainerId> = BTreeSet::new();
    for i in 0..options.count {
        let container_id = format!("container-{}", i + 1);
        let port = options.base_port.saturating_add(i as u16);
        let event = RuntimeEvent::ContainerRegistered {
            container_id: container_id.clone(),
            buffer_server: BufferServerAddress::new(options.buffer_host.clone(), port),
        };
        if runtime_tx.send(event).await.is_err() {
            warn!("runtime gone before all containers registered");
            return;
        }
        outstanding.insert(container_id);
    }

    // Instances per deployed container that has not been shut down yet.
    let mut running: BTreeMap<ContainerId, Vec<PhysicalId>> = BTreeMap::new();
    let mut ticker = tokio::time::interval(options.heartbeat_interval);

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    debug!("container channel closed");
                    break;
                };
                match message {
                    ContainerMessage::Deploy(assignment) => {
                        info!(container = %assignment.container_id, instances = assignment.operators.len(), "container deployed");
                        running.insert(assignment.container_id.clone(), assignment.operator_ids().collect());
                    }
                    ContainerMessage::HeartbeatResponse { container_id, response } => {
                        if response.shutdown && running.remove(&container_id).is_some() {
                            info!(container = %container_id, "container shutting down");
                            outstanding.remove(&container_id);
                        }
                    }
                    ContainerMessage::Release { container_id, reason } => {
                        info!(container = %container_id, %reason, "container released");
                        running.remove(&container_id);
                        outstanding.remove(&container_id);
                    }
                }

                if outstanding.is_empty() {
                    debug!("all local containers finished");
                    let _ = runtime_tx.send(RuntimeEvent::ShutdownRequested).await;
                    break;
                }
            }
            _ = ticker.tick() => {
                for (container_id, instances) in &running {
                    let heartbeat = ContainerHeartbeat {
                        container_id: container_id.clone(),
                        instances: instances
                            .iter()
                            .map(|id| InstanceHeartbeat::new(*id, InstanceState::Idle))
                            .collect(),
                    };
                    match runtime_tx.try_send(RuntimeEvent::Heartbeat(heartbeat)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            debug!(container = %container_id, "runtime busy; skipping heartbeat");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("runtime gone; stopping heartbeats");
                            return;
                        }
                    }
                }
            }
        }
    }

    info!("local containers finished");
}
