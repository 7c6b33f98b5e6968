use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use streamplan::engine::RuntimeEvent;
use streamplan::errors::Result;
use streamplan::heartbeat::{ContainerHeartbeat, InstanceHeartbeat, InstanceState};
use streamplan::plan::{ContainerId, PhysicalId};
use streamplan::transport::{ContainerBackend, ContainerMessage};
use tokio::sync::mpsc;

/// A fake container transport that:
/// - records every message the runtime delivers
/// - reports every deployed instance as idle, once on deployment and again
///   after each response that does not ask the container to shut down.
pub struct RecordingBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    delivered: Arc<Mutex<Vec<ContainerMessage>>>,
    instances: HashMap<ContainerId, Vec<PhysicalId>>,
}

impl RecordingBackend {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        delivered: Arc<Mutex<Vec<ContainerMessage>>>,
    ) -> Self {
        Self {
            runtime_tx,
            delivered,
            instances: HashMap::new(),
        }
    }

    fn idle_heartbeat(&self, container_id: &str) -> Option<ContainerHeartbeat> {
        let ids = self.instances.get(container_id)?;
        Some(ContainerHeartbeat {
            container_id: container_id.to_string(),
            instances: ids
                .iter()
                .map(|id| InstanceHeartbeat::new(*id, InstanceState::Idle))
                .collect(),
        })
    }
}

impl ContainerBackend for RecordingBackend {
    fn deliver(
        &mut self,
        message: ContainerMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.delivered.lock().unwrap().push(message.clone());

        let next = match &message {
            ContainerMessage::Deploy(assignment) => {
                self.instances.insert(
                    assignment.container_id.clone(),
                    assignment.operator_ids().collect(),
                );
                self.idle_heartbeat(&assignment.container_id)
            }
            ContainerMessage::HeartbeatResponse {
                container_id,
                response,
            } if !response.shutdown => self.idle_heartbeat(container_id),
            _ => None,
        };
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            if let Some(heartbeat) = next {
                tx.send(RuntimeEvent::Heartbeat(heartbeat))
                    .await
                    .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
