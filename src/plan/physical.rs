// src/plan/physical.rs

//! Physical plan types: deployable instances and the edges between them.

use std::fmt;

use crate::graph::{OperatorId, Properties, StreamId};
use crate::plan::partition::PartitionKey;

/// Property carrying the wrapped stream's implementation class on adapters.
pub const ADAPTER_STREAM_CLASS_PROPERTY: &str = "adapter.stream.class";

/// Property carrying `"true"` for input adapters, `"false"` for output ones.
pub const ADAPTER_IS_INPUT_PROPERTY: &str = "adapter.input";

/// Synthetic identity of a physical instance. Unique within a planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysicalId(u32);

impl PhysicalId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PhysicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of the buffer server publishers in a container write to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferServerAddress {
    pub host: String,
    pub port: u16,
}

impl BufferServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BufferServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What a physical instance runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalKind {
    /// An instance of a logical operator.
    Operator { logical: OperatorId, class: String },
    /// Adapter feeding a stream that has no logical source.
    InputAdapter { stream: StreamId, stream_class: String },
    /// Adapter draining a stream that has no logical target.
    OutputAdapter { stream: StreamId, stream_class: String },
}

/// A concrete deployable instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalOperator {
    pub id: PhysicalId,
    /// Name of the owning logical operator, or of the stream for adapters.
    pub logical_name: String,
    pub kind: PhysicalKind,
    pub properties: Properties,
    /// `None` for unpartitioned instances and adapters.
    pub partition: Option<PartitionKey>,
}

impl PhysicalOperator {
    /// Owning logical operator, if this is not an adapter.
    pub fn logical_operator(&self) -> Option<OperatorId> {
        match self.kind {
            PhysicalKind::Operator { logical, .. } => Some(logical),
            _ => None,
        }
    }

    pub fn is_adapter(&self) -> bool {
        !matches!(self.kind, PhysicalKind::Operator { .. })
    }

    pub fn is_output_adapter(&self) -> bool {
        matches!(self.kind, PhysicalKind::OutputAdapter { .. })
    }
}

/// A concrete directed edge between two physical instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalStream {
    pub stream: StreamId,
    /// Logical stream name.
    pub name: String,
    pub source: PhysicalId,
    pub target: PhysicalId,
    /// True when both ends run in the same container.
    pub inline: bool,
    pub buffer_server: BufferServerAddress,
    /// Disambiguates multiplexed subscriptions on the buffer server.
    pub channel_type: Option<String>,
    /// Partition a subscriber restricts itself to.
    pub partition_filter: Option<PartitionKey>,
    pub properties: Properties,
}
