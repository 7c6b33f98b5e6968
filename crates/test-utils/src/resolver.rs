use std::collections::HashMap;
use std::sync::Mutex;

use streamplan::graph::LogicalStream;
use streamplan::plan::{PartitionKey, PartitionResolver, Partitioning};

/// Resolver answering from a fixed table keyed by stream name.
///
/// Streams missing from the table are unpartitioned. Every lookup is
/// recorded.
#[derive(Default)]
pub struct FixedPartitionResolver {
    table: HashMap<String, Partitioning>,
    lookups: Mutex<Vec<String>>,
}

impl FixedPartitionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, stream: &str, keys: &[&str]) -> Self {
        self.table.insert(
            stream.to_string(),
            Partitioning::Resolved(keys.iter().map(|k| PartitionKey::from(*k)).collect()),
        );
        self
    }

    pub fn with_failure(mut self, stream: &str, reason: &str) -> Self {
        self.table
            .insert(stream.to_string(), Partitioning::Unresolved(reason.to_string()));
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl PartitionResolver for FixedPartitionResolver {
    fn resolve(&self, stream: &LogicalStream) -> Partitioning {
        self.lookups.lock().unwrap().push(stream.name().to_string());
        self.table
            .get(stream.name())
            .cloned()
            .unwrap_or(Partitioning::Unpartitioned)
    }
}
