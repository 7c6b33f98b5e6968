// src/plan/partition.rs

//! Partition planning: which partition keys to instantiate per operator.
//!
//! The partitioning codec is external; the planner only sees the keys it
//! declares through a [`PartitionResolver`]. Resolution failures never abort
//! planning: the operator stays unpartitioned and the failure is logged.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, error, warn};

use crate::graph::{LogicalGraph, LogicalStream, OperatorId};

/// Stream property read by [`PropertyPartitionResolver`].
pub const PARTITION_KEYS_PROPERTY: &str = "partition.keys";

/// Opaque tag identifying one shard of a partitioned operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(Vec<u8>);

impl PartitionKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for PartitionKey {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Outcome of asking a codec for its partition keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partitioning {
    /// The codec declares these keys.
    Resolved(Vec<PartitionKey>),
    /// The stream carries no partitioning.
    Unpartitioned,
    /// The codec could not be resolved (missing or invalid declaration).
    Unresolved(String),
}

/// External collaborator mapping a stream's codec declaration to keys.
pub trait PartitionResolver: Send + Sync {
    fn resolve(&self, stream: &LogicalStream) -> Partitioning;
}

/// Resolver reading a comma-separated key list from the
/// [`PARTITION_KEYS_PROPERTY`] stream property.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyPartitionResolver;

impl PartitionResolver for PropertyPartitionResolver {
    fn resolve(&self, stream: &LogicalStream) -> Partitioning {
        let Some(raw) = stream.properties().get(PARTITION_KEYS_PROPERTY) else {
            return Partitioning::Unpartitioned;
        };

        let keys: Vec<PartitionKey> = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(PartitionKey::from)
            .collect();

        if keys.is_empty() {
            Partitioning::Unresolved(format!(
                "property '{}' declares no keys: {:?}",
                PARTITION_KEYS_PROPERTY, raw
            ))
        } else {
            Partitioning::Resolved(keys)
        }
    }
}

/// Resolve a single stream, applying the fallback-to-unpartitioned policy.
///
/// Returns `None` when the stream is unpartitioned, failed to resolve, or
/// resolved to an empty key list. Duplicate keys are dropped.
pub fn stream_partitions(
    resolver: &dyn PartitionResolver,
    stream: &LogicalStream,
) -> Option<Vec<PartitionKey>> {
    match resolver.resolve(stream) {
        Partitioning::Resolved(keys) => {
            let mut seen = HashSet::new();
            let mut unique = Vec::with_capacity(keys.len());
            for key in keys {
                if seen.insert(key.clone()) {
                    unique.push(key);
                } else {
                    warn!(stream = %stream.name(), key = %key, "dropping duplicate partition key");
                }
            }
            if unique.is_empty() {
                warn!(stream = %stream.name(), "codec declared an empty partition list; treating as unpartitioned");
                None
            } else {
                Some(unique)
            }
        }
        Partitioning::Unpartitioned => None,
        Partitioning::Unresolved(reason) => {
            error!(stream = %stream.name(), %reason, "failed to get partition info from codec; treating as unpartitioned");
            None
        }
    }
}

/// Partition keys per partitioned operator. Immutable once planned.
#[derive(Debug, Clone, Default)]
pub struct PartitionPlan {
    by_operator: HashMap<OperatorId, Vec<PartitionKey>>,
}

impl PartitionPlan {
    /// Derive each operator's partitioning from its input streams.
    pub fn from_graph(graph: &LogicalGraph, resolver: &dyn PartitionResolver) -> Self {
        let mut by_operator = HashMap::new();

        for op in graph.operators() {
            for stream_id in op.inputs() {
                let stream = graph.stream(*stream_id);
                if let Some(keys) = stream_partitions(resolver, stream) {
                    debug!(operator = %op.name(), stream = %stream.name(), partitions = keys.len(), "operator is partitioned");
                    if by_operator.insert(op.id(), keys).is_some() {
                        warn!(operator = %op.name(), stream = %stream.name(), "several partitioned inputs; last one wins");
                    }
                }
            }
        }

        Self { by_operator }
    }

    pub fn partitions_of(&self, operator: OperatorId) -> Option<&[PartitionKey]> {
        self.by_operator.get(&operator).map(Vec::as_slice)
    }

    pub fn is_partitioned(&self, operator: OperatorId) -> bool {
        self.by_operator.contains_key(&operator)
    }

    /// Number of physical instances the operator expands to.
    pub fn instance_count(&self, operator: OperatorId) -> usize {
        self.partitions_of(operator).map_or(1, |keys| keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LogicalGraphBuilder, OperatorSpec, StreamSpec};

    fn graph_with_keys(keys: &str) -> LogicalGraph {
        let mut b = LogicalGraphBuilder::new();
        b.add_operator(OperatorSpec::new("A").class("Impl")).unwrap();
        b.add_operator(OperatorSpec::new("B").class("Impl")).unwrap();
        b.add_stream(
            StreamSpec::new("ab")
                .source("A")
                .target("B")
                .property(PARTITION_KEYS_PROPERTY, keys),
        )
        .unwrap();
        b.build()
    }

    #[test]
    fn property_resolver_reads_comma_separated_keys() {
        let g = graph_with_keys("k1, k2,k1");
        let plan = PartitionPlan::from_graph(&g, &PropertyPartitionResolver);
        let b = g.operator_by_name("B").unwrap().id();
        let a = g.operator_by_name("A").unwrap().id();

        assert_eq!(
            plan.partitions_of(b),
            Some(&[PartitionKey::from("k1"), PartitionKey::from("k2")][..])
        );
        assert_eq!(plan.instance_count(b), 2);
        assert!(!plan.is_partitioned(a));
        assert_eq!(plan.instance_count(a), 1);
    }

    #[test]
    fn unresolved_codec_falls_back_to_unpartitioned() {
        let g = graph_with_keys(" , ");
        let stream = g.stream_by_name("ab").unwrap();

        assert!(matches!(
            PropertyPartitionResolver.resolve(stream),
            Partitioning::Unresolved(_)
        ));
        let plan = PartitionPlan::from_graph(&g, &PropertyPartitionResolver);
        assert!(!plan.is_partitioned(g.operator_by_name("B").unwrap().id()));
    }

    #[test]
    fn partition_key_displays_lossy_utf8() {
        assert_eq!(PartitionKey::from("k1").to_string(), "k1");
        assert_eq!(PartitionKey::new(vec![0xff]).to_string(), "\u{fffd}");
    }
}
