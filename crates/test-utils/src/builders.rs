#![allow(dead_code)]

use std::sync::Arc;

use streamplan::config::{ConfigFile, OperatorConfig, RawConfigFile, StreamConfig};
use streamplan::graph::{LogicalGraph, LogicalGraphBuilder, OperatorSpec, StreamSpec};
use streamplan::manager::{DeploymentManager, PlannerConfig};
use streamplan::plan::{BufferServerAddress, PartitionResolver, PropertyPartitionResolver};

/// Builder for `ConfigFile` to simplify test setup.
#[derive(Default)]
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operator(mut self, name: &str, class: &str) -> Self {
        self.config.operator.insert(
            name.to_string(),
            OperatorConfig {
                class: Some(class.to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_stream(mut self, name: &str, stream: StreamConfig) -> Self {
        self.config.stream.insert(name.to_string(), stream);
        self
    }

    pub fn with_window(mut self, millis: u64) -> Self {
        self.config.planner.window_size_millis = millis;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `StreamConfig`.
pub struct StreamConfigBuilder {
    stream: StreamConfig,
}

impl StreamConfigBuilder {
    pub fn between(source: &str, target: &str) -> Self {
        Self {
            stream: StreamConfig {
                source: Some(source.to_string()),
                target: Some(target.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn input(target: &str, class: &str) -> Self {
        Self {
            stream: StreamConfig {
                target: Some(target.to_string()),
                class: Some(class.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn output(source: &str, class: &str) -> Self {
        Self {
            stream: StreamConfig {
                source: Some(source.to_string()),
                class: Some(class.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn inline(mut self) -> Self {
        self.stream.inline = true;
        self
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.stream.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> StreamConfig {
        self.stream
    }
}

/// Logical graph of operators `names` chained by non-inline streams
/// `"<a>_<b>"`, every operator with class `Impl`.
pub fn chain_graph(names: &[&str]) -> LogicalGraph {
    let mut builder = LogicalGraphBuilder::new();
    for name in names {
        builder
            .add_operator(OperatorSpec::new(*name).class("Impl"))
            .expect("operator");
    }
    for pair in names.windows(2) {
        builder
            .add_stream(
                StreamSpec::new(format!("{}_{}", pair[0], pair[1]))
                    .source(pair[0])
                    .target(pair[1]),
            )
            .expect("stream");
    }
    builder.build()
}

/// Manager with the default window and a fixed start time.
pub fn manager_for(graph: LogicalGraph, resolver: &dyn PartitionResolver) -> Arc<DeploymentManager> {
    Arc::new(DeploymentManager::with_start_time(
        graph,
        resolver,
        PlannerConfig::default(),
        0,
    ))
}

/// Manager resolving partitions from `partition.keys` stream properties.
pub fn property_manager(graph: LogicalGraph) -> Arc<DeploymentManager> {
    manager_for(graph, &PropertyPartitionResolver)
}

pub fn buffer_server(port: u16) -> BufferServerAddress {
    BufferServerAddress::new("localhost", port)
}
