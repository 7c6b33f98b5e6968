// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::errors::Result;
use crate::graph::{LogicalGraph, LogicalGraphBuilder, OperatorSpec, Properties, StreamSpec};
use crate::manager::PlannerConfig;
use crate::plan::DEFAULT_WINDOW_SIZE_MILLIS;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [planner]
/// window_size_millis = 500
///
/// [operator.parse]
/// class = "com.example.Parse"
/// max_tuples = 10000
///
/// [operator.count]
/// class = "com.example.Count"
///
/// [stream.lines]
/// target = "parse"
/// class = "com.example.LineReader"
/// properties = { "partition.keys" = "a,b" }
///
/// [stream.words]
/// source = "parse"
/// target = "count"
/// inline = true
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub planner: PlannerSection,

    /// Operators from `[operator.<name>]`, keyed by name.
    #[serde(default)]
    pub operator: BTreeMap<String, OperatorConfig>,

    /// Streams from `[stream.<name>]`, keyed by name.
    #[serde(default)]
    pub stream: BTreeMap<String, StreamConfig>,
}

/// `[planner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_window_size_millis")]
    pub window_size_millis: u64,
}

fn default_window_size_millis() -> u64 {
    DEFAULT_WINDOW_SIZE_MILLIS
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            window_size_millis: default_window_size_millis(),
        }
    }
}

/// `[operator.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OperatorConfig {
    /// Implementation class instantiated by containers.
    #[serde(default)]
    pub class: Option<String>,

    /// Warn when a heartbeat reports fewer tuples than this.
    #[serde(default)]
    pub min_tuples: Option<u64>,

    /// Warn when a heartbeat reports more tuples than this.
    #[serde(default)]
    pub max_tuples: Option<u64>,

    #[serde(default)]
    pub properties: Properties,
}

/// `[stream.<name>]` section.
///
/// Leaving out `source` or `target` makes the stream an input or output
/// adapter; adapters need a `class`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StreamConfig {
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub target: Option<String>,

    /// Co-locate both endpoints in one container.
    #[serde(default)]
    pub inline: bool,

    #[serde(default)]
    pub class: Option<String>,

    #[serde(default)]
    pub properties: Properties,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub planner: PlannerSection,
    pub operator: BTreeMap<String, OperatorConfig>,
    pub stream: BTreeMap<String, StreamConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            planner: raw.planner,
            operator: raw.operator,
            stream: raw.stream,
        }
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            window_size_millis: self.planner.window_size_millis,
        }
    }

    /// Build the logical graph: operators in name order, then streams in
    /// name order.
    pub fn to_graph(&self) -> Result<LogicalGraph> {
        let mut builder = LogicalGraphBuilder::new();

        for (name, op) in &self.operator {
            let mut spec = OperatorSpec::new(name.as_str());
            if let Some(class) = &op.class {
                spec = spec.class(class.as_str());
            }
            if let Some(min) = op.min_tuples {
                spec = spec.min_tuples(min);
            }
            if let Some(max) = op.max_tuples {
                spec = spec.max_tuples(max);
            }
            for (key, value) in &op.properties {
                spec = spec.property(key.as_str(), value.as_str());
            }
            builder.add_operator(spec)?;
        }

        for (name, stream) in &self.stream {
            let mut spec = StreamSpec::new(name.as_str()).inline(stream.inline);
            if let Some(source) = &stream.source {
                spec = spec.source(source.as_str());
            }
            if let Some(target) = &stream.target {
                spec = spec.target(target.as_str());
            }
            if let Some(class) = &stream.class {
                spec = spec.class(class.as_str());
            }
            for (key, value) in &stream.properties {
                spec = spec.property(key.as_str(), value.as_str());
            }
            builder.add_stream(spec)?;
        }

        Ok(builder.build())
    }
}
