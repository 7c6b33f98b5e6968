// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PlannerError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PlannerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_operators(cfg)?;
    validate_planner(cfg)?;
    validate_operators(cfg)?;
    validate_streams(cfg)?;
    validate_inline_cycles(cfg)?;
    Ok(())
}

fn ensure_has_operators(cfg: &RawConfigFile) -> Result<()> {
    if cfg.operator.is_empty() {
        return Err(PlannerError::Config(
            "config must contain at least one [operator.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_planner(cfg: &RawConfigFile) -> Result<()> {
    if cfg.planner.window_size_millis == 0 {
        return Err(PlannerError::Config(
            "[planner].window_size_millis must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_operators(cfg: &RawConfigFile) -> Result<()> {
    for (name, op) in &cfg.operator {
        if let (Some(min), Some(max)) = (op.min_tuples, op.max_tuples) {
            if min > max {
                return Err(PlannerError::Config(format!(
                    "operator '{name}' has min_tuples {min} above max_tuples {max}"
                )));
            }
        }
    }
    Ok(())
}

fn validate_streams(cfg: &RawConfigFile) -> Result<()> {
    for (name, stream) in &cfg.stream {
        for endpoint in [&stream.source, &stream.target].into_iter().flatten() {
            if !cfg.operator.contains_key(endpoint) {
                return Err(PlannerError::Config(format!(
                    "stream '{name}' references unknown operator '{endpoint}'"
                )));
            }
        }

        match (&stream.source, &stream.target) {
            (None, None) => {
                return Err(PlannerError::Config(format!(
                    "stream '{name}' needs a source, a target or both"
                )));
            }
            (Some(_), Some(_)) => {}
            _ if stream.class.is_none() => {
                return Err(PlannerError::Config(format!(
                    "adapter stream '{name}' needs a class"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Inline streams run their endpoints in one container; a cycle of them
/// cannot be wired.
fn validate_inline_cycles(cfg: &RawConfigFile) -> Result<()> {
    let mut graph: DiGraphMap<&str, &str> = DiGraphMap::new();

    for name in cfg.operator.keys() {
        graph.add_node(name.as_str());
    }

    for (name, stream) in &cfg.stream {
        if let (Some(source), Some(target), true) = (&stream.source, &stream.target, stream.inline) {
            graph.add_edge(source.as_str(), target.as_str(), name.as_str());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PlannerError::Config(format!(
            "cycle of inline streams involving operator '{}'",
            cycle.node_id()
        ))),
    }
}
