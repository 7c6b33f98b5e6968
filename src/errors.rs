// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlannerError {
    /// A logical operator or boundary stream has no implementation class.
    #[error("Configuration for {kind} '{id}' is missing its implementation class")]
    MissingClass { kind: &'static str, id: String },

    #[error("Cannot partition more than one operator in deployment group {group:?}")]
    MultiplePartitionedOperators { group: Vec<String> },

    #[error("Planner invariant violated: {0}")]
    InvariantViolation(String),

    #[error("There are no operators left to deploy")]
    NoWork,

    #[error("Cannot find a deployable group; remaining groups: {pending:?}")]
    NoDeployableGroup { pending: Vec<Vec<String>> },

    #[error("No assignment for container {0}")]
    UnknownContainer(String),

    #[error("Invalid logical graph: {0}")]
    Graph(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PlannerError>;
