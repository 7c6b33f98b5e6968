// src/config/mod.rs

//! Topology configuration for the `streamplan` binary.
//!
//! - [`model`] is the TOML-backed data model.
//! - [`loader`] reads a file from disk.
//! - [`validate`] checks references and inline cycles and turns the raw
//!   file into a [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, OperatorConfig, PlannerSection, RawConfigFile, StreamConfig};
