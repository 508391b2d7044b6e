// src/config/mod.rs

//! Configuration loading and validation for wavebuild.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate names, references, actions and DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{ActionConfig, ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
