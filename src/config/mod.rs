// src/config/mod.rs

//! Configuration loading and validation for jobwrapper.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file through the [`FileSystem`](crate::fs::FileSystem)
//!   abstraction (`loader.rs`).
//! - Apply defaults, resolve paths and validate (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{Config, RawConfig, RawDuration, parse_duration};
pub use validate::validate_config;
