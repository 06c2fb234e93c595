// src/config/mod.rs

//! Project file loading and validation.
//!
//! - `model.rs` holds the TOML-backed data model.
//! - `loader.rs` reads a project file from disk.
//! - `validate.rs` turns a raw file into a checked [`ProjectConfig`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    ActionConfig, DEFAULT_PROVIDER, ProjectConfig, ProjectSection, ProviderConfig,
    RawProjectConfig,
};
pub use validate::validate_raw_config;
