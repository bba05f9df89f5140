//! # lrmeta common library
//!
//! Shared code for the metadata pipeline crates:
//! - Error type and result alias
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Resource model: resource types, localized strings, resource paths
//! - Cache key naming shared by the normalizer and the API

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{CacheKey, Localized, ResourcePath, ResourceType};
