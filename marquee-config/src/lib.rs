//! Configuration for Marquee.
//!
//! Settings are layered: built-in defaults, then an optional TOML (or JSON)
//! file, then environment overrides. [`ConfigLoader`] applies the layers and
//! records where the result came from in [`ConfigMetadata`].
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod util;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::{
    Config, ConfigMetadata, ConfigSource, FetchConfig, SourcesConfig, StoreBackend, StoreConfig,
};
