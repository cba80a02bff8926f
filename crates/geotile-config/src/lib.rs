//! Configuration for the tile streaming stack.
//!
//! Settings persist to disk as `config.ron`, accept forward/backward
//! compatible edits through `#[serde(default)]`, take CLI overrides via clap,
//! and are range-checked by [`Config::validate`] before anything is built
//! from them.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, HeightEncoding, LoaderConfig, LodConfig, LodStrategyKind, MapConfig,
    MapMode, ProviderConfig, ProviderKind,
};
pub use error::ConfigError;
