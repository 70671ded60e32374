#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Component, FieldSource, LogFormat};
pub use toml_config::AnalyzerConfig;
