pub mod adapters;
pub mod config;
pub mod core;
pub mod document;
pub mod domain;
pub mod hmi;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::AnalyzerConfig;

pub use adapters::{CsvDataLogger, ModbusServer, OpcUaServer, ProductionDataProvider, SimulatedField};
pub use crate::core::{ControlCommand, ControlLoop, PlcController};
pub use document::{DocumentReport, ProjectDescriptionDocument};
pub use domain::model::{ProcessSnapshot, ProcessVariables};
pub use utils::error::{AnalyzerError, Result};
