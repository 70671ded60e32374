// Adapters layer: concrete implementations of the domain ports (field I/O, tag servers, data logging)

pub mod communication;
pub mod data_logger;
pub mod production_data;
pub mod simulated_field;

pub use communication::{ModbusServer, OpcUaServer};
pub use data_logger::CsvDataLogger;
pub use production_data::ProductionDataProvider;
pub use simulated_field::SimulatedField;
