pub mod controller;
pub mod multiphase;
pub mod pid;
pub mod safety;
pub mod sampling;

pub use crate::domain::model::{ProcessSnapshot, ProcessVariables};
pub use crate::domain::ports::{FieldIo, ProcessDataLogger, TagPublisher};
pub use crate::utils::error::Result;
pub use controller::{ControlCommand, ControlLoop, PlcController};
