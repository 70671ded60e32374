// Domain layer: process data model and ports (field I/O, tag publishing, data logging).

pub mod model;
pub mod ports;
