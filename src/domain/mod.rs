// Domain layer: commands, targets, results and the device-control port.

pub mod model;
pub mod ports;
