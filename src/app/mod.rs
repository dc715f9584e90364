pub mod gateway;
pub mod rpc;
pub mod tools;

pub use gateway::{Gateway, GatewaySettings};
