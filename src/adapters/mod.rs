// Adapters layer: concrete implementations for external systems.

pub mod openshock;

pub use openshock::{DownstreamClient, DownstreamSettings};
