pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{DownstreamClient, DownstreamSettings};
pub use app::{Gateway, GatewaySettings};
pub use config::GatewayConfig;
pub use crate::core::{auth::AuthGate, dispatcher::CommandDispatcher};
pub use utils::error::{GatewayError, Result};
