pub mod auth;
pub mod dispatcher;
pub mod limiter;

pub use crate::domain::model::{Command, CommandKind, DispatchResult, LimitPolicy, Target, TargetEntry};
pub use crate::domain::ports::DeviceControl;
pub use crate::utils::error::Result;
