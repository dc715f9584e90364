use serde::Serialize;
use thiserror::Error;

/// Why a caller was turned away by the auth gate.
///
/// Kept internal to logs; the HTTP response never says which one applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Invalid,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::Missing => "missing",
            AuthFailure::Invalid => "invalid",
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Unauthenticated ({})", .0.as_str())]
    Unauthenticated(AuthFailure),

    #[error("Invalid parameter '{field}'{}: {reason}", fmt_target(.target_id))]
    InvalidParameter {
        target_id: Option<String>,
        field: String,
        reason: String,
    },

    #[error("Unknown command: {kind}")]
    UnknownCommand { kind: String },

    #[error("Downstream failure for target '{target_id}': {reason}")]
    DownstreamFailure {
        target_id: String,
        status_code: Option<u16>,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn fmt_target(target_id: &Option<String>) -> String {
    match target_id {
        Some(id) => format!(" for target '{}'", id),
        None => String::new(),
    }
}

/// Error kinds as they appear in structured responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Unauthenticated,
    InvalidParameter,
    UnknownCommand,
    DownstreamFailure,
    Internal,
}

impl GatewayError {
    pub fn invalid_parameter(
        target_id: Option<&str>,
        field: &str,
        reason: impl Into<String>,
    ) -> Self {
        GatewayError::InvalidParameter {
            target_id: target_id.map(str::to_string),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            GatewayError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            GatewayError::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            GatewayError::DownstreamFailure { .. } => ErrorKind::DownstreamFailure,
            _ => ErrorKind::Internal,
        }
    }

    /// The parameter a caller got wrong, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            GatewayError::InvalidParameter { field, .. } => Some(field),
            GatewayError::InvalidConfigValueError { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthenticated(_) => 401,
            GatewayError::InvalidParameter { .. } | GatewayError::UnknownCommand { .. } => 400,
            GatewayError::DownstreamFailure { .. } => 502,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message_names_field_and_target() {
        let err = GatewayError::invalid_parameter(Some("abc"), "duration_ms", "must be between 300 and 30000");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'duration_ms' for target 'abc': must be between 300 and 30000"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(err.field(), Some("duration_ms"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_unauthenticated_message_does_not_carry_credentials() {
        let err = GatewayError::Unauthenticated(AuthFailure::Invalid);
        assert_eq!(err.to_string(), "Unauthenticated (invalid)");
        assert_eq!(err.status_code(), 401);
    }
}
