use crate::utils::error::{GatewayError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<Url> {
    if url_str.is_empty() {
        return Err(GatewayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(GatewayError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(GatewayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(GatewayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// Secrets are checked for emptiness only; the value never goes into the error.
pub fn validate_secret(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: "<redacted>".to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(GatewayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Range check for a per-target command parameter.
pub fn validate_param_range(target_id: &str, field_name: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(GatewayError::invalid_parameter(
            Some(target_id),
            field_name,
            format!("{} is out of range, must be between {} and {}", value, min, max),
        ));
    }
    Ok(())
}

pub fn validate_required_param<T: Copy>(target_id: &str, field_name: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| GatewayError::invalid_parameter(Some(target_id), field_name, "is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("openshock_api_url", "https://api.openshock.app").is_ok());
        assert!(validate_url("openshock_api_url", "http://localhost:8080").is_ok());
        assert!(validate_url("openshock_api_url", "").is_err());
        assert!(validate_url("openshock_api_url", "invalid-url").is_err());
        assert!(validate_url("openshock_api_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_secret_hides_value() {
        let err = validate_secret("mcp_auth_token", "   ").unwrap_err();
        assert!(err.to_string().contains("<redacted>"));
        assert!(validate_secret("mcp_auth_token", "s3cret").is_ok());
    }

    #[test]
    fn test_validate_param_range() {
        assert!(validate_param_range("a", "intensity", 1, 1, 100).is_ok());
        assert!(validate_param_range("a", "intensity", 100, 1, 100).is_ok());

        let err = validate_param_range("a", "intensity", 0, 1, 100).unwrap_err();
        assert_eq!(err.field(), Some("intensity"));
        assert!(err.to_string().contains("target 'a'"));
    }

    #[test]
    fn test_validate_required_param() {
        assert_eq!(validate_required_param("a", "duration_ms", Some(300)).unwrap(), 300);
        let err = validate_required_param::<i64>("a", "duration_ms", None).unwrap_err();
        assert_eq!(err.field(), Some("duration_ms"));
    }
}
