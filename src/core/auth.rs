use crate::domain::model::AuthToken;
use crate::utils::error::{AuthFailure, GatewayError, Result};
use std::net::SocketAddr;

const BEARER_PREFIX: &[u8] = b"Bearer ";

/// Who knocked, for the audit log.
#[derive(Debug, Clone, Default)]
pub struct CallerInfo {
    pub remote_addr: Option<SocketAddr>,
    pub user_agent: Option<String>,
    pub path: String,
}

/// Admits or rejects inbound requests against the configured gateway token.
#[derive(Debug, Clone)]
pub struct AuthGate {
    token: AuthToken,
}

impl AuthGate {
    pub fn new(token: AuthToken) -> Self {
        Self { token }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.expose().trim().is_empty()
    }

    /// Strips an optional, case-sensitive `Bearer ` prefix.
    pub fn credential_from_header(raw: &[u8]) -> &[u8] {
        raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw)
    }

    /// Compares the raw `Authorization` header value against the token.
    pub fn check(&self, header: Option<&[u8]>) -> std::result::Result<(), AuthFailure> {
        let raw = header.ok_or(AuthFailure::Missing)?;
        let credential = Self::credential_from_header(raw);

        if credential == self.token.expose().as_bytes() {
            Ok(())
        } else {
            Err(AuthFailure::Invalid)
        }
    }

    /// [`check`](Self::check) with audit logging. Never logs the credential.
    pub fn admit(&self, header: Option<&[u8]>, caller: &CallerInfo) -> Result<()> {
        match self.check(header) {
            Ok(()) => {
                tracing::debug!(
                    path = %caller.path,
                    remote_addr = ?caller.remote_addr,
                    "Authentication successful"
                );
                Ok(())
            }
            Err(reason) => {
                tracing::warn!(
                    reason = reason.as_str(),
                    path = %caller.path,
                    remote_addr = ?caller.remote_addr,
                    user_agent = caller.user_agent.as_deref().unwrap_or("-"),
                    rejected_at = %chrono::Utc::now().to_rfc3339(),
                    "Authentication rejected"
                );
                Err(GatewayError::Unauthenticated(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AuthGate {
        AuthGate::new(AuthToken::new("correct-token"))
    }

    #[test]
    fn test_blank_token_is_not_configured() {
        assert!(gate().is_configured());
        assert!(!AuthGate::new(AuthToken::new("  ")).is_configured());
    }

    #[test]
    fn test_missing_header_is_rejected() {
        assert_eq!(gate().check(None), Err(AuthFailure::Missing));
    }

    #[test]
    fn test_wrong_token_is_rejected_with_or_without_bearer() {
        assert_eq!(gate().check(Some(b"wrongtoken")), Err(AuthFailure::Invalid));
        assert_eq!(gate().check(Some(b"Bearer wrongtoken")), Err(AuthFailure::Invalid));
    }

    #[test]
    fn test_correct_token_is_admitted_with_or_without_bearer() {
        assert_eq!(gate().check(Some(b"correct-token")), Ok(()));
        assert_eq!(gate().check(Some(b"Bearer correct-token")), Ok(()));
    }

    #[test]
    fn test_bearer_prefix_is_case_sensitive() {
        assert_eq!(gate().check(Some(b"bearer correct-token")), Err(AuthFailure::Invalid));
        assert_eq!(gate().check(Some(b"BEARER correct-token")), Err(AuthFailure::Invalid));
    }

    #[test]
    fn test_comparison_is_exact() {
        assert_eq!(gate().check(Some(b"Bearer correct-token ")), Err(AuthFailure::Invalid));
        assert_eq!(gate().check(Some(b"Bearer  correct-token")), Err(AuthFailure::Invalid));
        assert_eq!(gate().check(Some(b"")), Err(AuthFailure::Invalid));
        assert_eq!(gate().check(Some(b"Bearer ")), Err(AuthFailure::Invalid));
    }

    #[test]
    fn test_admit_maps_to_unauthenticated_error() {
        let err = gate().admit(None, &CallerInfo::default()).unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated(AuthFailure::Missing)));
    }
}
