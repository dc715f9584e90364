use crate::adapters::openshock::{DownstreamSettings, DEFAULT_API_URL};
use crate::app::gateway::GatewaySettings;
use crate::domain::model::{AuthToken, DeviceCredential, LimitPolicy};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_positive_number, validate_range, validate_secret, validate_url, Validate,
};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "openshock-gateway")]
#[command(about = "Authenticated MCP gateway in front of the OpenShock device API")]
pub struct GatewayConfig {
    /// Credential sent to the device API as `OpenShockToken`
    #[arg(long, env = "OPENSHOCK_API_TOKEN", hide_env_values = true)]
    pub openshock_api_token: DeviceCredential,

    #[arg(long, env = "OPENSHOCK_API_URL", default_value = DEFAULT_API_URL)]
    pub openshock_api_url: String,

    /// Token callers must present in the Authorization header
    #[arg(long, env = "MCP_AUTH_TOKEN", hide_env_values = true)]
    pub mcp_auth_token: AuthToken,

    /// Ceiling for SHOCK intensity, 0 = unrestricted
    #[arg(long, env = "MAX_SHOCK_INTENSITY", default_value = "0")]
    pub max_shock_intensity: u8,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    #[arg(long, env = "MCP_SERVER_NAME", default_value = "openshock-mcp-server")]
    pub server_name: String,

    #[arg(long, env = "MCP_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub server_version: String,

    #[arg(long, env = "DOWNSTREAM_TIMEOUT_SECS", default_value = "30")]
    pub downstream_timeout_secs: u64,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl GatewayConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn limit_policy(&self) -> LimitPolicy {
        LimitPolicy::new(self.max_shock_intensity)
    }

    pub fn downstream_settings(&self) -> Result<DownstreamSettings> {
        Ok(DownstreamSettings {
            base_url: validate_url("openshock_api_url", &self.openshock_api_url)?,
            credential: self.openshock_api_token.clone(),
            timeout: Duration::from_secs(self.downstream_timeout_secs),
        })
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            server_name: self.server_name.clone(),
            server_version: self.server_version.clone(),
            auth_token: self.mcp_auth_token.clone(),
            policy: self.limit_policy(),
        }
    }
}

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<()> {
        validate_secret("openshock_api_token", self.openshock_api_token.expose())?;
        validate_secret("mcp_auth_token", self.mcp_auth_token.expose())?;
        validate_url("openshock_api_url", &self.openshock_api_url)?;
        validate_range("max_shock_intensity", self.max_shock_intensity, 0, 100)?;
        validate_positive_number("downstream_timeout_secs", self.downstream_timeout_secs, 1)?;

        if self.openshock_api_token.expose() == self.mcp_auth_token.expose() {
            tracing::warn!("Gateway auth token and device API credential are identical; use distinct secrets");
        }

        Ok(())
    }
}
