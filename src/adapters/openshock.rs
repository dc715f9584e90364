use crate::domain::model::{DeviceCredential, EffectKind};
use crate::domain::ports::DeviceControl;
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.openshock.app";
const CONTROL_PATH: &str = "2/shockers/control";
const CREDENTIAL_HEADER: &str = "OpenShockToken";
const STOP_CONTROL_TYPE: u8 = 0;
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct DownstreamSettings {
    pub base_url: Url,
    pub credential: DeviceCredential,
    pub timeout: Duration,
}

/// One control instruction as the device API expects it.
#[derive(Debug, Serialize)]
struct ControlRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    control_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    intensity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u16>,
}

fn control_type(effect: EffectKind) -> u8 {
    match effect {
        EffectKind::Shock => 1,
        EffectKind::Vibrate => 2,
        EffectKind::Beep => 3,
    }
}

/// Pooled HTTP connector to the device-control API.
///
/// Built once at startup; `reqwest::Client` is internally reference-counted
/// so cloning shares the same pool.
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    client: Client,
    control_url: Url,
}

impl DownstreamClient {
    pub fn new(settings: &DownstreamSettings) -> Result<Self> {
        let mut credential = HeaderValue::from_str(settings.credential.expose()).map_err(|_| {
            GatewayError::ConfigError {
                message: "device API credential contains characters not allowed in a header".to_string(),
            }
        })?;
        credential.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CREDENTIAL_HEADER, credential);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            control_url: control_url(&settings.base_url)?,
        })
    }

    pub fn control_url(&self) -> &Url {
        &self.control_url
    }

    async fn send_control(&self, target_id: &str, request: ControlRequest<'_>) -> Result<()> {
        tracing::debug!(
            target_id = %target_id,
            control_type = request.control_type,
            "Sending control request to device API"
        );

        let response = self
            .client
            .post(self.control_url.clone())
            .json(&[request])
            .send()
            .await
            .map_err(|e| downstream_failure(target_id, None, describe_transport_error(&e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(target_id = %target_id, status = status.as_u16(), "Device API accepted control request");
            return Ok(());
        }

        // 錯誤回應內容只保留前段，避免過長的日誌
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        let reason = if excerpt.trim().is_empty() {
            format!("device API returned {}", status)
        } else {
            format!("device API returned {}: {}", status, excerpt.trim())
        };

        Err(downstream_failure(target_id, Some(status.as_u16()), reason))
    }
}

#[async_trait]
impl DeviceControl for DownstreamClient {
    async fn apply_effect(
        &self,
        target_id: &str,
        effect: EffectKind,
        intensity: u8,
        duration_ms: u16,
    ) -> Result<()> {
        self.send_control(
            target_id,
            ControlRequest {
                id: target_id,
                control_type: control_type(effect),
                intensity: Some(intensity),
                duration: Some(duration_ms),
            },
        )
        .await
    }

    async fn stop(&self, target_id: &str) -> Result<()> {
        self.send_control(
            target_id,
            ControlRequest {
                id: target_id,
                control_type: STOP_CONTROL_TYPE,
                intensity: None,
                duration: None,
            },
        )
        .await
    }
}

fn control_url(base_url: &Url) -> Result<Url> {
    // 確保 base path 以 "/" 結尾，join 時才不會覆蓋最後一段
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(CONTROL_PATH).map_err(|e| GatewayError::InvalidConfigValueError {
        field: "openshock_api_url".to_string(),
        value: base_url.to_string(),
        reason: format!("cannot build control endpoint: {}", e),
    })
}

fn downstream_failure(target_id: &str, status_code: Option<u16>, reason: String) -> GatewayError {
    GatewayError::DownstreamFailure {
        target_id: target_id.to_string(),
        status_code,
        reason,
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request to device API timed out".to_string()
    } else if err.is_connect() {
        format!("could not connect to device API: {}", err)
    } else {
        format!("request to device API failed: {}", err)
    }
}
