use crate::adapters::openshock::{DownstreamClient, DownstreamSettings};
use crate::app::rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcHandler, ServerInfo};
use crate::core::auth::{AuthGate, CallerInfo};
use crate::core::dispatcher::CommandDispatcher;
use crate::domain::model::{AuthToken, CommandKind, LimitPolicy};
use crate::domain::ports::DeviceControl;
use crate::utils::error::{GatewayError, Result};
use crate::utils::logger::{self, REQUEST_ID_HEADER};
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT, WWW_AUTHENTICATE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::Instrument;

pub const HEALTH_PATH: &str = "/health";
pub const MCP_PATH: &str = "/mcp";

/// Gateway-side settings; the device credential lives in [`DownstreamSettings`].
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub server_name: String,
    pub server_version: String,
    pub auth_token: AuthToken,
    pub policy: LimitPolicy,
}

#[derive(Clone)]
struct AppState {
    auth: Arc<AuthGate>,
    rpc: Arc<RpcHandler>,
}

/// Composition root: auth gate in front of the dispatcher, one shared
/// downstream connection pool for the process lifetime.
pub struct Gateway {
    state: AppState,
}

impl Gateway {
    /// Builds the pooled downstream client once and wires it in.
    pub fn new(settings: GatewaySettings, downstream: &DownstreamSettings) -> Result<Self> {
        let client = DownstreamClient::new(downstream)?;
        tracing::info!(
            control_url = %client.control_url(),
            timeout = ?downstream.timeout,
            "Device API client ready"
        );
        Ok(Self::with_device(settings, Arc::new(client)))
    }

    pub fn with_device(settings: GatewaySettings, device: Arc<dyn DeviceControl>) -> Self {
        let dispatcher = CommandDispatcher::new(device, settings.policy);
        let info = ServerInfo {
            name: settings.server_name,
            version: settings.server_version,
        };

        Self {
            state: AppState {
                auth: Arc::new(AuthGate::new(settings.auth_token)),
                rpc: Arc::new(RpcHandler::new(dispatcher, info)),
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(HEALTH_PATH, get(health_handler))
            .route("/", get(info_handler))
            .route(MCP_PATH, post(mcp_handler))
            .layer(middleware::from_fn_with_state(self.state.clone(), require_auth))
            .layer(middleware::from_fn(trace_request))
            .with_state(self.state.clone())
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Gateway listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Wraps the whole request, auth included, in a span keyed by request id
/// and echoes the id back to the caller.
async fn trace_request(request: Request, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    let request_id = logger::request_id(request.headers().get(&header).and_then(|v| v.to_str().ok()));
    let span = logger::request_span(&request_id, request.method().as_str(), request.uri().path());

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(header, value);
    }
    response
}

/// Every path except the health check must pass the auth gate.
async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.uri().path() == HEALTH_PATH {
        return next.run(request).await;
    }

    let caller = CallerInfo {
        remote_addr: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0),
        user_agent: request
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        path: request.uri().path().to_string(),
    };

    let header = request.headers().get(AUTHORIZATION).map(|v| v.as_bytes());
    match state.auth.admit(header, &caller) {
        Ok(()) => next.run(request).await,
        Err(e) => unauthenticated_response(&e),
    }
}

fn unauthenticated_response(err: &GatewayError) -> Response {
    // Missing and invalid credentials look the same from the outside.
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
    (
        status,
        [(WWW_AUTHENTICATE, "Bearer")],
        Json(json!({
            "error": {
                "kind": err.kind(),
                "message": "Invalid authentication token",
            }
        })),
    )
        .into_response()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let info = state.rpc.info();
    Json(json!({
        "status": "healthy",
        "server": info.name,
        "version": info.version,
    }))
}

async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    let info = state.rpc.info();
    let tools: Vec<&str> = CommandKind::ALL.iter().map(|k| k.as_str()).collect();

    Json(json!({
        "name": info.name,
        "version": info.version,
        "protocol": "MCP",
        "tools": tools,
        "max_shock_intensity": state.rpc.dispatcher().policy().max_intensity,
        "auth_configured": state.auth.is_configured(),
        "endpoints": {
            "mcp": format!("POST {}", MCP_PATH),
            "health": format!("GET {}", HEALTH_PATH),
            "info": "GET /",
        }
    }))
}

async fn mcp_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed JSON-RPC payload");
            return event_stream_response(&JsonRpcResponse::error(None, JsonRpcError::parse_error(&e)));
        }
    };

    match state.rpc.handle(request).await {
        Some(response) => event_stream_response(&response),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Wraps a JSON-RPC response in a single server-sent-event frame.
fn event_stream_response(response: &JsonRpcResponse) -> Response {
    let payload = match serde_json::to_string(response) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize JSON-RPC response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from(format!("data: {}\n\n", payload)),
    )
        .into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
