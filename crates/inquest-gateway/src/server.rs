//! Gateway server: websocket fan-out plus health endpoint

use crate::auth::ResolvedAuth;
use crate::ws::{handle_connection, WsState};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use inquest_core::{EngineConfig, GatewayConfig, RuntimeConfig};
use inquest_runtime::SessionRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct GatewayLaunchConfig {
    pub gateway: GatewayConfig,
    pub engine: EngineConfig,
    pub runtime: RuntimeConfig,
    /// Pacing between frames of a `start_demo` playback.
    pub demo_frame_delay: Duration,
}

impl Default for GatewayLaunchConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            engine: EngineConfig::default(),
            runtime: RuntimeConfig::default(),
            demo_frame_delay: Duration::from_millis(400),
        }
    }
}

pub async fn start_gateway(config: GatewayLaunchConfig) -> anyhow::Result<()> {
    let env_token = std::env::var("INQUEST_GATEWAY_TOKEN").ok();
    let auth = ResolvedAuth::from_config(&config.gateway.auth, env_token);

    let registry = Arc::new(SessionRegistry::new(config.engine, config.runtime));
    let state = Arc::new(WsState {
        auth,
        registry,
        demo_frame_delay: config.demo_frame_delay,
        started_at: std::time::Instant::now(),
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state);

    let bind_addr: SocketAddr = format!(
        "{}:{}",
        config.gateway.bind.to_addr(),
        config.gateway.port
    )
    .parse()?;

    info!("Inquest gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  WebSocket:    ws://{}/ws", bind_addr);
    info!("  Auth mode:    {:?}", config.gateway.auth.mode);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn health_handler(State(state): State<Arc<WsState>>) -> impl IntoResponse {
    serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    })
    .to_string()
}
