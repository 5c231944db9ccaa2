use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::engine::LightState;
use crate::pico::PicoState;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    remotes: usize,
}

/// One configured remote and what it last did
#[derive(Serialize)]
struct RemoteResponse {
    device_id: String,
    light_entity_id: String,
    app_entity_id: String,
    state: Option<PicoState>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            remotes: state.engine.pico().registry().len(),
        }),
    )
}

/// Handler for GET /v1/remotes
#[tracing::instrument(skip(state))]
async fn remotes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();

    let remotes: Vec<RemoteResponse> = state
        .engine
        .pico()
        .registry()
        .iter()
        .map(|trigger| RemoteResponse {
            device_id: trigger.device_id.clone(),
            light_entity_id: trigger.light_entity_id.clone(),
            app_entity_id: trigger.app_entity_id.clone(),
            state: snapshot.remotes.get(&trigger.app_entity_id).cloned(),
        })
        .collect();

    (StatusCode::OK, Json(remotes))
}

/// Handler for GET /v1/lights
#[tracing::instrument(skip(state))]
async fn lights(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();
    let lights: BTreeMap<String, LightState> = snapshot
        .lights
        .iter()
        .map(|(id, light)| (id.clone(), light.clone()))
        .collect();

    (StatusCode::OK, Json(lights))
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/remotes", get(remotes))
        .route("/v1/lights", get(lights))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Serves until `shutdown_rx` fires, then shuts down gracefully.
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
