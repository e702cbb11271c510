//! HTTP router for the gateway.
//!
//! ## Endpoints
//!
//! - `POST /api/execute` - submit code, receive a session id
//! - `GET /ws` - WebSocket event protocol
//! - `GET /health` - liveness and active session count

use crate::proto::{validate_submission, ExecuteRequest, ExecuteResponse};
use crate::ws;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use kiln_core::{SessionId, SessionRegistry};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
}

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    tracing::debug!("Building HTTP router");

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/execute", post(execute_handler))
        .route("/ws", get(ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness check with the active session count.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    tracing::trace!("Health check request");
    Json(serde_json::json!({
        "status": "ok",
        "active_sessions": state.registry.count().await,
    }))
}

/// Submit code over plain HTTP.
///
/// Responds with the session id immediately; the run launches in the
/// background and its events flow to whichever WebSocket subscriber joins
/// the session. Launch failures are reported as `error` events.
async fn execute_handler(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> impl IntoResponse {
    if let Err(reason) = validate_submission(&request.code, request.language.as_deref()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": reason })),
        )
            .into_response();
    }

    let id = SessionId::new();
    let registry = state.registry.clone();
    let code = request.code;
    tokio::spawn(async move {
        if let Err(e) = registry.launch(id, &code).await {
            // Already finalized and reported through the session's events.
            tracing::warn!(session_id = %id, error = %e, "Launch failed");
        }
    });

    tracing::info!(session_id = %id, "Execution requested via HTTP");
    Json(ExecuteResponse {
        session_id: id.to_string(),
        message: "code execution started".into(),
    })
    .into_response()
}

/// Upgrade to the WebSocket event protocol.
async fn ws_handler(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| ws::handle_socket(state, socket))
}

/// Start the HTTP server, running until the shutdown future resolves.
pub async fn serve(
    state: AppState,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(state);

    tracing::info!(%addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{CoreConfig, ProcessProvider};
    use kiln_runtime::RuntimeConfig;

    #[test]
    fn test_build_router() {
        let provider = ProcessProvider::new(RuntimeConfig::default());
        let registry = SessionRegistry::new(provider, CoreConfig::default());
        let _router = build_router(AppState { registry });
        // Router builds without panic.
    }
}
