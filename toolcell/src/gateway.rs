//! HTTP gateway: a thin front door over the execution pipeline.
//!
//! Blocking pipeline work runs under `spawn_blocking`; the only state is
//! the shared [`ToolExecutor`]. Shutdown destroys any sandboxes still
//! registered and flushes deferred deletions.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use toolcell_core::config::GatewayConfig;
use toolcell_engine::ToolExecutor;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct AppState {
    executor: Arc<ToolExecutor>,
}

/// Start the gateway and block until shutdown.
pub fn serve(listen: Option<String>) -> Result<()> {
    let listen = listen.unwrap_or_else(|| GatewayConfig::from_env().listen);
    let executor = Arc::new(ToolExecutor::from_env());

    let runtime = tokio::runtime::Runtime::new().context("Create tokio runtime")?;
    runtime.block_on(serve_inner(listen, executor.clone()))?;

    // I2: nothing a request created may outlive the process silently.
    executor.sandboxes().destroy_all();
    executor.sandboxes().flush_deferred();
    Ok(())
}

async fn serve_inner(listen: String, executor: Arc<ToolExecutor>) -> Result<()> {
    let state = AppState { executor };

    let app = Router::new()
        .route("/", get(handle_home))
        .route("/health", get(handle_health))
        .route("/tools", get(handle_list_tools))
        .route("/tools/:tool_name", get(handle_tool_details))
        .route("/tools/:tool_name/execute", post(handle_execute))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Bind {}", listen))?;
    tracing::info!(%listen, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}

async fn handle_home() -> impl IntoResponse {
    Json(json!({
        "message": "toolcell gateway running",
        "status": "online",
    }))
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn handle_list_tools(State(state): State<AppState>) -> impl IntoResponse {
    let executor = state.executor.clone();
    let names = tokio::task::spawn_blocking(move || executor.catalog().get_all_tool_names()).await;

    match names {
        Ok(Ok(tools)) => {
            let count = tools.len();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "tools": tools,
                    "count": count,
                    "message": format!("Found {} tools in catalog", count),
                })),
            )
        }
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": e.to_string(), "tools": [] })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": e.to_string(), "tools": [] })),
        ),
    }
}

async fn handle_tool_details(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
) -> impl IntoResponse {
    let executor = state.executor.clone();
    let lookup_name = tool_name.clone();
    let details =
        tokio::task::spawn_blocking(move || executor.catalog().get_tool_details(&lookup_name))
            .await;

    match details {
        Ok(Ok(Some(descriptor))) => (
            StatusCode::OK,
            Json(json!({ "status": "success", "tool": descriptor })),
        ),
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "error",
                "message": format!("Tool '{}' not found in catalog", tool_name),
            })),
        ),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": e.to_string() })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": e.to_string() })),
        ),
    }
}

async fn handle_execute(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
    Json(input): Json<Value>,
) -> impl IntoResponse {
    let executor = state.executor.clone();
    let envelope =
        tokio::task::spawn_blocking(move || executor.execute(&tool_name, &input)).await;

    match envelope {
        Ok(envelope) => {
            let code = if envelope.is_success() {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (code, Json(serde_json::to_value(&envelope).unwrap_or_else(|_| json!({
                "status": "error",
                "message": "envelope serialization failed",
            }))))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": e.to_string() })),
        ),
    }
}
