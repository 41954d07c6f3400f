//! HTTP server implementation.
//!
//! This module provides the axum router and the listener lifecycle.

use axum::{
    Router,
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::params::{get_bool, parse_date, task_update_from_json};
use crate::error::{ApiError, ApiResult};
use crate::planner::{Planner, to_response};
use crate::types::{NewTask, TaskResponse};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Server state shared across handlers.
#[derive(Clone)]
pub struct ApiServer {
    planner: Arc<Planner>,
}

impl ApiServer {
    pub fn new(planner: Arc<Planner>) -> Self {
        Self { planner }
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }
}

/// Authenticated caller, taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())
            .map(|user_id| AuthUser(user_id.to_string()))
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    date: Option<String>,
}

/// Materialized listing for one date (today by default).
async fn list_tasks(
    State(state): State<ApiServer>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let date = query
        .date
        .as_deref()
        .map(|raw| parse_date("date", raw))
        .transpose()?;

    let listing = state.planner().list_for_date(&user_id, date)?;
    Ok(Json(listing.responses()))
}

async fn create_task(
    State(state): State<ApiServer>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let task = state.planner().create_task(&user_id, input)?;
    Ok((StatusCode::CREATED, Json(to_response(&task))))
}

async fn get_task(
    State(state): State<ApiServer>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskResponse>> {
    let task = state.planner().get_task(&user_id, &task_id)?;
    Ok(Json(to_response(&task)))
}

async fn update_task(
    State(state): State<ApiServer>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<TaskResponse>> {
    let update = task_update_from_json(&body)?;
    let task = state.planner().update_task(&user_id, &task_id, update)?;
    Ok(Json(to_response(&task)))
}

async fn delete_task(
    State(state): State<ApiServer>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.planner().delete_task(&user_id, &task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Complete (or with `{"completed": false}`, reopen) a real or virtual task.
async fn complete_task(
    State(state): State<ApiServer>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<TaskResponse>> {
    let completed = if body.iter().all(u8::is_ascii_whitespace) {
        true
    } else {
        let args: Value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::invalid_value("body", &e.to_string()))?;
        get_bool(&args, "completed")?.unwrap_or(true)
    };

    let task = state
        .planner()
        .set_completion(&user_id, &task_id, completed)?;
    Ok(Json(to_response(&task)))
}

/// API root - returns available endpoints.
async fn api_root() -> impl IntoResponse {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "tasks": "/api/tasks?date=YYYY-MM-DD",
            "complete": "/api/tasks/{id}/complete",
        }
    }))
}

/// Build the router with all routes.
pub fn build_router(state: ApiServer) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", get(api_root))
        .route("/api/health", get(health))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/api/tasks/{task_id}/complete", post(complete_task))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the given address.
///
/// Returns a oneshot sender that can be used to signal shutdown,
/// and the actual address the server is bound to.
pub async fn start_server(
    planner: Arc<Planner>,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(ApiServer::new(planner));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Planner API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Planner API shutting down");
            })
            .await
        {
            tracing::error!("Planner API server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
