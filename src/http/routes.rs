use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::evaluator::ConditionEvent;
use crate::runner::Phase;
use crate::session::{SessionHandle, SessionSnapshot};
use crate::telemetry::{TelemetryHub, TelemetrySnapshot};

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct DebugHttpState {
    pub session: SessionHandle,
    telemetry: Arc<TelemetryHub>,
    token: Arc<String>,
    started: Instant,
}

impl DebugHttpState {
    pub fn new(session: SessionHandle, telemetry: Arc<TelemetryHub>, token: String) -> Self {
        Self {
            session,
            telemetry,
            token: Arc::new(token),
            started: Instant::now(),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    Backpressure,
    ServiceUnavailable(&'static str),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token"),
            Self::Backpressure => (StatusCode::TOO_MANY_REQUESTS, "command queue saturated"),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SessionError> for HttpServerError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ChannelFull => Self::Backpressure,
            SessionError::Closed | SessionError::InvalidTaskIndex { .. } => {
                Self::ServiceUnavailable("session stopped")
            }
        }
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub session_running: bool,
    pub uptime_ms: u64,
    pub task_index: usize,
    pub phase: Phase,
}

/// Body of `POST /auto-processing`.
#[derive(Debug, Deserialize)]
pub struct AutoProcessingRequest {
    pub enabled: bool,
}

/// Command acknowledgement payload.
#[derive(Debug, Serialize)]
pub struct CommandAck {
    pub accepted: bool,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: DebugHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/snapshot", get(snapshot))
        .route("/telemetry", get(telemetry_snapshot))
        .route("/events", get(events_handler))
        .route("/auto-processing", post(set_auto_processing))
        .route("/condition", post(report_condition))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: DebugHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding debug HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving debug HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let snapshot = state.session.snapshot();
    Ok(Json(HealthResponse {
        status: "ok",
        session_running: !state.session.is_closed(),
        uptime_ms: state.started.elapsed().as_millis() as u64,
        task_index: snapshot.task_index,
        phase: snapshot.phase,
    }))
}

pub async fn snapshot(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<SessionSnapshot>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(Json(state.session.snapshot()))
}

pub async fn telemetry_snapshot(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<TelemetrySnapshot>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(Json(state.telemetry.snapshot()))
}

pub async fn events_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::SessionEventStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    if state.session.is_closed() {
        return Err(HttpServerError::ServiceUnavailable("session stopped"));
    }
    Ok(sse::session_events(&state.session))
}

pub async fn set_auto_processing(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(request): Json<AutoProcessingRequest>,
) -> Result<Json<CommandAck>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    state.session.set_auto_processing(request.enabled).await?;
    Ok(Json(CommandAck { accepted: true }))
}

pub async fn report_condition(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(event): Json<ConditionEvent>,
) -> Result<Json<CommandAck>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    state.session.report_condition(event).await?;
    Ok(Json(CommandAck { accepted: true }))
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_DEBUG_TOKEN: HeaderName = HeaderName::from_static("x-debug-token");

    headers
        .get(&X_DEBUG_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}
