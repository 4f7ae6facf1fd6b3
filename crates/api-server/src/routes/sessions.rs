//! Session API endpoints
//!
//! RESTful API for creating sessions, submitting messages, and cancelling
//! the in-flight execution.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agent_runtime::RuntimeError;
use bp_core::session::{SessionRecord, StoredMessage};

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub messages: Vec<StoredMessage>,
    pub events: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub ok: bool,
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type RouteError = (StatusCode, Json<ErrorResponse>);

impl SessionResponse {
    fn from_record(
        record: SessionRecord,
        messages: Vec<StoredMessage>,
        events: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            status: record.status.as_str().to_string(),
            messages,
            events,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/sessions - Create a new session
async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, RouteError> {
    let record = state.store().create_session().map_err(internal_error)?;

    Ok(Json(SessionResponse::from_record(
        record,
        Vec::new(),
        Vec::new(),
    )))
}

/// GET /api/sessions/{id} - Fetch a session with its transcript
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, RouteError> {
    let record = state
        .store()
        .get_session(session_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Session not found"))?;

    let messages = state
        .store()
        .load_messages(session_id)
        .map_err(internal_error)?;
    let events = state
        .store()
        .load_events(session_id)
        .map_err(internal_error)?;

    Ok(Json(SessionResponse::from_record(record, messages, events)))
}

/// GET /api/sessions/{id}/events - Fetch the persisted event history
async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<serde_json::Value>>, RouteError> {
    state
        .store()
        .get_session(session_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Session not found"))?;

    let events = state
        .store()
        .load_events(session_id)
        .map_err(internal_error)?;

    Ok(Json(events))
}

/// POST /api/sessions/{id}/messages - Submit a task and start an execution
async fn create_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<Json<StoredMessage>, RouteError> {
    state
        .store()
        .get_session(session_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Session not found"))?;

    // Reject before persisting anything so a conflict leaves no trace.
    if let Some(runtime) = state.registry().get(session_id) {
        if runtime.is_busy() {
            return Err(conflict_error("Agent is already running"));
        }
    }

    let message = StoredMessage::user(req.content.clone());
    state
        .store()
        .append_message(session_id, &message)
        .map_err(internal_error)?;

    match state.executor().start(session_id, req.content) {
        Ok(_) => {}
        Err(RuntimeError::AgentBusy { .. }) => {
            return Err(conflict_error("Agent is already running"))
        }
        Err(err) => return Err(internal_error(err)),
    }

    Ok(Json(message))
}

/// DELETE /api/sessions/{id} - Cancel the in-flight execution
async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, RouteError> {
    state
        .store()
        .get_session(session_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Session not found"))?;

    state.executor().cancel(session_id).await;

    Ok(Json(CancelResponse {
        ok: true,
        session_id,
    }))
}

// ============================================================================
// Router
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).delete(cancel_session),
        )
        .route("/api/sessions/{id}/events", get(session_events))
        .route("/api/sessions/{id}/messages", post(create_message))
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn internal_error(error: impl std::fmt::Display) -> RouteError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub(crate) fn not_found(error: impl Into<String>) -> RouteError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub(crate) fn conflict_error(error: impl Into<String>) -> RouteError {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use agent_runtime::MockBackend;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::{AgentMode, Config};

    fn build_state(delay: Duration) -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            bind_addr: std::net::SocketAddr::from(([127, 0, 0, 1], 0)),
            agent_mode: AgentMode::Mock,
            worker_url: "http://localhost:4000".to_string(),
            screenshot_dir: temp_dir.path().join("screenshots"),
            screenshot_url_prefix: "/api/files/screenshots".to_string(),
            session_idle_timeout: Duration::from_secs(3600),
        };
        let state = AppState::with_backend(config, Arc::new(MockBackend::new(delay)));
        (state, temp_dir)
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_create_session_returns_idle_session() {
        let (state, _temp) = build_state(Duration::ZERO);
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let payload = response_json(response).await;
        assert_eq!(payload["status"], "idle");
        assert!(payload["messages"].as_array().unwrap().is_empty());
        assert!(payload["events"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_not_found() {
        let (state, _temp) = build_state(Duration::ZERO);
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/sessions/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_message_starts_execution() {
        let (state, _temp) = build_state(Duration::ZERO);
        let session = state.store().create_session().unwrap();
        let app = router().with_state(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/sessions/{}/messages", session.id))
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({"content": "find the docs"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let payload = response_json(response).await;
        assert_eq!(payload["role"], "user");
        assert_eq!(payload["content"], "find the docs");

        assert!(state.registry().get(session.id).is_some());
    }

    #[tokio::test]
    async fn test_second_message_conflicts_while_running() {
        // Long enough that the first execution is still running.
        let (state, _temp) = build_state(Duration::from_secs(30));
        let session = state.store().create_session().unwrap();
        let app = router().with_state(state.clone());

        let post = |content: &str| {
            Request::builder()
                .method("POST")
                .uri(format!("/api/sessions/{}/messages", session.id))
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "content": content }).to_string()))
                .unwrap()
        };

        let first = app.clone().oneshot(post("first")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.clone().oneshot(post("second")).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        // The rejected message left no trace in the transcript.
        let messages = state.store().load_messages(session.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "first");

        state.executor().cancel(session.id).await;
    }

    #[tokio::test]
    async fn test_cancel_session_stops_execution() {
        let (state, _temp) = build_state(Duration::from_secs(30));
        let session = state.store().create_session().unwrap();
        let app = router().with_state(state.clone());

        state
            .executor()
            .start(session.id, "browse".to_string())
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/sessions/{}", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let payload = response_json(response).await;
        assert_eq!(payload["ok"], true);
        assert_eq!(payload["sessionId"], session.id.to_string());

        let runtime = state.registry().get(session.id).unwrap();
        assert!(!runtime.is_busy());
        assert!(runtime.event_log().unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_get_session_includes_transcript() {
        let (state, _temp) = build_state(Duration::ZERO);
        let session = state.store().create_session().unwrap();

        state
            .store()
            .append_message(session.id, &StoredMessage::user("hello"))
            .unwrap();
        state
            .store()
            .append_event(session.id, &json!({"type": "token", "data": {"text": "hi"}}))
            .unwrap();

        let app = router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/sessions/{}", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let payload = response_json(response).await;
        assert_eq!(payload["messages"].as_array().unwrap().len(), 1);
        assert_eq!(payload["events"][0]["type"], "token");
    }
}
