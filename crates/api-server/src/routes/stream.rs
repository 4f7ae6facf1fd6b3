//! Live event stream endpoint
//!
//! Replays a session's event log over SSE from an optional resume cursor,
//! then follows the live tail until the terminal event closes the stream.
//! A reconnecting client passes the count of events it has already seen as
//! `?cursor=N`; a client without one replays from the start.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use uuid::Uuid;

use agent_runtime::EventLog;

use super::sessions::{not_found, RouteError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub cursor: Option<usize>,
}

/// GET /api/sessions/{id}/stream - Follow a session's event stream
async fn stream_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, RouteError> {
    let log = state
        .registry()
        .get(session_id)
        .and_then(|runtime| runtime.event_log())
        .ok_or_else(|| not_found("No active agent run"))?;

    let cursor = query.cursor.unwrap_or(0);

    Ok(Sse::new(event_stream(log, cursor)).keep_alive(KeepAlive::default()))
}

fn event_stream(
    log: Arc<EventLog>,
    cursor: usize,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold((log, cursor), |(log, cursor)| async move {
        let (event, next) = log.next(cursor).await;
        event.map(|event| {
            let frame = Event::default()
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().data("{}"));
            (Ok(frame), (log, next))
        })
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/sessions/{id}/stream", get(stream_session))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use agent_runtime::MockBackend;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
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

    #[tokio::test]
    async fn test_stream_without_runtime_is_not_found() {
        let (state, _temp) = build_state(Duration::ZERO);
        let session = state.store().create_session().unwrap();
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/sessions/{}/stream", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_delivers_events_until_done() {
        let (state, _temp) = build_state(Duration::ZERO);
        let session = state.store().create_session().unwrap();

        state
            .executor()
            .start(session.id, "find the docs".to_string())
            .unwrap();

        let app = router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/sessions/{}/stream", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        // The body ends once the terminal event is delivered.
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("\"type\":\"token\""));
        assert!(text.contains("\"type\":\"done\""));
    }

    #[tokio::test]
    async fn test_stream_resumes_from_cursor() {
        let (state, _temp) = build_state(Duration::ZERO);
        let session = state.store().create_session().unwrap();

        let log = state
            .executor()
            .start(session.id, "find the docs".to_string())
            .unwrap();

        // Wait for the execution to finish so the replay is deterministic.
        let mut cursor = 0;
        loop {
            let (event, next) = log.next(cursor).await;
            if event.is_none() {
                break;
            }
            cursor = next;
        }

        let app = router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/sessions/{}/stream?cursor=1", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(!text.contains("\"type\":\"token\""));
        assert!(text.contains("\"type\":\"done\""));
    }
}
