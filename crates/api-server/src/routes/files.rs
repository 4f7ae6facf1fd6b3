//! Screenshot file serving

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::sessions::{not_found, RouteError};
use crate::state::AppState;

/// GET /api/files/screenshots/{filename} - Serve a stored screenshot
async fn get_screenshot(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, RouteError> {
    // The store writes flat uuid filenames; anything else is not ours.
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(not_found("Screenshot not found"));
    }

    let path = state.screenshots().dir().join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response()),
        Err(_) => Err(not_found("Screenshot not found")),
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/files/screenshots/{filename}", get(get_screenshot))
}
