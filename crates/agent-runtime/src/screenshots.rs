//! Screenshot blob store
//!
//! Tool outputs carry screenshots as (possibly data-URI wrapped) base64.
//! The store decodes them and writes them under a flat directory, handing
//! back a stable URL for the HTTP file route. Every failure path returns
//! `None`: a malformed screenshot must never abort event delivery.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::warn;
use uuid::Uuid;

/// File-backed store for screenshots captured during tool calls
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
    url_prefix: String,
}

impl ScreenshotStore {
    /// Create a store writing into `dir` and returning URLs under `url_prefix`
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into(),
        }
    }

    /// Directory screenshots are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode and persist a raw screenshot payload
    ///
    /// Strips a leading `data:image/...;base64,` prefix if present, decodes
    /// the remainder strictly, and writes `{uuid}.png`. Returns the
    /// retrievable URL, or `None` when the payload is empty or malformed.
    pub fn store(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let payload = if trimmed.starts_with("data:image") {
            match trimmed.split_once(',') {
                Some((_, rest)) => rest,
                None => return None,
            }
        } else {
            trimmed
        };
        if payload.is_empty() {
            return None;
        }

        let binary = STANDARD.decode(payload).ok()?;

        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("Failed to create screenshot directory: {}", e);
            return None;
        }

        let filename = format!("{}.png", Uuid::new_v4().simple());
        let path = self.dir.join(&filename);
        if let Err(e) = fs::write(&path, binary) {
            warn!("Failed to write screenshot {}: {}", path.display(), e);
            return None;
        }

        Some(format!("{}/{}", self.url_prefix, filename))
    }
}
