//! Session persistence - store sessions, messages, and events to disk
//!
//! Directory structure:
//! ```text
//! {data_dir}/
//!   sessions/
//!     {session_id}/
//!       session.json   # Session record
//!       messages.jsonl # Chat messages (newline-delimited JSON)
//!       events.jsonl   # Agent events (newline-delimited JSON)
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::model::{SessionRecord, SessionStatus, StoredMessage};
use crate::{Error, Result};

/// File-backed store for sessions and their transcripts
#[derive(Debug, Clone)]
pub struct SessionStore {
    /// Base directory for session storage
    base_dir: PathBuf,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: data_dir.as_ref().join("sessions"),
        }
    }

    fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.base_dir.join(session_id.to_string())
    }

    fn record_path(&self, session_id: Uuid) -> PathBuf {
        self.session_dir(session_id).join("session.json")
    }

    fn messages_path(&self, session_id: Uuid) -> PathBuf {
        self.session_dir(session_id).join("messages.jsonl")
    }

    fn events_path(&self, session_id: Uuid) -> PathBuf {
        self.session_dir(session_id).join("events.jsonl")
    }

    fn ensure_session_dir(&self, session_id: Uuid) -> Result<PathBuf> {
        let dir = self.session_dir(session_id);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    /// Create and persist a new session
    pub fn create_session(&self) -> Result<SessionRecord> {
        let record = SessionRecord::new();
        self.save_session(&record)?;
        Ok(record)
    }

    /// Save a session record
    pub fn save_session(&self, record: &SessionRecord) -> Result<()> {
        self.ensure_session_dir(record.id)?;
        let path = self.record_path(record.id);

        let file = File::create(&path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, record)
            .map_err(|e| Error::Storage(format!("Failed to serialize session: {}", e)))?;

        debug!("Saved session record: {}", path.display());
        Ok(())
    }

    /// Load a session record, returning `None` when it does not exist
    pub fn get_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>> {
        let path = self.record_path(session_id);

        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let record: SessionRecord = serde_json::from_reader(reader)
            .map_err(|e| Error::Storage(format!("Failed to deserialize session: {}", e)))?;

        Ok(Some(record))
    }

    /// List all sessions, newest first
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();

        for entry in fs::read_dir(&self.base_dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let session_id = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => match Uuid::parse_str(name) {
                    Ok(id) => id,
                    Err(_) => continue,
                },
                None => continue,
            };

            match self.get_session(session_id) {
                Ok(Some(record)) => sessions.push(record),
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to load session {}: {}", session_id, e);
                    continue;
                }
            }
        }

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(sessions)
    }

    /// Update a session's status
    ///
    /// A missing session is a no-op rather than an error: the execution may
    /// outlive deletion of the record it reports on.
    pub fn update_status(&self, session_id: Uuid, status: SessionStatus) -> Result<()> {
        let Some(mut record) = self.get_session(session_id)? else {
            return Ok(());
        };
        record.status = status;
        self.save_session(&record)
    }

    /// Append a chat message to a session's transcript
    pub fn append_message(&self, session_id: Uuid, message: &StoredMessage) -> Result<()> {
        self.ensure_session_dir(session_id)?;
        let path = self.messages_path(session_id);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(message)
            .map_err(|e| Error::Storage(format!("Failed to serialize message: {}", e)))?;

        writeln!(writer, "{}", json)?;
        writer.flush()?;

        debug!("Appended message {} to session {}", message.id, session_id);
        Ok(())
    }

    /// Load all chat messages for a session
    pub fn load_messages(&self, session_id: Uuid) -> Result<Vec<StoredMessage>> {
        read_jsonl(&self.messages_path(session_id), "messages")
    }

    /// Append an agent event (wire form) to a session's durable event log
    pub fn append_event(&self, session_id: Uuid, event: &serde_json::Value) -> Result<()> {
        self.ensure_session_dir(session_id)?;
        let path = self.events_path(session_id);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(event)
            .map_err(|e| Error::Storage(format!("Failed to serialize event: {}", e)))?;

        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Load all persisted events for a session
    pub fn load_events(&self, session_id: Uuid) -> Result<Vec<serde_json::Value>> {
        read_jsonl(&self.events_path(session_id), "events")
    }
}

/// Read a newline-delimited JSON file, skipping corrupt lines with a warning
fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut items = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Failed to read line {} in {} file: {}", line_num, what, e);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(
                    "Failed to parse {} entry at line {} in {}: {}",
                    what,
                    line_num,
                    path.display(),
                    e
                );
                continue;
            }
        }
    }

    Ok(items)
}
