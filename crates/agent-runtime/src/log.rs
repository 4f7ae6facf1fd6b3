//! Append-only event log with cursor-based consumption
//!
//! One `EventLog` exists per agent execution. The producer appends events
//! in publish order; any number of consumers read the same sequence from
//! their own cursors, blocking at the tail until a new event arrives or the
//! log closes. A terminal event (`done` / `error`) closes the log exactly
//! once; nothing can be published afterwards.

use std::sync::Mutex;

use tokio::sync::watch;

use crate::error::{Result, RuntimeError};
use crate::event::AgentEvent;

#[derive(Debug)]
pub struct EventLog {
    inner: Mutex<LogInner>,
    /// Bumped on every publish to wake blocked consumers
    version: watch::Sender<u64>,
}

#[derive(Debug, Default)]
struct LogInner {
    events: Vec<AgentEvent>,
    closed: bool,
}

impl EventLog {
    /// Create a new, open, empty log
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Mutex::new(LogInner::default()),
            version,
        }
    }

    /// Append an event, closing the log if the event is terminal
    ///
    /// Publishing after the log has closed is a programming error and is
    /// rejected with `RuntimeError::LogClosed`; the sequence is unchanged.
    pub fn publish(&self, event: AgentEvent) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return Err(RuntimeError::LogClosed);
            }
            let terminal = event.is_terminal();
            inner.events.push(event);
            if terminal {
                inner.closed = true;
            }
        }
        self.version.send_modify(|v| *v += 1);
        Ok(())
    }

    /// Read the event at `cursor`, waiting for it if the log is still open
    ///
    /// Returns `(Some(event), cursor + 1)` once the event exists, or
    /// `(None, cursor)` when the log has closed and the cursor is at the
    /// tail. The wait loop re-checks both conditions after every wakeup.
    pub async fn next(&self, cursor: usize) -> (Option<AgentEvent>, usize) {
        let mut version = self.version.subscribe();
        loop {
            {
                let inner = self.inner.lock().unwrap();
                if cursor < inner.events.len() {
                    return (Some(inner.events[cursor].clone()), cursor + 1);
                }
                if inner.closed {
                    return (None, cursor);
                }
            }
            // The sender lives in `self`, so `changed` only fails if the
            // log is being dropped; the re-check above handles both cases.
            let _ = version.changed().await;
        }
    }

    /// Number of events published so far
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a terminal event has been published
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_replay_from_zero_preserves_order() {
        let log = EventLog::new();
        log.publish(AgentEvent::token("a")).unwrap();
        log.publish(AgentEvent::token("b")).unwrap();
        log.publish(AgentEvent::done("ab")).unwrap();

        let (first, cursor) = log.next(0).await;
        assert_eq!(first.unwrap().data["text"], "a");
        let (second, cursor) = log.next(cursor).await;
        assert_eq!(second.unwrap().data["text"], "b");
        let (third, cursor) = log.next(cursor).await;
        assert_eq!(third.unwrap().kind, EventKind::Done);
        let (end, end_cursor) = log.next(cursor).await;
        assert!(end.is_none());
        assert_eq!(end_cursor, cursor);
    }

    #[tokio::test]
    async fn test_publish_after_close_fails_without_mutation() {
        let log = EventLog::new();
        log.publish(AgentEvent::done("finished")).unwrap();
        assert!(log.is_closed());

        let result = log.publish(AgentEvent::token("late"));
        assert!(matches!(result, Err(RuntimeError::LogClosed)));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_next_past_tail_after_close_returns_immediately() {
        let log = EventLog::new();
        log.publish(AgentEvent::error("boom")).unwrap();

        let (event, cursor) = timeout(Duration::from_millis(100), log.next(1))
            .await
            .expect("should not block");
        assert!(event.is_none());
        assert_eq!(cursor, 1);
    }

    #[tokio::test]
    async fn test_blocked_consumer_wakes_on_publish() {
        let log = Arc::new(EventLog::new());

        let reader = {
            let log = Arc::clone(&log);
            tokio::spawn(async move { log.next(0).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        log.publish(AgentEvent::token("wake")).unwrap();

        let (event, cursor) = timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should wake")
            .unwrap();
        assert_eq!(event.unwrap().data["text"], "wake");
        assert_eq!(cursor, 1);
    }

    #[tokio::test]
    async fn test_blocked_consumer_wakes_on_close() {
        let log = Arc::new(EventLog::new());
        log.publish(AgentEvent::token("only")).unwrap();

        let reader = {
            let log = Arc::clone(&log);
            tokio::spawn(async move { log.next(1).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        log.publish(AgentEvent::done("only")).unwrap();

        let (event, _) = timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should wake")
            .unwrap();
        assert_eq!(event.unwrap().kind, EventKind::Done);
    }

    #[tokio::test]
    async fn test_concurrent_consumers_observe_identical_sequence() {
        let log = Arc::new(EventLog::new());

        let drain = |log: Arc<EventLog>, start: usize| async move {
            let mut cursor = start;
            let mut seen = Vec::new();
            loop {
                let (event, next) = log.next(cursor).await;
                match event {
                    Some(event) => {
                        seen.push(event);
                        cursor = next;
                    }
                    None => break,
                }
            }
            seen
        };

        let early = tokio::spawn(drain(Arc::clone(&log), 0));

        for i in 0..10 {
            log.publish(AgentEvent::token(format!("t{}", i))).unwrap();
        }
        log.publish(AgentEvent::done("all")).unwrap();

        // A late reader starting from zero replays the full history.
        let late = tokio::spawn(drain(Arc::clone(&log), 0));

        let early = early.await.unwrap();
        let late = late.await.unwrap();

        assert_eq!(early.len(), 11);
        assert_eq!(late.len(), 11);
        for (a, b) in early.iter().zip(late.iter()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.data, b.data);
        }
    }

    #[tokio::test]
    async fn test_resume_from_cursor_skips_replayed_prefix() {
        let log = EventLog::new();
        for i in 0..5 {
            log.publish(AgentEvent::token(format!("t{}", i))).unwrap();
        }
        log.publish(AgentEvent::done("all")).unwrap();

        let (event, cursor) = log.next(3).await;
        assert_eq!(event.unwrap().data["text"], "t3");
        assert_eq!(cursor, 4);
    }
}
