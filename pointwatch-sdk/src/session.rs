//! Publisher session lifecycle.
//!
//! A session goes `Created -> Started -> Stopped`. Records can only be
//! submitted while started. Each submission is independent: a failure is
//! logged and counted, and the next submission is attempted as usual.

use std::fmt;

use thiserror::Error;

use pointwatch_types::{ErrorKind, MonitorPointRecord};

use crate::sink::{Sink, SinkConnection};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Started,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Started => "started",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Errors raised by a publisher session.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The sink could not be opened.
    #[error("cannot open sink {sink}: {source}")]
    Start {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    /// The session is not in a state that allows the operation.
    #[error("session is {0}")]
    InvalidState(SessionState),

    /// A record could not be delivered.
    #[error("cannot deliver record: {0}")]
    Send(#[from] std::io::Error),
}

impl PublishError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Start { .. } => ErrorKind::SessionStartFailure,
            PublishError::InvalidState(SessionState::Created) => ErrorKind::SessionStartFailure,
            PublishError::InvalidState(_) | PublishError::Send(_) => ErrorKind::PublishFailure,
        }
    }
}

/// A connection to the sink for the duration of one cycle.
///
/// # Example
///
/// ```rust
/// use pointwatch_sdk::{PublisherSession, Sink};
/// use pointwatch_types::{MonitorPointId, MonitorPointRecord};
///
/// #[tokio::main]
/// async fn main() {
///     let (sink, _rx) = Sink::channel(16);
///     let mut session = PublisherSession::new(sink);
///
///     session.start().await.unwrap();
///     let id = MonitorPointId::fixed("Array-Laser-Locked");
///     let record = MonitorPointRecord::builder(id, 1.0).build();
///     assert!(session.submit(&record).await);
///     session.stop().await;
///
///     assert_eq!(session.submitted(), 1);
/// }
/// ```
#[derive(Debug)]
pub struct PublisherSession {
    sink: Sink,
    state: SessionState,
    connection: Option<SinkConnection>,
    submitted: u64,
    failed: u64,
}

impl PublisherSession {
    /// Create a session for `sink`. Nothing is opened yet.
    pub fn new(sink: Sink) -> Self {
        Self {
            sink,
            state: SessionState::Created,
            connection: None,
            submitted: 0,
            failed: 0,
        }
    }

    /// Open the sink.
    ///
    /// Only valid once, from `Created`.
    pub async fn start(&mut self) -> Result<(), PublishError> {
        if self.state != SessionState::Created {
            return Err(PublishError::InvalidState(self.state));
        }

        let connection = self.sink.open().await.map_err(|source| PublishError::Start {
            sink: self.sink.to_string(),
            source,
        })?;

        tracing::debug!(sink = %self.sink, "Publisher session started");
        self.connection = Some(connection);
        self.state = SessionState::Started;
        Ok(())
    }

    /// Submit one record.
    ///
    /// Returns whether the record was delivered. Failures are logged and
    /// counted but never propagated.
    pub async fn submit(&mut self, record: &MonitorPointRecord) -> bool {
        let result = match (&self.state, self.connection.as_mut()) {
            (SessionState::Started, Some(connection)) => {
                connection.send(record).await.map_err(PublishError::from)
            }
            _ => Err(PublishError::InvalidState(self.state)),
        };

        match result {
            Ok(()) => {
                self.submitted += 1;
                tracing::debug!(id = %record.id(), value = %record.value(), "Submitted");
                true
            }
            Err(e) => {
                self.failed += 1;
                tracing::warn!(id = %record.id(), error = %e, kind = %e.kind(), "Submission failed");
                false
            }
        }
    }

    /// Release the sink.
    ///
    /// Idempotent: stopping a stopped session does nothing.
    pub async fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.state = SessionState::Stopped;

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                tracing::warn!(sink = %self.sink, error = %e, "Error closing sink");
            }
            tracing::debug!(
                sink = %self.sink,
                submitted = self.submitted,
                failed = self.failed,
                "Publisher session stopped"
            );
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Records delivered so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Records that could not be delivered.
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

impl Drop for PublisherSession {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::warn!(sink = %self.sink, "Publisher session dropped without stop");
            connection.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionEvent;
    use pointwatch_types::MonitorPointId;

    fn record(id: &str) -> MonitorPointRecord {
        MonitorPointRecord::builder(MonitorPointId::fixed(id), 1.0).build()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (sink, mut rx) = Sink::channel(16);
        let mut session = PublisherSession::new(sink);
        assert_eq!(session.state(), SessionState::Created);

        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Started);

        assert!(session.submit(&record("A")).await);
        assert!(session.submit(&record("B")).await);
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.submitted(), 2);

        assert_eq!(rx.recv().await, Some(SessionEvent::Started));
        assert!(matches!(rx.recv().await, Some(SessionEvent::Record(r)) if r.id().as_str() == "A"));
        assert!(matches!(rx.recv().await, Some(SessionEvent::Record(r)) if r.id().as_str() == "B"));
        assert_eq!(rx.recv().await, Some(SessionEvent::Stopped));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (sink, mut rx) = Sink::channel(16);
        let mut session = PublisherSession::new(sink);
        session.start().await.unwrap();
        session.stop().await;
        session.stop().await;
        drop(session);

        let mut stopped = 0;
        while let Ok(event) = rx.try_recv() {
            if event == SessionEvent::Stopped {
                stopped += 1;
            }
        }
        assert_eq!(stopped, 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (sink, _rx) = Sink::channel(16);
        let mut session = PublisherSession::new(sink);
        session.start().await.unwrap();
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, PublishError::InvalidState(SessionState::Started)));
        session.stop().await;
    }

    #[tokio::test]
    async fn test_start_failure_kind() {
        let (sink, rx) = Sink::channel(16);
        drop(rx);
        let mut session = PublisherSession::new(sink);
        let err = session.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionStartFailure);
        assert_eq!(session.state(), SessionState::Created);
    }

    #[tokio::test]
    async fn test_submit_before_start_fails() {
        let (sink, _rx) = Sink::channel(16);
        let mut session = PublisherSession::new(sink);
        assert!(!session.submit(&record("A")).await);
        assert_eq!(session.failed(), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_does_not_stop_session() {
        let (sink, mut rx) = Sink::channel(2);
        let mut session = PublisherSession::new(sink);
        session.start().await.unwrap();

        // Started + one record fill the channel
        assert!(session.submit(&record("A")).await);
        assert!(!session.submit(&record("B")).await);

        rx.recv().await;
        rx.recv().await;
        assert!(session.submit(&record("C")).await);
        assert_eq!(session.submitted(), 2);
        assert_eq!(session.failed(), 1);
        session.stop().await;
    }

    #[tokio::test]
    async fn test_drop_releases_connection() {
        let (sink, mut rx) = Sink::channel(16);
        let mut session = PublisherSession::new(sink);
        session.start().await.unwrap();
        drop(session);

        assert_eq!(rx.recv().await, Some(SessionEvent::Started));
        assert_eq!(rx.recv().await, Some(SessionEvent::Stopped));
    }

    #[tokio::test]
    async fn test_file_sink_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.jsonl");

        let mut session = PublisherSession::new(Sink::file(&path));
        session.start().await.unwrap();
        assert!(session.submit(&record("Array-Laser-Locked")).await);
        assert!(session.submit(&record("Array-AntennasToPads")).await);
        session.stop().await;

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "Array-Laser-Locked");
        assert_eq!(lines[1]["valueType"], "DOUBLE");
        assert_eq!(lines[1]["operMode"], "OPERATIONAL");
    }
}
