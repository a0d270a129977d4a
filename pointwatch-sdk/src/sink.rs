//! Sink backends for delivering monitor point records.

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use pointwatch_types::MonitorPointRecord;

/// Events seen by a channel sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A session was started.
    Started,
    /// A record was submitted.
    Record(MonitorPointRecord),
    /// A session was stopped.
    Stopped,
}

/// Destination for monitor point records.
///
/// A sink is only a description; a publisher session opens a fresh
/// connection to it every cycle.
#[derive(Debug, Clone)]
pub enum Sink {
    /// Send each record as one JSON datagram to `host:port`.
    Udp(String),

    /// Append each record as one JSON line to a file.
    File(PathBuf),

    /// Send session events through a channel.
    ///
    /// Use `Sink::channel()` to create this variant and get the receiver.
    Channel(tokio::sync::mpsc::Sender<SessionEvent>),
}

impl Sink {
    /// Create a UDP sink.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pointwatch_sdk::Sink;
    ///
    /// let sink = Sink::udp("localhost:10101");
    /// ```
    pub fn udp(addr: impl Into<String>) -> Self {
        Sink::Udp(addr.into())
    }

    /// Create a JSON-lines file sink.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Sink::File(path.into())
    }

    /// Create a channel sink and return both the sink and receiver.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pointwatch_sdk::Sink;
    ///
    /// let (sink, mut rx) = Sink::channel(64);
    ///
    /// // Later, receive events
    /// // while let Some(event) = rx.recv().await {
    /// //     println!("{event:?}");
    /// // }
    /// ```
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Sink::Channel(tx), rx)
    }

    /// Open a connection to this sink.
    pub(crate) async fn open(&self) -> std::io::Result<SinkConnection> {
        match self {
            Sink::Udp(addr) => {
                let socket = tokio::net::UdpSocket::bind("0.0.0.0:0").await?;
                socket.connect(addr).await?;
                Ok(SinkConnection::Udp(socket))
            }
            Sink::File(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                Ok(SinkConnection::File(tokio::io::BufWriter::new(file)))
            }
            Sink::Channel(tx) => {
                tx.try_send(SessionEvent::Started).map_err(channel_error)?;
                Ok(SinkConnection::Channel(tx.clone()))
            }
        }
    }
}

impl std::fmt::Display for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sink::Udp(addr) => write!(f, "udp://{addr}"),
            Sink::File(path) => write!(f, "file://{}", path.display()),
            Sink::Channel(_) => f.write_str("channel"),
        }
    }
}

/// An open connection to a sink.
#[derive(Debug)]
pub(crate) enum SinkConnection {
    Udp(tokio::net::UdpSocket),
    File(tokio::io::BufWriter<tokio::fs::File>),
    Channel(tokio::sync::mpsc::Sender<SessionEvent>),
}

impl SinkConnection {
    /// Deliver one record.
    pub(crate) async fn send(&mut self, record: &MonitorPointRecord) -> std::io::Result<()> {
        match self {
            SinkConnection::Udp(socket) => {
                let json = serde_json::to_vec(record)?;
                socket.send(&json).await?;
            }
            SinkConnection::File(writer) => {
                let mut json = serde_json::to_vec(record)?;
                json.push(b'\n');
                writer.write_all(&json).await?;
            }
            SinkConnection::Channel(tx) => {
                // Best effort send (don't block if channel is full)
                tx.try_send(SessionEvent::Record(record.clone()))
                    .map_err(channel_error)?;
            }
        }
        Ok(())
    }

    /// Flush and release the connection.
    pub(crate) async fn close(self) -> std::io::Result<()> {
        match self {
            SinkConnection::Udp(_) => Ok(()),
            SinkConnection::File(mut writer) => writer.flush().await,
            SinkConnection::Channel(tx) => {
                let _ = tx.try_send(SessionEvent::Stopped);
                Ok(())
            }
        }
    }

    /// Release the connection without waiting.
    pub(crate) fn abandon(self) {
        if let SinkConnection::Channel(tx) = self {
            let _ = tx.try_send(SessionEvent::Stopped);
        }
    }
}

fn channel_error<T>(err: tokio::sync::mpsc::error::TrySendError<T>) -> std::io::Error {
    use tokio::sync::mpsc::error::TrySendError;
    match err {
        TrySendError::Full(_) => std::io::Error::new(std::io::ErrorKind::WouldBlock, "sink channel is full"),
        TrySendError::Closed(_) => {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink channel is closed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_display() {
        assert_eq!(Sink::udp("localhost:10101").to_string(), "udp://localhost:10101");
        assert_eq!(Sink::file("/tmp/points.jsonl").to_string(), "file:///tmp/points.jsonl");
        let (sink, _rx) = Sink::channel(1);
        assert_eq!(sink.to_string(), "channel");
    }

    #[tokio::test]
    async fn test_channel_open_fails_when_closed() {
        let (sink, rx) = Sink::channel(4);
        drop(rx);
        let err = sink.open().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_udp_open_rejects_unresolvable_address() {
        assert!(Sink::udp("no port here").open().await.is_err());
    }
}
