use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::error::SendError;
use crate::record::Record;

/// identity of one live viewer, never reused once retired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(Uuid);

impl ViewerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form is plenty for log lines
        let id = self.0.simple().to_string();
        f.write_str(&id[..8])
    }
}

/// One live consumer of the broadcast stream.
///
/// The hub takes ownership of a viewer when it is registered and is the only
/// caller of [`Viewer::try_send`] and [`Viewer::close`] from then on.
///
/// # Contract
///
/// - `try_send` **must not block**. Hand the record to a bounded queue or
///   fail immediately; the hub calls it for every viewer in turn.
/// - `close` must be idempotent. It may be called after the transport has
///   already gone away.
pub trait Viewer: Send {
    fn id(&self) -> ViewerId;

    /// human readable name for log lines (peer address, test name, ...)
    fn label(&self) -> &str {
        "viewer"
    }

    fn try_send(&mut self, record: &Arc<Record>) -> Result<(), SendError>;

    fn close(&mut self);
}

/// viewer backed by a bounded outbox that a transport writer drains
#[derive(Debug)]
pub struct ChannelViewer {
    id: ViewerId,
    label: String,
    sender: Option<mpsc::Sender<Arc<Record>>>,
}

/// receiving half of a [`ChannelViewer`], owned by the transport writer
#[derive(Debug)]
pub struct ViewerOutbox {
    id: ViewerId,
    receiver: mpsc::Receiver<Arc<Record>>,
}

impl ChannelViewer {
    /// create a viewer whose outbox holds at most `capacity` undelivered records
    pub fn new(label: impl Into<String>, capacity: usize) -> (Self, ViewerOutbox) {
        let id = ViewerId::new();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                id,
                label: label.into(),
                sender: Some(sender),
            },
            ViewerOutbox { id, receiver },
        )
    }
}

impl Viewer for ChannelViewer {
    fn id(&self) -> ViewerId {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn try_send(&mut self, record: &Arc<Record>) -> Result<(), SendError> {
        let Some(sender) = &self.sender else {
            return Err(SendError::Closed);
        };
        sender.try_send(Arc::clone(record)).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn close(&mut self) {
        // dropping the sender lets the writer drain and then see end-of-stream
        self.sender = None;
    }
}

impl ViewerOutbox {
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// next record to write, `None` once the hub has closed the viewer
    pub async fn recv(&mut self) -> Option<Arc<Record>> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: usize) -> Arc<Record> {
        Arc::new(Record::parse(&format!(r#"{{"n":{n}}}"#)).unwrap())
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (mut viewer, mut outbox) = ChannelViewer::new("test", 4);
        assert_eq!(viewer.id(), outbox.id());
        assert_eq!(viewer.label(), "test");

        viewer.try_send(&record(1)).unwrap();
        let got = outbox.recv().await.unwrap();
        assert_eq!(got.raw(), r#"{"n":1}"#);
    }

    #[test]
    fn test_full_outbox_fails_without_blocking() {
        let (mut viewer, _outbox) = ChannelViewer::new("slow", 2);
        viewer.try_send(&record(1)).unwrap();
        viewer.try_send(&record(2)).unwrap();
        assert_eq!(viewer.try_send(&record(3)), Err(SendError::Full));
    }

    #[test]
    fn test_dropped_outbox_reports_closed() {
        let (mut viewer, outbox) = ChannelViewer::new("gone", 2);
        drop(outbox);
        assert_eq!(viewer.try_send(&record(1)), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_drains() {
        let (mut viewer, mut outbox) = ChannelViewer::new("closing", 4);
        viewer.try_send(&record(1)).unwrap();
        viewer.close();
        viewer.close();

        assert_eq!(viewer.try_send(&record(2)), Err(SendError::Closed));
        assert!(outbox.recv().await.is_some());
        assert!(outbox.recv().await.is_none());
    }

    #[test]
    fn test_viewer_ids_are_distinct() {
        assert_ne!(ViewerId::new(), ViewerId::new());
        assert_eq!(ViewerId::new().to_string().len(), 8);
    }
}
