//! Shared instrument state.
//!
//! [`Core`] aggregates everything the command engine and the handlers
//! touch: the status machine, the task supervisor, the reply channel, the
//! shutdown signal and a general-purpose lock for handlers that need to
//! guard a multi-step sequence across their own suspension points.

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::config::Identity;
use crate::status::Status;
use crate::tasks::TaskSupervisor;
use scpi_proto::ScpiError;

/// Receiving end of the instrument's reply channel.
pub type ReplyRx = mpsc::UnboundedReceiver<String>;

/// State shared by every handler of an instrument.
pub struct Core {
    /// Identity reported by *IDN?.
    pub identity: Identity,
    /// Status registers and the error queue. Never held across `.await`.
    pub status: Mutex<Status>,
    /// Spawned-command bookkeeping. Never held across `.await`.
    pub tasks: Mutex<TaskSupervisor>,
    /// Handler-visible lock; may be held across suspension points.
    pub lock: tokio::sync::Mutex<()>,
    reply_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: watch::Sender<Option<u8>>,
}

impl Core {
    /// Create a core plus the receiving end of its reply channel.
    pub fn new(identity: Identity) -> (Self, ReplyRx) {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(None);
        (
            Self {
                identity,
                status: Mutex::new(Status::new()),
                tasks: Mutex::new(TaskSupervisor::new()),
                lock: tokio::sync::Mutex::new(()),
                reply_tx,
                shutdown_tx,
            },
            reply_rx,
        )
    }

    /// Queue one output line.
    ///
    /// Replies are fire-and-forget: once the session is torn down the
    /// receiver is gone and the line is dropped.
    pub fn reply(&self, line: impl Into<String>) {
        let _ = self.reply_tx.send(line.into());
    }

    /// Append an error to the error queue.
    pub fn push_error(&self, err: ScpiError) {
        self.status.lock().push_error(err);
    }

    /// Request loop shutdown with the given exit code.
    pub fn request_shutdown(&self, code: u8) {
        let _ = self.shutdown_tx.send(Some(code));
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<Option<u8>> {
        self.shutdown_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            manufacturer: "Straylight".into(),
            model: "TEST".into(),
            serial: "0".into(),
            firmware: "0.0".into(),
        }
    }

    #[tokio::test]
    async fn replies_arrive_in_order() {
        let (core, mut rx) = Core::new(identity());
        core.reply("first");
        core.reply("second");
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn shutdown_signal_carries_the_exit_code() {
        let (core, _rx) = Core::new(identity());
        let mut shutdown = core.subscribe_shutdown();
        core.request_shutdown(36);
        shutdown.changed().await.unwrap();
        assert_eq!(*shutdown.borrow(), Some(36));
    }
}
