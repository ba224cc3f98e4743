//! The single text channel a run writes rendered batches to.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::MonitorError;
use crate::lock;

/// Rendered batches that may be queued ahead of the reader.
pub const OUTPUT_BUFFER: usize = 10;

/// Bounded stream of rendered text, closed exactly once.
///
/// Closing drops the only sender, so the reader still receives everything
/// queued before the close and then sees end of stream.
pub struct OutputStream {
    tx: Mutex<Option<mpsc::Sender<String>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
    closed: AtomicBool,
}

impl OutputStream {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue `text`, waiting for buffer space unless `cancel` fires first.
    /// A send abandoned because of cancellation is not an error.
    pub async fn send(&self, text: String, cancel: &CancellationToken) -> Result<(), MonitorError> {
        let tx = lock(&self.tx).clone().ok_or(MonitorError::OutputClosed)?;
        tokio::select! {
            sent = tx.send(text) => sent.map_err(|_| MonitorError::OutputClosed),
            _ = cancel.cancelled() => Ok(()),
        }
    }

    /// Close the stream. Returns `true` for the one call that actually
    /// closed it; every later or concurrent call is a no-op.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        lock(&self.tx).take();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Next queued message, or `None` once the stream is closed and drained.
    pub async fn next_message(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

impl Default for OutputStream {
    fn default() -> Self {
        Self::new()
    }
}
