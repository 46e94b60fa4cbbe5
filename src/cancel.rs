//! Run-scoped cancellation signal.
//!
//! One signal per run, cloned into every worker. Checked at each
//! suspension point: request send, body read, file read, retry sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct RunCancellation {
    tx: broadcast::Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl RunCancellation {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the run. All pending `cancelled()` waits resolve.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves when the run is cancelled. Safe to call after the fact.
    pub async fn cancelled(&self) {
        // Subscribe before the flag check so a concurrent cancel cannot
        // slip between them.
        let mut rx = self.tx.subscribe();
        if self.is_cancelled() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for RunCancellation {
    fn default() -> Self {
        Self::new()
    }
}
