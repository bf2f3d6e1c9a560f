//! Cancellable subscriptions over a bounded channel

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Lazy, non-restartable stream of notifications.
///
/// Items arrive through a bounded channel fed by a forwarding task. The
/// stream ends when the upstream ends or the handle is cancelled.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    handle: SubscriptionHandle,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::Receiver<T>, handle: SubscriptionHandle) -> Self {
        Self { rx, handle }
    }

    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn into_parts(self) -> (mpsc::Receiver<T>, SubscriptionHandle) {
        (self.rx, self.handle)
    }
}

/// Cancels the forwarding task. Cloneable, idempotent.
#[derive(Clone)]
pub struct SubscriptionHandle {
    task: Option<AbortHandle>,
    cancelled: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub fn new(task: AbortHandle) -> Self {
        Self {
            task: Some(task),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle with no task behind it, for feeds driven by hand
    pub fn detached() -> Self {
        Self {
            task: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true only for the call that actually cancelled
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(task) = &self.task {
            task.abort();
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
