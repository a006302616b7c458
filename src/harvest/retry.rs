use crate::storage::Target;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Message carried by the retry channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryMessage {
    /// A target a pool worker could not complete
    Retry(Target),

    /// No more retries will be sent for this batch
    Stop,
}

/// Result of one timed poll on the retry channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPoll {
    Target(Target),
    Stop,
    TimedOut,
    Closed,
}

/// Creates the per-batch retry channel
///
/// Unbounded: producers never block. The direct supervisor holds the only
/// receiver.
pub fn retry_channel() -> (RetrySender, RetryReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        RetrySender { tx },
        RetryReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer side, cloned into every pool worker
#[derive(Debug, Clone)]
pub struct RetrySender {
    tx: mpsc::UnboundedSender<RetryMessage>,
}

impl RetrySender {
    /// Requeues a target; returns false when the supervisor is already gone
    pub fn push(&self, target: Target) -> bool {
        match self.tx.send(RetryMessage::Retry(target)) {
            Ok(()) => true,
            Err(mpsc::error::SendError(message)) => {
                if let RetryMessage::Retry(target) = message {
                    tracing::error!(
                        target_url = %target,
                        "Retry channel closed, target dropped"
                    );
                }
                false
            }
        }
    }

    /// Sends the stop message
    pub fn stop(&self) -> bool {
        self.tx.send(RetryMessage::Stop).is_ok()
    }
}

/// Consumer side, owned by the direct supervisor
#[derive(Debug)]
pub struct RetryReceiver {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<RetryMessage>>>,
}

impl RetryReceiver {
    /// Waits up to `timeout` for the next message
    pub async fn poll(&mut self, timeout: Duration) -> RetryPoll {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(RetryMessage::Retry(target))) => RetryPoll::Target(target),
            Ok(Some(RetryMessage::Stop)) => RetryPoll::Stop,
            Ok(None) => RetryPoll::Closed,
            Err(_) => RetryPoll::TimedOut,
        }
    }

    /// Handle for collecting what is still queued once the consumer is gone
    pub fn leftovers(&self) -> RetryLeftovers {
        RetryLeftovers {
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Second handle on the queue, kept by the scheduler
///
/// Only drained after the supervisor task has finished or been aborted.
#[derive(Debug, Clone)]
pub struct RetryLeftovers {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<RetryMessage>>>,
}

impl RetryLeftovers {
    /// Removes every queued retry without waiting; stop messages are discarded
    pub async fn drain(&self) -> Vec<Target> {
        let mut rx = self.rx.lock().await;
        let mut targets = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let RetryMessage::Retry(target) = message {
                targets.push(target);
            }
        }
        targets
    }
}
