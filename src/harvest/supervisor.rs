//! Direct supervisor - the batch's unproxied worker and retry consumer

use super::retry::{RetryPoll, RetryReceiver};
use super::worker::{UnitWorker, WorkChunk, WorkerReport};
use crate::state::{SupervisorEvent, SupervisorState};
use crate::storage::Target;
use std::time::Duration;

/// What the direct supervisor did during one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Outcomes for the initial slice
    pub initial: WorkerReport,

    /// Outcomes for targets received over the retry channel
    pub retries: WorkerReport,

    /// Number of retry messages received
    pub retried: usize,
}

/// Long-lived direct worker of a batch and sole consumer of its retry channel
///
/// Processes its initial slice without a proxy, then retries requeued targets
/// one at a time (still without a proxy and without a channel to forward
/// failures to) until the stop message arrives.
pub struct DirectSupervisor {
    worker: UnitWorker,
    label: String,
    retry_poll: Duration,
}

impl DirectSupervisor {
    pub fn new(worker: UnitWorker, label: impl Into<String>, retry_poll: Duration) -> Self {
        Self {
            worker,
            label: label.into(),
            retry_poll,
        }
    }

    pub async fn run(self, initial: Vec<Target>, mut retries: RetryReceiver) -> SupervisorReport {
        let mut report = SupervisorReport::default();
        let mut state = SupervisorState::DrainingInitial;
        tracing::info!(
            worker = %self.label,
            state = %state,
            "Direct supervisor started with {} initial targets",
            initial.len()
        );

        if !initial.is_empty() {
            report.initial = self
                .worker
                .run(&self.label, &WorkChunk::direct(initial), None)
                .await;
        }
        state = state.transition(SupervisorEvent::InitialDrained);
        tracing::info!(
            worker = %self.label,
            state = %state,
            "Initial slice done ({} written), waiting for retries",
            report.initial.written
        );

        while state.accepts_retries() {
            match retries.poll(self.retry_poll).await {
                RetryPoll::Target(target) => {
                    report.retried += 1;
                    tracing::info!(worker = %self.label, "Retrying {}", target);
                    let outcome = self
                        .worker
                        .run(&self.label, &WorkChunk::direct(vec![target]), None)
                        .await;
                    report.retries.merge(&outcome);
                }
                RetryPoll::Stop => {
                    state = state.transition(SupervisorEvent::StopReceived);
                }
                RetryPoll::Closed => {
                    tracing::warn!(worker = %self.label, "Retry channel closed without stop message");
                    state = state.transition(SupervisorEvent::ChannelClosed);
                }
                RetryPoll::TimedOut => {}
            }
        }

        tracing::info!(
            worker = %self.label,
            state = %state,
            "Direct supervisor finished: {} retried, {} written on retry",
            report.retried,
            report.retries.written
        );
        report
    }
}
