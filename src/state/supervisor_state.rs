/// Lifecycle of the direct supervisor within one batch
///
/// The supervisor first drains its initial slice, then serves the retry
/// channel until it receives the stop message (or every sender is gone).
use std::fmt;

/// Represents the phase a direct supervisor is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Processing the leading slice of the batch without a proxy
    DrainingInitial,

    /// Polling the retry channel and processing requeued targets one by one
    WaitingRetry,

    /// Stop received; no further targets are accepted
    Stopped,
}

/// Events that drive [`SupervisorState`] transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// The initial slice has been fully processed
    InitialDrained,

    /// The stop message arrived on the retry channel
    StopReceived,

    /// Every sender of the retry channel was dropped
    ChannelClosed,
}

impl SupervisorState {
    /// Returns the state after `event`
    ///
    /// Events that do not apply to the current phase leave it unchanged;
    /// `Stopped` absorbs everything.
    pub fn transition(self, event: SupervisorEvent) -> Self {
        match (self, event) {
            (Self::DrainingInitial, SupervisorEvent::InitialDrained) => Self::WaitingRetry,
            (Self::WaitingRetry, SupervisorEvent::StopReceived)
            | (Self::WaitingRetry, SupervisorEvent::ChannelClosed) => Self::Stopped,
            (state, _) => state,
        }
    }

    /// Returns true if retried targets are accepted in this phase
    pub fn accepts_retries(&self) -> bool {
        matches!(self, Self::WaitingRetry)
    }

    /// Returns true once the supervisor will do no more work
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DrainingInitial => "draining_initial",
            Self::WaitingRetry => "waiting_retry",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
