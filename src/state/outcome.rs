use std::fmt;

/// What happened to one target after a processing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetOutcome {
    /// Record appended to the sink
    Written,

    /// Pushed onto the retry channel for the direct supervisor
    Requeued,

    /// Failed with nowhere to forward it; logged only
    Dropped,

    /// Extraction succeeded but the sink rejected the row
    SinkFailed,
}

impl TargetOutcome {
    /// Returns true if no further attempt will be made in this batch
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Requeued)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Requeued => "requeued",
            Self::Dropped => "dropped",
            Self::SinkFailed => "sink_failed",
        }
    }
}

impl fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
