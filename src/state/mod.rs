//! State module for tracking batch progress
//!
//! # Components
//!
//! - `SupervisorState`: Phases of the direct supervisor (draining, waiting for retries, stopped)
//! - `TargetOutcome`: The fate of a target after each processing attempt

mod outcome;
mod supervisor_state;

// Re-export main types
pub use outcome::TargetOutcome;
pub use supervisor_state::{SupervisorEvent, SupervisorState};
