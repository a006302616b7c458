//! Storage module for persisting run progress
//!
//! This module handles the plain-file state a harvest run depends on:
//! - The progress checkpoint: the absolute index the next batch starts at
//! - Newline-delimited list files (targets, proxies)

mod checkpoint;
mod targets;

pub use checkpoint::{CheckpointError, ProgressCheckpoint};
pub use targets::{load_targets, read_list_file, Target};
