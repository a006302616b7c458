//! Profile data extraction from rendered HTML
//!
//! This module handles:
//! - The [`Extractor`] seam workers call after a successful render
//! - The concrete [`ProfileExtractor`] for public profile pages
//! - Follower count normalization and redirect-link unwrapping

mod followers;
mod links;
mod profile;

pub use followers::normalize_follower_count;
pub use links::{classify_link, unwrap_gate_url, LinkKind, ProfileLink};
pub use profile::ProfileExtractor;

use crate::output::ProfileRecord;

/// Turns rendered HTML into a [`ProfileRecord`]
///
/// Implementations must not fail: absent data leaves fields empty and the
/// record's `error` empty. Workers decide the record's fate from `error` alone.
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, url: &str) -> ProfileRecord;
}
