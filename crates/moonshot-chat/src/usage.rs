//! Running token totals across the turns of one conversation

use crate::types::{ChatResponse, Usage};

/// Combine a turn's usage with the cumulative usage of the previous turn
///
/// A turn that reports nothing counts as zero. Without a previous turn the
/// current usage is returned unchanged.
pub fn cumulative_usage(current: Option<Usage>, previous: Option<&ChatResponse>) -> Usage {
    let current = current.unwrap_or_default();
    match previous {
        Some(previous) => current + previous.usage(),
        None => current,
    }
}
