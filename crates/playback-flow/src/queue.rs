//! Working queue construction

use autoplay_core_types::{PageScan, PlaybackItem};
use tracing::debug;

use crate::errors::FlowError;

/// Keep only candidates with an audio affordance, in scan order.
///
/// A scan with no qualifying candidate refuses to produce a queue.
pub fn build_queue(scan: &PageScan) -> Result<Vec<PlaybackItem>, FlowError> {
    if scan.candidates.is_empty() {
        return Err(FlowError::Discovery("no entries found on this page".into()));
    }

    let queue: Vec<PlaybackItem> = scan
        .candidates
        .iter()
        .filter(|candidate| candidate.has_audio)
        .map(|candidate| PlaybackItem {
            original_index: candidate.raw_index,
            key: candidate.key.clone(),
            trigger: candidate.trigger.clone(),
        })
        .collect();

    debug!(
        candidates = scan.candidates.len(),
        playable = queue.len(),
        "queue built"
    );

    if queue.is_empty() {
        return Err(FlowError::Discovery(
            "none of the entries on this page has audio".into(),
        ));
    }
    Ok(queue)
}

/// Queue position of the first item at or after raw row `raw_index`.
pub fn queue_offset_for_raw(queue: &[PlaybackItem], raw_index: usize) -> Option<usize> {
    queue
        .iter()
        .position(|item| item.original_index >= raw_index)
}
