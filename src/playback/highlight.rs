//! Mapping speech progress to the word to highlight.

use super::layout::PageFit;
use crate::geometry::Rect;
use crate::store::PageRecord;
use crate::text_utils::token_index_at;

/// Page-level word index for a boundary reported at `char_offset` of a
/// segment that starts at word `segment_start` of the page.
pub fn word_index_at(segment: &str, segment_start: usize, char_offset: usize) -> usize {
    segment_start + token_index_at(segment, char_offset)
}

/// Highlight rectangle for `word_index`, in container pixels.
pub fn highlight_rect(page: &PageRecord, word_index: usize, fit: &PageFit) -> Option<Rect> {
    page.words
        .get(word_index)
        .map(|word| fit.to_container_rect(word.rect))
}
