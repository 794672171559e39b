//! Text splitting helpers for speech alignment.
//!
//! Words are whitespace-delimited tokens; offsets are counted in `char`s,
//! which is how speech boundary callbacks report positions.

/// Number of whitespace-delimited tokens in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Text from the `start_word`-th token (0-based) to the end, tokens joined by
/// single spaces. Empty when `start_word` is past the last token.
pub fn segment_from_word(text: &str, start_word: usize) -> String {
    text.split_whitespace()
        .skip(start_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Index of the token being spoken at `char_offset` within `segment`.
///
/// An offset at a token's first character, inside it, or in the whitespace
/// after it all map to that token. Offsets past the end map to the last one.
pub fn token_index_at(segment: &str, char_offset: usize) -> usize {
    let mut started = 0usize;
    let mut in_token = false;
    for (idx, ch) in segment.chars().enumerate() {
        if idx > char_offset {
            break;
        }
        if ch.is_whitespace() {
            in_token = false;
        } else if !in_token {
            in_token = true;
            started += 1;
        }
    }
    started.saturating_sub(1)
}
