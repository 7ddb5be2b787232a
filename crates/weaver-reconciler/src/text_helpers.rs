//! Grapheme navigation inside text nodes.
//!
//! Offsets are in chars. Deletion always removes whole extended grapheme
//! clusters, so combining marks, emoji sequences and regional indicator
//! pairs never get split.

use unicode_segmentation::UnicodeSegmentation;

/// Char offsets of every grapheme boundary of `text`, both ends included.
pub fn grapheme_boundaries(text: &str) -> Vec<usize> {
    let mut boundaries = Vec::with_capacity(text.len() + 1);
    let mut chars = 0;
    boundaries.push(0);
    for grapheme in text.graphemes(true) {
        chars += grapheme.chars().count();
        boundaries.push(chars);
    }
    boundaries
}

/// Start of the grapheme cluster ending at or containing `offset - 1`.
pub fn previous_grapheme_boundary(text: &str, offset: usize) -> usize {
    grapheme_boundaries(text)
        .into_iter()
        .rev()
        .find(|&boundary| boundary < offset)
        .unwrap_or(0)
}

/// End of the grapheme cluster starting at or containing `offset`.
pub fn next_grapheme_boundary(text: &str, offset: usize) -> usize {
    let boundaries = grapheme_boundaries(text);
    let end = boundaries.last().copied().unwrap_or(0);
    boundaries
        .into_iter()
        .find(|&boundary| boundary > offset)
        .unwrap_or(end)
}

/// Number of grapheme clusters in `text`.
pub fn grapheme_count(text: &str) -> usize {
    text.graphemes(true).count()
}
