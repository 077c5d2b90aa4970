use smallvec::{smallvec, SmallVec};

use crate::types::{GlyphId, WordId};
use crate::word_list::WordList;
use crate::MAX_GLYPH_COUNT;

/// Number of occurrences of each glyph in a single cell across a set of options, indexed by
/// `GlyphId`.
pub type GlyphCounts = SmallVec<[u32; MAX_GLYPH_COUNT]>;

/// Count the glyphs appearing at `cell_idx` across the given options. Words too short to have a
/// glyph in that cell don't contribute anything.
#[must_use]
pub fn build_glyph_counts_for_cell(
    word_list: &WordList,
    cell_idx: usize,
    options: &[WordId],
) -> GlyphCounts {
    let mut result: GlyphCounts = smallvec![0; word_list.glyphs.len()];

    for &word_id in options {
        if let Some(&glyph) = word_list.words[word_id].glyphs.get(cell_idx) {
            result[glyph] += 1;
        }
    }

    result
}

/// How many of the counted options have `glyph` in the counted cell? Unknown glyphs count as 0.
#[inline]
#[must_use]
pub fn glyph_count(counts: &GlyphCounts, glyph: GlyphId) -> u32 {
    counts.get(glyph).copied().unwrap_or(0)
}
