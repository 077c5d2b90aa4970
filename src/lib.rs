//! Fill a crossword grid by treating it as a constraint-satisfaction problem: every slot is a
//! variable, every word in the word list is a candidate value, and crossing slots must agree on
//! their shared letter. See `backtracking_search::solve` for the entry point.

pub mod arc_consistency;
pub mod backtracking_search;
pub mod grid_config;
pub mod types;
pub mod util;
pub mod word_list;

pub const CHECK_INVARIANTS: bool = cfg!(feature = "check_invariants");

/// The expected maximum number of distinct characters appearing in a word list.
pub const MAX_GLYPH_COUNT: usize = 256;

/// The expected maximum length for a single slot.
pub const MAX_SLOT_LENGTH: usize = 21;
