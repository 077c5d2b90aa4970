use std::collections::BTreeMap;

/// An identifier for a given letter or symbol, based on its index in the `WordList`'s `glyphs`
/// field.
pub type GlyphId = usize;

/// An identifier for a given word, based on its index in the `WordList`'s `words` field.
pub type WordId = usize;

/// An identifier for a given slot, based on its index in the `GridConfig`'s `slot_configs` field.
pub type SlotId = usize;

/// A (possibly partial) mapping from slots to the words placed in them. Ordered so that anything
/// iterating over it visits slots in a stable order.
pub type Assignment = BTreeMap<SlotId, WordId>;

/// The remaining candidate words for each slot, indexed by `SlotId`.
pub type Domains = Vec<Vec<WordId>>;
