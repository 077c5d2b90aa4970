use smallvec::{smallvec, SmallVec};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Debug;
use std::{fmt, fs};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::types::{GlyphId, WordId};
use crate::{MAX_GLYPH_COUNT, MAX_SLOT_LENGTH};

/// Score assigned to entries that don't specify one.
pub const DEFAULT_WORD_SCORE: i32 = 50;

/// Stop collecting errors for a source after this many; the source is almost certainly not a
/// word list at that point.
const MAX_ERRORS_PER_SOURCE: usize = 100;

/// A struct representing a word in the word list.
#[derive(Debug, Clone)]
pub struct Word {
    /// The word as it would appear in a grid -- only lowercase letters or other valid glyphs.
    pub normalized_string: String,

    /// The word as it appears in the user's word list, with arbitrary formatting and punctuation.
    pub canonical_string: String,

    /// The glyph ids making up `normalized_string`.
    pub glyphs: SmallVec<[GlyphId; MAX_SLOT_LENGTH]>,

    /// The word's score, usually on a roughly 0 - 100 scale where 50 means average quality.
    pub score: i32,

    /// The index of the source that this word came from. If the same word appears in multiple
    /// sources, this will be the highest-priority (i.e., lowest) one.
    pub source_index: u16,
}

impl Word {
    /// The length of the word in glyphs, which is what slot lengths are measured in.
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Given a canonical word string from a dictionary file, turn it into the normalized form we'll
/// use in the actual fill engine.
#[must_use]
pub fn normalize_word(canonical: &str) -> String {
    canonical
        .to_lowercase()
        .nfc() // Normalize Unicode combining forms
        .filter(|c| !c.is_whitespace())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordListError {
    #[error("Can’t read file: “{0}”")]
    InvalidPath(String),

    #[error("Word list contains invalid word: “{0}”")]
    InvalidWord(String),

    #[error("Word list contains invalid score: “{0}”")]
    InvalidScore(String),
}

/// Configuration describing a source of wordlist entries.
pub enum WordListSourceConfig {
    Memory { id: String, words: Vec<String> },
    File { id: String, path: OsString },
    FileContents { id: String, contents: &'static str },
}

impl WordListSourceConfig {
    /// The unique, persistent id of this word list.
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            WordListSourceConfig::Memory { id, .. }
            | WordListSourceConfig::FileContents { id, .. }
            | WordListSourceConfig::File { id, .. } => id.clone(),
        }
    }
}

/// A single word list entry, before it's been assigned glyph ids.
struct RawWordListEntry {
    normalized: String,
    canonical: String,
    score: i32,
}

fn parse_word_list_file_contents(
    file_contents: &str,
    errors: &mut Vec<WordListError>,
) -> Vec<RawWordListEntry> {
    file_contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map_while(|line| {
            if errors.len() > MAX_ERRORS_PER_SOURCE {
                return None;
            }

            let line_parts: Vec<_> = line.split(';').collect();

            let canonical = line_parts[0].trim().to_string();
            let normalized = normalize_word(&canonical);
            if normalized.is_empty() {
                errors.push(WordListError::InvalidWord(line_parts[0].into()));
                return Some(None);
            }

            let Ok(score) = (if line_parts.len() < 2 {
                Ok(DEFAULT_WORD_SCORE)
            } else {
                line_parts[1].trim().parse::<i32>()
            }) else {
                errors.push(WordListError::InvalidScore(line_parts[1].into()));
                return Some(None);
            };

            Some(Some(RawWordListEntry {
                normalized,
                canonical,
                score,
            }))
        })
        .flatten()
        .collect()
}

fn load_words_from_source(
    source: &WordListSourceConfig,
) -> (Vec<RawWordListEntry>, Vec<WordListError>) {
    let mut errors = vec![];

    let entries = match source {
        WordListSourceConfig::Memory { words, .. } => words
            .iter()
            .filter_map(|canonical| {
                let normalized = normalize_word(canonical);
                if normalized.is_empty() {
                    errors.push(WordListError::InvalidWord(canonical.clone()));
                    return None;
                }

                Some(RawWordListEntry {
                    normalized,
                    canonical: canonical.clone(),
                    score: DEFAULT_WORD_SCORE,
                })
            })
            .collect(),

        WordListSourceConfig::File { path, .. } => {
            if let Ok(contents) = fs::read_to_string(path) {
                parse_word_list_file_contents(&contents, &mut errors)
            } else {
                errors.push(WordListError::InvalidPath(path.to_string_lossy().into()));
                vec![]
            }
        }

        WordListSourceConfig::FileContents { contents, .. } => {
            parse_word_list_file_contents(contents, &mut errors)
        }
    };

    (entries, errors)
}

/// The candidate vocabulary. Every slot's domain starts out as the full list, so ids are assigned
/// in load order and never change; that keeps every iteration over a domain deterministic.
pub struct WordList {
    /// A list of all characters that occur in any (normalized) word. `GlyphId`s used everywhere
    /// else are indices into this list.
    pub glyphs: SmallVec<[char; MAX_GLYPH_COUNT]>,

    /// The inverse of `glyphs`: a map from a character to the `GlyphId` representing it.
    pub glyph_id_by_char: HashMap<char, GlyphId>,

    /// All loaded words; a `WordId` is an index into this list.
    pub words: Vec<Word>,

    /// A map from a normalized string to the id of the Word representing it.
    pub word_id_by_string: HashMap<String, WordId>,

    /// The maximum word length provided when configuring the WordList, if any.
    pub max_length: Option<usize>,

    /// The minimum score provided when configuring the WordList, if any.
    pub min_score: Option<i32>,

    /// Errors encountered while loading each source, keyed by source id.
    pub source_errors: HashMap<String, Vec<WordListError>>,
}

impl WordList {
    /// Construct a new `WordList` using the given sources (omitting any entries that are longer than
    /// `max_length` or scored below `min_score`). Earlier sources take priority when the same word
    /// appears more than once.
    #[must_use]
    pub fn new(
        source_configs: &[WordListSourceConfig],
        max_length: Option<usize>,
        min_score: Option<i32>,
    ) -> WordList {
        assert!(
            source_configs.len() < 2usize.pow(16),
            "Too many word list sources"
        );

        let mut instance = WordList {
            glyphs: smallvec![],
            glyph_id_by_char: HashMap::new(),
            words: vec![],
            word_id_by_string: HashMap::new(),
            max_length,
            min_score,
            source_errors: HashMap::new(),
        };

        for (source_index, source) in source_configs.iter().enumerate() {
            let (entries, errors) = load_words_from_source(source);
            for entry in entries {
                instance.add_word(entry, source_index as u16);
            }
            instance.source_errors.insert(source.id(), errors);
        }

        instance
    }

    /// Shorthand for building a list out of in-memory words.
    #[must_use]
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> WordList {
        WordList::new(
            &[WordListSourceConfig::Memory {
                id: "0".into(),
                words: words.iter().map(|word| word.as_ref().to_string()).collect(),
            }],
            None,
            None,
        )
    }

    /// Add an entry unless it's filtered out or already present, returning its id if it's in the
    /// list afterward.
    fn add_word(&mut self, entry: RawWordListEntry, source_index: u16) -> Option<WordId> {
        if let Some(&word_id) = self.word_id_by_string.get(&entry.normalized) {
            return Some(word_id);
        }

        let length = entry.normalized.chars().count();
        if self.max_length.is_some_and(|max_length| length > max_length)
            || self.min_score.is_some_and(|min_score| entry.score < min_score)
        {
            return None;
        }

        let glyphs = entry
            .normalized
            .chars()
            .map(|ch| self.glyph_id_for_char(ch))
            .collect();

        let word_id = self.words.len();
        self.word_id_by_string
            .insert(entry.normalized.clone(), word_id);
        self.words.push(Word {
            normalized_string: entry.normalized,
            canonical_string: entry.canonical,
            glyphs,
            score: entry.score,
            source_index,
        });

        Some(word_id)
    }

    /// Get the `GlyphId` for a char, registering it if it hasn't been seen before.
    pub fn glyph_id_for_char(&mut self, ch: char) -> GlyphId {
        if let Some(&glyph_id) = self.glyph_id_by_char.get(&ch) {
            return glyph_id;
        }

        self.glyphs.push(ch);
        let glyph_id = self.glyphs.len() - 1;
        self.glyph_id_by_char.insert(ch, glyph_id);
        glyph_id
    }

    /// Look up a word by its normalized or unnormalized spelling.
    #[must_use]
    pub fn word_id(&self, word: &str) -> Option<WordId> {
        self.word_id_by_string.get(&normalize_word(word)).copied()
    }

    /// The normalized spelling of a word.
    #[must_use]
    pub fn word_string(&self, word_id: WordId) -> &str {
        &self.words[word_id].normalized_string
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Errors for each source that produced at least one.
    #[must_use]
    pub fn get_source_errors(&self) -> HashMap<String, Vec<WordListError>> {
        self.source_errors
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(id, errors)| (id.clone(), errors.clone()))
            .collect()
    }
}

impl Debug for WordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordList")
            .field("glyphs", &self.glyphs.len())
            .field("words", &self.words.len())
            .field("max_length", &self.max_length)
            .field("min_score", &self.min_score)
            .finish()
    }
}
