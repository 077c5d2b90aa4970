//! This module implements code for describing the structure of a crossword grid -- which cells are
//! fillable, which slots they form, and where those slots cross -- independent of the specific
//! fill algorithm.

use std::collections::HashMap;
use std::fmt::Debug;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{Assignment, SlotId};
use crate::word_list::WordList;

/// An identifier for the intersection between two slots; these correspond one-to-one with checked
/// squares in the grid.
pub type CrossingId = usize;

/// Zero-indexed row and column for a cell in the grid, where row 0 is the top row.
pub type GridCoord = (usize, usize);

/// Character used for blocks when rendering a grid.
pub const BLOCK_CHAR: char = '█';

/// The direction that a slot is facing.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    Across,
    Down,
}

/// A struct representing a crossing between one slot and another, referencing the other slot's id
/// and the location of the intersection within the other slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crossing {
    pub other_slot_id: SlotId,
    pub other_slot_cell: usize,
    pub crossing_id: CrossingId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridConfigError {
    #[error("Grid must have at least one row")]
    EmptyTemplate,

    #[error("Slot {0} extends outside the grid")]
    SlotOutOfBounds(String),

    #[error("Slot {0} covers a blocked cell")]
    SlotCoversBlock(String),

    #[error("More than two slots share the cell at row {row}, column {col}")]
    TooManySlotsInCell { row: usize, col: usize },

    #[error("Slots {0} and {1} share more than one cell")]
    RepeatedCrossing(String, String),

    #[error("Invalid slot key: {0}")]
    InvalidSlotKey(String),
}

/// A struct identifying a specific slot in the grid. Two slots with the same start cell, direction
/// and length are the same slot.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct SlotSpec {
    pub start_cell: GridCoord,
    pub direction: Direction,
    pub length: usize,
}

impl SlotSpec {
    /// Parse a string like "1,2,down,5" into a `SlotSpec` struct.
    pub fn from_key(key: &str) -> Result<SlotSpec, GridConfigError> {
        let key_parts: Vec<&str> = key.split(',').collect();
        if key_parts.len() != 4 {
            return Err(GridConfigError::InvalidSlotKey(key.into()));
        }

        let row: Result<usize, _> = key_parts[0].parse();
        let col: Result<usize, _> = key_parts[1].parse();
        let direction: Option<Direction> = match key_parts[2] {
            "across" => Some(Direction::Across),
            "down" => Some(Direction::Down),
            _ => None,
        };
        let length: Result<usize, _> = key_parts[3].parse();

        if let (Ok(row), Ok(col), Some(direction), Ok(length)) = (row, col, direction, length) {
            Ok(SlotSpec {
                start_cell: (row, col),
                direction,
                length,
            })
        } else {
            Err(GridConfigError::InvalidSlotKey(key.into()))
        }
    }

    /// Represent this slot as a string like "1,2,down,5".
    #[must_use]
    pub fn to_key(&self) -> String {
        let direction = match self.direction {
            Direction::Across => "across",
            Direction::Down => "down",
        };
        format!(
            "{},{},{},{}",
            self.start_cell.0, self.start_cell.1, direction, self.length,
        )
    }

    /// Generate the coords for each cell of this entry.
    #[must_use]
    pub fn cell_coords(&self) -> Vec<GridCoord> {
        (0..self.length)
            .map(|cell_idx| match self.direction {
                Direction::Across => (self.start_cell.0, self.start_cell.1 + cell_idx),
                Direction::Down => (self.start_cell.0 + cell_idx, self.start_cell.1),
            })
            .collect()
    }
}

/// Serialize a `SlotSpec` into a string key.
#[cfg(feature = "serde")]
impl Serialize for SlotSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_key())
    }
}

/// Deserialize a `SlotSpec` from a string key.
#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SlotSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_string = String::deserialize(deserializer)?;
        SlotSpec::from_key(&raw_string).map_err(serde::de::Error::custom)
    }
}

/// A struct representing the aspects of a slot in the grid that are static during filling.
#[derive(Debug, Clone)]
pub struct SlotConfig {
    pub id: SlotId,
    pub start_cell: GridCoord,
    pub direction: Direction,
    pub length: usize,

    /// For each cell of the slot, the crossing slot sharing it, if any.
    pub crossings: Vec<Option<Crossing>>,
}

impl SlotConfig {
    /// Generate the coords for each cell of this slot.
    #[must_use]
    pub fn cell_coords(&self) -> Vec<GridCoord> {
        self.slot_spec().cell_coords()
    }

    /// Generate a `SlotSpec` identifying this slot.
    #[must_use]
    pub fn slot_spec(&self) -> SlotSpec {
        SlotSpec {
            start_cell: self.start_cell,
            direction: self.direction,
            length: self.length,
        }
    }

    /// Generate a string key identifying this slot.
    #[must_use]
    pub fn slot_key(&self) -> String {
        self.slot_spec().to_key()
    }
}

/// A struct holding all of the information needed as input to a crossword filling operation. This
/// is immutable once built; the fill process keeps its own working state.
pub struct GridConfig {
    /// The word list used to fill the grid; every slot's initial domain is the whole list.
    pub word_list: WordList,

    /// Which cells can hold a letter, indexed by row and then column.
    pub structure: Vec<Vec<bool>>,

    /// Config representing all of the slots in the grid and their crossings.
    pub slot_configs: Vec<SlotConfig>,

    /// The width and height of the grid.
    pub width: usize,
    pub height: usize,

    /// The number of distinct crossings represented in all of the `slot_configs`.
    pub crossing_count: usize,
}

impl GridConfig {
    /// Can the given cell hold a letter? Cells outside the grid can't.
    #[must_use]
    pub fn is_fillable(&self, row: usize, col: usize) -> bool {
        self.structure
            .get(row)
            .and_then(|cells| cells.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// Identifying specs for every slot, in `SlotId` order.
    #[must_use]
    pub fn slot_specs(&self) -> Vec<SlotSpec> {
        self.slot_configs.iter().map(SlotConfig::slot_spec).collect()
    }

    /// Find the id of the slot matching the given spec.
    #[must_use]
    pub fn slot_id(&self, slot_spec: &SlotSpec) -> Option<SlotId> {
        self.slot_configs
            .iter()
            .position(|slot_config| slot_config.slot_spec() == *slot_spec)
    }

    /// Ids of the slots crossing the given slot.
    pub fn neighbors(&self, slot_id: SlotId) -> impl Iterator<Item = SlotId> + '_ {
        self.slot_configs[slot_id]
            .crossings
            .iter()
            .flatten()
            .map(|crossing| crossing.other_slot_id)
    }

    /// The number of slots crossing the given slot.
    #[must_use]
    pub fn degree(&self, slot_id: SlotId) -> usize {
        self.neighbors(slot_id).count()
    }

    /// If the two slots cross, the index of the shared cell within each of them, as
    /// `(cell_in_a, cell_in_b)`.
    #[must_use]
    pub fn overlap(&self, slot_a: SlotId, slot_b: SlotId) -> Option<(usize, usize)> {
        self.slot_configs[slot_a]
            .crossings
            .iter()
            .enumerate()
            .find_map(|(cell_idx, crossing)| match crossing {
                Some(crossing) if crossing.other_slot_id == slot_b => {
                    Some((cell_idx, crossing.other_slot_cell))
                }
                _ => None,
            })
    }
}

impl Debug for GridConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridConfig")
            .field("word_list", &self.word_list)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("slot_count", &self.slot_configs.len())
            .field("crossing_count", &self.crossing_count)
            .finish()
    }
}

/// Given `SlotSpec` structs specifying the positions of the slots in a grid, generate
/// `SlotConfig`s containing derived information about crossings, along with the number of
/// distinct crossings.
pub fn generate_slot_configs(
    entries: &[SlotSpec],
) -> Result<(Vec<SlotConfig>, usize), GridConfigError> {
    // Build a map from cell location to entries involved, which we can then use to calculate
    // crossings. Each value is a list of (entry index, cell index within entry).
    let mut entries_by_loc: HashMap<GridCoord, Vec<(usize, usize)>> = HashMap::new();

    for (entry_idx, entry) in entries.iter().enumerate() {
        for (cell_idx, loc) in entry.cell_coords().into_iter().enumerate() {
            let cell_entries = entries_by_loc.entry(loc).or_default();
            cell_entries.push((entry_idx, cell_idx));
            if cell_entries.len() > 2 {
                return Err(GridConfigError::TooManySlotsInCell {
                    row: loc.0,
                    col: loc.1,
                });
            }
        }
    }

    // When we're generating a Crossing, if `(current_slot_id, crossing_slot_id)` is in this list,
    // use its index; if not, use `crossing_id_cache.len()` as the id and push
    // `(crossing_slot_id, current_id)` into the list so we can reuse it when we see the crossing
    // from the other side. Since no cell is shared by more than two slots, each crossing is seen
    // by exactly two slots.
    let mut crossing_id_cache: Vec<(SlotId, SlotId)> = vec![];
    let mut slot_configs: Vec<SlotConfig> = Vec::with_capacity(entries.len());

    for (entry_idx, entry) in entries.iter().enumerate() {
        let mut crossings: Vec<Option<Crossing>> = Vec::with_capacity(entry.length);

        for loc in entry.cell_coords() {
            let Some(&(other_slot_id, other_slot_cell)) = entries_by_loc[&loc]
                .iter()
                .find(|&&(other_idx, _)| other_idx != entry_idx)
            else {
                crossings.push(None);
                continue;
            };

            if crossings
                .iter()
                .flatten()
                .any(|crossing| crossing.other_slot_id == other_slot_id)
            {
                return Err(GridConfigError::RepeatedCrossing(
                    entry.to_key(),
                    entries[other_slot_id].to_key(),
                ));
            }

            let crossing_id = if let Some(found_crossing_id) = crossing_id_cache
                .iter()
                .position(|&id_pair| id_pair == (entry_idx, other_slot_id))
            {
                found_crossing_id
            } else {
                crossing_id_cache.push((other_slot_id, entry_idx));
                crossing_id_cache.len() - 1
            };

            crossings.push(Some(Crossing {
                other_slot_id,
                other_slot_cell,
                crossing_id,
            }));
        }

        slot_configs.push(SlotConfig {
            id: entry_idx,
            start_cell: entry.start_cell,
            direction: entry.direction,
            length: entry.length,
            crossings,
        });
    }

    Ok((slot_configs, crossing_id_cache.len()))
}

/// Generate a `GridConfig` representing a grid with explicitly specified slots. Every slot has to
/// lie entirely on fillable cells.
pub fn generate_grid_config(
    word_list: WordList,
    entries: &[SlotSpec],
    structure: Vec<Vec<bool>>,
) -> Result<GridConfig, GridConfigError> {
    let height = structure.len();
    let width = structure.iter().map(Vec::len).max().unwrap_or(0);

    let structure: Vec<Vec<bool>> = structure
        .into_iter()
        .map(|mut row| {
            row.resize(width, false);
            row
        })
        .collect();

    for entry in entries {
        for (row, col) in entry.cell_coords() {
            if row >= height || col >= width {
                return Err(GridConfigError::SlotOutOfBounds(entry.to_key()));
            }
            if !structure[row][col] {
                return Err(GridConfigError::SlotCoversBlock(entry.to_key()));
            }
        }
    }

    let (slot_configs, crossing_count) = generate_slot_configs(entries)?;

    Ok(GridConfig {
        word_list,
        structure,
        slot_configs,
        width,
        height,
        crossing_count,
    })
}

/// Parse a template string into a fillability matrix. `_` and `.` represent fillable cells and
/// anything else represents a block; rows shorter than the widest one are padded with blocks.
pub fn parse_structure(template: &str) -> Result<Vec<Vec<bool>>, GridConfigError> {
    let rows: Vec<Vec<bool>> = template
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                None
            } else {
                Some(line.chars().map(|c| c == '_' || c == '.').collect())
            }
        })
        .collect();

    if rows.is_empty() {
        return Err(GridConfigError::EmptyTemplate);
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);

    Ok(rows
        .into_iter()
        .map(|mut row| {
            row.resize(width, false);
            row
        })
        .collect())
}

/// Generate a list of `SlotSpec`s from a fillability matrix: every maximal run of two or more
/// fillable cells is a slot. Across slots come first, in reading order, then down slots, column
/// by column.
#[must_use]
pub fn generate_slots_from_structure(structure: &[Vec<bool>]) -> Vec<SlotSpec> {
    fn build_runs(lines: &[Vec<bool>]) -> Vec<(usize, usize, usize)> {
        let mut result = vec![];

        for (line_idx, line) in lines.iter().enumerate() {
            let mut run_start: Option<usize> = None;

            for (cell_idx, &fillable) in line.iter().chain([false].iter()).enumerate() {
                match (fillable, run_start) {
                    (true, None) => run_start = Some(cell_idx),
                    (false, Some(start)) => {
                        if cell_idx - start > 1 {
                            result.push((line_idx, start, cell_idx - start));
                        }
                        run_start = None;
                    }
                    _ => {}
                }
            }
        }

        result
    }

    let width = structure.iter().map(Vec::len).max().unwrap_or(0);
    let transposed: Vec<Vec<bool>> = (0..width)
        .map(|col| {
            structure
                .iter()
                .map(|row| row.get(col).copied().unwrap_or(false))
                .collect()
        })
        .collect();

    let across = build_runs(structure)
        .into_iter()
        .map(|(row, col, length)| SlotSpec {
            start_cell: (row, col),
            direction: Direction::Across,
            length,
        });

    let down = build_runs(&transposed)
        .into_iter()
        .map(|(col, row, length)| SlotSpec {
            start_cell: (row, col),
            direction: Direction::Down,
            length,
        });

    across.chain(down).collect()
}

/// Generate a `GridConfig` from a template string with `_` or `.` representing fillable cells and
/// anything else representing blocks.
pub fn generate_grid_config_from_template_string(
    word_list: WordList,
    template: &str,
) -> Result<GridConfig, GridConfigError> {
    let structure = parse_structure(template)?;
    let slot_specs = generate_slots_from_structure(&structure);

    generate_grid_config(word_list, &slot_specs, structure)
}

/// Project an assignment onto the grid: each cell gets the letter placed there, or `None` if no
/// assigned slot covers it.
#[must_use]
pub fn letter_grid(config: &GridConfig, assignment: &Assignment) -> Vec<Vec<Option<char>>> {
    let mut letters = vec![vec![None; config.width]; config.height];

    for (&slot_id, &word_id) in assignment {
        let slot_config = &config.slot_configs[slot_id];
        let word = &config.word_list.words[word_id];

        for ((row, col), &glyph) in slot_config.cell_coords().into_iter().zip(&word.glyphs) {
            letters[row][col] = Some(config.word_list.glyphs[glyph]);
        }
    }

    letters
}

/// Turn the given grid config and assignment into a rendered string, with blocks drawn as
/// `BLOCK_CHAR` and unfilled cells left blank.
#[must_use]
pub fn render_grid(config: &GridConfig, assignment: &Assignment) -> String {
    letter_grid(config, assignment)
        .iter()
        .enumerate()
        .map(|(row, letters)| {
            letters
                .iter()
                .enumerate()
                .map(|(col, letter)| {
                    if config.is_fillable(row, col) {
                        letter.unwrap_or(' ')
                    } else {
                        BLOCK_CHAR
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Express an assignment in terms of slot specs and word strings.
#[must_use]
pub fn assignment_words(config: &GridConfig, assignment: &Assignment) -> HashMap<SlotSpec, String> {
    assignment
        .iter()
        .map(|(&slot_id, &word_id)| {
            (
                config.slot_configs[slot_id].slot_spec(),
                config.word_list.word_string(word_id).to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
pub mod tests {
    use crate::grid_config::{
        generate_grid_config, generate_grid_config_from_template_string, letter_grid,
        parse_structure, render_grid, Direction, GridConfig, GridConfigError, SlotSpec,
    };
    use crate::types::Assignment;
    use crate::word_list::WordList;

    pub const STRUCTURE_0: &str = "
        #___#
        #_##_
        #_##_
        #_##_
        #____
    ";

    pub fn generate_config(template: &str, words: &[&str]) -> GridConfig {
        generate_grid_config_from_template_string(WordList::from_words(words), template)
            .expect("Failed to parse template")
    }

    fn spec(row: usize, col: usize, direction: Direction, length: usize) -> SlotSpec {
        SlotSpec {
            start_cell: (row, col),
            direction,
            length,
        }
    }

    #[test]
    fn test_generates_slots_from_template() {
        let config = generate_config(STRUCTURE_0, &[]);

        assert_eq!((config.width, config.height), (5, 5));
        assert_eq!(
            config.slot_specs(),
            vec![
                spec(0, 1, Direction::Across, 3),
                spec(4, 1, Direction::Across, 4),
                spec(0, 1, Direction::Down, 5),
                spec(1, 4, Direction::Down, 4),
            ]
        );
        assert_eq!(config.crossing_count, 3);
    }

    #[test]
    fn test_overlaps_are_symmetric() {
        let config = generate_config(STRUCTURE_0, &[]);

        assert_eq!(config.overlap(0, 2), Some((0, 0)));
        assert_eq!(config.overlap(2, 0), Some((0, 0)));
        assert_eq!(config.overlap(1, 2), Some((0, 4)));
        assert_eq!(config.overlap(2, 1), Some((4, 0)));
        assert_eq!(config.overlap(1, 3), Some((3, 3)));
        assert_eq!(config.overlap(0, 3), None);
        assert_eq!(config.overlap(0, 1), None);
        assert_eq!(config.overlap(0, 0), None);

        for slot_a in 0..config.slot_configs.len() {
            for slot_b in 0..config.slot_configs.len() {
                assert_eq!(
                    config.overlap(slot_a, slot_b),
                    config.overlap(slot_b, slot_a).map(|(b, a)| (a, b))
                );
            }
        }
    }

    #[test]
    fn test_neighbors_and_degree() {
        let config = generate_config(STRUCTURE_0, &[]);

        assert_eq!(config.neighbors(0).collect::<Vec<_>>(), vec![2]);
        assert_eq!(config.neighbors(1).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(config.neighbors(2).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(config.degree(3), 1);
    }

    #[test]
    fn test_crossing_ids_are_shared_by_both_slots() {
        let config = generate_config(STRUCTURE_0, &[]);

        let down_crossing_ids: Vec<_> = config.slot_configs[2]
            .crossings
            .iter()
            .flatten()
            .map(|crossing| crossing.crossing_id)
            .collect();

        let first_across = config.slot_configs[0].crossings[0].as_ref().unwrap();
        let last_across = config.slot_configs[1].crossings[0].as_ref().unwrap();
        assert_eq!(
            down_crossing_ids,
            vec![first_across.crossing_id, last_across.crossing_id]
        );
    }

    #[test]
    fn test_slot_lookup_by_spec() {
        let config = generate_config(STRUCTURE_0, &[]);

        assert_eq!(config.slot_id(&spec(1, 4, Direction::Down, 4)), Some(3));
        assert_eq!(config.slot_id(&spec(1, 4, Direction::Down, 3)), None);
    }

    #[test]
    fn test_is_fillable_and_padding() {
        let config = generate_config(
            "
            ___
            _
            ",
            &[],
        );

        assert_eq!((config.width, config.height), (3, 2));
        assert!(config.is_fillable(0, 2));
        assert!(config.is_fillable(1, 0));
        assert!(!config.is_fillable(1, 1));
        assert!(!config.is_fillable(5, 5));

        // Only column 0 has a vertical run long enough to form a slot.
        assert_eq!(
            config.slot_specs(),
            vec![spec(0, 0, Direction::Across, 3), spec(0, 0, Direction::Down, 2)]
        );
    }

    #[test]
    fn test_rejects_empty_template() {
        assert_eq!(parse_structure("\n   \n").unwrap_err(), GridConfigError::EmptyTemplate);
    }

    #[test]
    fn test_rejects_invalid_explicit_slots() {
        let structure = parse_structure("___\n_#_\n___").unwrap();

        let out_of_bounds = generate_grid_config(
            WordList::from_words(&["cat"]),
            &[spec(0, 1, Direction::Across, 3)],
            structure.clone(),
        );
        assert_eq!(
            out_of_bounds.unwrap_err(),
            GridConfigError::SlotOutOfBounds("0,1,across,3".into())
        );

        let over_block = generate_grid_config(
            WordList::from_words(&["cat"]),
            &[spec(0, 1, Direction::Down, 3)],
            structure.clone(),
        );
        assert_eq!(
            over_block.unwrap_err(),
            GridConfigError::SlotCoversBlock("0,1,down,3".into())
        );

        let repeated = generate_grid_config(
            WordList::from_words(&["cat"]),
            &[
                spec(0, 0, Direction::Across, 3),
                spec(0, 0, Direction::Across, 2),
            ],
            structure,
        );
        assert!(matches!(
            repeated.unwrap_err(),
            GridConfigError::RepeatedCrossing(_, _)
        ));
    }

    #[test]
    fn test_letter_grid_and_render() {
        let config = generate_config(STRUCTURE_0, &["six", "nine", "seven", "five"]);

        let mut assignment = Assignment::new();
        assignment.insert(0, config.word_list.word_id("six").unwrap());
        assignment.insert(2, config.word_list.word_id("seven").unwrap());

        let letters = letter_grid(&config, &assignment);
        assert_eq!(letters[0], vec![None, Some('s'), Some('i'), Some('x'), None]);
        assert_eq!(letters[4][1], Some('n'));
        assert_eq!(letters[4][2], None);

        assert_eq!(
            render_grid(&config, &assignment),
            "█six█\n█e██ \n█v██ \n█e██ \n█n   "
        );
    }

    #[test]
    fn test_slot_key_round_trip() {
        let slot_spec = spec(3, 4, Direction::Down, 12);
        assert_eq!(slot_spec.to_key(), "3,4,down,12");
        assert_eq!(SlotSpec::from_key("3,4,down,12"), Ok(slot_spec));
        assert_eq!(
            SlotSpec::from_key("3,4,sideways,12"),
            Err(GridConfigError::InvalidSlotKey("3,4,sideways,12".into()))
        );
    }
}
