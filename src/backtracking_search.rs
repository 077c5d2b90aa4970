//! This module implements grid-filling using a backtracking search. Before searching we make every
//! slot node-consistent and then establish arc consistency with AC-3 (see `arc_consistency.rs`),
//! which leaves the domains fixed for the rest of the fill. The search itself picks slots with the
//! minimum-remaining-values heuristic (ties broken by degree), tries words in
//! least-constraining-value order, and only ever extends consistent partial assignments.

use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::arc_consistency::{
    enforce_node_consistency, establish_arc_consistency, initial_domains, ArcConsistencyFailure,
    ArcConsistencySuccess,
};
use crate::grid_config::GridConfig;
use crate::types::{Assignment, Domains, SlotId, WordId};
use crate::util::{build_glyph_counts_for_cell, glyph_count, GlyphCounts};
use crate::CHECK_INVARIANTS;

/// How many states should we visit between checks of the deadline and abort flag?
pub const INTERRUPT_FREQUENCY: usize = 10;

/// A struct tracking stats about the filling process.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub states: usize,
    pub backtracks: usize,
    pub node_eliminations: usize,
    pub arc_revisions: usize,
    pub arc_eliminations: usize,
    pub total_time: Duration,
    pub consistency_time: Duration,
    pub search_time: Duration,
}

impl Statistics {
    /// Fold in the search counters from another (parallel) search branch.
    fn absorb_search(&mut self, other: &Statistics) {
        self.states += other.states;
        self.backtracks += other.backtracks;
    }
}

/// Knobs for a fill operation. The default is a plain single-threaded search that runs until it
/// either succeeds or exhausts the search space.
#[derive(Debug, Clone, Default)]
pub struct FillOptions {
    /// Give up with `FillFailure::Timeout` once this much time has passed.
    pub timeout: Option<Duration>,

    /// A flag that can be set from another thread to cancel the fill.
    pub abort: Option<Arc<AtomicBool>>,

    /// Explore the candidates for the first slot in parallel, keeping whichever branch finishes
    /// first. Which fill is found may differ from the sequential search when several exist.
    pub parallel: bool,
}

/// A struct representing the results of a fill operation.
#[derive(Debug)]
pub struct FillSuccess {
    pub statistics: Statistics,
    pub assignment: Assignment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillFailure {
    /// There's no way to fill the grid with the given word list.
    HardFailure,
    Timeout,
    Abort,
}

/// Is every slot in the grid assigned a word?
#[must_use]
pub fn is_complete(config: &GridConfig, assignment: &Assignment) -> bool {
    (0..config.slot_configs.len()).all(|slot_id| assignment.contains_key(&slot_id))
}

/// Could `slot_id` hold `word_id` given the rest of the assignment? Checks the length, that no
/// other slot already uses the word, and that the word agrees with every assigned crossing slot.
/// Any existing entry for `slot_id` itself is ignored.
#[must_use]
pub fn is_choice_consistent(
    config: &GridConfig,
    assignment: &Assignment,
    slot_id: SlotId,
    word_id: WordId,
) -> bool {
    let slot_config = &config.slot_configs[slot_id];
    let words = &config.word_list.words;
    let word = &words[word_id];

    if word.len() != slot_config.length {
        return false;
    }

    if assignment
        .iter()
        .any(|(&other_slot_id, &other_word_id)| other_slot_id != slot_id && other_word_id == word_id)
    {
        return false;
    }

    slot_config
        .crossings
        .iter()
        .zip(&word.glyphs)
        .all(|(crossing, glyph)| {
            let Some(crossing) = crossing else {
                return true;
            };
            match assignment.get(&crossing.other_slot_id) {
                Some(&other_word_id) => {
                    words[other_word_id].glyphs.get(crossing.other_slot_cell) == Some(glyph)
                }
                None => true,
            }
        })
}

/// Do all of the assigned words fit together? This holds for partial assignments as long as the
/// words are distinct, have the right lengths, and agree wherever two assigned slots cross.
#[must_use]
pub fn is_consistent(config: &GridConfig, assignment: &Assignment) -> bool {
    let distinct_words: HashSet<WordId> = assignment.values().copied().collect();
    if distinct_words.len() != assignment.len() {
        return false;
    }

    assignment
        .iter()
        .all(|(&slot_id, &word_id)| is_choice_consistent(config, assignment, slot_id, word_id))
}

/// Identify the next slot we should try to fill: the unassigned slot with the fewest remaining
/// options, preferring slots with more crossings and then lower ids. Returns `None` if every slot
/// is assigned.
#[must_use]
pub fn select_unassigned_slot(
    config: &GridConfig,
    domains: &Domains,
    assignment: &Assignment,
) -> Option<SlotId> {
    (0..config.slot_configs.len())
        .filter(|slot_id| !assignment.contains_key(slot_id))
        .min_by_key(|&slot_id| (domains[slot_id].len(), Reverse(config.degree(slot_id))))
}

/// Order a slot's options so that the ones ruling out the fewest options in unassigned crossing
/// slots come first. Ties keep their domain order.
#[must_use]
pub fn order_domain_values(
    config: &GridConfig,
    domains: &Domains,
    slot_id: SlotId,
    assignment: &Assignment,
) -> Vec<WordId> {
    let words = &config.word_list.words;

    // For each unassigned crossing: (cell in this slot, crossing option count, glyph counts in the
    // crossing slot's shared cell).
    let crossing_counts: Vec<(usize, usize, GlyphCounts)> = config.slot_configs[slot_id]
        .crossings
        .iter()
        .enumerate()
        .filter_map(|(cell_idx, crossing)| {
            let crossing = crossing.as_ref()?;
            if assignment.contains_key(&crossing.other_slot_id) {
                return None;
            }
            let options = &domains[crossing.other_slot_id];
            Some((
                cell_idx,
                options.len(),
                build_glyph_counts_for_cell(&config.word_list, crossing.other_slot_cell, options),
            ))
        })
        .collect();

    let mut ordered = domains[slot_id].clone();
    ordered.sort_by_cached_key(|&word_id| {
        crossing_counts
            .iter()
            .map(|(cell_idx, option_count, counts)| {
                let compatible = words[word_id]
                    .glyphs
                    .get(*cell_idx)
                    .map_or(0, |&glyph| glyph_count(counts, glyph) as usize);
                option_count - compatible
            })
            .sum::<usize>()
    });

    ordered
}

/// The live state of one depth-first search over fixed domains.
struct Search<'a> {
    config: &'a GridConfig,
    domains: &'a Domains,
    deadline: Option<Instant>,
    abort: Option<&'a AtomicBool>,

    /// Set when a sibling branch of a parallel search has already found a fill.
    cancel: Option<&'a AtomicBool>,

    statistics: Statistics,
}

impl<'a> Search<'a> {
    fn new(
        config: &'a GridConfig,
        domains: &'a Domains,
        deadline: Option<Instant>,
        abort: Option<&'a AtomicBool>,
    ) -> Search<'a> {
        Search {
            config,
            domains,
            deadline,
            abort,
            cancel: None,
            statistics: Statistics::default(),
        }
    }

    fn check_interrupts(&self) -> Result<(), FillFailure> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(FillFailure::Timeout);
            }
        }

        let is_set = |flag: Option<&AtomicBool>| flag.is_some_and(|flag| flag.load(Ordering::Relaxed));
        if is_set(self.abort) || is_set(self.cancel) {
            return Err(FillFailure::Abort);
        }

        Ok(())
    }

    /// Extend `assignment` into a complete one if possible. Returns `Ok(false)` once every option
    /// for the chosen slot has failed, in which case `assignment` is left as it was passed in.
    fn backtrack(&mut self, assignment: &mut Assignment) -> Result<bool, FillFailure> {
        self.statistics.states += 1;

        if self.statistics.states % INTERRUPT_FREQUENCY == 0 {
            self.check_interrupts()?;
        }

        if is_complete(self.config, assignment) {
            return Ok(true);
        }

        let Some(slot_id) = select_unassigned_slot(self.config, self.domains, assignment) else {
            return Ok(true);
        };

        for word_id in order_domain_values(self.config, self.domains, slot_id, assignment) {
            assignment.insert(slot_id, word_id);

            if is_choice_consistent(self.config, assignment, slot_id, word_id) {
                if CHECK_INVARIANTS && !is_consistent(self.config, assignment) {
                    panic!("Search accepted an inconsistent assignment: {assignment:?}");
                }

                if self.backtrack(assignment)? {
                    return Ok(true);
                }
            }

            assignment.remove(&slot_id);
            self.statistics.backtracks += 1;

            if assignment.is_empty() {
                debug!(
                    slot = %self.config.slot_configs[slot_id].slot_key(),
                    word = self.config.word_list.word_string(word_id),
                    states = self.statistics.states,
                    "Exhausted first-slot option"
                );
            }
        }

        Ok(false)
    }
}

/// Run the search on the current thread.
fn search_sequential(
    config: &GridConfig,
    domains: &Domains,
    deadline: Option<Instant>,
    abort: Option<&AtomicBool>,
) -> (Result<Assignment, FillFailure>, Statistics) {
    let mut search = Search::new(config, domains, deadline, abort);
    let mut assignment = Assignment::new();

    let result = match search.backtrack(&mut assignment) {
        Ok(true) => Ok(assignment),
        Ok(false) => Err(FillFailure::HardFailure),
        Err(failure) => Err(failure),
    };

    (result, search.statistics)
}

/// Run the search with each candidate for the first slot explored as its own task. Each branch
/// owns its assignment and only reads the shared domains; the first branch to finish a fill flags
/// the others to stop.
fn search_parallel(
    config: &GridConfig,
    domains: &Domains,
    deadline: Option<Instant>,
    abort: Option<&AtomicBool>,
) -> (Result<Assignment, FillFailure>, Statistics) {
    let empty = Assignment::new();
    let Some(root_slot_id) = select_unassigned_slot(config, domains, &empty) else {
        return (Ok(empty), Statistics::default());
    };
    let candidates = order_domain_values(config, domains, root_slot_id, &empty);

    let found = AtomicBool::new(false);
    let winner: Mutex<Option<Assignment>> = Mutex::new(None);
    let interruption: Mutex<Option<FillFailure>> = Mutex::new(None);
    let statistics: Mutex<Statistics> = Mutex::new(Statistics::default());

    candidates.par_iter().for_each(|&word_id| {
        if found.load(Ordering::Relaxed) {
            return;
        }

        let mut search = Search {
            cancel: Some(&found),
            ..Search::new(config, domains, deadline, abort)
        };
        let mut assignment = Assignment::new();
        assignment.insert(root_slot_id, word_id);

        let outcome = search.check_interrupts().and_then(|()| {
            if is_choice_consistent(config, &assignment, root_slot_id, word_id) {
                search.backtrack(&mut assignment)
            } else {
                Ok(false)
            }
        });

        if let Ok(mut statistics) = statistics.lock() {
            statistics.absorb_search(&search.statistics);
        }

        match outcome {
            Ok(true) => {
                found.store(true, Ordering::Relaxed);
                if let Ok(mut winner) = winner.lock() {
                    winner.get_or_insert(assignment);
                }
            }
            Ok(false) => {}
            Err(failure) => {
                // Branches stopped because a sibling succeeded aren't failures.
                if !found.load(Ordering::Relaxed) {
                    if let Ok(mut interruption) = interruption.lock() {
                        interruption.get_or_insert(failure);
                    }
                }
            }
        }
    });

    let statistics = statistics.into_inner().unwrap_or_default();
    let result = match winner.into_inner().ok().flatten() {
        Some(assignment) => Ok(assignment),
        None => Err(interruption
            .into_inner()
            .ok()
            .flatten()
            .unwrap_or(FillFailure::HardFailure)),
    };

    (result, statistics)
}

/// Search for a valid fill for the given grid: make every slot node-consistent, establish arc
/// consistency, and then run a backtracking search over the narrowed domains.
pub fn find_fill(config: &GridConfig, options: &FillOptions) -> Result<FillSuccess, FillFailure> {
    let start = Instant::now();
    let deadline = options.timeout.map(|timeout| start + timeout);
    let abort = options.abort.as_deref();
    let mut statistics = Statistics::default();

    let mut domains = initial_domains(config);
    statistics.node_eliminations = enforce_node_consistency(config, &mut domains);

    match establish_arc_consistency(config, &mut domains, None) {
        Ok(ArcConsistencySuccess {
            revisions,
            eliminations,
        }) => {
            statistics.arc_revisions = revisions;
            statistics.arc_eliminations = eliminations;
        }
        Err(ArcConsistencyFailure {
            slot_id,
            revisions,
            eliminations,
        }) => {
            info!(
                slot = %config.slot_configs[slot_id].slot_key(),
                revisions, eliminations, "No fill: slot has no options left after propagation"
            );
            return Err(FillFailure::HardFailure);
        }
    }
    statistics.consistency_time = start.elapsed();

    debug!(
        slots = config.slot_configs.len(),
        remaining_options = domains.iter().map(Vec::len).sum::<usize>(),
        "Starting search"
    );

    Search::new(config, &domains, deadline, abort).check_interrupts()?;

    let search_start = Instant::now();
    let (result, search_statistics) = if options.parallel {
        search_parallel(config, &domains, deadline, abort)
    } else {
        search_sequential(config, &domains, deadline, abort)
    };
    statistics.absorb_search(&search_statistics);
    statistics.search_time = search_start.elapsed();
    statistics.total_time = start.elapsed();

    match result {
        Ok(assignment) => {
            info!(?statistics, "Found fill");
            Ok(FillSuccess {
                statistics,
                assignment,
            })
        }
        Err(failure) => {
            info!(?failure, ?statistics, "Fill failed");
            Err(failure)
        }
    }
}

/// Fill the grid, returning `None` if that's impossible with the given word list.
#[must_use]
pub fn solve(config: &GridConfig) -> Option<Assignment> {
    find_fill(config, &FillOptions::default())
        .ok()
        .map(|success| success.assignment)
}
