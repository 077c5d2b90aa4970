//! This module contains the domain-narrowing half of the solver: node consistency (each slot only
//! keeps words of its own length) and the AC-3 algorithm for establishing arc consistency. For our
//! purposes, a grid is arc-consistent when every word remaining in a slot's domain has at least
//! one partner in each crossing slot's domain that agrees on the shared letter.
//!
//! Domains only ever shrink here. If a domain is wiped out the grid can't be filled, and we bail
//! out immediately.

use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

use crate::grid_config::GridConfig;
use crate::types::{Domains, SlotId};
use crate::util::{build_glyph_counts_for_cell, glyph_count};

/// A directed constraint between two crossing slots: `(x, y)` means "make `x` consistent with
/// `y`".
pub type SlotArc = (SlotId, SlotId);

/// Result from a successful call to `establish_arc_consistency`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArcConsistencySuccess {
    /// How many times `revise` was called.
    pub revisions: usize,

    /// How many words were removed across all domains.
    pub eliminations: usize,
}

/// Result from a failed call to `establish_arc_consistency`, identifying the slot whose domain was
/// wiped out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcConsistencyFailure {
    pub slot_id: SlotId,
    pub revisions: usize,
    pub eliminations: usize,
}

/// Result from a call to `establish_arc_consistency`.
pub type ArcConsistencyResult = Result<ArcConsistencySuccess, ArcConsistencyFailure>;

/// Every slot starts out able to take any word in the list.
#[must_use]
pub fn initial_domains(config: &GridConfig) -> Domains {
    let all_words: Vec<_> = (0..config.word_list.len()).collect();
    vec![all_words; config.slot_configs.len()]
}

/// Remove every word whose length doesn't match its slot's length, returning the number of words
/// removed. A domain may end up empty; that's left for later phases to discover.
pub fn enforce_node_consistency(config: &GridConfig, domains: &mut Domains) -> usize {
    let words = &config.word_list.words;
    let mut eliminations = 0;

    for (slot_config, options) in config.slot_configs.iter().zip(domains.iter_mut()) {
        let before = options.len();
        options.retain(|&word_id| words[word_id].len() == slot_config.length);
        eliminations += before - options.len();
    }

    debug!(eliminations, "Established node consistency");

    eliminations
}

/// Make slot `x` arc consistent with slot `y` by removing every option for `x` whose letter in
/// the shared cell doesn't appear in that cell in any of `y`'s options. Returns whether anything
/// was removed.
///
/// # Panics
///
/// If `x` and `y` don't cross. Callers only ever build arcs between crossing slots.
pub fn revise(config: &GridConfig, domains: &mut Domains, x: SlotId, y: SlotId) -> bool {
    let (x_cell, y_cell) = config
        .overlap(x, y)
        .expect("revise must only be called on crossing slots");

    // Tally the letters `y` can still put in the shared cell before touching `x`, so we never
    // read from a domain while we're removing from it.
    let y_counts = build_glyph_counts_for_cell(&config.word_list, y_cell, &domains[y]);
    let words = &config.word_list.words;

    let before = domains[x].len();
    domains[x].retain(|&word_id| {
        words[word_id]
            .glyphs
            .get(x_cell)
            .is_some_and(|&glyph| glyph_count(&y_counts, glyph) > 0)
    });

    domains[x].len() != before
}

/// Every arc in the grid, in both directions.
#[must_use]
pub fn all_arcs(config: &GridConfig) -> Vec<SlotArc> {
    (0..config.slot_configs.len())
        .flat_map(|x| config.neighbors(x).map(move |y| (x, y)))
        .collect()
}

/// Run AC-3 over the given domains. If `arcs` is `None`, start from every arc in the grid;
/// otherwise start from the given arcs (ignoring any between slots that don't cross).
pub fn establish_arc_consistency(
    config: &GridConfig,
    domains: &mut Domains,
    arcs: Option<Vec<SlotArc>>,
) -> ArcConsistencyResult {
    let initial_arcs = arcs.unwrap_or_else(|| all_arcs(config));

    let mut queue: VecDeque<SlotArc> = VecDeque::with_capacity(initial_arcs.len());
    let mut queued: HashSet<SlotArc> = HashSet::with_capacity(initial_arcs.len());
    for arc in initial_arcs {
        if config.overlap(arc.0, arc.1).is_some() && queued.insert(arc) {
            queue.push_back(arc);
        }
    }

    let mut revisions = 0;
    let mut eliminations = 0;

    while let Some((x, y)) = queue.pop_front() {
        queued.remove(&(x, y));

        let before = domains[x].len();
        revisions += 1;

        if !revise(config, domains, x, y) {
            continue;
        }

        eliminations += before - domains[x].len();
        trace!(
            slot = x,
            against = y,
            remaining = domains[x].len(),
            "Revised domain"
        );

        if domains[x].is_empty() {
            debug!(slot = x, revisions, eliminations, "Domain wiped out");
            return Err(ArcConsistencyFailure {
                slot_id: x,
                revisions,
                eliminations,
            });
        }

        // Narrowing `x` may have left its other neighbors with unsupported options. `y` itself
        // doesn't need rechecking: everything removed from `x` had no partner in `y` anyway.
        for z in config.neighbors(x) {
            if z != y && queued.insert((z, x)) {
                queue.push_back((z, x));
            }
        }
    }

    debug!(revisions, eliminations, "Established arc consistency");

    Ok(ArcConsistencySuccess {
        revisions,
        eliminations,
    })
}

#[cfg(test)]
mod tests {
    use crate::arc_consistency::{
        all_arcs, enforce_node_consistency, establish_arc_consistency, initial_domains, revise,
        ArcConsistencyFailure,
    };
    use crate::grid_config::tests::{generate_config, STRUCTURE_0};
    use crate::grid_config::GridConfig;
    use crate::types::Domains;
    use proptest::prelude::*;

    const WORDS_0: [&str; 10] = [
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];

    /// Two across slots and two down slots forming a ring.
    const RING: &str = "
        ___
        _#_
        ___
    ";

    fn domain_strings(config: &GridConfig, domains: &Domains) -> Vec<Vec<String>> {
        domains
            .iter()
            .map(|options| {
                options
                    .iter()
                    .map(|&word_id| config.word_list.word_string(word_id).to_string())
                    .collect()
            })
            .collect()
    }

    fn is_arc_consistent(config: &GridConfig, domains: &Domains) -> bool {
        let words = &config.word_list.words;
        all_arcs(config).into_iter().all(|(x, y)| {
            let (x_cell, y_cell) = config.overlap(x, y).unwrap();
            domains[x].iter().all(|&x_word| {
                domains[y]
                    .iter()
                    .any(|&y_word| words[x_word].glyphs[x_cell] == words[y_word].glyphs[y_cell])
            })
        })
    }

    #[test]
    fn test_node_consistency_filters_by_length() {
        let config = generate_config(STRUCTURE_0, &WORDS_0);
        let mut domains = initial_domains(&config);

        let eliminations = enforce_node_consistency(&config, &mut domains);

        assert_eq!(
            domain_strings(&config, &domains),
            vec![
                vec!["one", "two", "six", "ten"],
                vec!["four", "five", "nine"],
                vec!["three", "seven", "eight"],
                vec!["four", "five", "nine"],
            ]
        );
        assert_eq!(eliminations, 40 - 13);
    }

    #[test]
    fn test_node_consistency_is_idempotent() {
        let config = generate_config(STRUCTURE_0, &WORDS_0);
        let mut domains = initial_domains(&config);

        enforce_node_consistency(&config, &mut domains);
        let once = domains.clone();

        assert_eq!(enforce_node_consistency(&config, &mut domains), 0);
        assert_eq!(domains, once);
    }

    #[test]
    fn test_revise() {
        let config = generate_config(
            "
            ___
            #_#
            #_#
            ",
            &["dog", "god", "ore", "cat"],
        );
        let mut domains = initial_domains(&config);
        domains[1] = vec![config.word_list.word_id("ore").unwrap()];

        assert!(revise(&config, &mut domains, 0, 1));
        assert_eq!(
            domain_strings(&config, &domains)[0],
            vec!["dog", "god"]
        );

        assert!(!revise(&config, &mut domains, 0, 1));
    }

    #[test]
    #[should_panic(expected = "revise must only be called on crossing slots")]
    fn test_revise_rejects_non_crossing_slots() {
        let config = generate_config(STRUCTURE_0, &WORDS_0);
        let mut domains = initial_domains(&config);

        revise(&config, &mut domains, 0, 3);
    }

    #[test]
    fn test_establish_arc_consistency() {
        let config = generate_config(STRUCTURE_0, &WORDS_0);
        let mut domains = initial_domains(&config);
        enforce_node_consistency(&config, &mut domains);

        let success = establish_arc_consistency(&config, &mut domains, None)
            .expect("Failed to establish consistency");

        // Uniqueness isn't an arc constraint, so "nine" survives in the last slot.
        assert_eq!(
            domain_strings(&config, &domains),
            vec![
                vec!["six"],
                vec!["nine"],
                vec!["seven"],
                vec!["five", "nine"],
            ]
        );
        assert_eq!(success.eliminations, 8);
        assert!(is_arc_consistent(&config, &domains));
    }

    #[test]
    fn test_establish_arc_consistency_from_given_arcs() {
        let config = generate_config(STRUCTURE_0, &WORDS_0);
        let mut domains = initial_domains(&config);
        enforce_node_consistency(&config, &mut domains);
        let before = domains.clone();

        // Arcs between slots that don't cross are skipped rather than revised.
        establish_arc_consistency(&config, &mut domains, Some(vec![(0, 2), (0, 3)]))
            .expect("Failed to establish consistency");

        let strings = domain_strings(&config, &domains);
        assert_eq!(strings[0], vec!["two", "six", "ten"]);
        assert_eq!(domains[1..], before[1..]);
    }

    #[test]
    fn test_establish_arc_consistency_fails_on_wipeout() {
        let config = generate_config(
            "
            ___
            _##
            _##
            _##
            ",
            &["cat", "dog", "bird", "fish"],
        );
        let mut domains = initial_domains(&config);
        enforce_node_consistency(&config, &mut domains);

        let result = establish_arc_consistency(&config, &mut domains, None);

        assert!(matches!(
            result,
            Err(ArcConsistencyFailure { slot_id: 0, .. })
        ));
        assert!(domains[0].is_empty());
    }

    #[test]
    fn test_grid_without_crossings_is_trivially_consistent() {
        let config = generate_config(
            "
            ___
            ###
            ___
            ",
            &["cat"],
        );
        let mut domains = initial_domains(&config);
        enforce_node_consistency(&config, &mut domains);

        let success = establish_arc_consistency(&config, &mut domains, None).unwrap();
        assert_eq!(success.revisions, 0);
        assert_eq!(domains, vec![vec![0], vec![0]]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_node_consistency_keeps_only_matching_lengths(
            words in prop::collection::vec("[abc]{2,4}", 1..12)
        ) {
            let config = generate_config(RING, &words.iter().map(String::as_str).collect::<Vec<_>>());
            let mut domains = initial_domains(&config);
            enforce_node_consistency(&config, &mut domains);

            for (slot_config, options) in config.slot_configs.iter().zip(&domains) {
                for &word_id in options {
                    prop_assert_eq!(config.word_list.words[word_id].len(), slot_config.length);
                }
            }

            let once = domains.clone();
            enforce_node_consistency(&config, &mut domains);
            prop_assert_eq!(domains, once);
        }

        #[test]
        fn prop_arc_consistency_is_sound(
            words in prop::collection::vec("[abc]{3}", 1..12)
        ) {
            let config = generate_config(RING, &words.iter().map(String::as_str).collect::<Vec<_>>());
            let mut domains = initial_domains(&config);
            enforce_node_consistency(&config, &mut domains);
            let before = domains.clone();

            match establish_arc_consistency(&config, &mut domains, None) {
                Ok(_) => {
                    prop_assert!(domains.iter().all(|options| !options.is_empty()));
                    prop_assert!(is_arc_consistent(&config, &domains));
                }
                Err(failure) => {
                    prop_assert!(domains[failure.slot_id].is_empty());
                }
            }

            // Domains only ever shrink.
            for (after, before) in domains.iter().zip(&before) {
                prop_assert!(after.iter().all(|word_id| before.contains(word_id)));
            }
        }
    }
}
