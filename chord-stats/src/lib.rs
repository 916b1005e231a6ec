//! Builds per-corpus chord statistics (`StatSet`) from parsed songs, and
//! linearly mixes several weighted stat sets together in log space.
//!
//! A `StatSet` records, for one corpus, the marginal log-probability of
//! seeing each chord, and the forward/backward transition log-probabilities
//! between chords. Counts come straight from `Measure::reps` (a repeated
//! chord contributes `reps - 1` self-transitions) and consecutive measures
//! within a song (never across song boundaries).

use std::collections::{BTreeMap, BTreeSet};

use chord_corpus::Song;
use chord_theory::Chord;
use serde::{Deserialize, Serialize};

/// Stand-in log-probability for an entry that was never observed. Never
/// `-inf`: a missing transition should drag a path down, not zero it out.
pub const LOGP_MISSING: f64 = -1e3;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatSet {
    pub marginal_logp: BTreeMap<Chord, f64>,
    /// `forward_logp[c_prev][c_next]` = log P(c_next | c_prev).
    pub forward_logp: BTreeMap<Chord, BTreeMap<Chord, f64>>,
    /// `backward_logp[c_next][c_prev]` = log P(c_prev | c_next).
    pub backward_logp: BTreeMap<Chord, BTreeMap<Chord, f64>>,
    /// Melody-note counts seen as a chord's first slot in a song.
    pub first_emit_count: BTreeMap<Chord, BTreeMap<u8, u32>>,
    /// Melody-note counts seen in any other slot.
    pub other_emit_count: BTreeMap<Chord, BTreeMap<u8, u32>>,
}

impl StatSet {
    pub fn from_songs(songs: &[Song]) -> Self {
        let mut seen_chords: BTreeMap<Chord, u64> = BTreeMap::new();
        let mut transitions: BTreeMap<Chord, BTreeMap<Chord, u64>> = BTreeMap::new();
        let mut first_emit_count: BTreeMap<Chord, BTreeMap<u8, u32>> = BTreeMap::new();
        let mut other_emit_count: BTreeMap<Chord, BTreeMap<u8, u32>> = BTreeMap::new();

        for song in songs {
            let mut prev: Option<&chord_corpus::Measure> = None;
            for measure in &song.measures {
                *seen_chords.entry(measure.chord).or_default() += measure.reps as u64;

                for (i, &(note, _dur)) in measure.melody_notes.iter().enumerate() {
                    let bucket = if i == 0 {
                        &mut first_emit_count
                    } else {
                        &mut other_emit_count
                    };
                    *bucket.entry(measure.chord).or_default().entry(note).or_default() += 1;
                }

                if measure.reps > 1 {
                    *transitions.entry(measure.chord).or_default().entry(measure.chord).or_default() +=
                        (measure.reps - 1) as u64;
                }
                if let Some(prev_measure) = prev {
                    *transitions
                        .entry(prev_measure.chord)
                        .or_default()
                        .entry(measure.chord)
                        .or_default() += 1;
                }
                prev = Some(measure);
            }
        }

        let marginal_logp = compute_seen_log_probs(&seen_chords);
        let (forward_logp, backward_logp) = compute_transition_log_probs(&seen_chords, &transitions);

        StatSet {
            marginal_logp,
            forward_logp,
            backward_logp,
            first_emit_count,
            other_emit_count,
        }
    }

    pub fn marginal(&self, chord: &Chord) -> f64 {
        self.marginal_logp.get(chord).copied().unwrap_or(LOGP_MISSING)
    }

    pub fn forward(&self, c_prev: &Chord, c_next: &Chord) -> f64 {
        self.forward_logp
            .get(c_prev)
            .and_then(|row| row.get(c_next))
            .copied()
            .unwrap_or(LOGP_MISSING)
    }

    pub fn backward(&self, c_next: &Chord, c_prev: &Chord) -> f64 {
        self.backward_logp
            .get(c_next)
            .and_then(|row| row.get(c_prev))
            .copied()
            .unwrap_or(LOGP_MISSING)
    }

    pub fn chords(&self) -> impl Iterator<Item = &Chord> {
        self.marginal_logp.keys()
    }
}

fn compute_seen_log_probs(seen_chords: &BTreeMap<Chord, u64>) -> BTreeMap<Chord, f64> {
    let total: u64 = seen_chords.values().sum();
    seen_chords
        .iter()
        .map(|(&chord, &count)| (chord, (count as f64 / total as f64).ln()))
        .collect()
}

fn compute_transition_log_probs(
    seen_chords: &BTreeMap<Chord, u64>,
    transitions: &BTreeMap<Chord, BTreeMap<Chord, u64>>,
) -> (BTreeMap<Chord, BTreeMap<Chord, f64>>, BTreeMap<Chord, BTreeMap<Chord, f64>>) {
    let mut back_transitions: BTreeMap<Chord, BTreeMap<Chord, u64>> = BTreeMap::new();
    let mut forward_logp: BTreeMap<Chord, BTreeMap<Chord, f64>> = BTreeMap::new();

    for (&c_prev, next_chords) in transitions {
        // The denominator is how often c_prev was seen at all, not its
        // out-degree: a chord transitions to itself and to other chords
        // from the same pool of appearances.
        let total = seen_chords[&c_prev] as f64;
        let mut row = BTreeMap::new();
        for (&c_next, &count) in next_chords {
            row.insert(c_next, (count as f64 / total).ln());
            *back_transitions.entry(c_next).or_default().entry(c_prev).or_default() += count;
        }
        forward_logp.insert(c_prev, row);
    }

    let mut backward_logp: BTreeMap<Chord, BTreeMap<Chord, f64>> = BTreeMap::new();
    for (&c_next, prev_chords) in &back_transitions {
        let total = seen_chords[&c_next] as f64;
        let mut row = BTreeMap::new();
        for (&c_prev, &count) in prev_chords {
            row.insert(c_prev, (count as f64 / total).ln());
        }
        backward_logp.insert(c_next, row);
    }

    (forward_logp, backward_logp)
}

/// Linearly mix a set of weighted marginal-probability dicts in log space.
/// A chord missing from one of the dicts contributes `LOGP_MISSING` to that
/// dict's term, not the chord's mixed marginal.
pub fn linearly_mix_dicts(weighted: &[(f64, &BTreeMap<Chord, f64>)]) -> BTreeMap<Chord, f64> {
    let mut keys = BTreeSet::new();
    for (_, d) in weighted {
        keys.extend(d.keys().copied());
    }
    keys.into_iter()
        .map(|chord| {
            let mixed = weighted
                .iter()
                .map(|(w, d)| w * d.get(&chord).copied().unwrap_or(LOGP_MISSING))
                .sum();
            (chord, mixed)
        })
        .collect()
}

/// A mixed transition table. Only covers chords that appear as an outer key
/// (a transition source) in at least one of the contributing stat sets.
#[derive(Clone, Debug, Default)]
pub struct MixedTransitions {
    rows: BTreeMap<Chord, BTreeMap<Chord, f64>>,
}

impl MixedTransitions {
    /// Look up `c_prev -> c_next`. If `c_prev` was never a transition source
    /// in any contributing stat set, this falls back to the mixed marginal
    /// log-probability of `c_next` (the whole row defaults to the marginal
    /// distribution, not to `LOGP_MISSING`). If `c_prev` does have a row but
    /// lacks this particular `c_next`, the entry is `LOGP_MISSING`.
    pub fn get(&self, c_prev: &Chord, c_next: &Chord, mixed_marginal: &BTreeMap<Chord, f64>) -> f64 {
        match self.rows.get(c_prev) {
            Some(row) => row.get(c_next).copied().unwrap_or(LOGP_MISSING),
            None => mixed_marginal.get(c_next).copied().unwrap_or(LOGP_MISSING),
        }
    }
}

/// Linearly mix a set of weighted transition-table dicts (forward or
/// backward) in log space, per `MixedTransitions`'s fallback rule.
pub fn linearly_mix_transitions(
    weighted: &[(f64, &BTreeMap<Chord, BTreeMap<Chord, f64>>)],
) -> MixedTransitions {
    let mut outer_keys = BTreeSet::new();
    for (_, d) in weighted {
        outer_keys.extend(d.keys().copied());
    }

    let mut rows = BTreeMap::new();
    for outer in outer_keys {
        let per_stat_rows: Vec<(f64, Option<&BTreeMap<Chord, f64>>)> =
            weighted.iter().map(|&(w, d)| (w, d.get(&outer))).collect();

        let mut inner_keys = BTreeSet::new();
        for (_, row) in &per_stat_rows {
            if let Some(row) = row {
                inner_keys.extend(row.keys().copied());
            }
        }

        let mixed_row: BTreeMap<Chord, f64> = inner_keys
            .into_iter()
            .map(|inner| {
                let mixed = per_stat_rows
                    .iter()
                    .map(|(w, row)| {
                        w * row.and_then(|r| r.get(&inner)).copied().unwrap_or(LOGP_MISSING)
                    })
                    .sum();
                (inner, mixed)
            })
            .collect();
        rows.insert(outer, mixed_row);
    }

    MixedTransitions { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_corpus::Measure;
    use chord_theory::c;

    fn measure(chord: chord_theory::Chord, reps: u32) -> Measure {
        Measure {
            chord,
            chord_name: chord.stringify(),
            start: 0.0,
            end: 1.0,
            reps,
            melody_notes: vec![],
        }
    }

    fn sample_song() -> Song {
        Song {
            name: "s".to_string(),
            mode_tag: "maj".to_string(),
            measures: vec![measure(c::i(), 2), measure(c::v(), 1), measure(c::i(), 1)],
        }
    }

    #[test]
    fn marginal_probabilities_sum_to_one() {
        let stats = StatSet::from_songs(&[sample_song()]);
        let total: f64 = stats.marginal_logp.values().map(|lp| lp.exp()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn repeated_chord_contributes_self_transition() {
        let stats = StatSet::from_songs(&[sample_song()]);
        // I repeats once (reps=2) then goes to V: two outgoing events from I.
        let self_transition = stats.forward(&c::i(), &c::i());
        let to_v = stats.forward(&c::i(), &c::v());
        assert!((self_transition.exp() - 0.5).abs() < 1e-9);
        assert!((to_v.exp() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn never_transitioned_pair_is_missing() {
        let stats = StatSet::from_songs(&[sample_song()]);
        assert_eq!(stats.forward(&c::v(), &c::iv()), LOGP_MISSING);
    }

    #[test]
    fn mixed_marginal_combines_two_corpora() {
        let a = StatSet::from_songs(&[sample_song()]);
        let b = StatSet::from_songs(&[Song {
            name: "t".to_string(),
            mode_tag: "maj".to_string(),
            measures: vec![measure(c::iv(), 1)],
        }]);
        let mixed = linearly_mix_dicts(&[(0.5, &a.marginal_logp), (0.5, &b.marginal_logp)]);
        // IV is unseen in `a`, so it contributes LOGP_MISSING there.
        let expected = 0.5 * b.marginal(&c::iv()) + 0.5 * LOGP_MISSING;
        assert!((mixed[&c::iv()] - expected).abs() < 1e-9);
    }

    #[test]
    fn mixed_transition_falls_back_to_marginal_for_unseen_source() {
        let a = StatSet::from_songs(&[sample_song()]);
        let mixed_marginal = linearly_mix_dicts(&[(1.0, &a.marginal_logp)]);
        let mixed = linearly_mix_transitions(&[(1.0, &a.forward_logp)]);
        // `vi` never appears as a transition source anywhere in `a`.
        let got = mixed.get(&c::vi(), &c::i(), &mixed_marginal);
        assert_eq!(got, mixed_marginal[&c::i()]);
    }

    #[test]
    fn mixed_transition_missing_entry_in_existing_row_is_logp_missing() {
        let a = StatSet::from_songs(&[sample_song()]);
        let mixed_marginal = linearly_mix_dicts(&[(1.0, &a.marginal_logp)]);
        let mixed = linearly_mix_transitions(&[(1.0, &a.forward_logp)]);
        // `I` has a row (it transitions to itself and to V) but never to IV.
        let got = mixed.get(&c::i(), &c::iv(), &mixed_marginal);
        assert_eq!(got, LOGP_MISSING);
    }
}
