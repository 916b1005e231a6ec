//! Wire types for the chord recommendation WebSocket protocol, and the
//! request-resolution step that turns a raw [`ChordRequest`] into the
//! grouped melody buckets, locks, and weighted stat-set roles the engine
//! needs.

use chord_engine::SlotPrediction;
use chord_theory::{productionize_chord, Chord, ChordPayload};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Note {
    pub pitch: i32,
    pub start: f64,
    pub end: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Music {
    pub notes: Vec<Note>,
}

/// A single fixed-time chord slot, optionally pinned to a chord. `value` is
/// the slot's chord in [`Chord::stringify`] form (absolute, not relative to
/// key), required when `locked` is set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Constraint {
    pub time: f64,
    #[serde(default)]
    pub value: Option<String>,
    pub locked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Major,
    ParallelMinor,
    RelativeMinor,
    MixedParallel,
    MixedRelative,
    #[serde(other)]
    Unrecognized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatSetRole {
    Major,
    ParallelMinor,
    RelativeMinor,
}

/// The weighted mix of corpora a request's `mode`/`minorness` selects.
/// Unrecognized modes fall back to plain major, same as an absent one.
pub fn stat_set_weights(mode: Mode, minorness: f64) -> Vec<(f64, StatSetRole)> {
    match mode {
        Mode::Major | Mode::Unrecognized => vec![(1.0, StatSetRole::Major)],
        Mode::ParallelMinor => vec![(1.0, StatSetRole::ParallelMinor)],
        Mode::RelativeMinor => vec![(1.0, StatSetRole::RelativeMinor)],
        Mode::MixedParallel => vec![(1.0 - minorness, StatSetRole::Major), (minorness, StatSetRole::ParallelMinor)],
        Mode::MixedRelative => vec![(1.0 - minorness, StatSetRole::Major), (minorness, StatSetRole::RelativeMinor)],
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordRequest {
    pub seq: u64,
    pub music: Music,
    pub chord_length: f64,
    pub key_signature: i32,
    pub mode: Mode,
    pub minorness: f64,
    pub jazziness: f64,
    pub first_weight: f64,
    pub determinism_weight: f64,
    pub seed: Option<u64>,
    pub bottom_bass: i32,
    pub tolerance: f64,
    #[serde(default)]
    pub constraints: Option<Vec<Constraint>>,
    pub preserve: bool,
}

/// A request's melody and locks resolved into engine-ready shape.
pub struct ResolvedRequest {
    pub constraint_times: Vec<f64>,
    pub grouped_notes: Vec<Vec<u8>>,
    pub locked_chords: Vec<Option<Chord>>,
    pub preserve_chords: Option<Vec<Chord>>,
    pub stat_set_weights: Vec<(f64, StatSetRole)>,
}

impl ChordRequest {
    pub fn resolve(&self) -> Result<ResolvedRequest, String> {
        let (constraints, preserve) = match &self.constraints {
            Some(cs) if !cs.is_empty() => (cs.clone(), self.preserve),
            _ => (build_default_constraints(&self.music.notes, self.chord_length)?, false),
        };

        let constraint_times: Vec<f64> = constraints.iter().map(|c| c.time).collect();
        let midi_root_of_major = (self.key_signature * 7).rem_euclid(12);
        let grouped_notes = group_notes_by_slot(&self.music.notes, &constraint_times, self.tolerance, midi_root_of_major);

        let locked_chords = constraints
            .iter()
            .map(|c| {
                if !c.locked {
                    return Ok(None);
                }
                let value = c.value.as_deref().ok_or("locked constraint missing a value")?;
                Ok(Some(Chord::parse(value)?.absolute_to_relative(self.key_signature)))
            })
            .collect::<Result<Vec<_>, String>>()?;

        let preserve_chords = if preserve {
            Some(
                constraints
                    .iter()
                    .map(|c| {
                        let value = c.value.as_deref().ok_or("preserved constraint missing a value")?;
                        Ok(Chord::parse(value)?.absolute_to_relative(self.key_signature))
                    })
                    .collect::<Result<Vec<_>, String>>()?,
            )
        } else {
            None
        };

        Ok(ResolvedRequest {
            constraint_times,
            grouped_notes,
            locked_chords,
            preserve_chords,
            stat_set_weights: stat_set_weights(self.mode, self.minorness),
        })
    }
}

/// One chord slot per `chordLength`-wide window spanning the melody's
/// duration, all unlocked. Used when a request supplies no constraints.
fn build_default_constraints(notes: &[Note], chord_length: f64) -> Result<Vec<Constraint>, String> {
    if chord_length <= 0.0 {
        return Err("chordLength must be positive".to_string());
    }
    let last_end = notes
        .iter()
        .map(|n| n.end)
        .fold(None, |acc: Option<f64>, e| Some(acc.map_or(e, |a| a.max(e))))
        .ok_or("cannot infer chord slots: no notes and no constraints were supplied")?;
    let slot_count = 1 + (last_end / chord_length).floor() as i64;
    Ok((0..slot_count)
        .map(|i| Constraint {
            time: i as f64 * chord_length,
            value: None,
            locked: false,
        })
        .collect())
}

/// Bucket notes into the windows between consecutive constraint times (and
/// a final open-ended window past the last one), converting each note's
/// pitch to a semitone-above-major-tonic pitch class. Assumes `notes` is
/// already sorted by `start`.
fn group_notes_by_slot(notes: &[Note], constraint_times: &[f64], tolerance: f64, midi_root_of_major: i32) -> Vec<Vec<u8>> {
    let pitch_class = |pitch: i32| -> u8 { (pitch - midi_root_of_major).rem_euclid(12) as u8 };

    let mut grouped = Vec::with_capacity(constraint_times.len().max(1));
    let mut idx = 0usize;
    for window in constraint_times.windows(2) {
        let end = window[1];
        let mut group = Vec::new();
        while idx < notes.len() && notes[idx].start < end - tolerance {
            group.push(pitch_class(notes[idx].pitch));
            idx += 1;
        }
        grouped.push(group);
    }
    let mut last_group = Vec::new();
    while idx < notes.len() {
        last_group.push(pitch_class(notes[idx].pitch));
        idx += 1;
    }
    grouped.push(last_group);
    grouped
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordResultEntry {
    pub time: f64,
    pub value: ChordPayload,
    pub suggestion: Option<ChordPayload>,
    pub locked: bool,
    pub recommendations: Vec<ChordPayload>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordResponse {
    pub seq: u64,
    pub all_chords: Vec<ChordPayload>,
    pub result: Vec<ChordResultEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Assemble the wire response from one engine run. `all_known_chords` is
/// the server's whole catalog (every chord any loaded stat set has ever
/// seen), not just the chords this particular progression touched.
pub fn build_response(
    seq: u64,
    all_known_chords: &[Chord],
    key_signature: i32,
    bottom_bass: i32,
    constraint_times: &[f64],
    locked_chords: &[Option<Chord>],
    slot_results: &[SlotPrediction],
) -> ChordResponse {
    let all_chords = all_known_chords
        .iter()
        .map(|c| productionize_chord(c, key_signature, 0.0, bottom_bass))
        .collect();

    let result = slot_results
        .iter()
        .enumerate()
        .map(|(i, slot)| ChordResultEntry {
            time: constraint_times[i],
            value: productionize_chord(&slot.chosen.1, key_signature, slot.chosen.0, bottom_bass),
            suggestion: slot
                .suggested
                .as_ref()
                .map(|&(score, chord)| productionize_chord(&chord, key_signature, score, bottom_bass)),
            locked: locked_chords.get(i).is_some_and(|c| c.is_some()),
            recommendations: slot
                .recommendations
                .iter()
                .map(|&(score, chord)| productionize_chord(&chord, key_signature, score, bottom_bass))
                .collect(),
        })
        .collect();

    ChordResponse {
        seq,
        all_chords,
        result,
    }
}
