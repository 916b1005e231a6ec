//! The song model: a `Measure` carries one chord plus the melody notes that
//! fall within it; a `Song` is an ordered list of measures.

use chord_theory::Chord;
use serde::{Deserialize, Serialize};

/// One chord-slot's worth of a song: the harmony, a human-readable label
/// from the source data, timing, repeat count, and melody notes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub chord: Chord,
    pub chord_name: String,
    pub start: f64,
    pub end: f64,
    /// How many slot-repeats this chord spans; weights statistics
    /// accumulation and contributes `reps - 1` self-transitions.
    pub reps: u32,
    /// Ordered `(semitone_above_tonic, duration)` pairs.
    pub melody_notes: Vec<(u8, f64)>,
}

impl Measure {
    pub fn modify_chord(&self, f: impl Fn(&Chord) -> Chord) -> Self {
        Self {
            chord: f(&self.chord),
            ..self.clone()
        }
    }

    pub fn transpose(&self, semitones: i32) -> Self {
        Self {
            chord: self.chord.transpose(semitones),
            melody_notes: self
                .melody_notes
                .iter()
                .map(|&(pc, dur)| (((pc as i32 + semitones).rem_euclid(12)) as u8, dur))
                .collect(),
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub name: String,
    pub mode_tag: String,
    pub measures: Vec<Measure>,
}

impl Song {
    pub fn modify_chord(&self, f: impl Fn(&Chord) -> Chord) -> Self {
        Self {
            name: self.name.clone(),
            mode_tag: self.mode_tag.clone(),
            measures: self.measures.iter().map(|m| m.modify_chord(&f)).collect(),
        }
    }

    pub fn transpose(&self, semitones: i32) -> Self {
        Self {
            name: self.name.clone(),
            mode_tag: self.mode_tag.clone(),
            measures: self.measures.iter().map(|m| m.transpose(semitones)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_theory::c;

    fn sample_measure() -> Measure {
        Measure {
            chord: c::v(),
            chord_name: "V".to_string(),
            start: 0.0,
            end: 1.0,
            reps: 1,
            melody_notes: vec![(7, 1.0), (11, 1.0)],
        }
    }

    #[test]
    fn transpose_shifts_chord_and_melody() {
        let measure = sample_measure();
        let shifted = measure.transpose(3);
        assert_eq!(shifted.chord.root, Some(10));
        assert_eq!(shifted.melody_notes, vec![(10, 1.0), (2, 1.0)]);
    }

    #[test]
    fn modify_chord_leaves_melody_untouched() {
        let measure = sample_measure();
        let collapsed = measure.modify_chord(|c| c.beta_collapse());
        assert_eq!(collapsed.melody_notes, measure.melody_notes);
    }

    #[test]
    fn song_transpose_applies_to_every_measure() {
        let song = Song {
            name: "test".to_string(),
            mode_tag: "maj".to_string(),
            measures: vec![sample_measure(), sample_measure()],
        };
        let shifted = song.transpose(-3);
        assert_eq!(shifted.measures[0].chord.root, Some(4));
    }
}
