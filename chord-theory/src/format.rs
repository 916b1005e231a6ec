//! Presentation formatting: chord names, Roman numerals, MIDI voicings.

use serde::{Deserialize, Serialize};

use crate::chord::{Chord, Quality, Seventh};

const ROMAN_NUMERALS: [&str; 12] = [
    "I", "bII", "II", "bIII", "III", "IV", "#IV", "V", "bVI", "VI", "bVII", "VII",
];

/// `FCGDAEB`, the circle of fifths starting at F, used as a lookup table for
/// enharmonic spelling.
const CIRCLE_OF_FIFTHS: [char; 7] = ['F', 'C', 'G', 'D', 'A', 'E', 'B'];

/// Spell a relative semitone as a letter name with sharps/flats, chosen by
/// its position on the circle of fifths relative to the key signature.
pub fn get_pitch_name(relative_semitone: i32, key_signature: i32) -> String {
    let circle_of_fifths_position = (relative_semitone * 7 + 4).rem_euclid(12) - 4;
    let fifths_offset_from_f = key_signature + circle_of_fifths_position + 1;
    let root = fifths_offset_from_f.rem_euclid(7) as usize;
    let modifier = fifths_offset_from_f.div_euclid(7);
    let letter = CIRCLE_OF_FIFTHS[root];
    if modifier < 0 {
        format!("{letter}{}", "♭".repeat((-modifier) as usize))
    } else {
        format!("{letter}{}", "♯".repeat(modifier as usize))
    }
}

impl Chord {
    /// Roman-numeral name relative to the implied major tonic.
    pub fn to_roman_numeral(&self) -> String {
        let Some(root) = self.root else {
            return "N.C.".to_string();
        };
        let mut base = ROMAN_NUMERALS[root as usize].to_string();
        let Some(rc) = self.relative else {
            base.push_str("pedal");
            return base;
        };

        match rc.quality {
            Quality::Min => base = base.to_lowercase(),
            Quality::Aug => base.push('+'),
            Quality::Dim => {
                base = base.to_lowercase();
                base.push(if rc.seventh == Some(Seventh::Min) { 'h' } else { 'o' });
            }
            _ => {
                if rc.seventh == Some(Seventh::Min) {
                    base.push('d');
                }
            }
        }

        let inv = rc.inversions.min(3) as usize;
        if rc.seventh.is_some() {
            base.push_str(["7", "65", "43", "42"][inv]);
        } else {
            base.push_str(["", "6", "64"][inv]);
        }

        match rc.quality {
            Quality::Sus2 => base.push_str("s2"),
            Quality::Sus4 => base.push_str("s4"),
            Quality::MajB5 => base.push_str("b5"),
            _ => {}
        }

        base
    }

    /// Human-readable chord name: pitch spelling plus a quality/seventh
    /// suffix and, for inverted chords, a slash-bass annotation.
    pub fn chord_name(&self, key_signature: i32) -> String {
        let Some(root) = self.root else {
            return "N.C.".to_string();
        };
        let mut base = get_pitch_name(root as i32, key_signature);
        let Some(rc) = self.relative else {
            base.push_str("pedal");
            return base;
        };

        match rc.quality {
            Quality::Maj | Quality::MajB5 | Quality::Sus2 | Quality::Sus4 => {
                match rc.seventh {
                    None => {}
                    Some(Seventh::Maj) => base.push_str("maj7"),
                    Some(Seventh::Min) => base.push('7'),
                    Some(Seventh::Dim) => base.push('6'),
                }
                match rc.quality {
                    Quality::MajB5 => base.push_str("b5"),
                    Quality::Sus2 => base.push_str("sus2"),
                    Quality::Sus4 => base.push_str("sus4"),
                    _ => {}
                }
            }
            Quality::Min => match rc.seventh {
                None => base.push('m'),
                Some(Seventh::Maj) => base.push_str("minMaj7"),
                Some(Seventh::Min) => base.push_str("m7"),
                Some(Seventh::Dim) => base.push_str("m6"),
            },
            Quality::Dim => match rc.seventh {
                None => base.push_str("dim"),
                Some(Seventh::Maj) => base.push_str("dimMaj7"),
                Some(Seventh::Min) => base.push_str("dimMin7"),
                Some(Seventh::Dim) => base.push_str("dim7"),
            },
            Quality::Aug => match rc.seventh {
                None => base.push_str("aug"),
                Some(Seventh::Maj) => base.push_str("aug7"),
                Some(Seventh::Min) => base.push_str("augMin7"),
                Some(Seventh::Dim) => base.push_str("augDim7"),
            },
        }

        if rc.inversions != 0 {
            let rendered = self.render();
            let bass_pc = rendered[rc.inversions as usize].rem_euclid(12);
            base.push('/');
            base.push_str(&get_pitch_name(bass_pc, key_signature));
        }

        base
    }
}

/// A chord payload as rendered for the wire protocol: name, score, absolute
/// serialized value, and a MIDI voicing above a configurable bass floor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChordPayload {
    pub name: String,
    pub score: f64,
    pub value: String,
    pub midis: Vec<i32>,
}

/// Render a relative chord into its full wire payload for a given key
/// signature, score, and bass floor.
pub fn productionize_chord(chord: &Chord, key_signature: i32, score: f64, bottom_bass: i32) -> ChordPayload {
    let midi_root = (key_signature * 7).rem_euclid(12);
    ChordPayload {
        name: chord.chord_name(key_signature),
        score,
        value: chord.relative_to_absolute(key_signature).stringify(),
        midis: chord.render_offset(midi_root, bottom_bass),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::{c, rc};

    #[test]
    fn tonic_roman_numeral_major() {
        assert_eq!(c::i().to_roman_numeral(), "I");
    }

    #[test]
    fn tonic_roman_numeral_minor() {
        assert_eq!(c::i_minor().to_roman_numeral(), "i");
    }

    #[test]
    fn dominant_seventh_roman_numeral() {
        let chord = Chord::new(Some(7), Some(rc::dom7()));
        assert_eq!(chord.to_roman_numeral(), "Vd7");
    }

    #[test]
    fn half_diminished_roman_numeral() {
        let chord = Chord::new(Some(2), Some(rc::half_dim7()));
        assert_eq!(chord.to_roman_numeral(), "iih7");
    }

    #[test]
    fn no_chord_name_is_nc() {
        assert_eq!(Chord::no_chord().chord_name(0), "N.C.");
        assert_eq!(Chord::no_chord().to_roman_numeral(), "N.C.");
    }

    #[test]
    fn pitch_name_c_major_tonic_is_c() {
        assert_eq!(get_pitch_name(0, 0), "C");
    }

    #[test]
    fn pitch_name_spells_sharps_in_sharp_keys() {
        // F# minor key signature (3 sharps), relative semitone 1 should
        // spell as a sharp, not a flat, in that context.
        let name = get_pitch_name(6, 3);
        assert!(name.contains('♯') || name == "B", "unexpected spelling: {name}");
    }

    #[test]
    fn chord_name_tonic_major_triad() {
        assert_eq!(c::i().chord_name(0), "C");
    }

    #[test]
    fn chord_name_minor_seventh() {
        let chord = Chord::new(Some(9), Some(rc::min7()));
        assert_eq!(chord.chord_name(0), "Am7");
    }

    #[test]
    fn productionize_chord_renders_midis_and_value() {
        let payload = productionize_chord(&c::v(), 0, 0.5, 48);
        assert_eq!(payload.score, 0.5);
        assert_eq!(payload.value, "07:maj None 0");
        assert!(!payload.midis.is_empty());
    }
}
