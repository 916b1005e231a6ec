//! Chord domain model: relative/absolute chord value types, collapsing and
//! transposition, and the presentation formatter (names, Roman numerals,
//! MIDI voicings).

mod chord;
mod format;

pub use chord::{c, rc, Chord, Quality, RelativeChord, Seventh};
pub use format::{get_pitch_name, productionize_chord, ChordPayload};
