//! MARG (Seoul National University) CSV lead-sheet reader.

use chord_theory::{Chord, RelativeChord};
use serde::Deserialize;

use crate::song::{Measure, Song};

const SCALE: [&str; 13] = [
    "C0", "C#", "D0", "D#", "E0", "F0", "F#", "G0", "G#", "A0", "A#", "B0", "B#",
];

fn unscale(note: &str) -> Option<i32> {
    SCALE.iter().position(|&n| n == note).map(|i| i as i32 % 12)
}

#[derive(Debug, Clone, Copy)]
enum ChordType {
    Relative(RelativeChord),
    NoChord,
    Pedal,
}

/// Lookup table mapping MARG's free-text chord-type strings to a relative
/// chord shape (or the `NC`/`pedal` special cases).
fn chord_merger(chord_type: &str) -> Result<ChordType, String> {
    use chord_theory::rc;
    use ChordType::{NoChord, Pedal, Relative};

    Ok(match chord_type {
        "[]" | "" => NoChord,
        "pedal" => Pedal,
        "major" | "maj" | "major-sixth" | "6" | "power" => Relative(rc::maj()),
        "minor" | "min" | "minor-sixth" => Relative(rc::min()),
        "dominant" | "dominant-ninth" | "dominant-seventh" | "dominant-11th" | "dominant-13th"
        | "major-minor" | "7" | "9" => Relative(rc::dom7()),
        "minor-seventh" | "minor-ninth" | "minor-11th" | "minor-13th" | "min7" | "min9" => {
            Relative(rc::min7())
        }
        "aug" | "augmented" => Relative(rc::aug()),
        "augmented-seventh" | "augmented-ninth" => Relative(rc::aug7()),
        "major-seventh" | "major-ninth" | "maj7" | "maj9" | "maj69" => Relative(rc::maj7()),
        "suspended-fourth" => Relative(rc::sus4()),
        "suspended-second" => Relative(rc::sus2()),
        "minor-major" | "minMaj7" => Relative(rc::min_maj7()),
        "diminished" | "dim" => Relative(rc::dim()),
        "diminished-seventh" | "dim7" | " dim7" => Relative(rc::dim7()),
        "half-diminished" | "m7b5" => Relative(rc::half_dim7()),
        "sus47" => Relative(rc::sus47()),
        other => return Err(format!("unknown MARG chord type: {other}")),
    })
}

#[derive(Debug, Deserialize)]
struct Row {
    key_fifths: String,
    key_mode: String,
    note_root: String,
    note_duration: f64,
    measure: String,
    chord_root: String,
    chord_type: String,
}

/// Parse one MARG CSV leadsheet file's contents into a `Song`.
pub fn parse_song(name: &str, csv_text: &str) -> Result<Song, String> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let mut measures: Vec<Measure> = Vec::new();
    let mut measure_label: Option<String> = None;
    let mut current: Option<Measure> = None;
    let mut mode_tag = String::new();
    let mut i = 0u32;

    for result in reader.deserialize() {
        let row: Row = result.map_err(|e| format!("malformed MARG row: {e}"))?;
        mode_tag = row.key_mode.clone();
        let key_fifths: i32 = row
            .key_fifths
            .parse()
            .map_err(|_| format!("non-integer key_fifths: {}", row.key_fifths))?;
        let tonic = (7 * key_fifths).rem_euclid(12);

        let abs_note_root = unscale(&row.note_root);
        let rel_note_root = abs_note_root.map(|r| (r - tonic).rem_euclid(12));
        let melody_note = (rel_note_root.map(|r| r as u8), row.note_duration);

        if Some(&row.measure) != measure_label.as_ref() {
            if let Some(m) = current.take() {
                measures.push(m);
            }
            measure_label = Some(row.measure.clone());

            let chord = match unscale(&row.chord_root) {
                None => Chord::no_chord(),
                Some(chord_root) => {
                    let relative_chord_root = (chord_root - tonic).rem_euclid(12) as u8;
                    match chord_merger(&row.chord_type)? {
                        ChordType::NoChord => Chord::no_chord(),
                        ChordType::Pedal => Chord::pedal(relative_chord_root),
                        ChordType::Relative(rc) => Chord::new(Some(relative_chord_root), Some(rc)),
                    }
                }
            };

            current = Some(Measure {
                chord,
                chord_name: row.chord_type.clone(),
                start: i as f64,
                end: i as f64,
                reps: 1,
                melody_notes: melody_note.0.map(|n| vec![(n, melody_note.1)]).unwrap_or_default(),
            });
        } else if let Some(m) = current.as_mut() {
            if let Some(n) = melody_note.0 {
                m.melody_notes.push((n, melody_note.1));
            }
        }
        i += 1;
    }
    if let Some(m) = current.take() {
        measures.push(m);
    }

    Ok(Song {
        name: name.to_string(),
        mode_tag,
        measures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_theory::{rc, Seventh};

    #[test]
    fn parses_simple_leadsheet() {
        let csv = "key_fifths,key_mode,note_root,note_duration,measure,chord_root,chord_type\n\
                    0,major,C0,1.0,m1,C0,major\n\
                    0,major,E0,1.0,m1,C0,major\n\
                    0,major,G0,1.0,m2,G0,dominant-seventh\n";
        let song = parse_song("test", csv).unwrap();
        assert_eq!(song.measures.len(), 2);
        assert_eq!(song.measures[0].chord.root, Some(0));
        assert_eq!(song.measures[0].melody_notes, vec![(0, 1.0), (4, 1.0)]);
        assert_eq!(song.measures[1].chord.relative.unwrap().seventh, Some(Seventh::Min));
    }

    #[test]
    fn unknown_chord_type_fails_loudly() {
        let csv = "key_fifths,key_mode,note_root,note_duration,measure,chord_root,chord_type\n\
                    0,major,C0,1.0,m1,C0,bogus-chord\n";
        assert!(parse_song("test", csv).is_err());
    }

    #[test]
    fn b_sharp_resolves_as_the_enharmonic_of_c() {
        let csv = "key_fifths,key_mode,note_root,note_duration,measure,chord_root,chord_type\n\
                    0,major,B#,1.0,m1,B#,aug\n";
        let song = parse_song("test", csv).unwrap();
        assert_eq!(song.measures[0].chord.root, Some(0));
        assert_eq!(song.measures[0].melody_notes, vec![(0, 1.0)]);
    }

    #[test]
    fn bare_aug_chord_type_is_recognized() {
        let csv = "key_fifths,key_mode,note_root,note_duration,measure,chord_root,chord_type\n\
                    0,major,C0,1.0,m1,C0,aug\n";
        let song = parse_song("test", csv).unwrap();
        assert_eq!(song.measures[0].chord.relative.unwrap(), rc::aug());
    }
}
