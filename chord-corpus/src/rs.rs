//! Rock Corpus `.clt` (harmony) / `.nlt` (melody) reader.
//!
//! Chord symbols follow Temperley/deClercq Roman-numeral notation: a base
//! numeral (`I`..`VII`, with accidentals), figured-bass/seventh suffixes,
//! and quality qualifiers (`d`, `h`, `x`, `o`, `a`/`+`, `s2`, `s4`, `b5`).

use chord_theory::{Chord, Quality, RelativeChord, Seventh};

use crate::song::{Measure, Song};

const ROMAN_NUMERALS: [&str; 12] = [
    "I", "bII", "II", "bIII", "III", "IV", "#IV", "V", "bVI", "VI", "bVII", "VII",
];

/// `(scale degree 0..11, true if major, false if minor)`.
fn identify_roman_numeral(symbol: &str) -> Result<(i32, bool), String> {
    let symbol = if symbol == "bV" { "#IV" } else { symbol };
    for (i, rn) in ROMAN_NUMERALS.iter().enumerate() {
        if *rn == symbol {
            return Ok((i as i32, true));
        }
        if rn.to_lowercase() == symbol {
            return Ok((i as i32, false));
        }
    }
    Err(format!("can't identify roman numeral: {symbol}"))
}

/// Port of the reference Rock Corpus chord-symbol grammar.
pub fn convert(symbol: &str) -> Result<Chord, String> {
    let mut symbol = symbol.to_string();
    let mut relative_base = 0i32;
    let mut seventh: Option<&str> = None; // "?" sentinel resolved after quality is known
    let mut inversions = 0u8;
    let mut quality_override: Option<&str> = None;

    if let Some((base_part, bass_part)) = symbol.clone().split_once('/') {
        let (base_degree, _) = identify_roman_numeral(bass_part)?;
        relative_base = base_degree;
        symbol = base_part.to_string();
    }

    let cut = |sym: &mut String, suffix: &str| -> bool {
        if sym.ends_with(suffix) {
            sym.truncate(sym.len() - suffix.len());
            true
        } else {
            false
        }
    };

    if cut(&mut symbol, "+11") {
        quality_override = Some("aug");
        seventh = Some("min");
    }
    if cut(&mut symbol, "b5") {
        quality_override = Some("flat5");
    }
    if cut(&mut symbol, "s4") {
        quality_override = Some("sus4");
    }

    if cut(&mut symbol, "64") {
        inversions = 2;
    } else if cut(&mut symbol, "65") {
        inversions = 1;
        seventh = Some("?");
    } else if cut(&mut symbol, "43") {
        inversions = 2;
        seventh = Some("?");
    } else if cut(&mut symbol, "42") {
        inversions = 3;
        seventh = Some("?");
    } else if cut(&mut symbol, "6") {
        inversions = 1;
    } else if cut(&mut symbol, "11") {
        seventh = Some("?");
    } else if cut(&mut symbol, "9") {
        seventh = Some("?");
    } else if cut(&mut symbol, "7") {
        seventh = Some("?");
    }

    if cut(&mut symbol, "x") || cut(&mut symbol, "o") {
        quality_override = Some("dim");
        if seventh.is_some() {
            seventh = Some("dim");
        }
    } else if cut(&mut symbol, "d") {
        seventh = Some("min");
    } else if cut(&mut symbol, "h") {
        quality_override = Some("dim");
        seventh = Some("min");
    } else if cut(&mut symbol, "+") {
        quality_override = Some("aug");
    }

    let (midi, is_major) = identify_roman_numeral(&symbol)?;

    let resolved_seventh = match seventh {
        Some("?") => {
            if midi == 7 && is_major {
                Some(Seventh::Min)
            } else if is_major {
                Some(Seventh::Maj)
            } else {
                Some(Seventh::Min)
            }
        }
        Some("min") => Some(Seventh::Min),
        Some("dim") => Some(Seventh::Dim),
        _ => None,
    };

    let quality = match quality_override {
        Some("flat5") => {
            if is_major {
                Quality::MajB5
            } else {
                Quality::Dim
            }
        }
        Some("dim") => Quality::Dim,
        Some("aug") => Quality::Aug,
        Some("sus4") => Quality::Sus4,
        None => {
            if is_major {
                Quality::Maj
            } else {
                Quality::Min
            }
        }
        Some(other) => return Err(format!("unhandled quality override: {other}")),
    };

    let root = (midi + relative_base).rem_euclid(12) as u8;
    Ok(Chord::new(Some(root), Some(RelativeChord::new(quality, resolved_seventh, inversions))))
}

/// Parse a `.clt` file's body lines (before the terminating `End`) into
/// `(measure_t, chord_symbol)` pairs.
fn parse_clt(text: &str) -> Vec<(f64, String)> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line == "End" {
            if line == "End" {
                break;
            }
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(_real_t) = parts.next() else { continue };
        let Some(measure_t) = parts.next() else { continue };
        let Some(chord_name) = parts.next() else { continue };
        let Ok(measure_t) = measure_t.parse::<f64>() else { continue };
        rows.push((measure_t, chord_name.to_string()));
    }
    rows
}

/// Parse a `.nlt` file's body lines into `(measure_t, semitones_above_root)`.
fn parse_nlt(text: &str) -> Vec<(f64, i32)> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line == "End" {
            if line == "End" {
                break;
            }
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(_real_t) = parts.next() else { continue };
        let Some(measure_t) = parts.next() else { continue };
        let Some(_midi) = parts.next() else { continue };
        let Some(semis) = parts.next() else { continue };
        let (Ok(measure_t), Ok(semis)) = (measure_t.parse::<f64>(), semis.parse::<i32>()) else {
            continue;
        };
        rows.push((measure_t, semis));
    }
    rows
}

/// Parse one paired `.clt`/`.nlt` song. `mode_tag` records the corpus's own
/// major/minor/mixolydian classification (`maj`/`min`/`mix`), carried
/// through from the filename convention.
pub fn parse_song(name: &str, clt_text: &str, nlt_text: &str, mode_tag: &str) -> Result<Song, String> {
    let harmony = parse_clt(clt_text);
    let melody = parse_nlt(nlt_text);

    let mut measures = Vec::with_capacity(harmony.len());
    for (idx, (measure_t, chord_symbol)) in harmony.iter().enumerate() {
        let chord = convert(chord_symbol)?;
        let next_t = harmony.get(idx + 1).map(|(t, _)| *t).unwrap_or(f64::INFINITY);
        let melody_notes: Vec<(u8, f64)> = melody
            .iter()
            .filter(|&&(t, _)| t >= *measure_t && t < next_t)
            .map(|&(_, semis)| (semis.rem_euclid(12) as u8, 1.0))
            .collect();
        measures.push(Measure {
            chord,
            chord_name: chord_symbol.clone(),
            start: *measure_t,
            end: next_t,
            reps: 1,
            melody_notes,
        });
    }
    Ok(Song {
        name: name.to_string(),
        mode_tag: mode_tag.to_string(),
        measures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_plain_major_tonic() {
        let chord = convert("I").unwrap();
        assert_eq!(chord.root, Some(0));
        assert_eq!(chord.relative.unwrap().quality, Quality::Maj);
    }

    #[test]
    fn convert_dominant_seventh_of_v() {
        let chord = convert("V7").unwrap();
        assert_eq!(chord.root, Some(7));
        assert_eq!(chord.relative.unwrap().seventh, Some(Seventh::Min));
    }

    #[test]
    fn convert_half_diminished_first_inversion() {
        let chord = convert("iih65").unwrap();
        assert_eq!(chord.root, Some(2));
        let rc = chord.relative.unwrap();
        assert_eq!(rc.quality, Quality::Dim);
        assert_eq!(rc.seventh, Some(Seventh::Min));
        assert_eq!(rc.inversions, 1);
    }

    #[test]
    fn convert_unknown_symbol_fails_loudly() {
        assert!(convert("bogus").is_err());
    }

    #[test]
    fn parse_song_pairs_harmony_and_melody() {
        let clt = "0.0 0.0 I 0 0 0 0\n0.5 1.0 IV 0 0 0 0\nEnd\n";
        let nlt = "0.0 0.0 60 0\n0.25 0.5 64 4\n0.6 1.2 65 5\nEnd\n";
        let song = parse_song("test", clt, nlt, "maj").unwrap();
        assert_eq!(song.measures.len(), 2);
        assert_eq!(song.measures[0].melody_notes, vec![(0, 1.0), (4, 1.0)]);
        assert_eq!(song.measures[1].melody_notes, vec![(5, 1.0)]);
    }
}
