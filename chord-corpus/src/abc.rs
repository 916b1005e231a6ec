//! ABC/Nottingham corpus reader.
//!
//! A reduced tokenizer over `.abc` lead-sheet text: recognizes the `K:` key
//! line, inline chord symbols in double quotes, and melody note letters.
//! This is not a full ABC notation parser — it covers the subset of the
//! grammar Nottingham-style lead sheets actually use (chord symbols plus
//! plain note letters), matching the reduced grammar the reference corpus
//! reader itself targets.

use chord_theory::{Chord, Quality, RelativeChord, Seventh};

use crate::song::{Measure, Song};

fn note_pitch_class(letter: char) -> Option<i32> {
    match letter.to_ascii_lowercase() {
        'c' => Some(0),
        'd' => Some(2),
        'e' => Some(4),
        'f' => Some(5),
        'g' => Some(7),
        'a' => Some(9),
        'b' => Some(11),
        _ => None,
    }
}

/// Identify a note name like `C`, `C#`, `B-` (sharp `#`, flat `-`), as used
/// inside chord symbols (root and slash-bass notation).
fn identify_note(s: &str) -> Result<i32, String> {
    if let Some(stripped) = s.strip_suffix('#') {
        return Ok((identify_note(stripped)? + 1).rem_euclid(12));
    }
    if let Some(stripped) = s.strip_suffix('-') {
        return Ok((identify_note(stripped)? - 1).rem_euclid(12));
    }
    let mut chars = s.chars();
    let letter = chars.next().ok_or_else(|| "empty note name".to_string())?;
    if chars.next().is_some() {
        return Err(format!("unrecognized note name: {s}"));
    }
    note_pitch_class(letter).ok_or_else(|| format!("unrecognized note name: {s}"))
}

/// Port of the reference ABC chord-symbol grammar: optional slash-bass,
/// `7`/`7b9` seventh, `6` (ignored), `m` for minor quality.
fn convert_chord_symbol(symbol: &str, major_tonic: i32) -> Result<Chord, String> {
    let mut symbol = symbol.replace(' ', "").replace('+', "#");
    if symbol.is_empty() {
        return Ok(Chord::no_chord());
    }

    let mut bass: Option<i32> = None;
    if let Some((root_part, bass_part)) = symbol.clone().split_once('/') {
        bass = Some(identify_note(bass_part)?);
        symbol = root_part.to_string();
    }

    let mut seventh = None;
    if symbol.ends_with("7b9") {
        symbol.truncate(symbol.len() - 3);
        seventh = Some(Seventh::Min);
    } else if symbol.ends_with('7') {
        symbol.truncate(symbol.len() - 1);
        seventh = Some(Seventh::Min);
    }
    if let Some(stripped) = symbol.strip_suffix('6') {
        symbol = stripped.to_string();
    }
    let mut quality = Quality::Maj;
    if let Some(stripped) = symbol.strip_suffix('m') {
        quality = Quality::Min;
        symbol = stripped.to_string();
    }

    let midi = identify_note(&symbol)?;

    let mut inversions = 0u8;
    if let Some(bass_pc) = bass {
        let probe = Chord::new(Some((midi % 12) as u8), Some(RelativeChord::new(quality, seventh, 0)));
        if let Some(idx) = probe.render().iter().position(|&n| n.rem_euclid(12) == bass_pc) {
            inversions = idx as u8;
        }
    }

    Ok(Chord::new(
        Some((midi - major_tonic).rem_euclid(12) as u8),
        Some(RelativeChord::new(quality, seventh, inversions)),
    ))
}

/// Major-key tonics recognized in `K:` lines, given as a circle-of-fifths
/// key signature (positive = sharps, negative = flats).
fn key_signature_of(key_name: &str) -> Result<i32, String> {
    match key_name.trim() {
        "C" => Ok(0),
        "G" => Ok(1),
        "D" => Ok(2),
        "A" => Ok(3),
        "E" => Ok(4),
        "B" => Ok(5),
        "F#" => Ok(6),
        "C#" => Ok(7),
        "F" => Ok(-1),
        "Bb" => Ok(-2),
        "Eb" => Ok(-3),
        "Ab" => Ok(-4),
        "Db" => Ok(-5),
        "Gb" => Ok(-6),
        "Cb" => Ok(-7),
        other => Err(format!("unrecognized ABC key: {other}")),
    }
}

struct TuneBuilder {
    name: String,
    major_tonic: i32,
    measures: Vec<Measure>,
    current_chord: Chord,
    current_notes: Vec<(u8, f64)>,
    measure_index: f64,
}

impl TuneBuilder {
    fn new(name: String, major_tonic: i32) -> Self {
        Self {
            name,
            major_tonic,
            measures: Vec::new(),
            current_chord: Chord::no_chord(),
            current_notes: Vec::new(),
            measure_index: 0.0,
        }
    }

    fn push_bar(&mut self, force: bool) {
        if !force && self.current_notes.is_empty() {
            return;
        }
        self.measures.push(Measure {
            chord: self.current_chord,
            chord_name: self.current_chord.stringify(),
            start: self.measure_index,
            end: self.measure_index + 1.0,
            reps: 1,
            melody_notes: std::mem::take(&mut self.current_notes),
        });
        self.measure_index += 1.0;
    }

    fn finish(mut self) -> Song {
        self.push_bar(false);
        Song {
            name: self.name,
            mode_tag: "maj".to_string(),
            measures: self.measures,
        }
    }
}

fn parse_body_line(line: &str, builder: &mut TuneBuilder) -> Result<(), String> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '"' {
                    end += 1;
                }
                let symbol: String = chars[start..end].iter().collect();
                builder.current_chord = convert_chord_symbol(&symbol, builder.major_tonic)?;
                i = end + 1;
            }
            '|' => {
                builder.push_bar(true);
                i += 1;
            }
            'z' | 'Z' => {
                i += 1;
            }
            c if c.is_ascii_alphabetic() && note_pitch_class(c).is_some() => {
                let pc = note_pitch_class(c).unwrap();
                builder.current_notes.push((
                    ((pc - builder.major_tonic).rem_euclid(12)) as u8,
                    1.0,
                ));
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    Ok(())
}

/// Parse a full `.abc` file (possibly containing several tunes separated by
/// `X:` headers) into a list of songs.
pub fn parse(text: &str) -> Result<Vec<Song>, String> {
    let mut songs = Vec::new();
    let mut current_name = String::new();
    let mut current_key_sig: Option<i32> = None;
    let mut builder: Option<TuneBuilder> = None;

    for line in text.lines() {
        let line = line.trim_end();
        if let Some(title) = line.strip_prefix("T:") {
            current_name = title.trim().to_string();
        } else if let Some(key) = line.strip_prefix("K:") {
            let key_sig = key_signature_of(key.trim())?;
            current_key_sig = Some(key_sig);
            if let Some(prev) = builder.take() {
                songs.push(prev.finish());
            }
            builder = Some(TuneBuilder::new(
                if current_name.is_empty() {
                    format!("tune-{}", songs.len())
                } else {
                    current_name.clone()
                },
                (key_sig * 7).rem_euclid(12),
            ));
        } else if line.starts_with("X:") {
            if let Some(prev) = builder.take() {
                songs.push(prev.finish());
            }
            current_name.clear();
            current_key_sig = None;
        } else if !line.is_empty() && !is_header_line(line) {
            if let Some(b) = builder.as_mut() {
                parse_body_line(line, b)?;
            }
        }
    }
    if let Some(b) = builder {
        songs.push(b.finish());
    }
    let _ = current_key_sig;
    Ok(songs)
}

fn is_header_line(line: &str) -> bool {
    line.len() >= 2
        && line.as_bytes()[1] == b':'
        && line.as_bytes()[0].is_ascii_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_tune_with_chords_and_notes() {
        let text = "X:1\nT:Test Tune\nK:C\n\"C\"cde\"G7\"gab|\"F\"fed|\n";
        let songs = parse(text).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].name, "Test Tune");
        assert_eq!(songs[0].measures.len(), 2);
        assert_eq!(songs[0].measures[0].chord.root, Some(7));
    }

    #[test]
    fn identify_note_handles_sharp_and_flat() {
        assert_eq!(identify_note("C#").unwrap(), 1);
        assert_eq!(identify_note("B-").unwrap(), 10);
    }

    #[test]
    fn convert_chord_symbol_minor_seventh() {
        let chord = convert_chord_symbol("Em7", 0).unwrap();
        assert_eq!(chord.root, Some(4));
        assert_eq!(chord.relative.unwrap().quality, Quality::Min);
        assert_eq!(chord.relative.unwrap().seventh, Some(Seventh::Min));
    }

    #[test]
    fn convert_chord_symbol_slash_bass_inversion() {
        let chord = convert_chord_symbol("D/f#", 0).unwrap();
        assert_eq!(chord.relative.unwrap().inversions, 1);
    }

    #[test]
    fn unrecognized_key_fails_loudly() {
        let text = "X:1\nT:Bad\nK:Xb\ncde|\n";
        assert!(parse(text).is_err());
    }
}
