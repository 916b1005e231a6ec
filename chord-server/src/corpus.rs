//! Loads the bundled corpora into the three `StatSet`s the engine mixes at
//! request time: major, parallel-minor, relative-minor. Mirrors
//! `server.py`'s module-level `major_songs`/`minor_songs` construction —
//! `beta_collapse()` applied universally, relative-minor built by
//! transposing the minor corpus down a minor third.

use std::fs;
use std::path::Path;

use chord_corpus::{readers, Song};
use chord_stats::StatSet;
use chord_theory::c;

use crate::config::ServerConfig;

/// The three `StatSet`s the server keeps in memory.
pub struct CorpusStats {
    pub major: StatSet,
    pub parallel_minor: StatSet,
    pub relative_minor: StatSet,
}

/// Every `.abc` file directly under `dir`. A missing directory yields no
/// songs rather than an error — not every deployment ships every corpus.
fn load_abc_songs(dir: &Path) -> Result<Vec<Song>, Box<dyn std::error::Error>> {
    let mut songs = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(songs);
    };
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("abc") {
            let text = fs::read_to_string(&path)?;
            songs.extend(readers::parse_abc(&text)?);
        }
    }
    Ok(songs)
}

/// Every paired `.nlt`/`.clt` file under `melody_dir`/`harmony_dir`,
/// classified major/minor/mixed by scanning measures for the plain tonic
/// triad — the harmony grammar itself carries no key-mode tag, so this
/// follows `corpus/rs/__init__.py`'s post-hoc `load_songs` classification.
fn load_rs_songs(melody_dir: &Path, harmony_dir: &Path) -> Result<(Vec<Song>, Vec<Song>, Vec<Song>), Box<dyn std::error::Error>> {
    let mut major = Vec::new();
    let mut minor = Vec::new();
    let mut mixed = Vec::new();

    let Ok(entries) = fs::read_dir(melody_dir) else {
        return Ok((major, minor, mixed));
    };
    for entry in entries {
        let melody_path = entry?.path();
        if melody_path.extension().and_then(|e| e.to_str()) != Some("nlt") {
            continue;
        }
        let stem = melody_path.file_stem().ok_or("malformed rs melody filename")?;
        let harmony_path = harmony_dir.join(stem).with_extension("clt");
        let name = melody_path.file_name().and_then(|n| n.to_str()).unwrap_or("rs-song").to_string();

        let nlt_text = fs::read_to_string(&melody_path)?;
        let clt_text = fs::read_to_string(&harmony_path)?;
        let song = readers::parse_rs_song(&name, &clt_text, &nlt_text, "")?;

        let has_major = song.measures.iter().any(|m| m.chord.simplified() == c::tonic_major());
        let has_minor = song.measures.iter().any(|m| m.chord.simplified() == c::tonic_minor());
        match (has_major, has_minor) {
            (true, true) => mixed.push(song),
            (true, false) => major.push(song),
            _ => minor.push(song),
        }
    }
    Ok((major, minor, mixed))
}

/// Every `.csv` leadsheet under each of `dirs`.
fn load_marg_songs(dirs: &[std::path::PathBuf]) -> Result<Vec<Song>, Box<dyn std::error::Error>> {
    let mut songs = Vec::new();
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else { continue };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                let text = fs::read_to_string(&path)?;
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("marg-song").to_string();
                songs.push(readers::parse_marg_song(&name, &text)?);
            }
        }
    }
    Ok(songs)
}

/// Parse the bundled corpora from disk and build the three `StatSet`s.
pub fn build_from_disk(config: &ServerConfig) -> Result<CorpusStats, Box<dyn std::error::Error>> {
    let abc_songs = load_abc_songs(&config.corpus_dir.join(&config.abc_subdir))?;
    let (rs_major, rs_minor, rs_mixed) = load_rs_songs(
        &config.corpus_dir.join(&config.rs_melody_subdir),
        &config.corpus_dir.join(&config.rs_harmony_subdir),
    )?;
    let marg_dirs: Vec<_> = config.marg_subdirs.iter().map(|s| config.corpus_dir.join(s)).collect();
    let marg_songs = load_marg_songs(&marg_dirs)?;

    let abc_major: Vec<Song> = abc_songs.iter().filter(|s| s.mode_tag == "maj").cloned().collect();
    let abc_minor: Vec<Song> = abc_songs.iter().filter(|s| s.mode_tag == "min").cloned().collect();

    let mut major_songs = rs_major;
    major_songs.extend(rs_mixed);
    major_songs.extend(abc_major);
    major_songs.extend(marg_songs);

    let mut minor_songs = rs_minor;
    minor_songs.extend(abc_minor);

    let major_songs: Vec<Song> = major_songs.iter().map(|s| s.modify_chord(|c| c.beta_collapse())).collect();
    let minor_songs: Vec<Song> = minor_songs.iter().map(|s| s.modify_chord(|c| c.beta_collapse())).collect();
    let relative_minor_songs: Vec<Song> = minor_songs.iter().map(|s| s.transpose(-3)).collect();

    Ok(CorpusStats {
        major: StatSet::from_songs(&major_songs),
        parallel_minor: StatSet::from_songs(&minor_songs),
        relative_minor: StatSet::from_songs(&relative_minor_songs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_corpus_directory_yields_empty_stat_sets() {
        let config = ServerConfig { corpus_dir: "does-not-exist".into(), ..ServerConfig::default() };
        let stats = build_from_disk(&config).unwrap();
        assert_eq!(stats.major.chords().count(), 0);
        assert_eq!(stats.parallel_minor.chords().count(), 0);
        assert_eq!(stats.relative_minor.chords().count(), 0);
    }

    #[test]
    fn abc_corpus_builds_a_usable_major_stat_set() {
        let dir = std::env::temp_dir().join(format!("chord-server-corpus-test-{}", std::process::id()));
        let abc_dir = dir.join("nottingham-dataset/ABC_cleaned");
        std::fs::create_dir_all(&abc_dir).unwrap();
        std::fs::write(abc_dir.join("tune.abc"), "X:1\nT:Tune\nK:C\n\"C\"cde\"G7\"gab|\n").unwrap();

        let config = ServerConfig { corpus_dir: dir.clone(), ..ServerConfig::default() };
        let stats = build_from_disk(&config).unwrap();
        assert!(stats.major.chords().count() >= 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
