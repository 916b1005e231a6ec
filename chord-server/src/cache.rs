//! JSON snapshot of the built `StatSet`s, mirroring
//! `elven_canopy_music::markov::MarkovModels::load`'s JSON-snapshot
//! convention: parse corpora once via `chord-server build-stats`, then read
//! a flat file on every subsequent startup instead of reparsing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::corpus::CorpusStats;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    major: chord_stats::StatSet,
    parallel_minor: chord_stats::StatSet,
    relative_minor: chord_stats::StatSet,
}

pub fn save(path: &Path, stats: &CorpusStats) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let snapshot = Snapshot {
        major: stats.major.clone(),
        parallel_minor: stats.parallel_minor.clone(),
        relative_minor: stats.relative_minor.clone(),
    };
    let json = serde_json::to_string(&snapshot)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load(path: &Path) -> Result<CorpusStats, Box<dyn std::error::Error>> {
    let data = std::fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&data)?;
    Ok(CorpusStats {
        major: snapshot.major,
        parallel_minor: snapshot.parallel_minor,
        relative_minor: snapshot.relative_minor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_corpus::{Measure, Song};
    use chord_stats::StatSet;

    fn sample_stats() -> CorpusStats {
        let song = Song {
            name: "s".to_string(),
            mode_tag: "maj".to_string(),
            measures: vec![Measure {
                chord: chord_theory::c::i(),
                chord_name: "I".to_string(),
                start: 0.0,
                end: 1.0,
                reps: 1,
                melody_notes: vec![],
            }],
        };
        CorpusStats {
            major: StatSet::from_songs(&[song]),
            parallel_minor: StatSet::from_songs(&[]),
            relative_minor: StatSet::from_songs(&[]),
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("chord-server-cache-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stats.json");

        let stats = sample_stats();
        save(&path, &stats).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.major.marginal_logp, stats.major.marginal_logp);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_fails_loudly_on_missing_snapshot() {
        let path = std::env::temp_dir().join("chord-server-cache-test-missing.json");
        assert!(load(&path).is_err());
    }
}
