//! Shared, read-only server state: the three `StatSet`s built at startup
//! plus the catalog of every chord any of them has ever seen. `StatSet`s
//! never change after load, so one instance is shared behind `Arc` across
//! every connection's task.

use std::collections::BTreeSet;
use std::sync::Arc;

use chord_protocol::StatSetRole;
use chord_stats::StatSet;
use chord_theory::Chord;

use crate::corpus::CorpusStats;

pub struct ServerState {
    major: StatSet,
    parallel_minor: StatSet,
    relative_minor: StatSet,
    pub all_chords: Vec<Chord>,
    pub default_recommendations: usize,
}

impl ServerState {
    pub fn new(stats: CorpusStats, default_recommendations: usize) -> Arc<Self> {
        let mut all_chords: BTreeSet<Chord> = BTreeSet::new();
        all_chords.extend(stats.major.chords().copied());
        all_chords.extend(stats.parallel_minor.chords().copied());
        all_chords.extend(stats.relative_minor.chords().copied());

        Arc::new(ServerState {
            major: stats.major,
            parallel_minor: stats.parallel_minor,
            relative_minor: stats.relative_minor,
            all_chords: all_chords.into_iter().collect(),
            default_recommendations,
        })
    }

    pub fn stat_set(&self, role: StatSetRole) -> &StatSet {
        match role {
            StatSetRole::Major => &self.major,
            StatSetRole::ParallelMinor => &self.parallel_minor,
            StatSetRole::RelativeMinor => &self.relative_minor,
        }
    }
}
