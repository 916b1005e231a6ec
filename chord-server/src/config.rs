//! Server configuration: listen address, corpus directory layout, the
//! `StatSet` snapshot path, and the recommendation-list size. Mirrors
//! `elven_canopy_relay::server::RelayConfig`'s shape — a plain struct with a
//! `Default` impl, populated by hand-rolled CLI parsing in `main`.

use std::path::PathBuf;

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root of the bundled corpora; `abc_subdir`/`rs_melody_subdir`/
    /// `rs_harmony_subdir`/`marg_subdirs` are relative to this.
    pub corpus_dir: PathBuf,
    /// Where `chord-server build-stats` writes (and the server reads) the
    /// parsed `StatSet` snapshot.
    pub cache_path: PathBuf,
    pub abc_subdir: String,
    pub rs_melody_subdir: String,
    pub rs_harmony_subdir: String,
    pub marg_subdirs: Vec<String>,
    /// Top-K recommendation list size, per slot.
    pub default_recommendations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            corpus_dir: PathBuf::from("data/corpus"),
            cache_path: PathBuf::from("data/stat_sets.json"),
            abc_subdir: "nottingham-dataset/ABC_cleaned".to_string(),
            rs_melody_subdir: "rs200_melody_nlt".to_string(),
            rs_harmony_subdir: "rs200_harmony_clt".to_string(),
            marg_subdirs: vec!["csv_train".to_string(), "csv_test".to_string()],
            default_recommendations: 10,
        }
    }
}
