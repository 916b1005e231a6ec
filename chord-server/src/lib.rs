//! Chord recommendation WebSocket server.
//!
//! Module overview:
//! - `config`:     `ServerConfig` — host/port, corpus directory layout,
//!                 snapshot cache path, recommendation-list size.
//! - `corpus`:     parses the bundled corpora into the major/parallel-minor/
//!                 relative-minor `StatSet`s, following `server.py`'s
//!                 module-level song loading and `beta_collapse`/-3-transpose
//!                 preprocessing.
//! - `cache`:      JSON snapshot of the built `StatSet`s, so the server
//!                 never reparses corpora on every request.
//! - `state`:      `ServerState` — the loaded stat sets plus the chord
//!                 catalog, shared behind `Arc` across connections.
//! - `connection`: per-connection request handling: parses a `ChordRequest`,
//!                 dispatches to `chord-engine`, serializes the response.
//! - `serve`:      the `tokio`/`tokio-tungstenite` accept loop.
//!
//! Dependencies: `chord-protocol` (wire types and request resolution),
//! `chord-corpus`/`chord-stats`/`chord-engine` (corpus loading and
//! prediction). No dependency on a particular corpus's presence on disk —
//! a missing corpus directory just yields an emptier `StatSet`.

pub mod cache;
pub mod config;
pub mod connection;
pub mod corpus;
pub mod serve;
pub mod state;
