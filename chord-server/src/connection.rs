//! Per-request handling: parse a `ChordRequest`, resolve it, dispatch to
//! `chord-engine`, and serialize a `ChordResponse`. Any failure along the way
//! — malformed JSON, an unparsable constraint chord, an empty melody with no
//! constraints — becomes an `{"error": ...}` payload instead, matching
//! `server.py`'s `echo` handler's blanket try/except around the whole
//! request.

use chord_engine::{predict, PredictConfig};
use chord_protocol::{build_response, ChordRequest, ErrorResponse};
use chord_stats::StatSet;

use crate::state::ServerState;

/// Handle one incoming request payload and return the JSON reply to send
/// back over the socket. Never panics.
pub fn handle_message(state: &ServerState, raw: &str) -> String {
    match handle_request(state, raw) {
        Ok(json) => json,
        Err(reason) => serde_json::to_string(&ErrorResponse { error: reason })
            .unwrap_or_else(|_| "{\"error\":\"failed to serialize error response\"}".to_string()),
    }
}

fn handle_request(state: &ServerState, raw: &str) -> Result<String, String> {
    let request: ChordRequest = serde_json::from_str(raw).map_err(|e| format!("malformed request: {e}"))?;
    let resolved = request.resolve()?;

    let weighted_stat_sets: Vec<(f64, &StatSet)> =
        resolved.stat_set_weights.iter().map(|&(weight, role)| (weight, state.stat_set(role))).collect();

    let config = PredictConfig {
        number_of_recommendations: state.default_recommendations,
        jazziness: request.jazziness,
        first_note_weight: request.first_weight,
        seed: request.seed,
        determinism_weight: request.determinism_weight,
    };

    let slot_results = predict(
        &weighted_stat_sets,
        &resolved.grouped_notes,
        &resolved.locked_chords,
        resolved.preserve_chords.as_deref(),
        &config,
    )?;

    let response = build_response(
        request.seq,
        &state.all_chords,
        request.key_signature,
        request.bottom_bass,
        &resolved.constraint_times,
        &resolved.locked_chords,
        &slot_results,
    );

    serde_json::to_string(&response).map_err(|e| format!("failed to serialize response: {e}"))
}
