//! Wire types for the RPC surface (section 6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct Empty {}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: u32,
}

/// One entry of an `UpdateTransitionSpec` request, in wire units (seconds,
/// not milliseconds — converted on arrival per section 6: "Server converts
/// seconds -> ms (x1000), drops entries with ETT < 0").
#[derive(Debug, Deserialize, Serialize)]
pub struct TransitionEntry {
    pub transition_id: i64,
    pub transition_to_genre: String,
    pub estimated_time_to_transition: f64,
    #[serde(default)]
    pub estimated_geo_distance_to_transition: f64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateTransitionSpecRequest {
    pub transitions: Vec<TransitionEntry>,
}

#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub first_frame_id: u64,
    /// PCM float32 little-endian, base64-encoded for JSON transport.
    pub audio_chunk: String,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
}
