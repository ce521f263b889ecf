//! RPC handlers, grounded on wkmp-ap's `api/handlers.rs`.

use super::server::AppContext;
use super::types::{
    ChunkResponse, Empty, ErrorResponse, PositionResponse, StartSessionResponse,
    UpdateTransitionSpecRequest,
};
use crate::audio::decode;
use crate::error::Error;
use crate::genre::Genre;
use crate::player::PlaybackHandle;
use crate::session::{Decoder, Session};
use crate::transition_spec::Transition;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use std::sync::Arc;
use tracing::{info, warn};

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match self.rpc_kind() {
            "InvalidArgument" => StatusCode::BAD_REQUEST,
            "NotFound" => StatusCode::NOT_FOUND,
            "Unavailable" | "SessionBusy" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse { kind: self.rpc_kind().to_string(), message: self.to_string() });
        (status, body).into_response()
    }
}

struct SymphoniaDecoder;
impl Decoder for SymphoniaDecoder {
    fn decode_slice(
        &self,
        path: &std::path::Path,
        start_ms: i64,
        end_ms: i64,
    ) -> crate::error::Result<crate::segment::DecodedAudio> {
        let (samples, sample_rate, channels) = decode::decode_slice(path, start_ms, end_ms)?;
        Ok(crate::segment::DecodedAudio { samples, sample_rate, channels })
    }
}

pub async fn ping() -> Json<Empty> {
    Json(Empty {})
}

pub async fn start_session(State(ctx): State<AppContext>) -> Json<StartSessionResponse> {
    let session_id = ctx.registry.allocate();
    let session = Arc::new(Session::new(
        session_id,
        ctx.config.tolerances,
        ctx.config.planner,
        Arc::clone(&ctx.library),
        Arc::new(PlaybackHandle::default()),
        ctx.output_format,
        ctx.viz_worker_count,
        Arc::clone(&ctx.sink_factory),
    ));
    ctx.sessions.write().await.insert(session_id, session);
    info!(session_id, "session started");
    Json(StartSessionResponse { session_id })
}

pub async fn update_transition_spec(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u32>,
    Json(req): Json<UpdateTransitionSpecRequest>,
) -> Result<Json<Empty>, Error> {
    let sessions = ctx.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
    let session = Arc::clone(session);
    drop(sessions);

    let raw = serde_json::to_value(&req).unwrap_or(serde_json::json!({}));

    // Convert seconds -> ms, drop entries with ETT < 0 (section 6).
    let transitions: Vec<Transition> = req
        .transitions
        .into_iter()
        .filter(|t| t.estimated_time_to_transition >= 0.0)
        .map(|t| Transition {
            id: t.transition_id,
            offset_ms: (t.estimated_time_to_transition * 1000.0).round() as i64,
            post_genre: Genre::new(t.transition_to_genre),
        })
        .collect();

    let wall_now_ms = crate::time::wall_now_ms();
    let decoder = SymphoniaDecoder;
    let processed = session.update(wall_now_ms, transitions, &decoder).await?;
    if !processed {
        warn!(session_id, "forecast dropped, session busy");
    }

    let request_log_id = wall_now_ms.to_string();
    let session_log_id = session_id.to_string();
    let entry = crate::log::ForecastLogEntry {
        session_log_id: &session_log_id,
        request_log_id: &request_log_id,
        received_wall_ms: wall_now_ms,
        raw: &raw,
    };
    crate::log::write_forecast_log(&ctx.config.log_path, &entry).await;

    Ok(Json(Empty {}))
}

pub async fn get_chunk(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u32>,
) -> Result<Json<ChunkResponse>, Error> {
    let sessions = ctx.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;

    // Pull-based delivery: a remote head unit fetches PCM chunks directly
    // rather than this core pushing to a local device. The chunk handed
    // back starts wherever the session's playback cursor currently sits.
    let handle = session.playback_handle();
    let frame_rate = ctx.output_format.sample_rate as i64;
    let played_ms = handle.played_ms();
    let first_frame_id = ((played_ms * frame_rate) / 1000).max(0) as u64;

    let chunk_bytes: Vec<u8> = match handle.active_segment() {
        Some(segment) => {
            let samples = segment.chunk(played_ms, played_ms + crate::player::CHUNK_LENGTH_MS);
            samples.iter().flat_map(|s| s.to_le_bytes()).collect()
        }
        None => Vec::new(),
    };
    Ok(Json(ChunkResponse {
        first_frame_id,
        audio_chunk: base64::engine::general_purpose::STANDARD.encode(chunk_bytes),
    }))
}

pub async fn get_position(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u32>,
) -> Result<Json<PositionResponse>, Error> {
    let sessions = ctx.sessions.read().await;
    if !sessions.contains_key(&session_id) {
        return Err(Error::NotFound(format!("session {session_id}")));
    }
    // Position tracking belongs to the out-of-scope vehicle-data client
    // (section 1); this core has no GPS feed of its own to report.
    Ok(Json(PositionResponse { latitude: 0.0, longitude: 0.0, altitude: 0.0 }))
}
