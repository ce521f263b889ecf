//! Session log persistence (section 6: "Session log layout").
//!
//! Every accepted `UpdateTransitionSpec` call writes the original forecast
//! verbatim, grounded on the request-logging behavior of
//! original_source/soundsride/service/server.py. Writes happen off the
//! coordinator's critical path.

use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One forecast as received, before parsing, for archival.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastLogEntry<'a> {
    pub session_log_id: &'a str,
    pub request_log_id: &'a str,
    pub received_wall_ms: i64,
    pub raw: &'a serde_json::Value,
}

/// `log/<session_log_id>/<request_log_id>.json`
pub fn request_log_path(log_root: &Path, session_log_id: &str, request_log_id: &str) -> PathBuf {
    log_root.join(session_log_id).join(format!("{request_log_id}.json"))
}

/// Write a forecast log entry, creating the session's log directory if
/// needed. Failures are logged, not propagated: logging must never block
/// or fail playback (section 7's propagation policy).
pub async fn write_forecast_log(log_root: &Path, entry: &ForecastLogEntry<'_>) {
    let path = request_log_path(log_root, entry.session_log_id, entry.request_log_id);
    if let Some(dir) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("failed to create session log directory {}: {e}", dir.display());
            return;
        }
    }
    let body = match serde_json::to_vec_pretty(entry) {
        Ok(b) => b,
        Err(e) => {
            warn!("failed to serialize forecast log entry: {e}");
            return;
        }
    };
    if let Err(e) = tokio::fs::write(&path, body).await {
        warn!("failed to write session log {}: {e}", path.display());
    }
}

pub async fn read_forecast_log(path: &Path) -> Result<serde_json::Value> {
    let body = tokio::fs::read(path).await.map_err(crate::error::Error::Io)?;
    serde_json::from_slice(&body).map_err(|e| crate::error::Error::Internal(format!("malformed log entry: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_layout_matches_section_6() {
        let path = request_log_path(Path::new("log"), "sess-1", "req-7");
        assert_eq!(path, PathBuf::from("log/sess-1/req-7.json"));
    }

    #[tokio::test]
    async fn write_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let raw = serde_json::json!({"transitions": []});
        let entry = ForecastLogEntry {
            session_log_id: "sess-1",
            request_log_id: "req-1",
            received_wall_ms: 1_000,
            raw: &raw,
        };
        write_forecast_log(dir.path(), &entry).await;

        let path = request_log_path(dir.path(), "sess-1", "req-1");
        let read_back = read_forecast_log(&path).await.unwrap();
        assert_eq!(read_back["raw"], raw);
    }
}
