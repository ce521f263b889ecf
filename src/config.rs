//! Configuration loading, grounded on wkmp-ap's `config.rs`
//! (`TomlConfig`/`Config::load`), narrowed to the tuning constants listed
//! in spec.md section 6 (no database-backed settings layer — see
//! DESIGN.md for the dropped `sqlx` dependency).

use crate::classifier::Tolerances;
use crate::error::{Error, Result};
use crate::mix_planner::PlannerConfig;
use crate::player::CHUNK_LENGTH_MS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Bootstrap configuration loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Directory of `(X.mp3, X.txt)` pairs (section 6).
    pub library_path: PathBuf,

    /// Directory session logs are written under (section 6).
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub deviation_tolerance_ms: i64,

    #[serde(default = "default_hot_zone_entrance_ms")]
    pub hot_zone_entrance_ms: i64,

    #[serde(default = "default_transition_safe_zone_ms")]
    pub transition_safe_zone_ms: i64,

    #[serde(default = "default_cross_fade_ms")]
    pub cross_fade_ms: i64,

    #[serde(default = "default_long_cross_fade_ms")]
    pub long_cross_fade_ms: i64,

    #[serde(default = "default_chunk_length_ms")]
    pub chunk_length_ms: i64,

    #[serde(default = "default_lookahead_snippet_count")]
    pub lookahead_snippet_count: usize,

    /// Output audio device name; `None` selects the host default.
    pub audio_device: Option<String>,
}

fn default_port() -> u16 {
    7121
}
fn default_log_path() -> PathBuf {
    PathBuf::from("log")
}
fn default_hot_zone_entrance_ms() -> i64 {
    i64::MAX
}
fn default_transition_safe_zone_ms() -> i64 {
    5_000
}
fn default_cross_fade_ms() -> i64 {
    3_000
}
fn default_long_cross_fade_ms() -> i64 {
    25_000
}
fn default_chunk_length_ms() -> i64 {
    CHUNK_LENGTH_MS
}
fn default_lookahead_snippet_count() -> usize {
    3
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub library_path: PathBuf,
    pub log_path: PathBuf,
    pub port: u16,
    pub tolerances: Tolerances,
    pub planner: PlannerConfig,
    pub audio_device: Option<String>,
}

impl Config {
    pub async fn load(
        config_path: &Path,
        port_override: Option<u16>,
        library_override: Option<PathBuf>,
    ) -> Result<Self> {
        let toml_str = tokio::fs::read_to_string(config_path)
            .await
            .map_err(Error::Io)?;
        let toml: TomlConfig = toml::from_str(&toml_str)
            .map_err(|e| Error::Internal(format!("failed to parse config: {e}")))?;

        Ok(Self {
            library_path: library_override.unwrap_or(toml.library_path),
            log_path: toml.log_path,
            port: port_override.unwrap_or(toml.port),
            tolerances: Tolerances {
                deviation_tolerance_ms: toml.deviation_tolerance_ms,
                hot_zone_entrance_ms: toml.hot_zone_entrance_ms,
            },
            planner: PlannerConfig {
                transition_safe_zone_ms: toml.transition_safe_zone_ms,
                cross_fade_ms: toml.cross_fade_ms,
                long_cross_fade_ms: toml.long_cross_fade_ms,
                lookahead_snippet_count: toml.lookahead_snippet_count,
            },
            audio_device: toml.audio_device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_section_6() {
        let toml: TomlConfig = toml::from_str("library_path = \"songs\"\n").unwrap();
        assert_eq!(toml.deviation_tolerance_ms, 0);
        assert_eq!(toml.hot_zone_entrance_ms, i64::MAX);
        assert_eq!(toml.transition_safe_zone_ms, 5_000);
        assert_eq!(toml.cross_fade_ms, 3_000);
        assert_eq!(toml.long_cross_fade_ms, 25_000);
        assert_eq!(toml.chunk_length_ms, 250);
        assert_eq!(toml.lookahead_snippet_count, 3);
    }
}
