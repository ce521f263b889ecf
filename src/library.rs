//! Snippet Library — component A.
//!
//! Loads `(X.mp3, X.txt)` pairs from a directory and answers lookups by
//! post-genre. Grounded on `Song`/`SongDatabase` in
//! original_source/soundsride/song.py; the on-disk phase-file format is
//! specified in spec.md section 6.

use crate::error::{Error, Result};
use crate::genre::Genre;
use crate::snippet::SongSnippet;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// A single `<phase_start_ms> <genre>` line from a song's phase file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Phase {
    start_ms: i64,
    genre: Genre,
}

fn parse_phase_file(contents: &str) -> Result<Vec<Phase>> {
    let mut phases = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let start_ms: i64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::MalformedForecast(format!("phase file line {}: bad start_ms", lineno + 1)))?;
        let genre = parts
            .next()
            .ok_or_else(|| Error::MalformedForecast(format!("phase file line {}: missing genre", lineno + 1)))?;
        phases.push(Phase { start_ms, genre: Genre::new(genre) });
    }
    Ok(phases)
}

/// Snippets derived from one song's phase boundaries, with the song's
/// total duration (needed to clamp the final transition's `end_ms`).
fn snippets_from_phases(source: &Path, phases: &[Phase], duration_ms: i64) -> Vec<SongSnippet> {
    let mut out = Vec::new();
    for i in 0..phases.len().saturating_sub(1) {
        let start_ms = phases[i].start_ms;
        let transition_ms = phases[i + 1].start_ms;
        let end_ms = phases.get(i + 2).map(|p| p.start_ms).unwrap_or(duration_ms);
        if !(start_ms < transition_ms && transition_ms < end_ms) {
            warn!(source = %source.display(), i, "skipping degenerate phase boundary");
            continue;
        }
        out.push(SongSnippet {
            source: source.to_path_buf(),
            start_ms,
            transition_ms,
            end_ms,
            pre_genre: phases[i].genre.clone(),
            post_genre: phases[i + 1].genre.clone(),
        });
    }
    out
}

/// In-memory index of every snippet across every loaded song, keyed by
/// post-genre. Decoding is deferred to render time (F); the library only
/// holds file paths and phase offsets.
pub struct SnippetLibrary {
    by_post_genre: HashMap<Genre, Vec<SongSnippet>>,
    // Round-robin cursor per genre, so repeated lookups cycle through
    // matches deterministically rather than always returning the first.
    cursors: HashMap<Genre, AtomicUsize>,
}

impl SnippetLibrary {
    /// Scan `dir` for `(X.mp3, X.txt)` pairs and build the index. Song
    /// duration is probed via symphonia when decoding is available; in
    /// this constructor it is supplied explicitly per file (callers in
    /// `main.rs` probe durations once at startup).
    pub fn from_phase_files(entries: Vec<(PathBuf, String, i64)>) -> Result<Self> {
        let mut by_post_genre: HashMap<Genre, Vec<SongSnippet>> = HashMap::new();

        for (audio_path, txt_contents, duration_ms) in entries {
            let phases = parse_phase_file(&txt_contents)?;
            let snippets = snippets_from_phases(&audio_path, &phases, duration_ms);
            debug!(song = %audio_path.display(), count = snippets.len(), "indexed snippets");
            for s in snippets {
                by_post_genre.entry(s.post_genre.clone()).or_default().push(s);
            }
        }

        let cursors = by_post_genre.keys().map(|g| (g.clone(), AtomicUsize::new(0))).collect();

        Ok(Self { by_post_genre, cursors })
    }

    /// Find a snippet whose `post_genre` matches `genre`. Ties between
    /// multiple matching snippets are broken round-robin (see
    /// SPEC_FULL.md / DESIGN.md: the original selects randomly; this is a
    /// deliberate determinism-preserving substitution).
    pub fn find_by_post_genre(&self, genre: &Genre) -> Option<&SongSnippet> {
        let candidates = self.by_post_genre.get(genre)?;
        if candidates.is_empty() {
            return None;
        }
        let cursor = self.cursors.get(genre)?;
        let idx = cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(idx)
    }

    pub fn genre_count(&self) -> usize {
        self.by_post_genre.len()
    }
}
