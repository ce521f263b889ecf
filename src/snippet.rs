//! Song snippets — components of the mix plan.
//!
//! Grounded on `SongSnippet`/`ScheduledSnippet` in
//! original_source/soundsride/mix_plan.py and `song.py`.

use crate::error::{Error, Result};
use crate::genre::Genre;
use std::path::PathBuf;

/// A slice of a song straddling one genre transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SongSnippet {
    pub source: PathBuf,
    pub start_ms: i64,
    pub transition_ms: i64,
    pub end_ms: i64,
    pub pre_genre: Genre,
    pub post_genre: Genre,
}

impl SongSnippet {
    pub fn new(
        source: PathBuf,
        start_ms: i64,
        transition_ms: i64,
        end_ms: i64,
        pre_genre: Genre,
        post_genre: Genre,
    ) -> Result<Self> {
        if !(start_ms < transition_ms && transition_ms < end_ms) {
            return Err(Error::InvalidSchedule(format!(
                "snippet offsets must satisfy start < transition < end, got {start_ms} < {transition_ms} < {end_ms}"
            )));
        }
        Ok(Self { source, start_ms, transition_ms, end_ms, pre_genre, post_genre })
    }

    pub fn pre_duration(&self) -> i64 {
        self.transition_ms - self.start_ms
    }

    pub fn post_duration(&self) -> i64 {
        self.end_ms - self.transition_ms
    }
}

/// Placement mode of a fade window inside a snippet's transition zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeMode {
    Early,
    Medium,
    Late,
    Slow,
}

impl FadeMode {
    /// Default mode for a given post-genre (section 4.E step 2: "highwayExit
    /// -> SLOW, else EARLY").
    pub fn default_for_genre(genre: &Genre) -> Self {
        if genre.as_str() == "highwayExit" {
            FadeMode::Slow
        } else {
            FadeMode::Early
        }
    }
}

/// A half-open millisecond interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A `SongSnippet` placed onto the session timeline.
#[derive(Debug, Clone)]
pub struct ScheduledSnippet {
    pub snippet: SongSnippet,
    pub scheduled_transition_ms: i64,
    pub mode: FadeMode,
    pub fade_in: Option<FadeWindow>,
    pub fade_out: Option<FadeWindow>,
}

impl ScheduledSnippet {
    pub fn new(snippet: SongSnippet, scheduled_transition_ms: i64, mode: FadeMode) -> Result<Self> {
        if scheduled_transition_ms <= 0 {
            return Err(Error::InvalidSchedule(format!(
                "scheduled_transition_ms must be > 0, got {scheduled_transition_ms}"
            )));
        }
        Ok(Self { snippet, scheduled_transition_ms, mode, fade_in: None, fade_out: None })
    }

    pub fn earliest_start(&self) -> i64 {
        (self.scheduled_transition_ms - self.snippet.pre_duration()).max(0)
    }

    pub fn latest_end(&self) -> i64 {
        self.scheduled_transition_ms + self.snippet.post_duration()
    }

    pub fn scheduled_start_ms(&self) -> i64 {
        self.scheduled_transition_ms - self.snippet.pre_duration()
    }

    /// Validate the fade-window invariant from section 3:
    /// `earliest_start <= fade_in_min <= fade_in_max <= fade_out_min <=
    /// fade_out_max <= latest_end` whenever those fields are set.
    pub fn validate_fade_windows(&self) -> Result<()> {
        let (earliest, latest) = (self.earliest_start(), self.latest_end());
        if let Some(fi) = self.fade_in {
            if !(earliest <= fi.start_ms && fi.start_ms <= fi.end_ms) {
                return Err(Error::InvalidSchedule("fade_in window out of order".into()));
            }
        }
        if let Some(fo) = self.fade_out {
            if !(fo.start_ms <= fo.end_ms && fo.end_ms <= latest) {
                return Err(Error::InvalidSchedule("fade_out window out of order".into()));
            }
        }
        if let (Some(fi), Some(fo)) = (self.fade_in, self.fade_out) {
            if fi.end_ms > fo.start_ms {
                return Err(Error::InvalidSchedule("fade_in_max must be <= fade_out_min".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snip(pre: i64, post: i64) -> SongSnippet {
        SongSnippet::new(
            PathBuf::from("song.mp3"),
            0,
            pre,
            pre + post,
            Genre::new("low"),
            Genre::new("high"),
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_monotone_offsets() {
        let err = SongSnippet::new(PathBuf::from("x.mp3"), 100, 50, 200, Genre::new("a"), Genre::new("b"));
        assert!(err.is_err());
    }

    #[test]
    fn derived_durations() {
        let s = snip(10_000, 20_000);
        assert_eq!(s.pre_duration(), 10_000);
        assert_eq!(s.post_duration(), 20_000);
    }

    #[test]
    fn scheduled_snippet_derives_earliest_and_latest() {
        let s = snip(10_000, 20_000);
        let sched = ScheduledSnippet::new(s, 50_000, FadeMode::Early).unwrap();
        assert_eq!(sched.earliest_start(), 40_000);
        assert_eq!(sched.latest_end(), 70_000);
    }

    #[test]
    fn rejects_non_positive_scheduled_transition() {
        let s = snip(1_000, 1_000);
        assert!(ScheduledSnippet::new(s, 0, FadeMode::Early).is_err());
    }

    #[test]
    fn default_mode_is_slow_for_highway_exit() {
        assert_eq!(FadeMode::default_for_genre(&Genre::new("highwayExit")), FadeMode::Slow);
        assert_eq!(FadeMode::default_for_genre(&Genre::new("tunnelEntrance")), FadeMode::Early);
    }
}
