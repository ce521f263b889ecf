//! Mix Planner / Scheduler — component E.
//!
//! Given a consolidated sequence of genre transitions anchored to absolute
//! timestamps, selects song snippets, computes overlap zones between
//! consecutive snippets, and resolves each overlap into a legal cross-fade
//! window. Ported from `MixPlan` in
//! original_source/soundsride/mix_plan.py (`_get_overlap_zones`,
//! `_get_cross_fade_zone_candidate`, `set_snippet_transitions`).

use crate::error::{Error, FadeOutcome, Result};
use crate::genre::Genre;
use crate::library::SnippetLibrary;
use crate::snippet::{FadeMode, FadeWindow, ScheduledSnippet};
use crate::transition_spec::TransitionId;
use tracing::{debug, warn};

/// Tuning constants for overlap/fade-zone computation (section 6).
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    pub transition_safe_zone_ms: i64,
    pub cross_fade_ms: i64,
    pub long_cross_fade_ms: i64,
    pub lookahead_snippet_count: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            transition_safe_zone_ms: 5_000,
            cross_fade_ms: 3_000,
            long_cross_fade_ms: 25_000,
            lookahead_snippet_count: 3,
        }
    }
}

/// Ordered sequence of `ScheduledSnippet`s by `scheduled_transition_ms`.
#[derive(Debug, Clone, Default)]
pub struct MixPlan {
    snippets: Vec<ScheduledSnippet>,
    /// One outcome per consecutive snippet pair that was resolved (section
    /// 7: `InfeasibleCrossfade` never reaches a caller as an error; this is
    /// how a caller can still tell a hard-cut fallback was taken).
    fade_outcomes: Vec<FadeOutcome>,
}

impl MixPlan {
    /// Construct a plan directly from already-scheduled snippets, bypassing
    /// selection/fade resolution. Used by segment-rendering tests that need
    /// a `MixPlan` without going through the library-backed planner.
    #[cfg(test)]
    pub(crate) fn from_snippets(snippets: Vec<ScheduledSnippet>) -> Self {
        Self { snippets, fade_outcomes: Vec::new() }
    }

    pub fn snippets(&self) -> &[ScheduledSnippet] {
        &self.snippets
    }

    /// Per-gap cross-fade outcome, in the same order as consecutive snippet
    /// pairs were resolved.
    pub fn fade_outcomes(&self) -> &[FadeOutcome] {
        &self.fade_outcomes
    }

    /// Total length: the maximum `latest_end` across all snippets.
    pub fn length_ms(&self) -> i64 {
        self.snippets.iter().map(|s| s.latest_end()).max().unwrap_or(0)
    }

    pub fn last(&self) -> Option<&ScheduledSnippet> {
        self.snippets.last()
    }
}

pub struct MixPlanner<'a> {
    library: &'a SnippetLibrary,
    config: PlannerConfig,
}

impl<'a> MixPlanner<'a> {
    pub fn new(library: &'a SnippetLibrary, config: PlannerConfig) -> Self {
        Self { library, config }
    }

    /// Build (or rebuild) a mix plan from a consolidated, absolute-time
    /// transition sequence.
    ///
    /// `previous_plan` supplies carry-forward (step 1): the last scheduled
    /// snippet whose `scheduled_transition_ms <= only_after_ms` is kept
    /// verbatim so already-committed playback is not disturbed.
    pub fn plan(
        &self,
        merged: &[(TransitionId, i64, Genre)],
        only_after_ms: i64,
        previous_plan: Option<&MixPlan>,
    ) -> Result<MixPlan> {
        let mut snippets = Vec::new();

        if let Some(prev) = previous_plan {
            if let Some(carried) = prev
                .snippets()
                .iter()
                .rev()
                .find(|s| s.scheduled_transition_ms <= only_after_ms)
            {
                snippets.push(carried.clone());
            }
        }

        let mut scheduled_count = 0usize;
        for (_, abs_ms, genre) in merged {
            if *abs_ms < only_after_ms {
                continue;
            }
            if scheduled_count >= self.config.lookahead_snippet_count {
                break;
            }
            let Some(song_snippet) = self.library.find_by_post_genre(genre) else {
                warn!(genre = %genre, "no snippet available for genre, skipping transition");
                continue;
            };
            let mode = FadeMode::default_for_genre(genre);
            let scheduled = ScheduledSnippet::new(song_snippet.clone(), *abs_ms, mode)?;
            snippets.push(scheduled);
            scheduled_count += 1;
        }

        let fade_outcomes = self.resolve_fades(&mut snippets);

        for s in &snippets {
            s.validate_fade_windows()?;
        }

        Ok(MixPlan { snippets, fade_outcomes })
    }

    /// Compute overlap/working/transition zones for every consecutive
    /// pair and assign fade windows (section 4.E steps 3-4). Returns one
    /// `FadeOutcome` per pair that had any overlap at all.
    fn resolve_fades(&self, snippets: &mut [ScheduledSnippet]) -> Vec<FadeOutcome> {
        let sz = self.config.transition_safe_zone_ms;
        let cf = self.config.cross_fade_ms;
        let lcf = self.config.long_cross_fade_ms;
        let mut outcomes = Vec::new();

        for i in 0..snippets.len().saturating_sub(1) {
            let (a_transition, a_latest_end) =
                (snippets[i].scheduled_transition_ms, snippets[i].latest_end());
            let (b_transition, b_earliest_start) =
                (snippets[i + 1].scheduled_transition_ms, snippets[i + 1].earliest_start());

            if a_latest_end <= b_earliest_start {
                debug!(i, "no overlap between consecutive snippets");
                continue;
            }

            let overlap_start = a_transition.max(b_earliest_start);
            let overlap_end = a_latest_end.min(b_transition);

            let working_start = a_transition + sz;
            let working_end = b_transition - sz;
            let working_len = working_end - working_start;

            let (fade_start, fade_end) = if working_len < cf {
                warn!(i, "working zone shorter than cross-fade window, falling back to hard cut");
                outcomes.push(FadeOutcome::HardCut);
                let midpoint = (overlap_start + overlap_end) / 2;
                (midpoint, midpoint)
            } else {
                outcomes.push(FadeOutcome::CrossFaded);
                let zone_start = working_start.max(overlap_start);
                let zone_end = working_end.min(overlap_end);
                let zone_len = zone_end - zone_start;
                let mode = snippets[i + 1].mode;
                let effective_len = cf.min(zone_len);

                match mode {
                    FadeMode::Late => (zone_end - effective_len, zone_end),
                    FadeMode::Medium => {
                        let center = (zone_start + zone_end) / 2;
                        (center - effective_len / 2, center + effective_len / 2)
                    }
                    FadeMode::Slow => {
                        let len = lcf.min(zone_len);
                        (zone_end - len, zone_end)
                    }
                    FadeMode::Early => (zone_start, zone_start + effective_len),
                }
            };

            let window = FadeWindow { start_ms: fade_start, end_ms: fade_end };
            snippets[i].fade_out = Some(window);
            snippets[i + 1].fade_in = Some(window);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::SongSnippet;
    use std::path::PathBuf;

    fn lib_with(entries: Vec<(PathBuf, &str, i64)>) -> SnippetLibrary {
        SnippetLibrary::from_phase_files(
            entries.into_iter().map(|(p, txt, dur)| (p, txt.to_string(), dur)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn carry_forward_keeps_last_committed_snippet() {
        let lib = lib_with(vec![(PathBuf::from("a.mp3"), "0 low\n10000 high\n", 20_000)]);
        let planner = MixPlanner::new(&lib, PlannerConfig::default());

        let merged = vec![(1, 10_000, Genre::new("high"))];
        let first = planner.plan(&merged, 0, None).unwrap();
        assert_eq!(first.snippets().len(), 1);

        // Re-plan with only_after_ms beyond the first snippet's transition:
        // nothing new qualifies, but carry-forward keeps the committed one.
        let second = planner.plan(&[], 10_000, Some(&first)).unwrap();
        assert_eq!(second.snippets().len(), 1);
        assert_eq!(second.snippets()[0].scheduled_transition_ms, 10_000);
    }

    #[test]
    fn s5_infeasible_crossfade_falls_back_to_hard_cut() {
        // A.transition=50000, A.pre=10000, A.post=20000 (latest_end=70000)
        // B.transition=60000, B.pre=15000, B.post=5000 (earliest_start=45000)
        let a = SongSnippet::new(PathBuf::from("a.mp3"), 0, 10_000, 30_000, Genre::new("x"), Genre::new("y")).unwrap();
        let b = SongSnippet::new(PathBuf::from("b.mp3"), 0, 15_000, 20_000, Genre::new("y"), Genre::new("z")).unwrap();

        let mut snippets = vec![
            ScheduledSnippet::new(a, 50_000, FadeMode::Early).unwrap(),
            ScheduledSnippet::new(b, 60_000, FadeMode::Early).unwrap(),
        ];
        assert_eq!(snippets[0].latest_end(), 70_000);
        assert_eq!(snippets[1].earliest_start(), 45_000);

        let lib = lib_with(vec![]);
        let planner = MixPlanner::new(&lib, PlannerConfig { transition_safe_zone_ms: 5_000, cross_fade_ms: 3_000, ..Default::default() });
        planner.resolve_fades(&mut snippets);

        let fade = snippets[0].fade_out.unwrap();
        assert_eq!(fade.start_ms, 55_000);
        assert_eq!(fade.end_ms, 55_000);
    }

    #[test]
    fn working_zone_equal_to_cf_succeeds_at_exact_length() {
        // Working zone length == CF exactly: fade length == CF, not a hard cut.
        let a = SongSnippet::new(PathBuf::from("a.mp3"), 0, 10_000, 30_000, Genre::new("x"), Genre::new("y")).unwrap();
        let b = SongSnippet::new(PathBuf::from("b.mp3"), 0, 10_000, 30_000, Genre::new("y"), Genre::new("z")).unwrap();

        // transition_b - transition_a - 2*sz == cf  =>  gap = cf + 2*sz
        let sz = 5_000;
        let cf = 3_000;
        let a_transition = 50_000;
        let b_transition = a_transition + cf + 2 * sz;

        let mut snippets = vec![
            ScheduledSnippet::new(a, a_transition, FadeMode::Early).unwrap(),
            ScheduledSnippet::new(b, b_transition, FadeMode::Early).unwrap(),
        ];

        let lib = lib_with(vec![]);
        let planner = MixPlanner::new(&lib, PlannerConfig { transition_safe_zone_ms: sz, cross_fade_ms: cf, ..Default::default() });
        planner.resolve_fades(&mut snippets);

        let fade = snippets[0].fade_out.unwrap();
        assert_eq!(fade.end_ms - fade.start_ms, cf);
    }

    #[test]
    fn working_zone_one_less_than_cf_falls_back() {
        let a = SongSnippet::new(PathBuf::from("a.mp3"), 0, 10_000, 30_000, Genre::new("x"), Genre::new("y")).unwrap();
        let b = SongSnippet::new(PathBuf::from("b.mp3"), 0, 10_000, 30_000, Genre::new("y"), Genre::new("z")).unwrap();

        let sz = 5_000;
        let cf = 3_000;
        let a_transition = 50_000;
        let b_transition = a_transition + (cf - 1) + 2 * sz;

        let mut snippets = vec![
            ScheduledSnippet::new(a, a_transition, FadeMode::Early).unwrap(),
            ScheduledSnippet::new(b, b_transition, FadeMode::Early).unwrap(),
        ];

        let lib = lib_with(vec![]);
        let planner = MixPlanner::new(&lib, PlannerConfig { transition_safe_zone_ms: sz, cross_fade_ms: cf, ..Default::default() });
        planner.resolve_fades(&mut snippets);

        let fade = snippets[0].fade_out.unwrap();
        assert_eq!(fade.start_ms, fade.end_ms, "hard cut has zero-length fade window");
    }

    #[test]
    fn rejects_non_positive_scheduled_transition_during_selection() {
        let lib = lib_with(vec![(PathBuf::from("a.mp3"), "0 low\n10000 high\n", 20_000)]);
        let planner = MixPlanner::new(&lib, PlannerConfig::default());
        let merged = vec![(1, 0, Genre::new("high"))];
        let err = planner.plan(&merged, 0, None);
        assert!(err.is_err());
    }

    #[test]
    fn plan_records_fade_outcome_per_gap() {
        let lib = lib_with(vec![(PathBuf::from("a.mp3"), "0 low\n10000 high\n", 20_000)]);
        let planner = MixPlanner::new(&lib, PlannerConfig::default());
        let merged = vec![(1, 10_000, Genre::new("high"))];
        let plan = planner.plan(&merged, 0, None).unwrap();
        assert!(plan.fade_outcomes().is_empty(), "single snippet has no gap to resolve");
    }

    #[test]
    fn lookahead_bound_stops_after_n_transitions() {
        let lib = lib_with(vec![(PathBuf::from("a.mp3"), "0 low\n10000 high\n", 20_000)]);
        let planner = MixPlanner::new(&lib, PlannerConfig { lookahead_snippet_count: 2, ..Default::default() });
        let merged = vec![
            (1, 10_000, Genre::new("high")),
            (2, 20_000, Genre::new("high")),
            (3, 30_000, Genre::new("high")),
        ];
        let plan = planner.plan(&merged, 0, None).unwrap();
        assert_eq!(plan.snippets().len(), 2);
    }
}
