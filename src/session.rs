//! Session Coordinator — component H.
//!
//! Ties components B through G together on each incoming forecast:
//! try-lock coordination, consolidator dispatch, re-planning, rendering,
//! and hot-swap. Grounded on `SoundsRideSession` in
//! original_source/soundsride/session.py.

use crate::audio::sink::SinkFactory;
use crate::classifier::Tolerances;
use crate::consolidator::TransitionConsolidator;
use crate::error::{Error, Result};
use crate::library::SnippetLibrary;
use crate::mix_planner::{MixPlan, MixPlanner, PlannerConfig};
use crate::player::{PlaybackHandle, StreamPlayer};
use crate::segment::{render, AudioFormat, DecodedAudio};
use crate::time::SessionClock;
use crate::transition_spec::TransitionSpec;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Decodes a snippet's `[start_ms, end_ms)` slice into PCM at the given
/// output format. Injected so the coordinator does not hard-code a decode
/// backend; production wiring supplies `crate::audio::decode`.
pub trait Decoder: Send + Sync {
    fn decode_slice(&self, path: &std::path::Path, start_ms: i64, end_ms: i64) -> Result<DecodedAudio>;
}

/// Mutable state touched by `update`, guarded by the session's try-lock
/// mutex (section 5: "per-session non-reentrant mutex... acquired with
/// try-lock semantics: contention => drop the incoming forecast").
struct SessionInner {
    clock: SessionClock,
    consolidator: TransitionConsolidator,
    last_plan: Option<MixPlan>,
}

/// One session: owns its consolidator/planner state and a handle to its
/// dedicated audio thread's `PlaybackHandle`.
pub struct Session {
    pub id: u32,
    inner: AsyncMutex<SessionInner>,
    library: Arc<SnippetLibrary>,
    planner_config: PlannerConfig,
    playback: Arc<PlaybackHandle>,
    output_format: AudioFormat,
    viz_permits: Arc<Semaphore>,
    sink_factory: Arc<dyn SinkFactory>,
    player_started: AtomicBool,
}

impl Session {
    pub fn new(
        id: u32,
        tolerances: Tolerances,
        planner_config: PlannerConfig,
        library: Arc<SnippetLibrary>,
        playback: Arc<PlaybackHandle>,
        output_format: AudioFormat,
        viz_worker_count: usize,
        sink_factory: Arc<dyn SinkFactory>,
    ) -> Self {
        Self {
            id,
            inner: AsyncMutex::new(SessionInner {
                clock: SessionClock::new(),
                consolidator: TransitionConsolidator::new(0, tolerances),
                last_plan: None,
            }),
            library,
            planner_config,
            playback,
            output_format,
            viz_permits: Arc::new(Semaphore::new(viz_worker_count.max(1))),
            sink_factory,
            player_started: AtomicBool::new(false),
        }
    }

    pub fn playback_handle(&self) -> Arc<PlaybackHandle> {
        Arc::clone(&self.playback)
    }

    /// Handle one incoming forecast (section 4.H). Returns `Ok(true)` if
    /// the forecast was processed, `Ok(false)` if it was dropped due to
    /// contention (`SessionBusy` is not an error here — section 7: "dropped
    /// silently at user level, observability event emitted").
    pub async fn update(
        &self,
        wall_now_ms: i64,
        spec_no_anchor: Vec<crate::transition_spec::Transition>,
        decoder: &dyn Decoder,
    ) -> Result<bool> {
        let mut guard = match self.inner.try_lock() {
            Ok(g) => g,
            Err(_) => {
                warn!(session_id = self.id, "forecast dropped: session busy");
                return Ok(false);
            }
        };

        // Origin is stamped on the first *non-empty* forecast (section 4.H
        // step 3), not on whatever arrives first — an empty forecast carries
        // no anchor-worthy information.
        let now_ms = if spec_no_anchor.is_empty() {
            guard.clock.peek_ms(wall_now_ms)
        } else {
            guard.clock.now_ms(wall_now_ms)
        };
        let spec = TransitionSpec::new(now_ms, spec_no_anchor)?;

        let classification = guard.consolidator.update(now_ms, &spec);
        let action_required = classification.as_ref().map(|c| c.strategy.action_required()).unwrap_or(false);

        if classification.is_none() {
            return Ok(true);
        }

        if !action_required {
            return Ok(true);
        }

        let merged = guard.consolidator.get().merged();
        let planner = MixPlanner::new(&self.library, self.planner_config);
        let plan = planner.plan(&merged, now_ms, guard.last_plan.as_ref())?;

        let format = self.output_format;
        let segment = render(&plan, format, |snippet, start_ms, end_ms| {
            decoder.decode_slice(&snippet.source, start_ms, end_ms)
        })?;

        if self.player_started.load(Ordering::Acquire) {
            self.playback.swap_segment(segment);
        } else {
            self.spawn_player(segment)?;
            self.player_started.store(true, Ordering::Release);
        }
        guard.last_plan = Some(plan);

        info!(session_id = self.id, now_ms, "re-planned and swapped segment");
        self.dispatch_visualization();

        Ok(true)
    }

    /// Open the output sink and hand the session's playback handle to a
    /// dedicated audio thread, seeded with the first real rendered segment
    /// (section 5: stream player runs on its own thread; no thread exists
    /// until there is real audio to play).
    fn spawn_player(&self, segment: crate::segment::Segment) -> Result<()> {
        let sink = self.sink_factory.open(self.output_format)?;
        let handle = Arc::clone(&self.playback);
        let session_id = self.id;
        std::thread::Builder::new()
            .name(format!("stream-player-{session_id}"))
            .spawn(move || {
                let mut player = StreamPlayer::new(sink, handle, segment);
                if let Err(e) = player.run() {
                    warn!(session_id, "stream player exited with error: {e}");
                }
            })
            .map_err(|e| Error::Internal(format!("failed to spawn audio thread: {e}")))?;
        Ok(())
    }

    /// Best-effort visualization dispatch, bounded to `viz_worker_count`
    /// concurrent jobs, never blocking the caller (section 5 / SPEC_FULL.md
    /// "Visualization dispatch").
    fn dispatch_visualization(&self) {
        let permits = Arc::clone(&self.viz_permits);
        let session_id = self.id;
        tokio::spawn(async move {
            let Ok(_permit) = permits.try_acquire_owned() else {
                warn!(session_id, "visualization worker pool saturated, dropping snapshot");
                return;
            };
            // Snapshot rendering itself is out of scope (section 1); this
            // is the dispatch point an implementation would hang it off.
        });
    }
}

/// Allocates session ids (section 6: "StartSession... monotonically-
/// assigned id").
#[derive(Default)]
pub struct SessionRegistry {
    next_id: AtomicU32,
}

impl SessionRegistry {
    pub fn allocate(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sink::CapturingSinkFactory;
    use crate::genre::Genre;
    use crate::transition_spec::Transition;
    use std::path::Path;
    use std::time::{Duration, Instant};

    struct SilentDecoder;
    impl Decoder for SilentDecoder {
        fn decode_slice(&self, _path: &Path, start_ms: i64, end_ms: i64) -> Result<DecodedAudio> {
            Ok(DecodedAudio { samples: vec![0.0; (end_ms - start_ms).max(0) as usize], sample_rate: 1_000, channels: 1 })
        }
    }

    fn library() -> Arc<SnippetLibrary> {
        Arc::new(
            SnippetLibrary::from_phase_files(vec![(
                std::path::PathBuf::from("song.mp3"),
                "0 low\n10000 high\n30000 low\n".to_string(),
                40_000,
            )])
            .unwrap(),
        )
    }

    #[test]
    fn session_registry_allocates_monotonically() {
        let reg = SessionRegistry::default();
        let a = reg.allocate();
        let b = reg.allocate();
        assert!(b > a);
    }

    #[tokio::test]
    async fn startup_forecast_triggers_replan_and_swap() {
        let session = Session::new(
            1,
            Tolerances::default(),
            PlannerConfig::default(),
            library(),
            Arc::new(PlaybackHandle::default()),
            AudioFormat { sample_rate: 1_000, channels: 1 },
            3,
            Arc::new(CapturingSinkFactory),
        );
        let decoder = SilentDecoder;
        let transitions = vec![Transition { id: 1, offset_ms: 10_000, post_genre: Genre::new("high") }];

        let processed = session.update(0, transitions, &decoder).await.unwrap();
        assert!(processed);

        // The first successful render spawns the audio thread; poll for it
        // to leave Idle rather than asserting a specific state, since the
        // thread runs concurrently with this test.
        let deadline = Instant::now() + Duration::from_secs(2);
        while session.playback.state() == crate::player::PlaybackState::Idle && Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert_ne!(session.playback.state(), crate::player::PlaybackState::Idle);
    }
}
