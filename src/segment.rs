//! Rendered Segment — component F.
//!
//! The in-memory PCM buffer produced from a mix plan: a fixed sample-rate,
//! fixed-channel-count interleaved `f32` buffer, built by decoding each
//! scheduled snippet's audio and overlaying it with linear fade gain inside
//! its fade windows. Ground truth for rendering is
//! `MixPlan._get_overlay_window` (original_source/soundsride/mix_plan.py).

use crate::error::{Error, Result};
use crate::mix_planner::MixPlan;
use std::sync::Arc;

/// Format tag a `Segment` carries so the player (G) can validate hot-swap
/// compatibility (section 4.G: "swap requires matching sample rate,
/// channel count, and sample width").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self { sample_rate: 44_100, channels: 2 }
    }
}

/// Rendered PCM, ready for playback. Cheaply cloneable (`Arc<[f32]>`) so
/// handing a freshly rendered segment to the audio thread's swap slot does
/// not copy the buffer.
#[derive(Debug, Clone)]
pub struct Segment {
    pub format: AudioFormat,
    samples: Arc<[f32]>,
}

impl Segment {
    /// Construct a segment directly from raw samples, bypassing `render`.
    /// Used by other modules' tests (e.g. the stream player) that need a
    /// segment of a known length without building a `MixPlan`.
    #[cfg(test)]
    pub(crate) fn from_raw_for_test(format: AudioFormat, samples: Vec<f32>) -> Self {
        Self { format, samples: Arc::from(samples) }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.format.channels as usize
    }

    pub fn duration_ms(&self) -> i64 {
        (self.frame_count() as i64 * 1000) / self.format.sample_rate as i64
    }

    /// Slice `[left_ms, right_ms)` of samples as interleaved frames,
    /// clamped to the buffer's end. Used by the stream player (G).
    pub fn chunk(&self, left_ms: i64, right_ms: i64) -> &[f32] {
        let channels = self.format.channels as usize;
        let sample_rate = self.format.sample_rate as i64;
        let left_frame = ((left_ms * sample_rate) / 1000).max(0) as usize;
        let right_frame = ((right_ms * sample_rate) / 1000).max(0) as usize;
        let total_frames = self.frame_count();
        let left = (left_frame * channels).min(self.samples.len());
        let right = (right_frame * channels).min(self.samples.len()).max(left);
        let _ = total_frames;
        &self.samples[left..right]
    }
}

/// A decoded snippet slice in its own native sample rate and channel
/// count, before being normalized to the session's output format.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Normalize `audio` to `dst`'s sample rate and channel count via a direct
/// linear resampler (SPEC_FULL.md section 4.F: rubato was considered and
/// dropped — see DESIGN.md — since render operates on whole buffers, not
/// a filter-state-preserving stream, so a one-shot linear interpolation is
/// enough). Channel-count mismatches are reconciled by mixing down to mono
/// first, then spreading that mono signal across every destination
/// channel; this crate does not attempt to preserve stereo imaging across
/// a channel-count change.
fn resample_to_format(audio: &DecodedAudio, dst: AudioFormat) -> Vec<f32> {
    let src_channels = audio.channels.max(1) as usize;
    let dst_channels = dst.channels.max(1) as usize;
    let src_frames = audio.samples.len() / src_channels;

    let (work, work_channels): (std::borrow::Cow<[f32]>, usize) = if src_channels == dst_channels {
        (std::borrow::Cow::Borrowed(&audio.samples), src_channels)
    } else {
        let mono: Vec<f32> = (0..src_frames)
            .map(|frame| {
                let start = frame * src_channels;
                audio.samples[start..start + src_channels].iter().sum::<f32>() / src_channels as f32
            })
            .collect();
        (std::borrow::Cow::Owned(mono), 1)
    };

    if audio.sample_rate == dst.sample_rate && work_channels == dst_channels {
        return work.into_owned();
    }
    if src_frames == 0 {
        return Vec::new();
    }

    let dst_frames = ((src_frames as u64 * dst.sample_rate as u64) / audio.sample_rate.max(1) as u64) as usize;
    let mut out = Vec::with_capacity(dst_frames * dst_channels);

    for out_frame in 0..dst_frames {
        let src_pos = (out_frame as f64 * audio.sample_rate as f64) / dst.sample_rate as f64;
        let left_idx = src_pos.floor() as usize;
        let frac = (src_pos - left_idx as f64) as f32;
        let right_idx = (left_idx + 1).min(src_frames.saturating_sub(1));

        for ch in 0..dst_channels {
            let src_ch = ch.min(work_channels - 1);
            let a = work[left_idx * work_channels + src_ch];
            let b = work[right_idx * work_channels + src_ch];
            out.push(a + (b - a) * frac);
        }
    }
    out
}

/// Linear fade gain at `t_ms` within `[start_ms, end_ms)`: 0.0 before
/// start, 1.0 at/after end when `rising`, the mirror when falling.
fn linear_gain(t_ms: i64, start_ms: i64, end_ms: i64, rising: bool) -> f32 {
    if end_ms <= start_ms {
        return 1.0;
    }
    let frac = ((t_ms - start_ms) as f64 / (end_ms - start_ms) as f64).clamp(0.0, 1.0) as f32;
    if rising {
        frac
    } else {
        1.0 - frac
    }
}

/// Render a mix plan into a single PCM buffer, given a decode function that
/// turns a snippet's `[start_ms, end_ms)` slice into interleaved samples at
/// the session's output format. `decode` is injected so tests can supply a
/// synthetic waveform without touching a real audio file.
pub fn render(
    plan: &MixPlan,
    format: AudioFormat,
    mut decode: impl FnMut(&crate::snippet::SongSnippet, i64, i64) -> Result<DecodedAudio>,
) -> Result<Segment> {
    let total_ms = plan.length_ms();
    if total_ms <= 0 {
        return Ok(Segment { format, samples: Arc::from(Vec::new()) });
    }

    let channels = format.channels as usize;
    let total_frames = ((total_ms as i64 * format.sample_rate as i64) / 1000) as usize;
    let mut base = vec![0.0f32; total_frames * channels];

    for scheduled in plan.snippets() {
        let snippet = &scheduled.snippet;
        let decoded = decode(snippet, snippet.start_ms, snippet.end_ms)?;
        let pcm = resample_to_format(&decoded, format);
        let snippet_frames = pcm.len() / channels;

        let base_start_ms = scheduled.scheduled_start_ms();
        let base_start_frame = ((base_start_ms.max(0) as i64 * format.sample_rate as i64) / 1000) as usize;

        for frame in 0..snippet_frames {
            let out_frame = base_start_frame + frame;
            if out_frame >= total_frames {
                break;
            }
            let t_ms = base_start_ms + (frame as i64 * 1000) / format.sample_rate as i64;

            let mut gain = 1.0f32;
            if let Some(fi) = scheduled.fade_in {
                if t_ms < fi.end_ms {
                    gain *= linear_gain(t_ms, fi.start_ms, fi.end_ms, true);
                }
            }
            if let Some(fo) = scheduled.fade_out {
                if t_ms >= fo.start_ms {
                    gain *= linear_gain(t_ms, fo.start_ms, fo.end_ms, false);
                }
            }

            for ch in 0..channels {
                let src = pcm.get(frame * channels + ch).copied().unwrap_or(0.0);
                base[out_frame * channels + ch] += src * gain;
            }
        }
    }

    Ok(Segment { format, samples: Arc::from(base) })
}

/// Validate that `new` may hot-swap in for `current` (section 4.G:
/// "swap requires matching sample rate, channel count, and sample width").
pub fn validate_swap_compatible(current: &Segment, new: &Segment) -> Result<()> {
    if current.format != new.format {
        return Err(Error::SegmentSwapIncompatible(format!(
            "format mismatch: current={:?}, new={:?}",
            current.format, new.format
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genre::Genre;
    use crate::mix_planner::MixPlan as _MixPlan;
    use crate::snippet::{FadeMode, ScheduledSnippet, SongSnippet};
    use std::path::PathBuf;

    fn fmt() -> AudioFormat {
        AudioFormat { sample_rate: 1_000, channels: 1 }
    }

    #[test]
    fn renders_silence_for_empty_plan() {
        let plan = crate::mix_planner::MixPlan::default();
        let seg = render(&plan, fmt(), |_, _, _| {
            Ok(DecodedAudio { samples: vec![], sample_rate: fmt().sample_rate, channels: fmt().channels })
        })
        .unwrap();
        assert_eq!(seg.duration_ms(), 0);
    }

    #[test]
    fn swap_rejects_format_mismatch() {
        let a = Segment { format: AudioFormat { sample_rate: 44_100, channels: 2 }, samples: Arc::from(vec![]) };
        let b = Segment { format: AudioFormat { sample_rate: 48_000, channels: 2 }, samples: Arc::from(vec![]) };
        assert!(validate_swap_compatible(&a, &b).is_err());
    }

    #[test]
    fn swap_accepts_matching_format() {
        let a = Segment { format: fmt(), samples: Arc::from(vec![0.0; 10]) };
        let b = Segment { format: fmt(), samples: Arc::from(vec![0.0; 20]) };
        assert!(validate_swap_compatible(&a, &b).is_ok());
    }

    #[test]
    fn chunk_clamps_to_buffer_end() {
        let seg = Segment { format: fmt(), samples: Arc::from(vec![1.0; 1_000]) };
        let chunk = seg.chunk(900, 1_200);
        assert_eq!(chunk.len(), 100);
    }

    #[test]
    fn renders_single_snippet_with_gain_one() {
        let snip = SongSnippet::new(PathBuf::from("a.mp3"), 0, 500, 1_000, Genre::new("x"), Genre::new("y")).unwrap();
        let scheduled = ScheduledSnippet::new(snip, 500, FadeMode::Early).unwrap();
        let plan = _MixPlan::from_snippets(vec![scheduled]);

        let seg = render(&plan, fmt(), |_, start_ms, end_ms| {
            Ok(DecodedAudio {
                samples: vec![1.0; (end_ms - start_ms) as usize],
                sample_rate: fmt().sample_rate,
                channels: fmt().channels,
            })
        })
        .unwrap();

        assert_eq!(seg.duration_ms(), 1_000);
        assert!(seg.samples().iter().skip(100).take(100).all(|&s| (s - 1.0).abs() < 1e-6));
    }
}
