//! Audio output capability, grounded on wkmp-ap's `audio/output.rs`
//! (`AudioOutput`) and `playback/ring_buffer.rs` (`AudioRingBuffer`).
//!
//! Per section 9's design note ("model the output device as a capability
//! accepting (format, channels, rate) on open and raw PCM bytes on
//! write... decoupled so a test backend can capture written bytes"), the
//! player (G) depends only on the `AudioSink` trait, never on cpal
//! directly.

use crate::error::{Error, Result};
use crate::segment::AudioFormat;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// A capability that accepts interleaved `f32` PCM frames for playback.
/// Blocking: `write` returns once the frames have been handed off (queued
/// into the device's ring buffer), matching the Stream Player's blocking
/// write contract (section 4.G step 4).
pub trait AudioSink: Send {
    fn format(&self) -> AudioFormat;
    fn write(&mut self, frames: &[f32]) -> Result<()>;
}

/// Real output device, bridging the player's blocking writes into cpal's
/// callback-driven API via a lock-free SPSC ring buffer.
pub struct CpalSink {
    format: AudioFormat,
    producer: ringbuf::HeapProd<f32>,
    _stream: Stream,
    underruns: Arc<Mutex<u64>>,
}

impl CpalSink {
    pub fn open(device_name: Option<&str>, format: AudioFormat) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::Unavailable(format!("failed to enumerate devices: {e}")))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| Error::Unavailable(format!("audio device not found: {name}")))?,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::Unavailable("no default output device".into()))?,
        };

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // ~200ms of headroom at the configured rate/channels.
        let capacity = (format.sample_rate as usize * format.channels as usize) / 5;
        let ring = HeapRb::<f32>::new(capacity.max(1));
        let (producer, mut consumer) = ring.split();

        let underruns = Arc::new(Mutex::new(0u64));
        let underruns_cb = Arc::clone(&underruns);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _| {
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().unwrap_or(0.0);
                        if consumer.is_empty() {
                            if let Ok(mut n) = underruns_cb.lock() {
                                *n += 1;
                            }
                        }
                    }
                },
                move |err| warn!("cpal stream error: {err}"),
                None,
            )
            .map_err(|e| Error::Unavailable(format!("failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| Error::Unavailable(format!("failed to start output stream: {e}")))?;

        debug!(?format, "opened cpal audio sink");
        Ok(Self { format, producer, _stream: stream, underruns })
    }

    pub fn underrun_count(&self) -> u64 {
        *self.underruns.lock().expect("underrun counter poisoned")
    }
}

impl AudioSink for CpalSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn write(&mut self, frames: &[f32]) -> Result<()> {
        for &sample in frames {
            // Blocking: spin until the ring buffer has room. The audio
            // callback drains it at device rate, so this is bounded by
            // real-time playback, not an unbounded wait.
            while self.producer.try_push(sample).is_err() {
                std::thread::yield_now();
            }
        }
        Ok(())
    }
}

impl AudioSink for Box<dyn AudioSink> {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    fn write(&mut self, frames: &[f32]) -> Result<()> {
        (**self).write(frames)
    }
}

/// Opens a sink for a given output format. Injected into `Session` so the
/// coordinator does not hard-code a device backend, mirroring the `Decoder`
/// trait's decoupling of decode from playback.
pub trait SinkFactory: Send + Sync {
    fn open(&self, format: AudioFormat) -> Result<Box<dyn AudioSink>>;
}

/// Production factory: opens the named (or default) cpal output device.
pub struct CpalSinkFactory {
    pub device_name: Option<String>,
}

impl SinkFactory for CpalSinkFactory {
    fn open(&self, format: AudioFormat) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(CpalSink::open(self.device_name.as_deref(), format)?))
    }
}

/// Test factory: every session gets its own `CapturingSink` instead of a
/// real device.
#[derive(Default)]
pub struct CapturingSinkFactory;

impl SinkFactory for CapturingSinkFactory {
    fn open(&self, format: AudioFormat) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(CapturingSink::new(format)))
    }
}

/// Test backend that captures every written sample instead of playing it,
/// per section 9's "audio backend abstraction" note.
#[derive(Debug, Default, Clone)]
pub struct CapturingSink {
    format: AudioFormat,
    pub captured: Vec<f32>,
}

impl CapturingSink {
    pub fn new(format: AudioFormat) -> Self {
        Self { format, captured: Vec::new() }
    }
}

impl AudioSink for CapturingSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn write(&mut self, frames: &[f32]) -> Result<()> {
        self.captured.extend_from_slice(frames);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capturing_sink_accumulates_writes() {
        let mut sink = CapturingSink::new(AudioFormat { sample_rate: 1_000, channels: 1 });
        sink.write(&[1.0, 2.0]).unwrap();
        sink.write(&[3.0]).unwrap();
        assert_eq!(sink.captured, vec![1.0, 2.0, 3.0]);
    }
}
