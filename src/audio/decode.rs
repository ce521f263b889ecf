//! Symphonia-based file decode, grounded on wkmp-ap's `audio/decoder.rs`
//! (`SimpleDecoder::decode_file`), narrowed to decode-and-trim a single
//! `[start_ms, end_ms)` slice rather than the whole file.

use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode an entire file to interleaved `f32` samples, returning
/// `(samples, sample_rate, channels)`.
pub fn decode_file(path: &Path) -> Result<(Vec<f32>, u32, u16)> {
    let file = std::fs::File::open(path).map_err(Error::Io)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Internal(format!("failed to probe {}: {e}", path.display())))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Internal(format!("no audio track in {}", path.display())))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Internal("sample rate not found".into()))?;
    let channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| Error::Internal("channel count not found".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Internal(format!("failed to create decoder: {e}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("error reading packet from {}: {e}", path.display());
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => convert_to_f32(&decoded, &mut samples),
            Err(e) => {
                warn!("decode error in {}: {e}", path.display());
                continue;
            }
        }
    }

    debug!(path = %path.display(), samples = samples.len(), sample_rate, channels, "decoded file");
    Ok((samples, sample_rate, channels))
}

/// Decode and trim a `[start_ms, end_ms)` slice, interleaved `f32`.
pub fn decode_slice(path: &Path, start_ms: i64, end_ms: i64) -> Result<(Vec<f32>, u32, u16)> {
    let (all, sample_rate, channels) = decode_file(path)?;
    let ch = channels as usize;
    let start_frame = ((start_ms.max(0) as i64 * sample_rate as i64) / 1000) as usize;
    let end_frame = ((end_ms.max(0) as i64 * sample_rate as i64) / 1000) as usize;
    let start = (start_frame * ch).min(all.len());
    let end = (end_frame * ch).min(all.len()).max(start);
    Ok((all[start..end].to_vec(), sample_rate, channels))
}

fn convert_to_f32(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => {
            let channels = buf.spec().channels.count();
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    out.push(buf.chan(ch)[frame]);
                }
            }
        }
        AudioBufferRef::S32(buf) => {
            let channels = buf.spec().channels.count();
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    out.push(buf.chan(ch)[frame] as f32 / i32::MAX as f32);
                }
            }
        }
        AudioBufferRef::S16(buf) => {
            let channels = buf.spec().channels.count();
            for frame in 0..buf.frames() {
                for ch in 0..channels {
                    out.push(buf.chan(ch)[frame] as f32 / i16::MAX as f32);
                }
            }
        }
        _ => warn!("unsupported sample format during decode, samples dropped"),
    }
}
