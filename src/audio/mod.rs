//! Audio decode and output, grounded on wkmp-ap's `audio/decoder.rs` and
//! `audio/output.rs`, narrowed to this crate's needs (mp3/wav/isomp4 decode
//! via symphonia, output via cpal behind a small `AudioSink` capability).

pub mod decode;
pub mod sink;
