//! Video processing: FFmpeg invocations, probing and the transcode pipeline.

pub mod ffmpeg;
pub mod hls;
pub mod probe;
pub mod processor;
