//! Mediaflow Processing Library
//!
//! Turns uploaded originals into servable renditions. The [`Processor`] runs
//! the per-asset pipeline; external tools are reached through [`MediaTools`]
//! (`FfmpegTools` in production).

pub mod error;
pub mod video;
pub mod workdir;

pub use error::{ProcessingError, ProcessingResult};
pub use video::ffmpeg::{FfmpegTools, MediaTools, HLS_LADDER};
pub use video::probe::ProbeInfo;
pub use video::processor::{Processor, ProcessorConfig, TranscodeStage};
pub use workdir::WorkDir;
