//! FFmpeg / ffprobe invocations.
//!
//! Argument vectors are built by pure functions so they can be asserted on in
//! tests; [`FfmpegTools`] runs them.

use crate::error::{ProcessingError, ProcessingResult};
use crate::video::probe::{parse_probe_output, ProbeInfo};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// One quality rung of the HLS ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HlsRung {
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub maxrate_kbps: u32,
    pub bufsize_kbps: u32,
}

impl HlsRung {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Fixed four-rung ladder: max-rate is bitrate + 7%, buffer is 1.5x bitrate.
pub const HLS_LADDER: [HlsRung; 4] = [
    HlsRung {
        width: 1920,
        height: 1080,
        bitrate_kbps: 5000,
        maxrate_kbps: 5350,
        bufsize_kbps: 7500,
    },
    HlsRung {
        width: 1280,
        height: 720,
        bitrate_kbps: 3000,
        maxrate_kbps: 3210,
        bufsize_kbps: 4500,
    },
    HlsRung {
        width: 854,
        height: 480,
        bitrate_kbps: 1500,
        maxrate_kbps: 1605,
        bufsize_kbps: 2250,
    },
    HlsRung {
        width: 640,
        height: 360,
        bitrate_kbps: 800,
        maxrate_kbps: 856,
        bufsize_kbps: 1200,
    },
];

pub const HLS_SEGMENT_SECONDS: u32 = 6;
pub const MASTER_PLAYLIST: &str = "master.m3u8";

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Arguments producing the multi-bitrate HLS ladder in `output_dir`.
///
/// Without audio the stream map only references video streams so the master
/// playlist stays valid.
pub fn hls_transcode_args(input: &Path, output_dir: &Path, has_audio: bool) -> Vec<String> {
    let out = path_arg(output_dir);
    let mut args: Vec<String> = vec![
        "-i".into(),
        path_arg(input),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "fast".into(),
    ];

    for _ in HLS_LADDER.iter() {
        args.push("-map".into());
        args.push("0:v:0".into());
    }

    if has_audio {
        args.extend(
            ["-c:a", "aac", "-ar", "48000", "-b:a", "128k"]
                .iter()
                .map(|s| s.to_string()),
        );
        for _ in HLS_LADDER.iter() {
            args.push("-map".into());
            args.push("0:a:0?".into());
        }
    }

    for (i, rung) in HLS_LADDER.iter().enumerate() {
        args.push(format!("-s:v:{}", i));
        args.push(rung.resolution());
        args.push(format!("-b:v:{}", i));
        args.push(format!("{}k", rung.bitrate_kbps));
        args.push(format!("-maxrate:v:{}", i));
        args.push(format!("{}k", rung.maxrate_kbps));
        args.push(format!("-bufsize:v:{}", i));
        args.push(format!("{}k", rung.bufsize_kbps));
    }

    args.push("-var_stream_map".into());
    args.push(var_stream_map(has_audio));

    args.extend([
        "-master_pl_name".to_string(),
        MASTER_PLAYLIST.to_string(),
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        HLS_SEGMENT_SECONDS.to_string(),
        "-hls_list_size".to_string(),
        "0".to_string(),
        "-hls_segment_filename".to_string(),
        format!("{}/v%v/seg-%03d.ts", out),
        format!("{}/v%v/playlist.m3u8", out),
    ]);

    args
}

pub fn var_stream_map(has_audio: bool) -> String {
    (0..HLS_LADDER.len())
        .map(|i| {
            if has_audio {
                format!("v:{},a:{}", i, i)
            } else {
                format!("v:{}", i)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Single JPEG frame at the one-second mark.
pub fn poster_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        path_arg(input),
        "-ss".into(),
        "00:00:01".into(),
        "-vframes".into(),
        "1".into(),
        "-q:v".into(),
        "2".into(),
        path_arg(output),
    ]
}

pub fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "quiet".into(),
        "-print_format".into(),
        "json".into(),
        "-show_format".into(),
        "-show_streams".into(),
        path_arg(input),
    ]
}

pub fn audio_probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "a".into(),
        "-show_entries".into(),
        "stream=codec_type".into(),
        "-of".into(),
        "csv=p=0".into(),
        path_arg(input),
    ]
}

/// External media tooling used by the processor.
#[async_trait]
pub trait MediaTools: Send + Sync {
    async fn probe(&self, input: &Path) -> ProcessingResult<ProbeInfo>;

    /// Whether the input has at least one audio stream. Probe failures count as no audio.
    async fn has_audio(&self, input: &Path) -> bool;

    async fn transcode_hls(
        &self,
        input: &Path,
        output_dir: &Path,
        has_audio: bool,
    ) -> ProcessingResult<()>;

    async fn extract_poster(&self, input: &Path, output: &Path) -> ProcessingResult<()>;
}

/// [`MediaTools`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegTools {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Runs `program` to completion and returns its stdout.
    ///
    /// The child is killed if the returned future is dropped, so a job timeout
    /// does not leave encoders running.
    async fn run(&self, program: &str, args: &[String]) -> ProcessingResult<Vec<u8>> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProcessingError::CommandSpawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessingError::CommandFailed {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr: tail(&stderr, 2000).to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// Last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn probe(&self, input: &Path) -> ProcessingResult<ProbeInfo> {
        let stdout = self.run(&self.ffprobe_path, &probe_args(input)).await?;
        parse_probe_output(&stdout)
    }

    async fn has_audio(&self, input: &Path) -> bool {
        match self.run(&self.ffprobe_path, &audio_probe_args(input)).await {
            Ok(stdout) => !String::from_utf8_lossy(&stdout).trim().is_empty(),
            Err(e) => {
                tracing::warn!(error = %e, input = %input.display(), "Failed to check audio streams");
                false
            }
        }
    }

    async fn transcode_hls(
        &self,
        input: &Path,
        output_dir: &Path,
        has_audio: bool,
    ) -> ProcessingResult<()> {
        for i in 0..HLS_LADDER.len() {
            tokio::fs::create_dir_all(output_dir.join(format!("v{}", i))).await?;
        }

        let args = hls_transcode_args(input, output_dir, has_audio);
        tracing::debug!(has_audio, args = ?args, "Running ffmpeg HLS transcode");
        self.run(&self.ffmpeg_path, &args).await?;
        Ok(())
    }

    async fn extract_poster(&self, input: &Path, output: &Path) -> ProcessingResult<()> {
        self.run(&self.ffmpeg_path, &poster_args(input, output))
            .await?;
        Ok(())
    }
}
