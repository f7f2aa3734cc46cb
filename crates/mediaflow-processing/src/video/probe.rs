//! ffprobe output parsing.

use crate::error::{ProcessingError, ProcessingResult};
use mediaflow_core::models::AssetMeta;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

/// Technical metadata read from a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration_seconds: Option<Decimal>,
    pub bitrate: Option<i64>,
    pub codec: Option<String>,
}

impl ProbeInfo {
    pub fn into_meta(self, asset_id: Uuid) -> AssetMeta {
        AssetMeta {
            asset_id,
            width: self.width,
            height: self.height,
            duration_seconds: self.duration_seconds,
            bitrate: self.bitrate,
            codec: self.codec,
            exif: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
}

/// Parses `ffprobe -print_format json -show_format -show_streams` output.
///
/// Dimensions and codec come from the first video stream; duration and
/// bitrate from the container.
pub fn parse_probe_output(stdout: &[u8]) -> ProcessingResult<ProbeInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ProcessingError::Probe("No video stream found".to_string()))?;

    let format = probe.format.as_ref();
    let duration_seconds = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.trim().parse::<Decimal>().ok())
        .map(|d| d.round_dp(3));
    let bitrate = format
        .and_then(|f| f.bit_rate.as_deref())
        .and_then(|b| b.trim().parse::<i64>().ok());

    Ok(ProbeInfo {
        width: video.width,
        height: video.height,
        duration_seconds,
        bitrate,
        codec: video.codec_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "aac", "codec_type": "audio"},
            {"index": 1, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080}
        ],
        "format": {"filename": "input.mp4", "duration": "12.345678", "bit_rate": "5123456"}
    }"#;

    #[test]
    fn parses_first_video_stream_and_format() {
        let info = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        assert_eq!(info.width, Some(1920));
        assert_eq!(info.height, Some(1080));
        assert_eq!(info.codec.as_deref(), Some("h264"));
        assert_eq!(info.bitrate, Some(5_123_456));
        assert_eq!(info.duration_seconds, Some(Decimal::from_str("12.346").unwrap()));
    }

    #[test]
    fn audio_only_input_is_rejected() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"mp3"}],"format":{}}"#;
        let err = parse_probe_output(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ProcessingError::Probe(_)));
    }

    #[test]
    fn missing_format_fields_are_none() {
        let json = r#"{"streams":[{"codec_type":"video","width":640,"height":360}]}"#;
        let info = parse_probe_output(json.as_bytes()).unwrap();
        assert_eq!(info.width, Some(640));
        assert_eq!(info.duration_seconds, None);
        assert_eq!(info.bitrate, None);
        assert_eq!(info.codec, None);
    }

    #[test]
    fn garbage_is_json_error() {
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(ProcessingError::Json(_))
        ));
    }

    #[test]
    fn into_meta_carries_asset_id() {
        let id = Uuid::new_v4();
        let meta = ProbeInfo {
            width: Some(1),
            ..Default::default()
        }
        .into_meta(id);
        assert_eq!(meta.asset_id, id);
        assert_eq!(meta.width, Some(1));
        assert!(meta.exif.is_none());
    }
}
