//! Request bodies and fake media tooling shared by the integration tests.

use async_trait::async_trait;
use axum_test::TestServer;
use mediaflow_processing::{MediaTools, ProbeInfo, ProcessingResult};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::path::Path;
use uuid::Uuid;

pub fn init_body(kind: &str, mime: &str, filename: &str) -> Value {
    json!({ "mime": mime, "kind": kind, "filename": filename, "size": 1_048_576 })
}

/// Runs init-upload and returns the parsed response.
pub async fn init_upload(client: &TestServer, kind: &str, mime: &str, filename: &str) -> Value {
    let response = client
        .post("/v1/media/init-upload")
        .json(&init_body(kind, mime, filename))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

pub fn asset_id(init: &Value) -> Uuid {
    init["assetId"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("init-upload returned no assetId")
}

/// Writes the files a four-rung ffmpeg HLS run would produce.
pub struct FakeFfmpeg;

#[async_trait]
impl MediaTools for FakeFfmpeg {
    async fn probe(&self, _input: &Path) -> ProcessingResult<ProbeInfo> {
        Ok(ProbeInfo {
            width: Some(1920),
            height: Some(1080),
            duration_seconds: Some(Decimal::new(12_500, 3)),
            bitrate: Some(4_000_000),
            codec: Some("h264".to_string()),
        })
    }

    async fn has_audio(&self, _input: &Path) -> bool {
        true
    }

    async fn transcode_hls(
        &self,
        _input: &Path,
        output_dir: &Path,
        _has_audio: bool,
    ) -> ProcessingResult<()> {
        let mut master = String::from("#EXTM3U\n");
        for rung in 0..4 {
            let dir = output_dir.join(format!("v{}", rung));
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(dir.join("playlist.m3u8"), "#EXTM3U\n#EXTINF:6.0,\nseg-000.ts\n").await?;
            tokio::fs::write(dir.join("seg-000.ts"), b"segment").await?;
            master.push_str(&format!("v{}/playlist.m3u8\n", rung));
        }
        tokio::fs::write(output_dir.join("master.m3u8"), master).await?;
        Ok(())
    }

    async fn extract_poster(&self, _input: &Path, output: &Path) -> ProcessingResult<()> {
        tokio::fs::write(output, b"jpeg").await?;
        Ok(())
    }
}
