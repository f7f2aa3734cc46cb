//! Public URLs advertised for ready assets.

use crate::imgproxy::{ImgproxySigner, Operations, ResizeType};
use mediaflow_core::models::{Asset, AssetKind, AssetState};
use mediaflow_core::{ApiConfig, BUCKET_ORIGINALS};
use mediaflow_storage::keys::{hls_master_key, poster_key};
use std::collections::BTreeMap;

/// Processing options for the thumbnail advertised with every ready image.
pub fn thumbnail_operations() -> Operations {
    Operations::new()
        .resize(ResizeType::Fit, 400, 400)
        .quality(80)
        .format("webp")
}

/// URL map for an asset. Empty unless the asset is `ready`; audio and
/// documents have no derived URLs.
pub fn build_asset_urls(
    config: &ApiConfig,
    signer: &ImgproxySigner,
    asset: &Asset,
) -> BTreeMap<&'static str, String> {
    let mut urls = BTreeMap::new();
    if asset.state != AssetState::Ready {
        return urls;
    }

    match asset.kind {
        AssetKind::Image => {
            urls.insert(
                "original",
                format!("{}/v1/media/{}/original", config.public_imgproxy_url, asset.id),
            );
            let source = format!("s3://{}/{}", BUCKET_ORIGINALS, asset.object_key);
            urls.insert(
                "thumbnail",
                format!(
                    "{}{}",
                    config.public_imgproxy_url,
                    signer.sign_url(&thumbnail_operations().to_string(), &source)
                ),
            );
            urls.insert(
                "signedImage",
                "Call /v1/image endpoint with operations".to_string(),
            );
        }
        AssetKind::Video => {
            urls.insert(
                "hls",
                format!("{}/{}", config.public_vod_url, hls_master_key(asset.id)),
            );
            urls.insert(
                "poster",
                format!("{}/{}", config.public_thumbs_url, poster_key(asset.id)),
            );
        }
        AssetKind::Audio | AssetKind::Document => {}
    }

    urls
}
