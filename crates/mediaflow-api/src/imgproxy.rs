//! Signed URLs for the external image-transform service.
//!
//! A signed path is `/{signature}/{operations}/{encoded_source}` where the
//! source URL is base64url-encoded (no padding) and the signature is
//! `base64url(HMAC-SHA256(key, salt || "/{operations}/{encoded_source}"))`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid imgproxy key: {0}")]
    InvalidKey(hex::FromHexError),

    #[error("invalid imgproxy salt: {0}")]
    InvalidSalt(hex::FromHexError),

    #[error("imgproxy key rejected: {0}")]
    KeyLength(#[from] hmac::digest::InvalidLength),
}

#[derive(Clone)]
pub struct ImgproxySigner {
    /// HMAC state already keyed; cloned per signature.
    mac: HmacSha256,
    salt: Vec<u8>,
}

impl ImgproxySigner {
    /// Builds a signer from hex-encoded key and salt.
    pub fn new(key_hex: &str, salt_hex: &str) -> Result<Self, SignerError> {
        let key = hex::decode(key_hex).map_err(SignerError::InvalidKey)?;
        let salt = hex::decode(salt_hex).map_err(SignerError::InvalidSalt)?;
        let mac = HmacSha256::new_from_slice(&key)?;
        Ok(Self { mac, salt })
    }

    /// Signed path for `operations` applied to `source_url`, e.g.
    /// `sign_url("rs:fit:800:800/q:80", "s3://media-originals/2024/01/01/x.jpg")`.
    pub fn sign_url(&self, operations: &str, source_url: &str) -> String {
        let path = format!("/{}/{}", operations, URL_SAFE_NO_PAD.encode(source_url));
        format!("/{}{}", self.signature(&path), path)
    }

    /// Like [`sign_url`](Self::sign_url) with an `exp:{unix}` option the proxy enforces.
    pub fn sign_url_with_expiry(&self, operations: &str, source_url: &str, expires_at: i64) -> String {
        let path = format!(
            "/{}/exp:{}/{}",
            operations,
            expires_at,
            URL_SAFE_NO_PAD.encode(source_url)
        );
        format!("/{}{}", self.signature(&path), path)
    }

    fn signature(&self, path: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(&self.salt);
        mac.update(path.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for ImgproxySigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ImgproxySigner").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeType {
    Fit,
    Fill,
    Auto,
    Force,
}

impl Display for ResizeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ResizeType::Fit => write!(f, "fit"),
            ResizeType::Fill => write!(f, "fill"),
            ResizeType::Auto => write!(f, "auto"),
            ResizeType::Force => write!(f, "force"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Resize {
    kind: ResizeType,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct Crop {
    width: u32,
    height: u32,
    gravity: Option<String>,
}

/// Builder for the processing-options segment of a signed URL.
///
/// Renders in a fixed order: resize (or plain width/height), quality, format,
/// background, blur, sharpen, gravity, crop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operations {
    resize: Option<Resize>,
    width: u32,
    height: u32,
    quality: u32,
    format: Option<String>,
    background: Option<String>,
    blur: u32,
    sharpen: f64,
    gravity: Option<String>,
    crop: Option<Crop>,
}

impl Operations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resize(mut self, kind: ResizeType, width: u32, height: u32) -> Self {
        self.resize = Some(Resize {
            kind,
            width,
            height,
        });
        self
    }

    /// Plain dimensions, ignored when [`resize`](Self::resize) is set.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn background(mut self, color: impl Into<String>) -> Self {
        self.background = Some(color.into());
        self
    }

    pub fn blur(mut self, sigma: u32) -> Self {
        self.blur = sigma;
        self
    }

    pub fn sharpen(mut self, sigma: f64) -> Self {
        self.sharpen = sigma;
        self
    }

    pub fn gravity(mut self, gravity: impl Into<String>) -> Self {
        self.gravity = Some(gravity.into());
        self
    }

    pub fn crop(mut self, width: u32, height: u32, gravity: Option<&str>) -> Self {
        self.crop = Some(Crop {
            width,
            height,
            gravity: gravity.map(str::to_string),
        });
        self
    }
}

impl Display for Operations {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut parts: Vec<String> = Vec::new();

        if let Some(resize) = &self.resize {
            parts.push(format!(
                "rs:{}:{}:{}",
                resize.kind, resize.width, resize.height
            ));
        } else if self.width > 0 || self.height > 0 {
            parts.push(format!("w:{}/h:{}", self.width, self.height));
        }
        if self.quality > 0 {
            parts.push(format!("q:{}", self.quality));
        }
        if let Some(format) = self.format.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("f:{}", format));
        }
        if let Some(background) = self.background.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("bg:{}", background));
        }
        if self.blur > 0 {
            parts.push(format!("bl:{}", self.blur));
        }
        if self.sharpen > 0.0 {
            parts.push(format!("sh:{}", self.sharpen));
        }
        if let Some(gravity) = self.gravity.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("g:{}", gravity));
        }
        if let Some(crop) = &self.crop {
            match crop.gravity.as_deref().filter(|s| !s.is_empty()) {
                Some(gravity) => parts.push(format!("c:{}:{}:{}", crop.width, crop.height, gravity)),
                None => parts.push(format!("c:{}:{}", crop.width, crop.height)),
            }
        }

        write!(f, "{}", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "943b421c9eb07c830af81030552c86009268de4e532ba2ee2eab8247c6da0881";
    const SALT: &str = "520f986b998545b4785e0defbc4f3c1203f22de2374a3d53cb7a7fe9fea309c5";

    fn signer() -> ImgproxySigner {
        ImgproxySigner::new(KEY, SALT).unwrap()
    }

    #[test]
    fn signed_path_layout() {
        let signed = signer().sign_url("rs:fit:400:400/q:80/f:webp", "s3://media-originals/a.jpg");
        let parts: Vec<&str> = signed.trim_start_matches('/').splitn(2, '/').collect();

        // 32-byte digest, unpadded base64url
        assert_eq!(parts[0].len(), 43);
        assert!(!parts[0].contains('='));

        let encoded = parts[1].rsplit('/').next().unwrap();
        assert_eq!(
            URL_SAFE_NO_PAD.decode(encoded).unwrap(),
            b"s3://media-originals/a.jpg"
        );
        assert!(parts[1].starts_with("rs:fit:400:400/q:80/f:webp/"));
    }

    #[test]
    fn signature_matches_hmac_over_salted_path() {
        let path = format!("/q:80/{}", URL_SAFE_NO_PAD.encode("s3://b/k"));
        let mut mac = HmacSha256::new_from_slice(&hex::decode(KEY).unwrap()).unwrap();
        mac.update(&hex::decode(SALT).unwrap());
        mac.update(path.as_bytes());
        let expected = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        assert_eq!(signer().sign_url("q:80", "s3://b/k"), format!("/{}{}", expected, path));
    }

    #[test]
    fn signing_is_deterministic_and_salted() {
        let a = signer().sign_url("q:80", "s3://b/k");
        assert_eq!(a, signer().sign_url("q:80", "s3://b/k"));

        let other = ImgproxySigner::new(KEY, "00ff").unwrap();
        assert_ne!(a, other.sign_url("q:80", "s3://b/k"));
    }

    #[test]
    fn expiry_is_part_of_the_signed_path() {
        let signed = signer().sign_url_with_expiry("q:80", "s3://b/k", 1_700_000_000);
        assert!(signed.contains("/q:80/exp:1700000000/"));
        assert_ne!(signed, signer().sign_url_with_expiry("q:80", "s3://b/k", 1_700_000_001));
    }

    #[test]
    fn rejects_non_hex_credentials() {
        assert!(matches!(
            ImgproxySigner::new("zz", SALT),
            Err(SignerError::InvalidKey(_))
        ));
        assert!(matches!(
            ImgproxySigner::new(KEY, "not-hex"),
            Err(SignerError::InvalidSalt(_))
        ));
    }

    #[test]
    fn operations_render_in_order() {
        let ops = Operations::new()
            .resize(ResizeType::Fit, 400, 400)
            .quality(80)
            .format("webp");
        assert_eq!(ops.to_string(), "rs:fit:400:400/q:80/f:webp");

        let ops = Operations::new()
            .size(200, 0)
            .background("ffffff")
            .blur(5)
            .sharpen(0.5)
            .gravity("sm")
            .crop(100, 50, Some("ce"));
        assert_eq!(ops.to_string(), "w:200/h:0/bg:ffffff/bl:5/sh:0.5/g:sm/c:100:50:ce");

        assert_eq!(Operations::new().crop(10, 20, None).to_string(), "c:10:20");
        assert_eq!(Operations::new().to_string(), "");
    }
}
