//! Signature decoding.
//!
//! Signatures arrive as base64 data URIs captured on the client's canvas.
//! A rejected signature is an expected outcome, never a fault: callers
//! degrade to the manual-signing placeholder line instead of aborting
//! the document.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::SignatureAsset;

/// Payloads below this size are an empty or all-white canvas and are
/// treated as "no signature".
pub const MIN_SIGNATURE_BYTES: usize = 100;

/// Image formats accepted for embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    Png,
    Jpeg,
}

impl SignatureFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// A signature that decoded successfully into a real, embeddable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSignature {
    pub bytes: Vec<u8>,
    pub format: SignatureFormat,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Why a signature asset could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureRejected {
    #[error("signature payload is empty")]
    Empty,
    #[error("unsupported signature mime type: {0}")]
    UnsupportedMime(String),
    #[error("signature payload is not valid base64")]
    MalformedBase64,
    #[error("signature payload too small to be a real signature ({0} bytes)")]
    BelowThreshold(usize),
    #[error("signature payload is not a decodable image")]
    UndecodableImage,
}

/// Decode a data-URI signature into raw bytes and a detected format.
pub fn decode(asset: &SignatureAsset) -> Result<DecodedSignature, SignatureRejected> {
    let uri = asset.data_uri.trim();
    if uri.is_empty() {
        return Err(SignatureRejected::Empty);
    }

    let (mime, payload) = match uri.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((mime, payload)) => (mime.to_string(), payload),
            None => return Err(SignatureRejected::MalformedBase64),
        },
        // Bare base64 without a data URI wrapper: trust the declared hint.
        None => (asset.mime_hint.clone(), uri),
    };

    let format = match mime.trim().to_lowercase().as_str() {
        "image/png" => SignatureFormat::Png,
        "image/jpeg" | "image/jpg" => SignatureFormat::Jpeg,
        other => return Err(SignatureRejected::UnsupportedMime(other.to_string())),
    };

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| SignatureRejected::MalformedBase64)?;

    if bytes.len() < MIN_SIGNATURE_BYTES {
        return Err(SignatureRejected::BelowThreshold(bytes.len()));
    }

    // Probed once here so every consumer (renderers, archive manifest,
    // signature marker) agrees on whether a signature exists.
    if image::load_from_memory(&bytes).is_err() {
        return Err(SignatureRejected::UndecodableImage);
    }

    Ok(DecodedSignature {
        bytes,
        format,
        signed_at: asset.signed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn asset(data_uri: &str) -> SignatureAsset {
        SignatureAsset {
            data_uri: data_uri.to_string(),
            mime_hint: String::new(),
            signed_at: None,
        }
    }

    fn encoded_image(format: image::ImageOutputFormat) -> Vec<u8> {
        let img = image::RgbImage::from_fn(80, 30, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        assert!(bytes.len() >= MIN_SIGNATURE_BYTES);
        bytes
    }

    #[test]
    fn test_decode_png_signature() {
        let bytes = encoded_image(image::ImageOutputFormat::Png);
        let uri = format!("data:image/png;base64,{}", BASE64.encode(&bytes));
        let decoded = decode(&asset(&uri)).unwrap();
        assert_eq!(decoded.format, SignatureFormat::Png);
        assert_eq!(decoded.bytes, bytes);
    }

    #[test]
    fn test_decode_jpeg_mime_variants() {
        let payload = BASE64.encode(encoded_image(image::ImageOutputFormat::Jpeg(80)));
        for mime in ["image/jpeg", "image/jpg"] {
            let uri = format!("data:{};base64,{}", mime, payload);
            let decoded = decode(&asset(&uri)).unwrap();
            assert_eq!(decoded.format, SignatureFormat::Jpeg);
        }
    }

    #[test]
    fn test_unsupported_mime_is_rejected_not_fatal() {
        let uri = format!("data:image/gif;base64,{}", BASE64.encode(vec![0u8; 200]));
        assert_eq!(
            decode(&asset(&uri)),
            Err(SignatureRejected::UnsupportedMime("image/gif".to_string()))
        );
    }

    #[test]
    fn test_malformed_base64_is_rejected() {
        assert_eq!(
            decode(&asset("data:image/png;base64,not//valid=base64===!")),
            Err(SignatureRejected::MalformedBase64)
        );
    }

    #[test]
    fn test_undersized_payload_is_rejected() {
        let uri = format!("data:image/png;base64,{}", BASE64.encode(vec![0xABu8; 40]));
        let result = decode(&asset(&uri));
        assert_eq!(result, Err(SignatureRejected::BelowThreshold(40)));
    }

    #[test]
    fn test_non_image_payload_is_rejected() {
        // Large enough to pass the threshold, but not an image.
        let uri = format!("data:image/png;base64,{}", BASE64.encode(vec![0x42u8; 300]));
        assert_eq!(
            decode(&asset(&uri)),
            Err(SignatureRejected::UndecodableImage)
        );
    }

    #[test]
    fn test_empty_uri_is_rejected() {
        assert_eq!(decode(&asset("")), Err(SignatureRejected::Empty));
    }

    #[test]
    fn test_bare_base64_uses_mime_hint() {
        let mut a = asset(&BASE64.encode(encoded_image(image::ImageOutputFormat::Png)));
        a.mime_hint = "image/png".to_string();
        let decoded = decode(&a).unwrap();
        assert_eq!(decoded.format, SignatureFormat::Png);
    }
}
