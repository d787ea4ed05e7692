//! Image payload helpers for the captioning route.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

pub const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

/// Picks the MIME type for an uploaded image.
///
/// Magic bytes win over the declared part content type; a declared type is
/// only trusted when it is `image/*`. Anything else falls back to JPEG.
pub fn detect_image_mime(bytes: &[u8], declared: Option<&str>) -> &'static str {
    if let Some(detected) = detect_from_bytes(bytes) {
        if let Some(declared) = declared.filter(|d| !d.eq_ignore_ascii_case(detected)) {
            debug!(declared = declared, detected = detected, "Overriding image MIME type");
        }
        return detected;
    }

    match declared.map(|d| d.trim().to_ascii_lowercase()).as_deref() {
        Some("image/png") => "image/png",
        Some("image/jpeg") | Some("image/jpg") => "image/jpeg",
        Some("image/gif") => "image/gif",
        Some("image/webp") => "image/webp",
        Some("image/bmp") => "image/bmp",
        _ => FALLBACK_IMAGE_MIME,
    }
}

fn detect_from_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 4 && bytes[..4] == [0x89, 0x50, 0x4E, 0x47] {
        return Some("image/png");
    }
    if bytes.len() >= 3 && bytes[..3] == [0xFF, 0xD8, 0xFF] {
        return Some("image/jpeg");
    }
    if bytes.len() >= 4 && bytes[..4] == *b"GIF8" {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && bytes[..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
        return Some("image/webp");
    }
    if bytes.len() >= 2 && bytes[..2] == *b"BM" {
        return Some("image/bmp");
    }
    None
}

pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
