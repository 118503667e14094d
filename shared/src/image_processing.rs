//! Upload metadata for picked images. Bytes are sent as picked; nothing is
//! decoded or re-encoded.

use image::ImageFormat;
use tracing::debug;

pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";
pub const DEFAULT_FILE_STEM: &str = "upload";

/// MIME type from the magic bytes, if `image` recognises them.
#[must_use]
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

/// Sniffed type first, then whatever image type the chooser declared.
#[must_use]
pub fn resolve_mime_type(bytes: &[u8], declared: Option<&str>) -> String {
    if let Some(sniffed) = sniff_mime_type(bytes) {
        if let Some(declared) = declared {
            if !declared.eq_ignore_ascii_case(sniffed) {
                debug!(declared, sniffed, "declared image type differs from content");
            }
        }
        return sniffed.to_string();
    }

    match declared.map(str::trim) {
        Some(d) if d.to_ascii_lowercase().starts_with("image/") => d.to_ascii_lowercase(),
        _ => FALLBACK_MIME_TYPE.to_string(),
    }
}

/// Last path component of `name`, or `upload.<ext>` when nothing usable is
/// left.
#[must_use]
pub fn upload_file_name(name: &str, mime_type: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if !base.is_empty() && base != "." && base != ".." {
        return base.to_string();
    }

    let extension = ImageFormat::from_mime_type(mime_type)
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("bin");

    format!("{DEFAULT_FILE_STEM}.{extension}")
}
