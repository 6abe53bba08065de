//! Image upload helpers: validation and data URL conversion.

use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};

/// MIME types accepted for image uploads.
pub const SUPPORTED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Largest accepted upload, 10 MB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageValidationError {
    #[error("unsupported image format {mime}; supported formats: {}", supported_formats())]
    Format { mime: String },
    #[error("file is {} which exceeds the {} limit", format_file_size(*size), format_file_size(MAX_FILE_SIZE))]
    Size { size: u64 },
}

fn supported_formats() -> String {
    SUPPORTED_IMAGE_TYPES
        .iter()
        .filter_map(|mime| mime.split('/').nth(1))
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check an upload's MIME type, then its size.
pub fn validate_image(mime: &str, size: u64) -> Result<(), ImageValidationError> {
    if !SUPPORTED_IMAGE_TYPES.contains(&mime) {
        return Err(ImageValidationError::Format {
            mime: mime.to_string(),
        });
    }
    if size > MAX_FILE_SIZE {
        return Err(ImageValidationError::Size { size });
    }
    Ok(())
}

/// `data:{mime};base64,...` for the given bytes.
pub fn to_data_url(data: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", BASE64_STANDARD.encode(data))
}

/// Data URL with the MIME type guessed from `path`'s extension.
pub fn data_url_from_path(path: impl AsRef<Path>, data: &[u8]) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    to_data_url(data, mime.as_ref())
}

/// Payload after the first `,` of a data URL; input without one is returned as is.
pub fn extract_base64(data_url: &str) -> &str {
    data_url
        .split_once(',')
        .map_or(data_url, |(_, payload)| payload)
}

/// Human readable size with up to two decimals, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
