// src/utils/file_magic.rs

//! Receipt uploads: accepted extensions and their magic bytes.

use std::path::{Component, Path, PathBuf};

/// Extensions accepted for payment receipts.
pub const RECEIPT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "pdf"];

/// Lower-cased extension of `file_name`, if it is an accepted receipt type.
pub fn receipt_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_lowercase();
    RECEIPT_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Checks that the leading bytes match the claimed extension (without the dot).
pub fn matches_magic_bytes(data: &[u8], extension: &str) -> bool {
    if data.is_empty() {
        return false;
    }

    match extension {
        "png" => data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
        "jpg" | "jpeg" => data.starts_with(&[0xFF, 0xD8, 0xFF]),
        "webp" => data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP",
        "pdf" => data.starts_with(b"%PDF"),
        _ => false,
    }
}

/// MIME type served for a stored receipt with this extension.
pub fn receipt_content_type(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Resolves a stored receipt reference under `root`.
/// Only plain relative components are accepted, so `..` or an absolute path
/// cannot leave the receipt directory.
pub fn receipt_path(root: &Path, receipt_ref: &str) -> Option<PathBuf> {
    let relative = Path::new(receipt_ref);
    let mut components = relative.components().peekable();
    components.peek()?;
    if !components.all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(relative))
}
