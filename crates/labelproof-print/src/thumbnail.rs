// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thumbnail derivation for verification photos: a pure bytes -> bytes
// resize to a fixed target width, re-encoded as PNG.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use tracing::debug;

use labelproof_core::error::{LabelproofError, Result};

/// Resize an encoded image to exactly `width` pixels wide, preserving aspect
/// ratio, and return PNG bytes.
///
/// Smaller sources are scaled up; the thumbnail is always the target width,
/// matching what the job page lays out against.
pub fn shrink_to_width(image_bytes: &[u8], width: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| LabelproofError::Image(format!("decode: {e}")))?;

    let (w, h) = (img.width().max(1), img.height().max(1));
    let height = ((width as u64 * h as u64 + w as u64 / 2) / w as u64).max(1) as u32;

    debug!(from_w = w, from_h = h, to_w = width, to_h = height, "resizing photo");
    let resized = img.resize_exact(width, height, image::imageops::FilterType::Lanczos3);

    let mut buffer = Vec::new();
    resized
        .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| LabelproofError::Image(format!("encode: {e}")))?;
    Ok(buffer)
}

/// Base64-in, base64-out variant of [`shrink_to_width`], for records that
/// carry their photos as base64 PNG fields.
pub fn shrink_base64(image_b64: &str, width: u32) -> Result<String> {
    let bytes = BASE64
        .decode(image_b64)
        .map_err(|e| LabelproofError::Image(format!("base64 decode: {e}")))?;
    let small = shrink_to_width(&bytes, width)?;
    Ok(BASE64.encode(small))
}
