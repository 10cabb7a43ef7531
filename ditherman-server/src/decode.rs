//! Upload validation, decoding and PNG encoding of the result.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, ImageFormat};

use crate::error::ApiError;

const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Lowercased extension of `filename` including the leading dot, or "" when
/// there is none.
pub fn extension_of(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rfind('.') {
        Some(i) => name[i..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Reject uploads whose name or declared type is not JPEG/PNG.
pub fn validate_upload(filename: &str, content_type: &str) -> Result<(), ApiError> {
    let ext = extension_of(filename);
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::UnsupportedExtension(ext));
    }
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(ApiError::UnsupportedContentType(content_type.to_string()));
    }
    Ok(())
}

/// Decode uploaded bytes, sniffing the format from content, and rotate the
/// result upright according to its EXIF orientation.
pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(bytes).context("unrecognised image data")?;
    let img = image::load_from_memory_with_format(bytes, format)
        .with_context(|| format!("failed to decode image (format: {format:?})"))?;
    match exif_orientation(bytes) {
        Some(tag) if tag != 1 => {
            tracing::debug!(tag, "applying exif orientation");
            Ok(orient(img, tag))
        }
        _ => Ok(img),
    }
}

/// EXIF orientation tag, if the container carries one.
fn exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let reader = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = reader.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Short(ref v) => v.first().copied(),
        _ => field.value.get_uint(0).and_then(|v| u16::try_from(v).ok()),
    }
}

/// Map an image in stored coordinates to view coordinates.
fn orient(img: DynamicImage, tag: u16) -> DynamicImage {
    match tag {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .context("png encoding")?;
    Ok(png_bytes)
}
