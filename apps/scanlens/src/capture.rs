//! Desktop capture collaborator: a file picker standing in for the camera.
//! Picked images are downscaled and re-encoded to JPEG before upload, the
//! same bounds the analyzer applies on its side.

use std::io::Cursor;

use anyhow::{Context, Result};
use client_core::CaptureProvider;
use image::codecs::jpeg::JpegEncoder;

const MAX_DIMENSION: u32 = 800;
const JPEG_QUALITY: u8 = 70;

pub struct FilePickerCapture;

impl CaptureProvider for FilePickerCapture {
    fn capture(&self) -> Result<Option<Vec<u8>>> {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("images", &["jpg", "jpeg", "png"])
            .pick_file()
        else {
            // Dialog dismissed: no capture, no session.
            return Ok(None);
        };

        let decoded = image::open(&path)
            .with_context(|| format!("failed to decode image '{}'", path.display()))?;
        encode_jpeg(&decoded).map(Some)
    }
}

fn encode_jpeg(decoded: &image::DynamicImage) -> Result<Vec<u8>> {
    let resized = decoded.thumbnail(MAX_DIMENSION, MAX_DIMENSION);
    let mut buffer = Cursor::new(Vec::new());
    resized
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))
        .context("failed to encode capture as jpeg")?;
    Ok(buffer.into_inner())
}
