//! QR code rasterization for wallet addresses.
//!
//! Codes use error-correction level L, 10 pixels per module and a
//! 4-module light border. The same payload always yields the same pixels
//! and the same PNG bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use std::collections::HashMap;
use std::io::Cursor;

use crate::error::EncodeError;

/// Pixels per QR module.
pub const MODULE_PX: u32 = 10;
/// Light modules around the symbol.
pub const QUIET_ZONE: u32 = 4;

const DARK: u8 = 0;
const LIGHT: u8 = 255;

/// A rendered QR code.
#[derive(Debug, Clone)]
pub struct ScannableCode {
    /// The exact encoded string.
    pub payload: String,
    /// Modules per side, without the quiet zone.
    pub modules: u32,
    /// Grayscale raster.
    pub image: GrayImage,
    /// PNG encoding of `image`.
    pub png: Vec<u8>,
}

impl ScannableCode {
    /// Side length in pixels.
    pub fn size_px(&self) -> u32 {
        self.image.width()
    }

    /// `data:image/png;base64,...` for inline display.
    pub fn data_uri(&self) -> String {
        png_data_uri(&self.png)
    }
}

/// Encode `payload` as a QR code.
pub fn generate(payload: &str) -> Result<ScannableCode, EncodeError> {
    if payload.is_empty() {
        return Err(EncodeError::EmptyPayload);
    }

    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L).map_err(|e| match e {
        QrError::DataTooLong => EncodeError::PayloadTooLong { len: payload.len() },
        other => EncodeError::Encoder(other.to_string()),
    })?;

    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET_ZONE) * MODULE_PX;

    let image = GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / MODULE_PX) as i64 - QUIET_ZONE as i64;
        let my = (y / MODULE_PX) as i64 - QUIET_ZONE as i64;
        let inside = (0..modules as i64).contains(&mx) && (0..modules as i64).contains(&my);
        if inside && colors[(my as u32 * modules + mx as u32) as usize] == Color::Dark {
            Luma([DARK])
        } else {
            Luma([LIGHT])
        }
    });

    let png = encode_png(DynamicImage::ImageLuma8(image.clone()))?;

    Ok(ScannableCode {
        payload: payload.to_string(),
        modules,
        image,
        png,
    })
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: DynamicImage) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| EncodeError::Raster(e.to_string()))?;
    Ok(bytes)
}

/// Inline data URI for PNG bytes.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Per-run memo of generated codes, keyed by the exact address.
#[derive(Debug, Default)]
pub struct CodeCache {
    codes: HashMap<String, ScannableCode>,
}

impl CodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate or reuse the code for `payload`.
    pub fn get_or_generate(&mut self, payload: &str) -> Result<&ScannableCode, EncodeError> {
        if !self.codes.contains_key(payload) {
            let code = generate(payload)?;
            self.codes.insert(payload.to_string(), code);
        }
        Ok(&self.codes[payload])
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
