//! JPEG codec.
//!
//! Decodes gray, RGB and CMYK JPEGs to RGBA8 with opaque alpha. Encodes
//! RGB at the requested quality; JPEG carries no alpha, so it is dropped.

use std::io::{BufReader, Cursor};

use jpeg_encoder::{ColorType, Encoder};

use crate::{IoError, IoResult, RgbaImage};

/// Decodes JPEG bytes to RGBA8.
pub fn decode(bytes: &[u8]) -> IoResult<RgbaImage> {
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(Cursor::new(bytes)));
    let pixels = decoder
        .decode()
        .map_err(|e| IoError::DecodeError(e.to_string()))?;

    let info = decoder
        .info()
        .ok_or_else(|| IoError::DecodeError("missing JPEG info".into()))?;

    let data: Vec<u8> = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        jpeg_decoder::PixelFormat::L8 => pixels.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        jpeg_decoder::PixelFormat::CMYK32 => pixels
            .chunks_exact(4)
            .flat_map(|cmyk| {
                let c = cmyk[0] as f32 / 255.0;
                let m = cmyk[1] as f32 / 255.0;
                let y = cmyk[2] as f32 / 255.0;
                let k = cmyk[3] as f32 / 255.0;

                let r = ((1.0 - c) * (1.0 - k) * 255.0) as u8;
                let g = ((1.0 - m) * (1.0 - k) * 255.0) as u8;
                let b = ((1.0 - y) * (1.0 - k) * 255.0) as u8;

                [r, g, b, 255]
            })
            .collect(),
        // High byte of each 16-bit sample
        jpeg_decoder::PixelFormat::L16 => pixels
            .chunks_exact(2)
            .flat_map(|l16| [l16[0], l16[0], l16[0], 255])
            .collect(),
    };

    RgbaImage::new(info.width as u32, info.height as u32, data)
}

/// Encodes an RGBA8 image as baseline JPEG, quality clamped to 1-100.
pub fn encode(image: &RgbaImage, quality: u8) -> IoResult<Vec<u8>> {
    let (Ok(width), Ok(height)) = (u16::try_from(image.width), u16::try_from(image.height)) else {
        return Err(IoError::EncodeError(format!(
            "{}x{} exceeds the JPEG limit of 65535",
            image.width, image.height
        )));
    };

    let mut buffer = Vec::new();
    let encoder = Encoder::new(&mut buffer, quality.clamp(1, 100));
    encoder
        .encode(&image.to_rgb(), width, height, ColorType::Rgb)
        .map_err(|e: jpeg_encoder::EncodingError| IoError::EncodeError(e.to_string()))?;

    Ok(buffer)
}
