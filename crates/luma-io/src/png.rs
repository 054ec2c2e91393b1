//! PNG codec.
//!
//! Decoding expands palette and low-bit-depth images, converts gray and
//! gray+alpha to RGBA, and narrows 16-bit samples to their high byte.
//! Encoding always writes 8-bit RGBA.

use std::io::{BufReader, Cursor};

use crate::{IoError, IoResult, RgbaImage};

/// Decodes PNG bytes to RGBA8.
pub fn decode(bytes: &[u8]) -> IoResult<RgbaImage> {
    let mut decoder = png::Decoder::new(BufReader::new(Cursor::new(bytes)));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder
        .read_info()
        .map_err(|e: png::DecodingError| IoError::DecodeError(e.to_string()))?;

    let buf_size = reader
        .output_buffer_size()
        .ok_or_else(|| IoError::DecodeError("cannot determine output buffer size".into()))?;
    let mut buf = vec![0u8; buf_size];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e: png::DecodingError| IoError::DecodeError(e.to_string()))?;

    let samples = match info.bit_depth {
        png::BitDepth::Eight => buf[..info.buffer_size()].to_vec(),
        // Big-endian: keep the high byte
        png::BitDepth::Sixteen => {
            buf[..info.buffer_size()].chunks_exact(2).map(|s| s[0]).collect()
        }
        depth => {
            let reason = format!("unexpected bit depth after expansion: {:?}", depth);
            return Err(IoError::DecodeError(reason));
        }
    };

    let data: Vec<u8> = match info.color_type {
        png::ColorType::Rgba => samples,
        png::ColorType::Rgb => samples
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        png::ColorType::Grayscale => samples.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        png::ColorType::GrayscaleAlpha => samples
            .chunks_exact(2)
            .flat_map(|ga| [ga[0], ga[0], ga[0], ga[1]])
            .collect(),
        color_type => {
            let reason = format!("unsupported color type: {:?}", color_type);
            return Err(IoError::DecodeError(reason));
        }
    };

    RgbaImage::new(info.width, info.height, data)
}

/// Encodes an RGBA8 image as PNG.
pub fn encode(image: &RgbaImage) -> IoResult<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, image.width, image.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| IoError::EncodeError(e.to_string()))?;
        writer
            .write_image_data(&image.data)
            .map_err(|e| IoError::EncodeError(e.to_string()))?;
        writer.finish().map_err(|e| IoError::EncodeError(e.to_string()))?;
    }
    Ok(buffer)
}
