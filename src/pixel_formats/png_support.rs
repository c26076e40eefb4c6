// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! PNG export of readback bytes, for dumping render targets while debugging.

use crate::imp::Error;
use crate::pixel_formats::{TextureFormat, f16};

/// Converts tightly packed readback bytes to 8-bit RGBA.
///
/// Returns `None` for formats we don't know how to display.
pub fn to_rgba8(format: TextureFormat, bytes: &[u8]) -> Option<Vec<u8>> {
    match format {
        TextureFormat::Rgba8Unorm
        | TextureFormat::Rgba8UnormSrgb
        | TextureFormat::Bgra8Unorm
        | TextureFormat::Bgra8UnormSrgb => Some(bytes.to_vec()),
        TextureFormat::R8Unorm => Some(bytes.iter().flat_map(|r| [*r, *r, *r, 255]).collect()),
        TextureFormat::Rgba16Float => Some(
            bytes
                .chunks_exact(2)
                .map(|c| {
                    let v = f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32();
                    (v.clamp(0.0, 1.0) * 255.0).round() as u8
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Encodes readback bytes of a `width` x `height` image as PNG.
pub fn encode_png(
    format: TextureFormat,
    width: u32,
    height: u32,
    bytes: &[u8],
) -> Result<Vec<u8>, Error> {
    let Some(rgba) = to_rgba8(format, bytes) else {
        return Err(Error::InvalidDescriptor(format!(
            "can't encode {:?} as png",
            format
        )));
    };
    if rgba.len() != width as usize * height as usize * 4 {
        return Err(Error::InvalidDescriptor(format!(
            "expected {}x{} pixels, got {} bytes",
            width,
            height,
            bytes.len()
        )));
    }
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| Error::Native(e.to_string()))?;
        writer
            .write_image_data(&rgba)
            .map_err(|e| Error::Native(e.to_string()))?;
        writer.finish().map_err(|e| Error::Native(e.to_string()))?;
    }
    Ok(out)
}
