// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Texture formats and their native translation.
//!
//! Every [`TextureFormat`] maps to exactly one [`FormatInfo`] row: the sized internal format
//! used for storage allocation, the transfer format/type pair used for uploads and readback,
//! the byte size of one texel (or one compressed block), the component count, and whether
//! the format is block-compressed.
//!
//! The table is an exhaustive `match`, so adding a format without a row fails to compile.
//!
//! # Examples
//!
//! ```
//! use descriptor_bridge::pixel_formats::TextureFormat;
//!
//! let info = TextureFormat::Rgba8Unorm.info();
//! assert_eq!(info.bytes_per_block, 4);
//! assert_eq!(info.components, 4);
//! assert!(!info.is_compressed());
//! ```

/*
Quick note on type design.  The host API names formats with an enum, and the native side names
them with three loosely typed integers (internal format, transfer format, transfer type).  We keep
the enum as the only public spelling and confine the integers to the table below, so a caller can
never hand us a (format, type) pair the context would reject.
 */
pub mod png_support;

use crate::images::device::Features;
use crate::imp::gl::consts as gl;

pub use half::f16;

/// Pixel format of a texture or render attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TextureFormat {
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    R16Uint,
    R16Sint,
    R16Float,
    Rg8Unorm,
    Rg8Snorm,
    Rg8Uint,
    Rg8Sint,
    R32Uint,
    R32Sint,
    R32Float,
    Rg16Uint,
    Rg16Sint,
    Rg16Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    /// Stored as RGBA on the native side, which has no BGRA storage.
    Bgra8Unorm,
    /// Stored as sRGB RGBA on the native side.
    Bgra8UnormSrgb,
    Rgb10a2Unorm,
    Rg11b10Ufloat,
    Rgb9e5Ufloat,
    Rg32Uint,
    Rg32Sint,
    Rg32Float,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    Rgba32Uint,
    Rgba32Sint,
    Rgba32Float,
    Stencil8,
    Depth16Unorm,
    Depth24Plus,
    Depth24PlusStencil8,
    Depth32Float,
    Depth32FloatStencil8,
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc2RgbaUnorm,
    Bc2RgbaUnormSrgb,
    Bc3RgbaUnorm,
    Bc3RgbaUnormSrgb,
    Bc7RgbaUnorm,
    Bc7RgbaUnormSrgb,
    Etc2Rgb8Unorm,
    Etc2Rgb8UnormSrgb,
    Etc2Rgba8Unorm,
    Etc2Rgba8UnormSrgb,
    Astc4x4Unorm,
    Astc4x4UnormSrgb,
}

/// How the shader (and the clear path) sees a format's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Float,
    Uint,
    Sint,
    Depth,
    Stencil,
    DepthStencil,
}

/// One row of the format table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Sized internal format passed to storage allocation.
    pub internal_format: u32,
    /// Transfer format for uploads and `read_pixels`.
    pub transfer_format: u32,
    /// Transfer component type.
    pub transfer_type: u32,
    /// Bytes per texel, or per 4x4 block for compressed formats.
    pub bytes_per_block: u8,
    pub components: u8,
    /// Edge length of a compressed block; 1 for uncompressed formats.
    pub block_dimension: u8,
    pub kind: SampleKind,
}

impl FormatInfo {
    pub const fn is_compressed(&self) -> bool {
        self.block_dimension > 1
    }
}

const fn row(
    internal_format: u32,
    transfer_format: u32,
    transfer_type: u32,
    bytes_per_block: u8,
    components: u8,
    kind: SampleKind,
) -> FormatInfo {
    FormatInfo {
        internal_format,
        transfer_format,
        transfer_type,
        bytes_per_block,
        components,
        block_dimension: 1,
        kind,
    }
}

const fn compressed(internal_format: u32, bytes_per_block: u8, components: u8) -> FormatInfo {
    FormatInfo {
        internal_format,
        transfer_format: gl::NONE,
        transfer_type: gl::NONE,
        bytes_per_block,
        components,
        block_dimension: 4,
        kind: SampleKind::Float,
    }
}

impl TextureFormat {
    /// Every format, in declaration order.
    pub const ALL: &'static [TextureFormat] = &[
        TextureFormat::R8Unorm,
        TextureFormat::R8Snorm,
        TextureFormat::R8Uint,
        TextureFormat::R8Sint,
        TextureFormat::R16Uint,
        TextureFormat::R16Sint,
        TextureFormat::R16Float,
        TextureFormat::Rg8Unorm,
        TextureFormat::Rg8Snorm,
        TextureFormat::Rg8Uint,
        TextureFormat::Rg8Sint,
        TextureFormat::R32Uint,
        TextureFormat::R32Sint,
        TextureFormat::R32Float,
        TextureFormat::Rg16Uint,
        TextureFormat::Rg16Sint,
        TextureFormat::Rg16Float,
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Rgba8Snorm,
        TextureFormat::Rgba8Uint,
        TextureFormat::Rgba8Sint,
        TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgb10a2Unorm,
        TextureFormat::Rg11b10Ufloat,
        TextureFormat::Rgb9e5Ufloat,
        TextureFormat::Rg32Uint,
        TextureFormat::Rg32Sint,
        TextureFormat::Rg32Float,
        TextureFormat::Rgba16Uint,
        TextureFormat::Rgba16Sint,
        TextureFormat::Rgba16Float,
        TextureFormat::Rgba32Uint,
        TextureFormat::Rgba32Sint,
        TextureFormat::Rgba32Float,
        TextureFormat::Stencil8,
        TextureFormat::Depth16Unorm,
        TextureFormat::Depth24Plus,
        TextureFormat::Depth24PlusStencil8,
        TextureFormat::Depth32Float,
        TextureFormat::Depth32FloatStencil8,
        TextureFormat::Bc1RgbaUnorm,
        TextureFormat::Bc1RgbaUnormSrgb,
        TextureFormat::Bc2RgbaUnorm,
        TextureFormat::Bc2RgbaUnormSrgb,
        TextureFormat::Bc3RgbaUnorm,
        TextureFormat::Bc3RgbaUnormSrgb,
        TextureFormat::Bc7RgbaUnorm,
        TextureFormat::Bc7RgbaUnormSrgb,
        TextureFormat::Etc2Rgb8Unorm,
        TextureFormat::Etc2Rgb8UnormSrgb,
        TextureFormat::Etc2Rgba8Unorm,
        TextureFormat::Etc2Rgba8UnormSrgb,
        TextureFormat::Astc4x4Unorm,
        TextureFormat::Astc4x4UnormSrgb,
    ];

    /// The first format stored with `internal_format`.
    pub(crate) fn from_internal_format(internal_format: u32) -> Option<TextureFormat> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.info().internal_format == internal_format)
    }

    /// The native table row for this format.
    pub const fn info(self) -> FormatInfo {
        use SampleKind::*;
        use TextureFormat::*;
        match self {
            R8Unorm => row(gl::R8, gl::RED, gl::UNSIGNED_BYTE, 1, 1, Float),
            R8Snorm => row(gl::R8_SNORM, gl::RED, gl::BYTE, 1, 1, Float),
            R8Uint => row(gl::R8UI, gl::RED_INTEGER, gl::UNSIGNED_BYTE, 1, 1, Uint),
            R8Sint => row(gl::R8I, gl::RED_INTEGER, gl::BYTE, 1, 1, Sint),
            R16Uint => row(gl::R16UI, gl::RED_INTEGER, gl::UNSIGNED_SHORT, 2, 1, Uint),
            R16Sint => row(gl::R16I, gl::RED_INTEGER, gl::SHORT, 2, 1, Sint),
            R16Float => row(gl::R16F, gl::RED, gl::HALF_FLOAT, 2, 1, Float),
            Rg8Unorm => row(gl::RG8, gl::RG, gl::UNSIGNED_BYTE, 2, 2, Float),
            Rg8Snorm => row(gl::RG8_SNORM, gl::RG, gl::BYTE, 2, 2, Float),
            Rg8Uint => row(gl::RG8UI, gl::RG_INTEGER, gl::UNSIGNED_BYTE, 2, 2, Uint),
            Rg8Sint => row(gl::RG8I, gl::RG_INTEGER, gl::BYTE, 2, 2, Sint),
            R32Uint => row(gl::R32UI, gl::RED_INTEGER, gl::UNSIGNED_INT, 4, 1, Uint),
            R32Sint => row(gl::R32I, gl::RED_INTEGER, gl::INT, 4, 1, Sint),
            R32Float => row(gl::R32F, gl::RED, gl::FLOAT, 4, 1, Float),
            Rg16Uint => row(gl::RG16UI, gl::RG_INTEGER, gl::UNSIGNED_SHORT, 4, 2, Uint),
            Rg16Sint => row(gl::RG16I, gl::RG_INTEGER, gl::SHORT, 4, 2, Sint),
            Rg16Float => row(gl::RG16F, gl::RG, gl::HALF_FLOAT, 4, 2, Float),
            Rgba8Unorm => row(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, Float),
            Rgba8UnormSrgb => row(gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, Float),
            Rgba8Snorm => row(gl::RGBA8_SNORM, gl::RGBA, gl::BYTE, 4, 4, Float),
            Rgba8Uint => row(gl::RGBA8UI, gl::RGBA_INTEGER, gl::UNSIGNED_BYTE, 4, 4, Uint),
            Rgba8Sint => row(gl::RGBA8I, gl::RGBA_INTEGER, gl::BYTE, 4, 4, Sint),
            Bgra8Unorm => row(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, Float),
            Bgra8UnormSrgb => row(gl::SRGB8_ALPHA8, gl::RGBA, gl::UNSIGNED_BYTE, 4, 4, Float),
            Rgb10a2Unorm => row(
                gl::RGB10_A2,
                gl::RGBA,
                gl::UNSIGNED_INT_2_10_10_10_REV,
                4,
                4,
                Float,
            ),
            Rg11b10Ufloat => row(
                gl::R11F_G11F_B10F,
                gl::RGBA,
                gl::UNSIGNED_INT_10F_11F_11F_REV,
                4,
                3,
                Float,
            ),
            Rgb9e5Ufloat => row(
                gl::RGB9_E5,
                gl::RGBA,
                gl::UNSIGNED_INT_5_9_9_9_REV,
                4,
                3,
                Float,
            ),
            Rg32Uint => row(gl::RG32UI, gl::RG_INTEGER, gl::UNSIGNED_INT, 8, 2, Uint),
            Rg32Sint => row(gl::RG32I, gl::RG_INTEGER, gl::INT, 8, 2, Sint),
            Rg32Float => row(gl::RG32F, gl::RG, gl::FLOAT, 8, 2, Float),
            Rgba16Uint => row(gl::RGBA16UI, gl::RGBA_INTEGER, gl::UNSIGNED_SHORT, 8, 4, Uint),
            Rgba16Sint => row(gl::RGBA16I, gl::RGBA_INTEGER, gl::SHORT, 8, 4, Sint),
            Rgba16Float => row(gl::RGBA16F, gl::RGBA, gl::HALF_FLOAT, 8, 4, Float),
            Rgba32Uint => row(gl::RGBA32UI, gl::RGBA_INTEGER, gl::UNSIGNED_INT, 16, 4, Uint),
            Rgba32Sint => row(gl::RGBA32I, gl::RGBA_INTEGER, gl::INT, 16, 4, Sint),
            Rgba32Float => row(gl::RGBA32F, gl::RGBA, gl::FLOAT, 16, 4, Float),
            Stencil8 => row(
                gl::STENCIL_INDEX8,
                gl::DEPTH_STENCIL,
                gl::UNSIGNED_BYTE,
                1,
                1,
                Stencil,
            ),
            Depth16Unorm => row(
                gl::DEPTH_COMPONENT16,
                gl::DEPTH_COMPONENT,
                gl::UNSIGNED_SHORT,
                2,
                1,
                Depth,
            ),
            Depth24Plus => row(
                gl::DEPTH_COMPONENT24,
                gl::DEPTH_COMPONENT,
                gl::UNSIGNED_INT,
                4,
                1,
                Depth,
            ),
            Depth24PlusStencil8 => row(
                gl::DEPTH24_STENCIL8,
                gl::DEPTH_STENCIL,
                gl::UNSIGNED_INT_24_8,
                4,
                2,
                DepthStencil,
            ),
            Depth32Float => row(
                gl::DEPTH_COMPONENT32F,
                gl::DEPTH_COMPONENT,
                gl::FLOAT,
                4,
                1,
                Depth,
            ),
            Depth32FloatStencil8 => row(
                gl::DEPTH32F_STENCIL8,
                gl::DEPTH_STENCIL,
                gl::FLOAT_32_UNSIGNED_INT_24_8_REV,
                8,
                2,
                DepthStencil,
            ),
            Bc1RgbaUnorm => compressed(gl::COMPRESSED_RGBA_S3TC_DXT1_EXT, 8, 4),
            Bc1RgbaUnormSrgb => compressed(gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT1_EXT, 8, 4),
            Bc2RgbaUnorm => compressed(gl::COMPRESSED_RGBA_S3TC_DXT3_EXT, 16, 4),
            Bc2RgbaUnormSrgb => compressed(gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT3_EXT, 16, 4),
            Bc3RgbaUnorm => compressed(gl::COMPRESSED_RGBA_S3TC_DXT5_EXT, 16, 4),
            Bc3RgbaUnormSrgb => compressed(gl::COMPRESSED_SRGB_ALPHA_S3TC_DXT5_EXT, 16, 4),
            Bc7RgbaUnorm => compressed(gl::COMPRESSED_RGBA_BPTC_UNORM_EXT, 16, 4),
            Bc7RgbaUnormSrgb => compressed(gl::COMPRESSED_SRGB_ALPHA_BPTC_UNORM_EXT, 16, 4),
            Etc2Rgb8Unorm => compressed(gl::COMPRESSED_RGB8_ETC2, 8, 3),
            Etc2Rgb8UnormSrgb => compressed(gl::COMPRESSED_SRGB8_ETC2, 8, 3),
            Etc2Rgba8Unorm => compressed(gl::COMPRESSED_RGBA8_ETC2_EAC, 16, 4),
            Etc2Rgba8UnormSrgb => compressed(gl::COMPRESSED_SRGB8_ALPHA8_ETC2_EAC, 16, 4),
            Astc4x4Unorm => compressed(gl::COMPRESSED_RGBA_ASTC_4X4_KHR, 16, 4),
            Astc4x4UnormSrgb => compressed(gl::COMPRESSED_SRGB8_ALPHA8_ASTC_4X4_KHR, 16, 4),
        }
    }

    pub const fn has_depth(self) -> bool {
        matches!(
            self.info().kind,
            SampleKind::Depth | SampleKind::DepthStencil
        )
    }

    pub const fn has_stencil(self) -> bool {
        matches!(
            self.info().kind,
            SampleKind::Stencil | SampleKind::DepthStencil
        )
    }

    pub const fn is_depth_stencil(self) -> bool {
        self.has_depth() || self.has_stencil()
    }

    pub const fn is_compressed(self) -> bool {
        self.info().is_compressed()
    }

    /// The optional device feature a format depends on, if any.
    pub const fn required_feature(self) -> Option<Features> {
        use TextureFormat::*;
        match self {
            Bc1RgbaUnorm | Bc1RgbaUnormSrgb | Bc2RgbaUnorm | Bc2RgbaUnormSrgb | Bc3RgbaUnorm
            | Bc3RgbaUnormSrgb => Some(Features::TEXTURE_COMPRESSION_S3TC),
            Bc7RgbaUnorm | Bc7RgbaUnormSrgb => Some(Features::TEXTURE_COMPRESSION_BPTC),
            Etc2Rgb8Unorm | Etc2Rgb8UnormSrgb | Etc2Rgba8Unorm | Etc2Rgba8UnormSrgb => {
                Some(Features::TEXTURE_COMPRESSION_ETC2)
            }
            Astc4x4Unorm | Astc4x4UnormSrgb => Some(Features::TEXTURE_COMPRESSION_ASTC),
            _ => None,
        }
    }

    /// Whether rendering into this format needs the float color buffer feature.
    pub const fn needs_float_color_buffer(self) -> bool {
        use TextureFormat::*;
        matches!(
            self,
            R16Float | Rg16Float | Rgba16Float | R32Float | Rg32Float | Rgba32Float | Rg11b10Ufloat
        )
    }

    /// Bytes covering a `width` x `height` region of one image.
    pub const fn image_byte_size(self, width: u32, height: u32) -> usize {
        let info = self.info();
        let block = info.block_dimension as u32;
        let blocks_wide = width.div_ceil(block) as usize;
        let blocks_high = height.div_ceil(block) as usize;
        blocks_wide * blocks_high * info.bytes_per_block as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stencil_channel_detection() {
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(TextureFormat::Depth32FloatStencil8.has_stencil());
        assert!(!TextureFormat::Depth24Plus.has_stencil());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(TextureFormat::Depth16Unorm.has_depth());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }

    #[test]
    fn compressed_sizes_round_up_to_blocks() {
        // 5x5 covers 2x2 blocks of 8 bytes
        assert_eq!(TextureFormat::Bc1RgbaUnorm.image_byte_size(5, 5), 32);
        assert_eq!(TextureFormat::Rgba8Unorm.image_byte_size(5, 5), 100);
        assert_eq!(
            TextureFormat::Bc7RgbaUnorm.required_feature(),
            Some(Features::TEXTURE_COMPRESSION_BPTC)
        );
    }

    #[test]
    fn bgra_shares_rgba_storage() {
        assert_eq!(
            TextureFormat::Bgra8Unorm.info().internal_format,
            TextureFormat::Rgba8Unorm.info().internal_format
        );
    }
}
