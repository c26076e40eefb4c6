// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex buffer layout descriptions.
//!
//! A render pipeline declares one [`VertexBufferLayout`] per vertex buffer slot.  Each layout
//! gives the stride between elements, whether the buffer advances per vertex or per instance,
//! and the attributes read out of each element.
//!
//! Layouts are not applied when the pipeline is created.  The context keeps vertex attribute
//! state globally, so attribute pointers are set at every draw, against whatever buffers are
//! bound to the slots at that point.
//!
//! # Example
//!
//! ```
//! use descriptor_bridge::images::vertex_layout::{
//!     VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode,
//! };
//!
//! // position (xyz) followed by uv
//! let layout = VertexBufferLayout {
//!     array_stride: 20,
//!     step_mode: VertexStepMode::Vertex,
//!     attributes: vec![
//!         VertexAttribute { format: VertexFormat::Float32x3, offset: 0, shader_location: 0 },
//!         VertexAttribute { format: VertexFormat::Float32x2, offset: 12, shader_location: 1 },
//!     ],
//! };
//! assert_eq!(layout.attributes[1].format.size(), 8);
//! ```

use crate::imp::gl::consts as gl;

/// Whether a vertex buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    #[default]
    Vertex,
    /// Advances once per instance.  Set up with an attribute divisor of 1.
    Instance,
}

/// Data type of one vertex attribute.
///
/// Normalized formats are read as floats in the shader.  `Uint`/`Sint` formats are read as
/// integers and need integer attribute pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VertexFormat {
    Uint8x2,
    Uint8x4,
    Sint8x2,
    Sint8x4,
    Unorm8x2,
    Unorm8x4,
    Snorm8x2,
    Snorm8x4,
    Uint16x2,
    Uint16x4,
    Sint16x2,
    Sint16x4,
    Unorm16x2,
    Unorm16x4,
    Snorm16x2,
    Snorm16x4,
    Float16x2,
    Float16x4,
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
}

/// How the context reads a [`VertexFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NativeVertexFormat {
    pub(crate) components: i32,
    pub(crate) data_type: u32,
    pub(crate) normalized: bool,
    /// Read through the integer pointer entry point.
    pub(crate) integer: bool,
}

impl VertexFormat {
    pub(crate) const fn native(self) -> NativeVertexFormat {
        use VertexFormat::*;
        let (components, data_type, normalized, integer) = match self {
            Uint8x2 => (2, gl::UNSIGNED_BYTE, false, true),
            Uint8x4 => (4, gl::UNSIGNED_BYTE, false, true),
            Sint8x2 => (2, gl::BYTE, false, true),
            Sint8x4 => (4, gl::BYTE, false, true),
            Unorm8x2 => (2, gl::UNSIGNED_BYTE, true, false),
            Unorm8x4 => (4, gl::UNSIGNED_BYTE, true, false),
            Snorm8x2 => (2, gl::BYTE, true, false),
            Snorm8x4 => (4, gl::BYTE, true, false),
            Uint16x2 => (2, gl::UNSIGNED_SHORT, false, true),
            Uint16x4 => (4, gl::UNSIGNED_SHORT, false, true),
            Sint16x2 => (2, gl::SHORT, false, true),
            Sint16x4 => (4, gl::SHORT, false, true),
            Unorm16x2 => (2, gl::UNSIGNED_SHORT, true, false),
            Unorm16x4 => (4, gl::UNSIGNED_SHORT, true, false),
            Snorm16x2 => (2, gl::SHORT, true, false),
            Snorm16x4 => (4, gl::SHORT, true, false),
            Float16x2 => (2, gl::HALF_FLOAT, false, false),
            Float16x4 => (4, gl::HALF_FLOAT, false, false),
            Float32 => (1, gl::FLOAT, false, false),
            Float32x2 => (2, gl::FLOAT, false, false),
            Float32x3 => (3, gl::FLOAT, false, false),
            Float32x4 => (4, gl::FLOAT, false, false),
            Uint32 => (1, gl::UNSIGNED_INT, false, true),
            Uint32x2 => (2, gl::UNSIGNED_INT, false, true),
            Uint32x3 => (3, gl::UNSIGNED_INT, false, true),
            Uint32x4 => (4, gl::UNSIGNED_INT, false, true),
            Sint32 => (1, gl::INT, false, true),
            Sint32x2 => (2, gl::INT, false, true),
            Sint32x3 => (3, gl::INT, false, true),
            Sint32x4 => (4, gl::INT, false, true),
        };
        NativeVertexFormat {
            components,
            data_type,
            normalized,
            integer,
        }
    }

    /// Size of one attribute value in bytes.
    pub const fn size(self) -> u64 {
        let native = self.native();
        let component = match native.data_type {
            gl::UNSIGNED_BYTE | gl::BYTE => 1,
            gl::UNSIGNED_SHORT | gl::SHORT | gl::HALF_FLOAT => 2,
            _ => 4,
        };
        component * native.components as u64
    }
}

/// One attribute read out of each element of a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    /// Byte offset within the element.
    pub offset: u64,
    /// The `layout(location = N)` of the shader input.
    pub shader_location: u32,
}

/// The layout of one vertex buffer slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexBufferLayout {
    /// Bytes between consecutive elements.
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(VertexFormat::Float32x3.size(), 12);
        assert_eq!(VertexFormat::Unorm8x4.size(), 4);
        assert_eq!(VertexFormat::Float16x2.size(), 4);
        assert_eq!(VertexFormat::Sint32.size(), 4);
    }

    #[test]
    fn integer_formats_use_integer_pointers() {
        assert!(VertexFormat::Uint16x2.native().integer);
        assert!(!VertexFormat::Unorm16x2.native().integer);
        assert!(VertexFormat::Unorm16x2.native().normalized);
    }
}
