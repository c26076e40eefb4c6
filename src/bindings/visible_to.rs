// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Usage and visibility declarations for GPU resources.
//!
//! These are bitmasks in the descriptor model.  The emulation only reads a few bits of each
//! (which native buffer target to use, which upload hint to pass), but keeps the full set so
//! callers can write descriptors the same way for either backend.
//!
//! # Examples
//!
//! ```
//! use descriptor_bridge::bindings::visible_to::{BufferUsages, ShaderStages};
//!
//! let usage = BufferUsages::UNIFORM | BufferUsages::COPY_DST;
//! assert!(usage.contains(BufferUsages::UNIFORM));
//! let visibility = ShaderStages::VERTEX | ShaderStages::FRAGMENT;
//! assert_eq!(visibility, ShaderStages::VERTEX_FRAGMENT);
//! ```

use crate::imp::gl::consts as gl;

bitflags::bitflags! {
    /// How a buffer will be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsages: u32 {
        /// The buffer can be read back to the CPU.
        const MAP_READ = 1 << 0;
        const MAP_WRITE = 1 << 1;
        const COPY_SRC = 1 << 2;
        /// The buffer can be written with `Queue::write_buffer` or as a copy destination.
        const COPY_DST = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const UNIFORM = 1 << 6;
    }
}

bitflags::bitflags! {
    /// How a texture will be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsages: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Shader stages a binding is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const VERTEX_FRAGMENT = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

impl BufferUsages {
    /// The native bind target a buffer with this usage lives on.
    ///
    /// Vertex wins over index, index over uniform; anything else is an array buffer.
    pub const fn native_target(self) -> u32 {
        if self.contains(BufferUsages::VERTEX) {
            gl::ARRAY_BUFFER
        } else if self.contains(BufferUsages::INDEX) {
            gl::ELEMENT_ARRAY_BUFFER
        } else if self.contains(BufferUsages::UNIFORM) {
            gl::UNIFORM_BUFFER
        } else {
            gl::ARRAY_BUFFER
        }
    }

    /// The storage hint passed when allocating.
    pub const fn native_hint(self) -> u32 {
        if self.contains(BufferUsages::MAP_READ) {
            gl::DYNAMIC_READ
        } else if self.intersects(BufferUsages::COPY_DST.union(BufferUsages::UNIFORM)) {
            gl::DYNAMIC_DRAW
        } else {
            gl::STATIC_DRAW
        }
    }
}
