// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render pass descriptions.
//!
//! A pass renders into up to [crate::images::device::Limits::max_color_attachments] color
//! attachments and at most one depth/stencil attachment.  All attachments must have the same
//! size.  If any attachment's texture is multisampled the whole pass is, and the pass resolves
//! when it ends: into each attachment's `resolve_target`, or back into the attachment's own
//! texture when it has none.

use crate::bindings::texture::TextureView;

/// A clear color.  Integer attachments take the components as integers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const TRANSPARENT: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    Clear(V),
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreOp {
    #[default]
    Store,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operations<V> {
    pub load: LoadOp<V>,
    pub store: StoreOp,
}

impl<V> Operations<V> {
    pub const fn clear(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }
    pub const fn load() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderPassColorAttachment<'a> {
    pub view: &'a TextureView,
    /// Where multisampled contents land.  Ignored for single-sampled passes.
    pub resolve_target: Option<&'a TextureView>,
    pub ops: Operations<Color>,
}

#[derive(Debug, Clone)]
pub struct RenderPassDepthStencilAttachment<'a> {
    pub view: &'a TextureView,
    /// `None` leaves the depth aspect alone.  Multisampled passes must clear it.
    pub depth_ops: Option<Operations<f32>>,
    /// `None` leaves the stencil aspect alone.  Multisampled passes must clear it.
    pub stencil_ops: Option<Operations<u32>>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor<'a> {
    pub label: Option<&'a str>,
    /// Attachment `i` is `color_attachments[i]`.  `None` leaves the slot empty.
    pub color_attachments: &'a [Option<RenderPassColorAttachment<'a>>],
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<'a>>,
}
