// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Textures and texture views.

Textures get immutable storage at creation: every mip level, every layer, allocated in one call.
The native bind target is fixed at that point too (see [TextureTarget::select]).  One-dimensional
textures are stored as 2D textures one texel high.

A multisampled texture is stored single-sampled.  Render passes render into multisampled
renderbuffers and resolve into it (or into the declared resolve target) when the pass ends.

Views are a projection of their texture: a mip range, a layer range, and a format.  The context
has no view objects, so nothing native is created; passes and bind groups read the ranges when
they attach or bind.
*/

use std::cell::Cell;
use std::rc::Rc;

use crate::bindings::visible_to::TextureUsages;
use crate::imp::gl::NativeTexture;
use crate::imp::gl::consts as gl;
use crate::imp::{BoundDevice, Error, NativeObject};
use crate::pixel_formats::TextureFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
}

impl Extent3d {
    pub const fn new(width: u32, height: u32, depth_or_array_layers: u32) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    D1,
    D2,
    D2Array,
    Cube,
    D3,
}

/// The native target a texture is bound on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    Texture2DArray,
    Texture3D,
    CubeMap,
}

impl TextureTarget {
    /// Picks the target for a texture.
    ///
    /// A 3D dimension always wins, then the cubemap flag.  Otherwise the texture is an array if
    /// flagged as one or if it has more than one layer.
    pub const fn select(
        dimension: TextureDimension,
        depth_or_array_layers: u32,
        array: bool,
        cubemap: bool,
    ) -> TextureTarget {
        if matches!(dimension, TextureDimension::D3) {
            TextureTarget::Texture3D
        } else if cubemap {
            TextureTarget::CubeMap
        } else if array || depth_or_array_layers > 1 {
            TextureTarget::Texture2DArray
        } else {
            TextureTarget::Texture2D
        }
    }

    pub const fn native(self) -> u32 {
        match self {
            TextureTarget::Texture2D => gl::TEXTURE_2D,
            TextureTarget::Texture2DArray => gl::TEXTURE_2D_ARRAY,
            TextureTarget::Texture3D => gl::TEXTURE_3D,
            TextureTarget::CubeMap => gl::TEXTURE_CUBE_MAP,
        }
    }

    /// Whether storage and uploads are addressed in three dimensions.
    pub(crate) const fn is_layered(self) -> bool {
        matches!(self, TextureTarget::Texture2DArray | TextureTarget::Texture3D)
    }
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub label: Option<&'a str>,
    pub size: Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsages,
    /// Forces an array texture even with a single layer.
    pub array: bool,
    /// Six layers become the faces of a cube map.
    pub cubemap: bool,
}

impl<'a> TextureDescriptor<'a> {
    /// A single-sampled 2D texture with one mip level.
    pub fn new_2d(
        label: Option<&'a str>,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsages,
    ) -> Self {
        Self {
            label,
            size: Extent3d::new(width, height, 1),
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage,
            array: false,
            cubemap: false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct TextureInner {
    device: Rc<BoundDevice>,
    native: Cell<Option<NativeTexture>>,
    label: Option<String>,
    size: Extent3d,
    mip_level_count: u32,
    sample_count: u32,
    dimension: TextureDimension,
    format: TextureFormat,
    usage: TextureUsages,
    target: TextureTarget,
}

#[derive(Debug, Clone)]
pub struct Texture(pub(crate) Rc<TextureInner>);

fn max_mips(size: Extent3d, dimension: TextureDimension) -> u32 {
    let mut largest = size.width.max(size.height);
    if dimension == TextureDimension::D3 {
        largest = largest.max(size.depth_or_array_layers);
    }
    32 - largest.leading_zeros()
}

impl Texture {
    pub(crate) fn new(device: &Rc<BoundDevice>, descriptor: &TextureDescriptor) -> Result<Self, Error> {
        let size = descriptor.size;
        let invalid = |msg: String| {
            Err(Error::InvalidDescriptor(format!(
                "texture {:?}: {}",
                descriptor.label, msg
            )))
        };
        if size.width == 0 || size.height == 0 || size.depth_or_array_layers == 0 {
            return invalid(format!("empty size {:?}", size));
        }
        if descriptor.mip_level_count == 0
            || descriptor.mip_level_count > max_mips(size, descriptor.dimension)
        {
            return invalid(format!(
                "{} mip levels for size {:?}",
                descriptor.mip_level_count, size
            ));
        }
        if descriptor.dimension == TextureDimension::D1 && size.height != 1 {
            return invalid("1D textures must be one texel high".to_string());
        }
        if let Some(feature) = descriptor.format.required_feature()
            && !device.features.contains(feature)
        {
            return invalid(format!(
                "format {:?} needs {:?}",
                descriptor.format, feature
            ));
        }
        if descriptor.sample_count == 0 || descriptor.sample_count > device.limits.max_samples.max(1) {
            return invalid(format!("unsupported sample count {}", descriptor.sample_count));
        }
        if descriptor.sample_count > 1
            && (descriptor.mip_level_count != 1
                || descriptor.dimension != TextureDimension::D2
                || size.depth_or_array_layers != 1
                || descriptor.format.is_compressed())
        {
            return invalid("multisampled textures must be single-level, single-layer 2D".to_string());
        }
        let target = TextureTarget::select(
            descriptor.dimension,
            size.depth_or_array_layers,
            descriptor.array,
            descriptor.cubemap,
        );
        if target == TextureTarget::CubeMap
            && (size.depth_or_array_layers != 6 || size.width != size.height)
        {
            return invalid("cube maps need six square layers".to_string());
        }
        let internal_format = descriptor.format.info().internal_format;
        let native_target = target.native();

        let mut gl = device.gl()?;
        let native = gl.create_texture().map_err(Error::Native)?;
        gl.bind_texture(native_target, Some(native));
        if target.is_layered() {
            gl.tex_storage_3d(
                native_target,
                descriptor.mip_level_count,
                internal_format,
                size.width,
                size.height,
                size.depth_or_array_layers,
            );
        } else {
            gl.tex_storage_2d(
                native_target,
                descriptor.mip_level_count,
                internal_format,
                size.width,
                size.height,
            );
        }
        gl.tex_parameter_i32(native_target, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
        gl.tex_parameter_i32(native_target, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
        gl.tex_parameter_i32(native_target, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(native_target, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(native_target, gl::TEXTURE_WRAP_R, gl::CLAMP_TO_EDGE as i32);
        gl.bind_texture(native_target, None);
        drop(gl);

        logwise::trace_sync!(
            "created texture {label} {target} {format}",
            label = logwise::privacy::LogIt(&descriptor.label),
            target = logwise::privacy::LogIt(&target),
            format = logwise::privacy::LogIt(&descriptor.format)
        );
        Ok(Texture(Rc::new(TextureInner {
            device: device.clone(),
            native: Cell::new(Some(native)),
            label: descriptor.label.map(str::to_string),
            size,
            mip_level_count: descriptor.mip_level_count,
            sample_count: descriptor.sample_count,
            dimension: descriptor.dimension,
            format: descriptor.format,
            usage: descriptor.usage,
            target,
        })))
    }

    pub fn size(&self) -> Extent3d {
        self.0.size
    }
    pub fn width(&self) -> u32 {
        self.0.size.width
    }
    pub fn height(&self) -> u32 {
        self.0.size.height
    }
    pub fn format(&self) -> TextureFormat {
        self.0.format
    }
    pub fn mip_level_count(&self) -> u32 {
        self.0.mip_level_count
    }
    pub fn sample_count(&self) -> u32 {
        self.0.sample_count
    }
    pub fn dimension(&self) -> TextureDimension {
        self.0.dimension
    }
    pub fn usage(&self) -> TextureUsages {
        self.0.usage
    }
    pub fn target(&self) -> TextureTarget {
        self.0.target
    }
    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    /// Size of mip `level`, never smaller than one texel.  Array layers are not reduced.
    pub fn mip_extent(&self, level: u32) -> Extent3d {
        let size = self.0.size;
        let depth = if self.0.target == TextureTarget::Texture3D {
            (size.depth_or_array_layers >> level).max(1)
        } else {
            size.depth_or_array_layers
        };
        Extent3d::new(
            (size.width >> level).max(1),
            (size.height >> level).max(1),
            depth,
        )
    }

    pub fn create_view(&self, descriptor: &TextureViewDescriptor) -> Result<TextureView, Error> {
        // a 2D view of a 3D texture is one depth slice of one mip, addressed as a layer
        let slice = self.0.target == TextureTarget::Texture3D
            && descriptor.dimension == Some(TextureViewDimension::D2);
        let base_mip_level = descriptor.base_mip_level;
        let mip_level_count = match descriptor.mip_level_count {
            Some(count) => count,
            None if slice => 1,
            None => self.0.mip_level_count.saturating_sub(base_mip_level),
        };
        let layers = match self.0.target {
            TextureTarget::Texture3D if slice && base_mip_level < self.0.mip_level_count => {
                self.mip_extent(base_mip_level).depth_or_array_layers
            }
            TextureTarget::Texture3D => 1,
            _ => self.0.size.depth_or_array_layers,
        };
        let base_array_layer = descriptor.base_array_layer;
        let array_layer_count = match descriptor.array_layer_count {
            Some(count) => count,
            None if slice => 1,
            None => layers.saturating_sub(base_array_layer),
        };
        if slice && (mip_level_count != 1 || array_layer_count != 1) {
            return Err(Error::InvalidDescriptor(
                "a slice of a 3D texture covers one mip and one depth slice".to_string(),
            ));
        }
        if mip_level_count == 0 || base_mip_level + mip_level_count > self.0.mip_level_count {
            return Err(Error::InvalidDescriptor(format!(
                "view mips {}..{} out of range for {} levels",
                base_mip_level,
                base_mip_level + mip_level_count,
                self.0.mip_level_count
            )));
        }
        if array_layer_count == 0 || base_array_layer + array_layer_count > layers {
            return Err(Error::InvalidDescriptor(format!(
                "view layers {}..{} out of range for {} layers",
                base_array_layer,
                base_array_layer + array_layer_count,
                layers
            )));
        }
        let format = descriptor.format.unwrap_or(self.0.format);
        if format.info().internal_format != self.0.format.info().internal_format {
            return Err(Error::InvalidDescriptor(format!(
                "can't view {:?} storage as {:?}",
                self.0.format, format
            )));
        }
        let dimension = descriptor.dimension.unwrap_or(match self.0.target {
            TextureTarget::Texture3D => TextureViewDimension::D3,
            TextureTarget::CubeMap => TextureViewDimension::Cube,
            TextureTarget::Texture2DArray => TextureViewDimension::D2Array,
            TextureTarget::Texture2D if self.0.dimension == TextureDimension::D1 => {
                TextureViewDimension::D1
            }
            TextureTarget::Texture2D => TextureViewDimension::D2,
        });
        Ok(TextureView(Rc::new(TextureViewInner {
            texture: self.clone(),
            label: descriptor.label.map(str::to_string),
            format,
            dimension,
            base_mip_level,
            mip_level_count,
            base_array_layer,
            array_layer_count,
        })))
    }

    /// Deletes the native texture.  Idempotent.
    pub fn destroy(&self) {
        if let Some(native) = self.0.native.take() {
            self.0.device.release(NativeObject::Texture(native));
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.native.get().is_none()
    }

    pub(crate) fn native(&self) -> Result<NativeTexture, Error> {
        self.0.native.get().ok_or_else(|| {
            Error::InvalidState(format!("texture {:?} was destroyed", self.0.label))
        })
    }

    pub(crate) fn device(&self) -> &Rc<BoundDevice> {
        &self.0.device
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        if let Some(native) = self.native.take() {
            self.device.release(NativeObject::Texture(native));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextureViewDescriptor<'a> {
    pub label: Option<&'a str>,
    pub format: Option<TextureFormat>,
    pub dimension: Option<TextureViewDimension>,
    pub base_mip_level: u32,
    /// `None` for every level from the base on.
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    /// `None` for every layer from the base on.
    pub array_layer_count: Option<u32>,
}

#[derive(Debug)]
pub(crate) struct TextureViewInner {
    texture: Texture,
    label: Option<String>,
    format: TextureFormat,
    dimension: TextureViewDimension,
    base_mip_level: u32,
    mip_level_count: u32,
    base_array_layer: u32,
    array_layer_count: u32,
}

/// A range of a texture.  Keeps the texture alive.
#[derive(Debug, Clone)]
pub struct TextureView(pub(crate) Rc<TextureViewInner>);

impl TextureView {
    pub fn texture(&self) -> &Texture {
        &self.0.texture
    }
    pub fn format(&self) -> TextureFormat {
        self.0.format
    }
    pub fn dimension(&self) -> TextureViewDimension {
        self.0.dimension
    }
    pub fn base_mip_level(&self) -> u32 {
        self.0.base_mip_level
    }
    pub fn mip_level_count(&self) -> u32 {
        self.0.mip_level_count
    }
    pub fn base_array_layer(&self) -> u32 {
        self.0.base_array_layer
    }
    pub fn array_layer_count(&self) -> u32 {
        self.0.array_layer_count
    }
    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }
    /// Width and height of the base mip level.
    pub fn extent(&self) -> (u32, u32) {
        let e = self.0.texture.mip_extent(self.0.base_mip_level);
        (e.width, e.height)
    }
}

impl PartialEq for TextureView {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_selection() {
        use TextureDimension::*;
        assert_eq!(TextureTarget::select(D2, 1, false, false), TextureTarget::Texture2D);
        assert_eq!(TextureTarget::select(D2, 4, false, false), TextureTarget::Texture2DArray);
        assert_eq!(TextureTarget::select(D2, 1, true, false), TextureTarget::Texture2DArray);
        assert_eq!(TextureTarget::select(D2, 6, false, true), TextureTarget::CubeMap);
        assert_eq!(TextureTarget::select(D2, 6, true, true), TextureTarget::CubeMap);
        assert_eq!(TextureTarget::select(D3, 6, true, true), TextureTarget::Texture3D);
        assert_eq!(TextureTarget::select(D1, 1, false, false), TextureTarget::Texture2D);
    }

    #[test]
    fn mip_limits() {
        assert_eq!(max_mips(Extent3d::new(256, 256, 1), TextureDimension::D2), 9);
        assert_eq!(max_mips(Extent3d::new(1, 1, 1), TextureDimension::D2), 1);
        assert_eq!(max_mips(Extent3d::new(4, 4, 64), TextureDimension::D3), 7);
        assert_eq!(max_mips(Extent3d::new(4, 4, 64), TextureDimension::D2), 3);
    }
}
