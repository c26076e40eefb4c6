// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Sampler objects.

A native sampler object overrides the sampling parameters of whatever texture is bound on the
same unit.  Which unit that is isn't known until draw time, when the pipeline's pairing table
says which texture binding each sampler belongs to.
*/

use std::cell::Cell;
use std::rc::Rc;

use crate::imp::gl::NativeSampler;
use crate::imp::gl::consts as gl;
use crate::imp::{BoundDevice, Error, NativeObject};
use crate::images::device::Features;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

/// Comparison used by depth tests, stencil tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    pub(crate) const fn native(self) -> u32 {
        match self {
            CompareFunction::Never => gl::NEVER,
            CompareFunction::Less => gl::LESS,
            CompareFunction::Equal => gl::EQUAL,
            CompareFunction::LessEqual => gl::LEQUAL,
            CompareFunction::Greater => gl::GREATER,
            CompareFunction::NotEqual => gl::NOTEQUAL,
            CompareFunction::GreaterEqual => gl::GEQUAL,
            CompareFunction::Always => gl::ALWAYS,
        }
    }
}

impl FilterMode {
    pub(crate) const fn native(self) -> u32 {
        match self {
            FilterMode::Nearest => gl::NEAREST,
            FilterMode::Linear => gl::LINEAR,
        }
    }
}

impl AddressMode {
    pub(crate) const fn native(self) -> u32 {
        match self {
            AddressMode::ClampToEdge => gl::CLAMP_TO_EDGE,
            AddressMode::Repeat => gl::REPEAT,
            AddressMode::MirrorRepeat => gl::MIRRORED_REPEAT,
        }
    }
}

/// The minification enum for a (min, mipmap) filter pair.
pub(crate) const fn min_filter(min: FilterMode, mipmap: FilterMode) -> u32 {
    match (min, mipmap) {
        (FilterMode::Nearest, FilterMode::Nearest) => gl::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Linear, FilterMode::Nearest) => gl::LINEAR_MIPMAP_NEAREST,
        (FilterMode::Nearest, FilterMode::Linear) => gl::NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, FilterMode::Linear) => gl::LINEAR_MIPMAP_LINEAR,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor<'a> {
    pub label: Option<&'a str>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    /// Makes this a comparison sampler.
    pub compare: Option<CompareFunction>,
    /// Values above 1 need [Features::ANISOTROPIC_FILTERING] and are clamped to the device limit.
    pub anisotropy_clamp: u16,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::default(),
            address_mode_v: AddressMode::default(),
            address_mode_w: AddressMode::default(),
            mag_filter: FilterMode::default(),
            min_filter: FilterMode::default(),
            mipmap_filter: FilterMode::default(),
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            anisotropy_clamp: 1,
        }
    }
}

#[derive(Debug)]
pub(crate) struct SamplerInner {
    device: Rc<BoundDevice>,
    native: Cell<Option<NativeSampler>>,
    label: Option<String>,
}

/// A native sampler object.  Clones share it.
#[derive(Debug, Clone)]
pub struct Sampler(pub(crate) Rc<SamplerInner>);

impl Sampler {
    pub(crate) fn new(device: &Rc<BoundDevice>, descriptor: &SamplerDescriptor) -> Result<Self, Error> {
        if descriptor.anisotropy_clamp == 0 {
            return Err(Error::InvalidDescriptor(
                "anisotropy_clamp must be at least 1".to_string(),
            ));
        }
        if descriptor.anisotropy_clamp > 1
            && !device.features.contains(Features::ANISOTROPIC_FILTERING)
        {
            return Err(Error::InvalidDescriptor(
                "anisotropic filtering is not supported by this context".to_string(),
            ));
        }
        let mut gl = device.gl()?;
        let native = gl.create_sampler().map_err(Error::Native)?;
        gl.sampler_parameter_i32(
            native,
            gl::TEXTURE_MIN_FILTER,
            min_filter(descriptor.min_filter, descriptor.mipmap_filter) as i32,
        );
        gl.sampler_parameter_i32(
            native,
            gl::TEXTURE_MAG_FILTER,
            descriptor.mag_filter.native() as i32,
        );
        gl.sampler_parameter_i32(
            native,
            gl::TEXTURE_WRAP_S,
            descriptor.address_mode_u.native() as i32,
        );
        gl.sampler_parameter_i32(
            native,
            gl::TEXTURE_WRAP_T,
            descriptor.address_mode_v.native() as i32,
        );
        gl.sampler_parameter_i32(
            native,
            gl::TEXTURE_WRAP_R,
            descriptor.address_mode_w.native() as i32,
        );
        gl.sampler_parameter_f32(native, gl::TEXTURE_MIN_LOD, descriptor.lod_min_clamp);
        gl.sampler_parameter_f32(native, gl::TEXTURE_MAX_LOD, descriptor.lod_max_clamp);
        if let Some(compare) = descriptor.compare {
            gl.sampler_parameter_i32(
                native,
                gl::TEXTURE_COMPARE_MODE,
                gl::COMPARE_REF_TO_TEXTURE as i32,
            );
            gl.sampler_parameter_i32(native, gl::TEXTURE_COMPARE_FUNC, compare.native() as i32);
        }
        if descriptor.anisotropy_clamp > 1 {
            let anisotropy = (descriptor.anisotropy_clamp as f32).min(device.limits.max_anisotropy);
            gl.sampler_parameter_f32(native, gl::TEXTURE_MAX_ANISOTROPY_EXT, anisotropy);
        }
        drop(gl);
        logwise::trace_sync!(
            "created sampler {label}",
            label = logwise::privacy::LogIt(&descriptor.label)
        );
        Ok(Sampler(Rc::new(SamplerInner {
            device: device.clone(),
            native: Cell::new(Some(native)),
            label: descriptor.label.map(str::to_string),
        })))
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    /// Deletes the native sampler through the device that created it.
    ///
    /// Calling this more than once does nothing.  Bind groups that still refer to the sampler
    /// fail when they are next applied.
    pub fn destroy(&self) {
        if let Some(native) = self.0.native.take() {
            self.0.device.release(NativeObject::Sampler(native));
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.native.get().is_none()
    }

    pub(crate) fn native(&self) -> Result<NativeSampler, Error> {
        self.0
            .native
            .get()
            .ok_or_else(|| Error::InvalidState("sampler was destroyed".to_string()))
    }
}

impl PartialEq for Sampler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Drop for SamplerInner {
    fn drop(&mut self) {
        if let Some(native) = self.native.take() {
            self.device.release(NativeObject::Sampler(native));
        }
    }
}
