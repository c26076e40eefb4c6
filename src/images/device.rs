// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The device: one native context and every resource created on it.
//!
//! A [Device] wraps a [GlContext] the caller already created.  Binding discovers optional
//! features from the context's extensions, reads its limits, and sets up the state the
//! emulation relies on.  Every factory lives here.
//!
//! The device is single-threaded.  Clones share it; the context is torn down (cached programs,
//! shaders and the vertex array deleted) when the last clone and the last resource created from
//! it are gone.

use std::fmt::Formatter;
use std::rc::Rc;

use crate::bindings::bind_group::{BindGroup, BindGroupDescriptor};
use crate::bindings::buffer::{Buffer, BufferDescriptor};
use crate::bindings::layout::{
    BindGroupLayout, BindGroupLayoutDescriptor, PipelineLayout, PipelineLayoutDescriptor,
};
use crate::bindings::sampler::{Sampler, SamplerDescriptor};
use crate::bindings::texture::{Texture, TextureDescriptor};
use crate::cooperative::CancellationToken;
use crate::images::command::CommandEncoder;
use crate::images::pipeline::{RenderPipeline, RenderPipelineDescriptor};
use crate::images::queue::Queue;
use crate::images::shader::{ShaderModule, ShaderModuleDescriptor};
use crate::imp::gl::GlContext;
use crate::imp::gl::consts as gl;
use crate::imp::{self, Error};

bitflags::bitflags! {
    /// Optional capabilities, discovered from the context's extensions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u32 {
        const TEXTURE_COMPRESSION_S3TC = 1 << 0;
        const TEXTURE_COMPRESSION_BPTC = 1 << 1;
        const TEXTURE_COMPRESSION_ETC2 = 1 << 2;
        const TEXTURE_COMPRESSION_ASTC = 1 << 3;
        const ANISOTROPIC_FILTERING = 1 << 4;
        /// Program links can be polled without blocking.
        const PARALLEL_SHADER_COMPILE = 1 << 5;
        /// Float formats can be rendered to.
        const FLOAT_COLOR_BUFFER = 1 << 6;
    }
}

/// Extensions that provide each feature.  Any one of the names is enough.
const FEATURE_EXTENSIONS: &[(Features, &[&str])] = &[
    (
        Features::TEXTURE_COMPRESSION_S3TC,
        &[
            "WEBGL_compressed_texture_s3tc",
            "EXT_texture_compression_s3tc",
            "WEBKIT_WEBGL_compressed_texture_s3tc",
        ],
    ),
    (
        Features::TEXTURE_COMPRESSION_BPTC,
        &["EXT_texture_compression_bptc"],
    ),
    (
        Features::TEXTURE_COMPRESSION_ETC2,
        &["WEBGL_compressed_texture_etc", "OES_compressed_ETC2_RGB8_texture"],
    ),
    (
        Features::TEXTURE_COMPRESSION_ASTC,
        &[
            "WEBGL_compressed_texture_astc",
            "KHR_texture_compression_astc_ldr",
        ],
    ),
    (
        Features::ANISOTROPIC_FILTERING,
        &[
            "EXT_texture_filter_anisotropic",
            "WEBKIT_EXT_texture_filter_anisotropic",
        ],
    ),
    (
        Features::PARALLEL_SHADER_COMPILE,
        &["KHR_parallel_shader_compile"],
    ),
    (
        Features::FLOAT_COLOR_BUFFER,
        &["EXT_color_buffer_float"],
    ),
];

impl Features {
    /// Enables every extension the context offers that maps to a feature.
    pub(crate) fn enable(gl: &mut dyn GlContext) -> Features {
        let supported = gl.supported_extensions();
        let mut features = Features::empty();
        for (feature, names) in FEATURE_EXTENSIONS {
            for name in *names {
                let offered = supported
                    .iter()
                    .any(|s| s.strip_prefix("GL_").unwrap_or(s) == *name);
                if offered && gl.enable_extension(name) {
                    features |= *feature;
                    break;
                }
            }
        }
        features
    }
}

/// Limits read from the context when the device is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub max_texture_dimension_2d: u32,
    pub max_texture_dimension_3d: u32,
    pub max_texture_array_layers: u32,
    pub max_cube_map_dimension: u32,
    pub max_uniform_buffer_bindings: u32,
    pub max_uniform_block_size: u32,
    pub min_uniform_buffer_offset_alignment: u32,
    pub max_texture_units: u32,
    pub max_vertex_attributes: u32,
    pub max_samples: u32,
    pub max_color_attachments: u32,
    /// 1.0 without anisotropic filtering.
    pub max_anisotropy: f32,
}

impl Limits {
    pub(crate) fn query(gl: &dyn GlContext, features: Features) -> Limits {
        let max_anisotropy = if features.contains(Features::ANISOTROPIC_FILTERING) {
            gl.get_parameter_f32(gl::MAX_TEXTURE_MAX_ANISOTROPY_EXT).max(1.0)
        } else {
            1.0
        };
        Limits {
            max_texture_dimension_2d: gl.get_parameter_u32(gl::MAX_TEXTURE_SIZE),
            max_texture_dimension_3d: gl.get_parameter_u32(gl::MAX_3D_TEXTURE_SIZE),
            max_texture_array_layers: gl.get_parameter_u32(gl::MAX_ARRAY_TEXTURE_LAYERS),
            max_cube_map_dimension: gl.get_parameter_u32(gl::MAX_CUBE_MAP_TEXTURE_SIZE),
            max_uniform_buffer_bindings: gl.get_parameter_u32(gl::MAX_UNIFORM_BUFFER_BINDINGS),
            max_uniform_block_size: gl.get_parameter_u32(gl::MAX_UNIFORM_BLOCK_SIZE),
            min_uniform_buffer_offset_alignment: gl
                .get_parameter_u32(gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT),
            max_texture_units: gl.get_parameter_u32(gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS),
            max_vertex_attributes: gl.get_parameter_u32(gl::MAX_VERTEX_ATTRIBS),
            max_samples: gl.get_parameter_u32(gl::MAX_SAMPLES),
            max_color_attachments: gl
                .get_parameter_u32(gl::MAX_COLOR_ATTACHMENTS)
                .min(gl.get_parameter_u32(gl::MAX_DRAW_BUFFERS)),
            max_anisotropy,
        }
    }
}

/// Device options.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Checks every pass framebuffer for completeness, failing the submit if one is incomplete.
    ///
    /// The check is a synchronous round trip on most drivers.
    pub check_framebuffer_status: bool,
    /// Polls program completion during async pipeline creation when the context supports it.
    pub parallel_compile: bool,
    pub label: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            check_framebuffer_status: false,
            parallel_compile: true,
            label: None,
        }
    }
}

/// Clones share the device.
#[derive(Clone)]
pub struct Device(pub(crate) Rc<imp::BoundDevice>);

impl Device {
    /// Binds a device to `context`.
    pub fn new(context: impl GlContext + 'static, config: DeviceConfig) -> Result<Device, Error> {
        Ok(Device(Rc::new(imp::BoundDevice::bind(
            Box::new(context),
            config,
        )?)))
    }

    pub fn features(&self) -> Features {
        self.0.features
    }

    pub fn limits(&self) -> &Limits {
        &self.0.limits
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.0.config
    }

    pub fn queue(&self) -> Queue {
        Queue::new(self.clone())
    }

    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<Buffer, Error> {
        Buffer::new(&self.0, descriptor)
    }

    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<Texture, Error> {
        Texture::new(&self.0, descriptor)
    }

    pub fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<Sampler, Error> {
        Sampler::new(&self.0, descriptor)
    }

    pub fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayout, Error> {
        BindGroupLayout::new(descriptor)
    }

    pub fn create_pipeline_layout(&self, descriptor: &PipelineLayoutDescriptor) -> PipelineLayout {
        PipelineLayout::new(descriptor)
    }

    pub fn create_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<BindGroup, Error> {
        BindGroup::new(descriptor)
    }

    /// Compiles a shader stage.  Identical descriptors return the same module.
    pub fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModule, Error> {
        imp::program::compile_module(&self.0, descriptor)
    }

    /// Links (or reuses) the program and captures the pipeline state.
    pub fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipeline, Error> {
        RenderPipeline::new(&self.0, descriptor)
    }

    /// Like [Self::create_render_pipeline], yielding to the executor while the link completes.
    ///
    /// Returns [Error::Cancelled] if `cancel` is set before the link finishes.
    pub async fn create_render_pipeline_async(
        &self,
        descriptor: &RenderPipelineDescriptor<'_>,
        cancel: Option<&CancellationToken>,
    ) -> Result<RenderPipeline, Error> {
        RenderPipeline::new_async(&self.0, descriptor, cancel).await
    }

    pub fn create_command_encoder(&self, label: Option<&str>) -> CommandEncoder {
        CommandEncoder::new(self.clone(), label)
    }

    /// Number of linked programs in the cache.
    pub fn cached_program_count(&self) -> usize {
        self.0.programs.borrow().program_count()
    }

    /// Number of compiled modules in the cache.
    pub fn cached_module_count(&self) -> usize {
        self.0.programs.borrow().module_count()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Device {}

impl std::hash::Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0), state);
    }
}
