// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Resources and the binding model: buffers, textures, samplers, and how they reach shaders. */

pub mod annotations;
pub mod bind_group;
pub mod buffer;
pub mod layout;
pub mod sampler;
pub mod slots;
pub mod texture;
pub mod visible_to;

pub use bind_group::{BindGroup, BindGroupDescriptor, BindGroupEntry, BindingResource, BufferBinding};
pub use buffer::{Buffer, BufferDescriptor, MapState};
pub use layout::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingKind, PipelineLayout,
    PipelineLayoutDescriptor,
};
pub use sampler::{AddressMode, CompareFunction, FilterMode, Sampler, SamplerDescriptor};
pub use slots::SlotTable;
pub use texture::{
    Extent3d, Origin3d, Texture, TextureDescriptor, TextureDimension, TextureTarget, TextureView,
    TextureViewDescriptor, TextureViewDimension,
};
