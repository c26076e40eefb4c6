// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Devices, pipelines, and recording and submitting work. */

pub mod command;
pub mod device;
pub mod pipeline;
pub mod queue;
pub mod render_pass;
pub mod shader;
pub mod vertex_layout;

pub use command::{CommandBuffer, CommandEncoder, RenderPassEncoder};
pub use device::{Device, DeviceConfig, Features, Limits};
pub use pipeline::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, ColorTargetState, ColorWrites,
    DepthBiasState, DepthStencilState, Face, FragmentState, FrontFace, IndexFormat,
    MultisampleState, PrimitiveState, PrimitiveTopology, RenderPipeline,
    RenderPipelineDescriptor, StencilFaceState, StencilOperation, StencilState, VertexState,
};
pub use queue::Queue;
pub use render_pass::{
    Color, LoadOp, Operations, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPassDescriptor, StoreOp,
};
pub use shader::{ShaderModule, ShaderModuleDescriptor, ShaderStage};
pub use vertex_layout::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};
