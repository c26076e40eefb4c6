// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Render pipelines.

A pipeline is a linked program plus a snapshot of the fixed-function state it was described
with.  The context has no pipeline objects, so that state is re-applied on every draw.

Programs come from the device's program cache, keyed by the (vertex, fragment) module pair.
Binding slots are assigned from the pipeline layout; see [crate::bindings::slots].
*/

use std::rc::Rc;

use crate::bindings::layout::PipelineLayout;
use crate::bindings::sampler::CompareFunction;
use crate::bindings::slots::SlotTable;
use crate::cooperative::CancellationToken;
use crate::images::shader::{ShaderModule, ShaderStage};
use crate::images::vertex_layout::VertexBufferLayout;
use crate::imp::gl::consts as gl;
use crate::imp::program::{self, LinkedProgram, SamplerPairing};
use crate::imp::{BoundDevice, Error};
use crate::pixel_formats::TextureFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl PrimitiveTopology {
    pub(crate) const fn native(self) -> u32 {
        match self {
            PrimitiveTopology::PointList => gl::POINTS,
            PrimitiveTopology::LineList => gl::LINES,
            PrimitiveTopology::LineStrip => gl::LINE_STRIP,
            PrimitiveTopology::TriangleList => gl::TRIANGLES,
            PrimitiveTopology::TriangleStrip => gl::TRIANGLE_STRIP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub(crate) const fn native(self) -> u32 {
        match self {
            IndexFormat::Uint16 => gl::UNSIGNED_SHORT,
            IndexFormat::Uint32 => gl::UNSIGNED_INT,
        }
    }
    pub const fn size(self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}

impl FrontFace {
    pub(crate) const fn native(self) -> u32 {
        match self {
            FrontFace::Ccw => gl::CCW,
            FrontFace::Cw => gl::CW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
}

impl Face {
    pub(crate) const fn native(self) -> u32 {
        match self {
            Face::Front => gl::FRONT,
            Face::Back => gl::BACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrimitiveState {
    pub topology: PrimitiveTopology,
    pub strip_index_format: Option<IndexFormat>,
    pub front_face: FrontFace,
    /// `None` disables culling.
    pub cull_mode: Option<Face>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
    Constant,
    OneMinusConstant,
}

impl BlendFactor {
    pub(crate) const fn native(self) -> u32 {
        match self {
            BlendFactor::Zero => gl::ZERO,
            BlendFactor::One => gl::ONE,
            BlendFactor::Src => gl::SRC_COLOR,
            BlendFactor::OneMinusSrc => gl::ONE_MINUS_SRC_COLOR,
            BlendFactor::SrcAlpha => gl::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
            BlendFactor::Dst => gl::DST_COLOR,
            BlendFactor::OneMinusDst => gl::ONE_MINUS_DST_COLOR,
            BlendFactor::DstAlpha => gl::DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => gl::ONE_MINUS_DST_ALPHA,
            BlendFactor::SrcAlphaSaturated => gl::SRC_ALPHA_SATURATE,
            BlendFactor::Constant => gl::CONSTANT_COLOR,
            BlendFactor::OneMinusConstant => gl::ONE_MINUS_CONSTANT_COLOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl BlendOperation {
    pub(crate) const fn native(self) -> u32 {
        match self {
            BlendOperation::Add => gl::FUNC_ADD,
            BlendOperation::Subtract => gl::FUNC_SUBTRACT,
            BlendOperation::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
            BlendOperation::Min => gl::MIN,
            BlendOperation::Max => gl::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl BlendComponent {
    pub const REPLACE: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        operation: BlendOperation::Add,
    };
    pub const OVER: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    pub const REPLACE: Self = Self {
        color: BlendComponent::REPLACE,
        alpha: BlendComponent::REPLACE,
    };
    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent::OVER,
    };
    pub const PREMULTIPLIED_ALPHA_BLENDING: Self = Self {
        color: BlendComponent::OVER,
        alpha: BlendComponent::OVER,
    };
}

bitflags::bitflags! {
    /// Channels a color target writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u32 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const COLOR = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
        const ALL = Self::COLOR.bits() | Self::ALPHA.bits();
    }
}

impl Default for ColorWrites {
    fn default() -> Self {
        ColorWrites::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetState {
    pub format: TextureFormat,
    pub blend: Option<BlendState>,
    pub write_mask: ColorWrites,
}

impl ColorTargetState {
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            blend: None,
            write_mask: ColorWrites::ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Invert,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
}

impl StencilOperation {
    pub(crate) const fn native(self) -> u32 {
        match self {
            StencilOperation::Keep => gl::KEEP,
            StencilOperation::Zero => gl::ZERO,
            StencilOperation::Replace => gl::REPLACE,
            StencilOperation::Invert => gl::INVERT,
            StencilOperation::IncrementClamp => gl::INCR,
            StencilOperation::DecrementClamp => gl::DECR,
            StencilOperation::IncrementWrap => gl::INCR_WRAP,
            StencilOperation::DecrementWrap => gl::DECR_WRAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl StencilFaceState {
    pub const IGNORE: Self = Self {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self::IGNORE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub front: StencilFaceState,
    pub back: StencilFaceState,
    pub read_mask: u32,
    pub write_mask: u32,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            front: StencilFaceState::IGNORE,
            back: StencilFaceState::IGNORE,
            read_mask: 0xff,
            write_mask: 0xff,
        }
    }
}

impl StencilState {
    /// Whether any face can fail or modify the buffer.
    pub fn is_enabled(&self) -> bool {
        self.front != StencilFaceState::IGNORE || self.back != StencilFaceState::IGNORE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBiasState {
    pub constant: i32,
    pub slope_scale: f32,
    /// Not supported by the context; nonzero values are ignored with a warning.
    pub clamp: f32,
}

impl DepthBiasState {
    pub fn is_enabled(&self) -> bool {
        self.constant != 0 || self.slope_scale != 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub stencil: StencilState,
    pub bias: DepthBiasState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultisampleState {
    pub count: u32,
    pub mask: u64,
    pub alpha_to_coverage_enabled: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VertexState {
    pub module: ShaderModule,
    /// Slot `i` is `buffers[i]`.
    pub buffers: Vec<VertexBufferLayout>,
}

#[derive(Debug, Clone)]
pub struct FragmentState {
    pub module: ShaderModule,
    /// Color attachment `i` is `targets[i]`.  `None` leaves the attachment unwritten.
    pub targets: Vec<Option<ColorTargetState>>,
}

#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    pub label: Option<&'a str>,
    pub layout: &'a PipelineLayout,
    pub vertex: VertexState,
    pub fragment: FragmentState,
    pub primitive: PrimitiveState,
    pub depth_stencil: Option<DepthStencilState>,
    pub multisample: MultisampleState,
}

#[derive(Debug)]
pub(crate) struct RenderPipelineInner {
    pub(crate) label: Option<String>,
    pub(crate) layout: PipelineLayout,
    pub(crate) program: Rc<LinkedProgram>,
    pub(crate) slots: SlotTable,
    pub(crate) sampler_pairings: Vec<SamplerPairing>,
    pub(crate) vertex_buffers: Vec<VertexBufferLayout>,
    pub(crate) targets: Vec<Option<ColorTargetState>>,
    pub(crate) primitive: PrimitiveState,
    pub(crate) depth_stencil: Option<DepthStencilState>,
    pub(crate) multisample: MultisampleState,
}

/// Clones share the pipeline; identity decides whether setting it again is a change.
#[derive(Debug, Clone)]
pub struct RenderPipeline(pub(crate) Rc<RenderPipelineInner>);

fn validate(device: &BoundDevice, descriptor: &RenderPipelineDescriptor) -> Result<(), Error> {
    if descriptor.vertex.module.stage() != ShaderStage::Vertex {
        return Err(Error::InvalidDescriptor(
            "vertex state needs a vertex module".to_string(),
        ));
    }
    if descriptor.fragment.module.stage() != ShaderStage::Fragment {
        return Err(Error::InvalidDescriptor(
            "fragment state needs a fragment module".to_string(),
        ));
    }
    if descriptor.fragment.targets.len() as u32 > device.limits.max_color_attachments {
        return Err(Error::InvalidDescriptor(format!(
            "{} color targets exceed the limit of {}",
            descriptor.fragment.targets.len(),
            device.limits.max_color_attachments
        )));
    }
    let mut locations = Vec::new();
    for layout in &descriptor.vertex.buffers {
        for attribute in &layout.attributes {
            if attribute.shader_location >= device.limits.max_vertex_attributes {
                return Err(Error::InvalidDescriptor(format!(
                    "attribute location {} exceeds the limit of {}",
                    attribute.shader_location, device.limits.max_vertex_attributes
                )));
            }
            if locations.contains(&attribute.shader_location) {
                return Err(Error::InvalidDescriptor(format!(
                    "attribute location {} used twice",
                    attribute.shader_location
                )));
            }
            locations.push(attribute.shader_location);
        }
    }
    if let Some(ds) = &descriptor.depth_stencil {
        if !ds.format.has_depth() && !ds.format.has_stencil() {
            return Err(Error::InvalidDescriptor(format!(
                "{:?} is not a depth or stencil format",
                ds.format
            )));
        }
        if ds.bias.clamp != 0.0 {
            logwise::warn_sync!("depth bias clamp is not supported and will be ignored");
        }
    }
    Ok(())
}

impl RenderPipeline {
    pub(crate) fn new(
        device: &BoundDevice,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<Self, Error> {
        validate(device, descriptor)?;
        let slots = SlotTable::allocate(descriptor.layout);
        let program = program::link(
            device,
            &descriptor.vertex.module,
            &descriptor.fragment.module,
            &slots,
        )?;
        Ok(Self::assemble(descriptor, program, slots))
    }

    pub(crate) async fn new_async(
        device: &BoundDevice,
        descriptor: &RenderPipelineDescriptor<'_>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self, Error> {
        validate(device, descriptor)?;
        let slots = SlotTable::allocate(descriptor.layout);
        let program = program::link_async(
            device,
            &descriptor.vertex.module,
            &descriptor.fragment.module,
            &slots,
            cancel,
        )
        .await?;
        Ok(Self::assemble(descriptor, program, slots))
    }

    fn assemble(
        descriptor: &RenderPipelineDescriptor,
        program: Rc<LinkedProgram>,
        slots: SlotTable,
    ) -> Self {
        let sampler_pairings = program::sampler_pairings(&program);
        logwise::debuginternal_sync!(
            "pipeline {label}: {uniforms} uniform slots, {textures} texture slots",
            label = logwise::privacy::LogIt(&descriptor.label),
            uniforms = slots.uniform_slot_count(),
            textures = slots.texture_slot_count()
        );
        RenderPipeline(Rc::new(RenderPipelineInner {
            label: descriptor.label.map(str::to_string),
            layout: descriptor.layout.clone(),
            program,
            slots,
            sampler_pairings,
            vertex_buffers: descriptor.vertex.buffers.clone(),
            targets: descriptor.fragment.targets.clone(),
            primitive: descriptor.primitive,
            depth_stencil: descriptor.depth_stencil,
            multisample: descriptor.multisample,
        }))
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    pub fn layout(&self) -> &PipelineLayout {
        &self.0.layout
    }

    /// Slot assignment derived from the layout.
    pub fn slots(&self) -> &SlotTable {
        &self.0.slots
    }

    /// Whether two pipelines share one linked program.
    pub fn shares_program_with(&self, other: &RenderPipeline) -> bool {
        Rc::ptr_eq(&self.0.program, &other.0.program)
    }
}

impl PartialEq for RenderPipeline {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
