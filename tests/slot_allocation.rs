// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Slot assignment from pipeline layouts, and the native calls it turns into.
//!
//! A layout `[{0, buffer}, {1, texture}, {2, sampler}]` reused for groups 0 and 1 must put the
//! buffers in uniform slots 0 and 1, the textures in texture units 0 and 1, and give the
//! samplers no slot at all.

use descriptor_bridge::bindings::visible_to::{BufferUsages, ShaderStages, TextureUsages};
use descriptor_bridge::bindings::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingKind, BindingResource, BufferBinding, BufferDescriptor,
    PipelineLayout, PipelineLayoutDescriptor, SamplerDescriptor, SlotTable, TextureDescriptor,
    TextureViewDescriptor,
};
use descriptor_bridge::images::{
    Color, ColorTargetState, FragmentState, MultisampleState, Operations, PrimitiveState,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    ShaderModuleDescriptor, ShaderStage, VertexState,
};
use descriptor_bridge::pixel_formats::TextureFormat;
use descriptor_bridge::{Device, DeviceConfig, GlCall, HeadlessContext, consts as gl};

const VERTEX: &str = "#version 300 es
// @group(0) @binding(0) uniform Globals
// @group(1) @binding(0) uniform Locals
layout(std140) uniform Globals { mat4 view; };
layout(std140) uniform Locals { mat4 model; };
void main() { gl_Position = view * model * vec4(0.0, 0.0, 0.0, 1.0); }
";

const FRAGMENT: &str = "#version 300 es
precision mediump float;
// @group(0) @binding(1) texture u_albedo0 @sampler(2)
// @group(1) @binding(1) texture u_albedo1 @sampler(2)
uniform sampler2D u_albedo0;
uniform sampler2D u_albedo1;
out vec4 color;
void main() { color = texture(u_albedo0, vec2(0.0)) * texture(u_albedo1, vec2(0.0)); }
";

fn scenario_group_layout(device: &Device) -> BindGroupLayout {
    let entries = [
        BindGroupLayoutEntry::new(0, ShaderStages::VERTEX, BindingKind::Buffer),
        BindGroupLayoutEntry::new(1, ShaderStages::FRAGMENT, BindingKind::Texture),
        BindGroupLayoutEntry::new(2, ShaderStages::FRAGMENT, BindingKind::Sampler),
    ];
    device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("material"),
            entries: &entries,
        })
        .unwrap()
}

fn scenario_layout(device: &Device) -> PipelineLayout {
    let group = scenario_group_layout(device);
    device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("scenario"),
        bind_group_layouts: &[&group, &group],
    })
}

fn pipeline(device: &Device, layout: &PipelineLayout) -> RenderPipeline {
    let vertex = device
        .create_shader_module(&ShaderModuleDescriptor::new(ShaderStage::Vertex, VERTEX))
        .unwrap();
    let fragment = device
        .create_shader_module(&ShaderModuleDescriptor::new(ShaderStage::Fragment, FRAGMENT))
        .unwrap();
    device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("scenario"),
            layout,
            vertex: VertexState {
                module: vertex,
                buffers: Vec::new(),
            },
            fragment: FragmentState {
                module: fragment,
                targets: vec![Some(ColorTargetState::new(TextureFormat::Rgba8Unorm))],
            },
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
        })
        .unwrap()
}

fn last_created(context: &HeadlessContext, name: &str) -> i64 {
    context
        .calls()
        .iter()
        .rev()
        .find(|c| c.name == name)
        .map(|c| c.arg(0))
        .unwrap()
}

fn calls_named(context: &HeadlessContext, name: &str) -> Vec<GlCall> {
    context
        .calls()
        .into_iter()
        .filter(|c| c.name == name)
        .collect()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn scenario_slot_table() {
    let device = Device::new(HeadlessContext::new(), DeviceConfig::default()).unwrap();
    let layout = scenario_layout(&device);
    let table = SlotTable::allocate(&layout);

    assert_eq!(table.uniform_slot(0, 0), Some(0));
    assert_eq!(table.uniform_slot(1, 0), Some(1));
    assert_eq!(table.texture_slot(0, 1), Some(0));
    assert_eq!(table.texture_slot(1, 1), Some(1));
    for group in 0..2 {
        assert_eq!(table.uniform_slot(group, 2), None);
        assert_eq!(table.texture_slot(group, 2), None);
    }
    assert_eq!(table.uniform_slot_count(), 2);
    assert_eq!(table.texture_slot_count(), 2);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn allocation_is_deterministic() {
    let device = Device::new(HeadlessContext::new(), DeviceConfig::default()).unwrap();
    let layout = scenario_layout(&device);
    assert_eq!(SlotTable::allocate(&layout), SlotTable::allocate(&layout));

    // a structurally identical layout built separately agrees too
    let again = scenario_layout(&device);
    assert_eq!(SlotTable::allocate(&layout), SlotTable::allocate(&again));

    let first = pipeline(&device, &layout);
    let second = pipeline(&device, &layout);
    assert_eq!(first.slots(), second.slots());
    assert_eq!(first.slots(), &SlotTable::allocate(&layout));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn link_points_names_at_slots() {
    let context = HeadlessContext::new();
    let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
    let layout = scenario_layout(&device);
    context.clear_calls();
    let _pipeline = pipeline(&device, &layout);

    let blocks: Vec<(String, i64)> = calls_named(&context, "uniform_block_binding")
        .into_iter()
        .map(|c| (c.text.clone().unwrap_or_default(), c.arg(2)))
        .collect();
    assert!(blocks.contains(&("Globals".to_string(), 0)), "{blocks:?}");
    assert!(blocks.contains(&("Locals".to_string(), 1)), "{blocks:?}");

    let samplers: Vec<(String, i64)> = calls_named(&context, "uniform_1_i32")
        .into_iter()
        .map(|c| (c.text.clone().unwrap_or_default(), c.arg(1)))
        .collect();
    assert!(samplers.contains(&("u_albedo0".to_string(), 0)), "{samplers:?}");
    assert!(samplers.contains(&("u_albedo1".to_string(), 1)), "{samplers:?}");
}

/// A bind group for the scenario layout.  The group keeps its resources alive.
fn material(device: &Device, layout: &BindGroupLayout) -> BindGroup {
    let buffer = device
        .create_buffer(&BufferDescriptor {
            label: Some("uniforms"),
            size: 64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
        .unwrap();
    let texture = device
        .create_texture(&TextureDescriptor::new_2d(
            Some("albedo"),
            2,
            2,
            TextureFormat::Rgba8Unorm,
            TextureUsages::TEXTURE_BINDING,
        ))
        .unwrap();
    let sampler = device.create_sampler(&SamplerDescriptor::default()).unwrap();
    let view = texture.create_view(&TextureViewDescriptor::default()).unwrap();
    device
        .create_bind_group(&BindGroupDescriptor {
            label: Some("material"),
            layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Buffer(BufferBinding::whole(&buffer)),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(view),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(sampler),
                },
            ],
        })
        .unwrap()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn draw_binds_each_group_at_its_slots() {
    let context = HeadlessContext::new();
    let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
    let group_layout = scenario_group_layout(&device);
    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[&group_layout, &group_layout],
    });
    let pipeline = pipeline(&device, &layout);

    let m0 = material(&device, &group_layout);
    let buffer0 = last_created(&context, "create_buffer");
    let texture0 = last_created(&context, "create_texture");
    let sampler0 = last_created(&context, "create_sampler");
    let m1 = material(&device, &group_layout);
    let buffer1 = last_created(&context, "create_buffer");
    let texture1 = last_created(&context, "create_texture");
    let sampler1 = last_created(&context, "create_sampler");

    let target = device
        .create_texture(&TextureDescriptor::new_2d(
            Some("target"),
            4,
            4,
            TextureFormat::Rgba8Unorm,
            TextureUsages::RENDER_ATTACHMENT,
        ))
        .unwrap();
    let target_view = target.create_view(&TextureViewDescriptor::default()).unwrap();

    let mut encoder = device.create_command_encoder(Some("frame"));
    {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("main"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &target_view,
                resolve_target: None,
                ops: Operations::clear(Color::BLACK),
            })],
            depth_stencil_attachment: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &m0);
        pass.set_bind_group(1, &m1);
        pass.draw(0..3, 0..1);
        pass.end();
    }
    let commands = encoder.finish().unwrap();
    context.clear_calls();
    device.queue().submit([commands]).unwrap();

    let ranges: Vec<(i64, i64)> = calls_named(&context, "bind_buffer_range")
        .iter()
        .map(|c| (c.arg(1), c.arg(2)))
        .collect();
    assert_eq!(ranges, vec![(0, buffer0), (1, buffer1)]);

    let calls = context.calls();
    let unit_of = |texture: i64| {
        let at = calls
            .iter()
            .position(|c| c.name == "bind_texture" && c.arg(1) == texture)
            .unwrap();
        calls[..at]
            .iter()
            .rev()
            .find(|c| c.name == "active_texture")
            .map(|c| c.arg(0) - gl::TEXTURE0 as i64)
            .unwrap()
    };
    assert_eq!(unit_of(texture0), 0);
    assert_eq!(unit_of(texture1), 1);

    let samplers: Vec<(i64, i64)> = calls_named(&context, "bind_sampler")
        .iter()
        .map(|c| (c.arg(0), c.arg(1)))
        .collect();
    assert_eq!(samplers, vec![(0, sampler0), (1, sampler1)]);
}
