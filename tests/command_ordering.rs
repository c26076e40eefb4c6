// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Recorded commands reach the context in recording order, and only at submit.

use descriptor_bridge::bindings::visible_to::{BufferUsages, ShaderStages, TextureUsages};
use descriptor_bridge::bindings::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingKind, BindingResource, Buffer, BufferBinding, BufferDescriptor,
    PipelineLayout, PipelineLayoutDescriptor, TextureDescriptor, TextureView,
    TextureViewDescriptor,
};
use descriptor_bridge::images::{
    Color, ColorTargetState, FragmentState, MultisampleState, Operations, PrimitiveState,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    ShaderModuleDescriptor, ShaderStage, VertexAttribute, VertexBufferLayout, VertexFormat,
    VertexState, VertexStepMode,
};
use descriptor_bridge::pixel_formats::TextureFormat;
use descriptor_bridge::{Device, DeviceConfig, Error, HeadlessContext, consts as gl};

const VERTEX: &str = "#version 300 es
// @group(0) @binding(0) uniform Transform
layout(std140) uniform Transform { mat4 mvp; };
layout(location = 0) in vec3 position;
void main() { gl_Position = mvp * vec4(position, 1.0); }
";

const FRAGMENT_RED: &str = "#version 300 es
precision mediump float;
out vec4 color;
void main() { color = vec4(1.0, 0.0, 0.0, 1.0); }
";

const FRAGMENT_BLUE: &str = "#version 300 es
precision mediump float;
out vec4 color;
void main() { color = vec4(0.0, 0.0, 1.0, 1.0); }
";

struct Fixture {
    context: HeadlessContext,
    device: Device,
    group_layout: BindGroupLayout,
    layout: PipelineLayout,
    target: TextureView,
}

impl Fixture {
    fn new() -> Self {
        let context = HeadlessContext::new();
        let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
        let group_layout = device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("transform"),
                entries: &[BindGroupLayoutEntry::new(
                    0,
                    ShaderStages::VERTEX,
                    BindingKind::Buffer,
                )],
            })
            .unwrap();
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[&group_layout],
        });
        let target = device
            .create_texture(&TextureDescriptor::new_2d(
                Some("target"),
                8,
                8,
                TextureFormat::Rgba8Unorm,
                TextureUsages::RENDER_ATTACHMENT,
            ))
            .unwrap()
            .create_view(&TextureViewDescriptor::default())
            .unwrap();
        Fixture {
            context,
            device,
            group_layout,
            layout,
            target,
        }
    }

    fn pipeline(&self, fragment: &str) -> RenderPipeline {
        let vertex = self
            .device
            .create_shader_module(&ShaderModuleDescriptor::new(ShaderStage::Vertex, VERTEX))
            .unwrap();
        let fragment = self
            .device
            .create_shader_module(&ShaderModuleDescriptor::new(ShaderStage::Fragment, fragment))
            .unwrap();
        self.device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: None,
                layout: &self.layout,
                vertex: VertexState {
                    module: vertex,
                    buffers: vec![VertexBufferLayout {
                        array_stride: 12,
                        step_mode: VertexStepMode::Vertex,
                        attributes: vec![VertexAttribute {
                            format: VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        }],
                    }],
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

    /// A new buffer and the native name it got.
    fn buffer(&self, usage: BufferUsages) -> (Buffer, i64) {
        let buffer = self
            .device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 64,
                usage,
                mapped_at_creation: false,
            })
            .unwrap();
        (buffer, self.last_created("create_buffer"))
    }

    fn group(&self, buffer: &Buffer) -> BindGroup {
        self.device
            .create_bind_group(&BindGroupDescriptor {
                label: None,
                layout: &self.group_layout,
                entries: &[BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Buffer(BufferBinding::whole(buffer)),
                }],
            })
            .unwrap()
    }

    fn last_created(&self, name: &str) -> i64 {
        self.context
            .calls()
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.arg(0))
            .unwrap()
    }

    fn pass_descriptor(&self) -> Vec<Option<RenderPassColorAttachment<'_>>> {
        vec![Some(RenderPassColorAttachment {
            view: &self.target,
            resolve_target: None,
            ops: Operations::clear(Color::BLACK),
        })]
    }
}

/// The program in use at the time of each draw-relevant call.
#[derive(Debug, PartialEq)]
enum Event {
    Program(i64),
    Uniform(i64),
    Vertices(i64),
    Draw(i64),
}

fn events(context: &HeadlessContext) -> Vec<Event> {
    context
        .calls()
        .iter()
        .filter_map(|c| match c.name {
            "use_program" if c.arg(0) != 0 => Some(Event::Program(c.arg(0))),
            "bind_buffer_range" => Some(Event::Uniform(c.arg(2))),
            "bind_buffer" if c.arg(0) == gl::ARRAY_BUFFER as i64 && c.arg(1) != 0 => {
                Some(Event::Vertices(c.arg(1)))
            }
            "draw_arrays_instanced" => Some(Event::Draw(c.arg(2))),
            _ => None,
        })
        .collect()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn replay_follows_recording_order() {
    let f = Fixture::new();
    let red = f.pipeline(FRAGMENT_RED);
    let red_program = f.last_created("create_program");
    let blue = f.pipeline(FRAGMENT_BLUE);
    let blue_program = f.last_created("create_program");
    let (uniforms_a, a) = f.buffer(BufferUsages::UNIFORM);
    let (uniforms_b, b) = f.buffer(BufferUsages::UNIFORM);
    let (vertices_1, v1) = f.buffer(BufferUsages::VERTEX);
    let (vertices_2, v2) = f.buffer(BufferUsages::VERTEX);
    let group_a = f.group(&uniforms_a);
    let group_b = f.group(&uniforms_b);

    let attachments = f.pass_descriptor();
    let mut encoder = f.device.create_command_encoder(Some("ordering"));
    {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &attachments,
            depth_stencil_attachment: None,
        });
        pass.set_pipeline(&red);
        pass.set_bind_group(0, &group_a);
        pass.set_vertex_buffer(0, &vertices_1, 0);
        pass.draw(0..3, 0..1);
        pass.set_bind_group(0, &group_b);
        pass.set_vertex_buffer(0, &vertices_2, 0);
        pass.draw(0..6, 0..1);
        pass.set_pipeline(&blue);
        pass.draw(0..9, 0..1);
        // same group again: not a change
        pass.set_bind_group(0, &group_b);
        pass.draw(0..12, 0..1);
    }
    let commands = encoder.finish().unwrap();
    f.context.clear_calls();
    f.device.queue().submit([commands]).unwrap();

    assert_eq!(
        events(&f.context),
        vec![
            Event::Program(red_program),
            Event::Uniform(a),
            Event::Vertices(v1),
            Event::Draw(3),
            Event::Program(red_program),
            Event::Uniform(b),
            Event::Vertices(v2),
            Event::Draw(6),
            Event::Program(blue_program),
            // a new pipeline re-applies every group
            Event::Uniform(b),
            Event::Vertices(v2),
            Event::Draw(9),
            Event::Program(blue_program),
            Event::Vertices(v2),
            Event::Draw(12),
        ]
    );
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn nothing_reaches_the_context_before_submit() {
    let f = Fixture::new();
    let pipeline = f.pipeline(FRAGMENT_RED);
    let (uniforms, _) = f.buffer(BufferUsages::UNIFORM);
    let (vertices, _) = f.buffer(BufferUsages::VERTEX);
    let group = f.group(&uniforms);
    let attachments = f.pass_descriptor();

    f.context.clear_calls();
    let mut encoder = f.device.create_command_encoder(None);
    {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &attachments,
            depth_stencil_attachment: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &group);
        pass.set_vertex_buffer(0, &vertices, 0);
        pass.draw(0..3, 0..1);
        pass.end();
    }
    assert!(encoder.operation_count() > 0);
    let commands = encoder.finish().unwrap();
    assert!(f.context.calls().is_empty());

    f.device.queue().submit([commands]).unwrap();
    let names = f.context.call_names();
    let begin = names.iter().position(|n| *n == "create_framebuffer").unwrap();
    let draw = names.iter().position(|n| *n == "draw_arrays_instanced").unwrap();
    let end = names.iter().position(|n| *n == "delete_framebuffer").unwrap();
    assert!(begin < draw && draw < end);
    assert_eq!(f.context.live_objects().framebuffers, 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn first_recording_error_is_kept() {
    let f = Fixture::new();
    let (uniforms, _) = f.buffer(BufferUsages::UNIFORM);
    let attachments = f.pass_descriptor();

    let mut encoder = f.device.create_command_encoder(Some("broken"));
    {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &attachments,
            depth_stencil_attachment: None,
        });
        // no pipeline yet
        pass.draw(0..3, 0..1);
        // a uniform buffer is not a vertex buffer
        pass.set_vertex_buffer(0, &uniforms, 0);
    }
    assert!(encoder.is_invalid());
    assert_eq!(encoder.operation_count(), 0);
    match encoder.finish() {
        Err(Error::InvalidState(msg)) => assert!(msg.contains("pipeline"), "{msg}"),
        other => panic!("expected the missing pipeline error, got {other:?}"),
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn failed_replay_tears_down_the_pass() {
    let f = Fixture::new();
    let pipeline = f.pipeline(FRAGMENT_RED);
    let (vertices, _) = f.buffer(BufferUsages::VERTEX);
    let attachments = f.pass_descriptor();

    let mut encoder = f.device.create_command_encoder(None);
    {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &attachments,
            depth_stencil_attachment: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_vertex_buffer(0, &vertices, 0);
        // group 0 is never set
        pass.draw(0..3, 0..1);
    }
    let commands = encoder.finish().unwrap();
    f.context.clear_calls();
    let result = f.device.queue().submit([commands]);
    assert!(matches!(result, Err(Error::InvalidState(_))), "{result:?}");
    assert!(!f.context.call_names().contains(&"draw_arrays_instanced"));
    assert_eq!(f.context.live_objects().framebuffers, 0);

    // the device is still usable afterwards
    let mut encoder = f.device.create_command_encoder(None);
    encoder.begin_render_pass(&RenderPassDescriptor {
        label: None,
        color_attachments: &attachments,
        depth_stencil_attachment: None,
    });
    f.device.queue().submit([encoder.finish().unwrap()]).unwrap();
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn copies_run_between_passes_in_order() {
    let f = Fixture::new();
    let queue = f.device.queue();
    let source = f
        .device
        .create_buffer(&BufferDescriptor {
            label: Some("source"),
            size: 16,
            usage: BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
        .unwrap();
    let destination = f
        .device
        .create_buffer(&BufferDescriptor {
            label: Some("destination"),
            size: 16,
            usage: BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
        .unwrap();
    queue.write_buffer(&source, 0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    let attachments = f.pass_descriptor();
    let mut encoder = f.device.create_command_encoder(None);
    encoder.begin_render_pass(&RenderPassDescriptor {
        label: None,
        color_attachments: &attachments,
        depth_stencil_attachment: None,
    });
    encoder.copy_buffer_to_buffer(&source, 4, &destination, 8, 4);
    f.context.clear_calls();
    queue.submit([encoder.finish().unwrap()]).unwrap();

    let names = f.context.call_names();
    let pass_end = names.iter().position(|n| *n == "delete_framebuffer").unwrap();
    let copy = names.iter().position(|n| *n == "copy_buffer_sub_data").unwrap();
    assert!(pass_end < copy);

    let data = test_executors::spin_on(queue.read_buffer(&destination, 0, 16)).unwrap();
    assert_eq!(data, vec![0, 0, 0, 0, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0]);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn misaligned_copy_invalidates_the_encoder() {
    let f = Fixture::new();
    let (a, _) = f.buffer(BufferUsages::COPY_SRC);
    let (b, _) = f.buffer(BufferUsages::COPY_DST);
    let mut encoder = f.device.create_command_encoder(None);
    encoder.copy_buffer_to_buffer(&a, 2, &b, 0, 4);
    assert!(matches!(encoder.finish(), Err(Error::InvalidDescriptor(_))));
}
