// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Fixed-function and vertex state re-derived from the pipeline before each draw.

use descriptor_bridge::bindings::visible_to::{BufferUsages, TextureUsages};
use descriptor_bridge::bindings::{
    Buffer, BufferDescriptor, CompareFunction, PipelineLayout, PipelineLayoutDescriptor,
    TextureDescriptor, TextureView, TextureViewDescriptor,
};
use descriptor_bridge::images::{
    BlendState, Color, ColorTargetState, DepthBiasState, DepthStencilState, Face,
    FragmentState, FrontFace, IndexFormat, MultisampleState, Operations, PrimitiveState,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    ShaderModuleDescriptor, ShaderStage, StencilState, VertexAttribute, VertexBufferLayout,
    VertexFormat, VertexState, VertexStepMode,
};
use descriptor_bridge::pixel_formats::TextureFormat;
use descriptor_bridge::{Device, DeviceConfig, Error, GlCall, HeadlessContext, consts as gl};

const VERTEX: &str = "#version 300 es
layout(location = 0) in vec3 position;
layout(location = 1) in vec4 offset;
void main() { gl_Position = vec4(position, 1.0) + offset; }
";

const FRAGMENT: &str = "#version 300 es
precision mediump float;
out vec4 color;
void main() { color = vec4(1.0); }
";

const POSITION_STRIDE: u64 = 12;
const OFFSET_STRIDE: u64 = 16;

struct Fixture {
    context: HeadlessContext,
    device: Device,
    layout: PipelineLayout,
    target: TextureView,
    positions: Buffer,
    offsets: Buffer,
    indices: Buffer,
}

impl Fixture {
    fn new() -> Fixture {
        let context = HeadlessContext::new();
        let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[],
        });
        let target = device
            .create_texture(&TextureDescriptor::new_2d(
                None,
                4,
                4,
                TextureFormat::Rgba8Unorm,
                TextureUsages::RENDER_ATTACHMENT,
            ))
            .unwrap()
            .create_view(&TextureViewDescriptor::default())
            .unwrap();
        let buffer = |size, usage| {
            device
                .create_buffer(&BufferDescriptor {
                    label: None,
                    size,
                    usage,
                    mapped_at_creation: false,
                })
                .unwrap()
        };
        let positions = buffer(POSITION_STRIDE * 8, BufferUsages::VERTEX);
        let offsets = buffer(OFFSET_STRIDE * 8, BufferUsages::VERTEX);
        let indices = buffer(16, BufferUsages::INDEX);
        Fixture {
            context,
            device,
            layout,
            target,
            positions,
            offsets,
            indices,
        }
    }

    /// Positions step per vertex at slot 0, offsets per instance at slot 1.
    fn pipeline(
        &self,
        primitive: PrimitiveState,
        blend: Option<BlendState>,
        depth_stencil: Option<DepthStencilState>,
    ) -> RenderPipeline {
        let vertex = self
            .device
            .create_shader_module(&ShaderModuleDescriptor::new(ShaderStage::Vertex, VERTEX))
            .unwrap();
        let fragment = self
            .device
            .create_shader_module(&ShaderModuleDescriptor::new(ShaderStage::Fragment, FRAGMENT))
            .unwrap();
        self.device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: None,
                layout: &self.layout,
                vertex: VertexState {
                    module: vertex,
                    buffers: vec![
                        VertexBufferLayout {
                            array_stride: POSITION_STRIDE,
                            step_mode: VertexStepMode::Vertex,
                            attributes: vec![VertexAttribute {
                                format: VertexFormat::Float32x3,
                                offset: 0,
                                shader_location: 0,
                            }],
                        },
                        VertexBufferLayout {
                            array_stride: OFFSET_STRIDE,
                            step_mode: VertexStepMode::Instance,
                            attributes: vec![VertexAttribute {
                                format: VertexFormat::Float32x4,
                                offset: 0,
                                shader_location: 1,
                            }],
                        },
                    ],
                },
                fragment: FragmentState {
                    module: fragment,
                    targets: vec![Some(ColorTargetState {
                        blend,
                        ..ColorTargetState::new(TextureFormat::Rgba8Unorm)
                    })],
                },
                primitive,
                depth_stencil,
                multisample: MultisampleState::default(),
            })
            .unwrap()
    }

    /// A blending, culling, depth-testing pipeline and one with all of that off.
    fn pipelines(&self) -> (RenderPipeline, RenderPipeline) {
        let culled = PrimitiveState {
            front_face: FrontFace::Cw,
            cull_mode: Some(Face::Back),
            ..PrimitiveState::default()
        };
        let depth = DepthStencilState {
            format: TextureFormat::Depth24PlusStencil8,
            depth_write_enabled: false,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        };
        let blended = self.pipeline(culled, Some(BlendState::ALPHA_BLENDING), Some(depth));
        let plain = self.pipeline(PrimitiveState::default(), None, None);
        (blended, plain)
    }

    /// Records an indexed draw with `blended`, then an instanced draw with `plain`, and returns
    /// the calls of each draw, from the previous draw up to and including its own.
    fn record_and_submit(
        &self,
        blended: &RenderPipeline,
        plain: &RenderPipeline,
        base_vertex: i32,
    ) -> Result<Vec<Vec<GlCall>>, Error> {
        let mut encoder = self.device.create_command_encoder(None);
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &self.target,
                    resolve_target: None,
                    ops: Operations::clear(Color::BLACK),
                })],
                depth_stencil_attachment: None,
            });
            pass.set_vertex_buffer(0, &self.positions, 0);
            pass.set_vertex_buffer(1, &self.offsets, 0);
            pass.set_index_buffer(&self.indices, IndexFormat::Uint16, 0);
            pass.set_pipeline(blended);
            pass.draw_indexed(1..4, base_vertex, 0..1);
            pass.set_pipeline(plain);
            pass.draw(0..3, 2..5);
        }
        let commands = encoder.finish()?;
        self.context.clear_calls();
        self.device.queue().submit([commands])?;
        Ok(split_at_draws(self.context.calls()))
    }
}

fn split_at_draws(calls: Vec<GlCall>) -> Vec<Vec<GlCall>> {
    let mut draws = Vec::new();
    let mut current = Vec::new();
    for call in calls {
        let is_draw = call.name.starts_with("draw_arrays") || call.name.starts_with("draw_elements");
        current.push(call);
        if is_draw {
            draws.push(std::mem::take(&mut current));
        }
    }
    draws
}

fn has(calls: &[GlCall], name: &str, args: &[u32]) -> bool {
    let args: Vec<i64> = args.iter().map(|a| *a as i64).collect();
    calls.iter().any(|c| c.name == name && c.args == args)
}

/// Arguments of the last `name` call.
fn last<'a>(calls: &'a [GlCall], name: &str) -> &'a [i64] {
    &calls
        .iter()
        .rev()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no {name} call"))
        .args
}

/// `vertex_attrib_pointer_f32` arguments for `location`.
fn pointer(calls: &[GlCall], location: u32) -> Vec<i64> {
    calls
        .iter()
        .filter(|c| c.name == "vertex_attrib_pointer_f32" && c.arg(0) == location as i64)
        .map(|c| c.args.clone())
        .last()
        .unwrap_or_else(|| panic!("location {location} was never pointed"))
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn culling_follows_the_pipeline() {
    let fixture = Fixture::new();
    let (blended, plain) = fixture.pipelines();
    let draws = fixture.record_and_submit(&blended, &plain, 0).unwrap();
    assert_eq!(draws.len(), 2);

    assert!(has(&draws[0], "enable", &[gl::CULL_FACE]));
    assert_eq!(last(&draws[0], "cull_face"), &[gl::BACK as i64]);
    assert_eq!(last(&draws[0], "front_face"), &[gl::CW as i64]);

    assert!(has(&draws[1], "disable", &[gl::CULL_FACE]));
    assert!(!has(&draws[1], "enable", &[gl::CULL_FACE]));
    assert_eq!(last(&draws[1], "front_face"), &[gl::CCW as i64]);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn blending_comes_from_the_first_target() {
    let fixture = Fixture::new();
    let (blended, plain) = fixture.pipelines();
    let draws = fixture.record_and_submit(&blended, &plain, 0).unwrap();

    assert!(has(&draws[0], "enable", &[gl::BLEND]));
    assert_eq!(
        last(&draws[0], "blend_func_separate"),
        &[
            gl::SRC_ALPHA as i64,
            gl::ONE_MINUS_SRC_ALPHA as i64,
            gl::ONE as i64,
            gl::ONE_MINUS_SRC_ALPHA as i64,
        ]
    );

    assert!(has(&draws[1], "disable", &[gl::BLEND]));
    assert!(!draws[1].iter().any(|c| c.name == "blend_func_separate"));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn no_depth_stencil_turns_the_depth_test_off_and_restores_writes() {
    let fixture = Fixture::new();
    let (blended, plain) = fixture.pipelines();
    let draws = fixture.record_and_submit(&blended, &plain, 0).unwrap();

    assert!(has(&draws[0], "enable", &[gl::DEPTH_TEST]));
    assert_eq!(last(&draws[0], "depth_func"), &[gl::LESS as i64]);
    assert_eq!(last(&draws[0], "depth_mask"), &[0]);

    // the previous draw left depth writes off
    assert!(has(&draws[1], "disable", &[gl::DEPTH_TEST]));
    assert!(!has(&draws[1], "enable", &[gl::DEPTH_TEST]));
    assert_eq!(last(&draws[1], "depth_mask"), &[1]);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn instance_buffers_step_once_per_instance() {
    let fixture = Fixture::new();
    let (blended, plain) = fixture.pipelines();
    let draws = fixture.record_and_submit(&blended, &plain, 0).unwrap();

    for draw in &draws {
        assert!(has(draw, "vertex_attrib_divisor", &[0, 0]));
        assert!(has(draw, "vertex_attrib_divisor", &[1, 1]));
    }
    // instances 2..5: the instance buffer starts two strides in, the vertex buffer doesn't move
    let float = gl::FLOAT as i64;
    assert_eq!(
        pointer(&draws[1], 1),
        vec![1, 4, float, 0, OFFSET_STRIDE as i64, 2 * OFFSET_STRIDE as i64]
    );
    assert_eq!(
        pointer(&draws[1], 0),
        vec![0, 3, float, 0, POSITION_STRIDE as i64, 0]
    );
    assert_eq!(
        last(&draws[1], "draw_arrays_instanced"),
        &[gl::TRIANGLES as i64, 0, 3, 3]
    );
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn base_vertex_moves_per_vertex_buffers_only() {
    let fixture = Fixture::new();
    let (blended, plain) = fixture.pipelines();
    let draws = fixture.record_and_submit(&blended, &plain, 2).unwrap();

    let float = gl::FLOAT as i64;
    assert_eq!(
        pointer(&draws[0], 0),
        vec![0, 3, float, 0, POSITION_STRIDE as i64, 2 * POSITION_STRIDE as i64]
    );
    assert_eq!(
        pointer(&draws[0], 1),
        vec![1, 4, float, 0, OFFSET_STRIDE as i64, 0]
    );
    // indices 1..4 of u16: three indices starting two bytes in
    assert_eq!(
        last(&draws[0], "draw_elements_instanced"),
        &[gl::TRIANGLES as i64, 3, gl::UNSIGNED_SHORT as i64, 2, 1]
    );
    assert_eq!(last(&draws[0], "bind_buffer")[0], gl::ELEMENT_ARRAY_BUFFER as i64);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn base_vertex_before_the_buffer_start_fails_the_draw() {
    let fixture = Fixture::new();
    let (blended, plain) = fixture.pipelines();
    let result = fixture.record_and_submit(&blended, &plain, -1);
    assert!(matches!(result, Err(Error::InvalidState(_))), "{result:?}");
    let names = fixture.context.call_names();
    assert!(!names.contains(&"draw_elements_instanced"));
    assert!(!names.contains(&"draw_arrays_instanced"));
    assert_eq!(fixture.context.live_objects().framebuffers, 0);
}
