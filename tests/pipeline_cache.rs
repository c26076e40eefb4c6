// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Module and program caching, async linking, and shader failures.

use std::future::Future;
use std::pin::pin;
use std::task::{Context, Poll};

use descriptor_bridge::bindings::{PipelineLayout, PipelineLayoutDescriptor};
use descriptor_bridge::cooperative::CancellationToken;
use descriptor_bridge::images::{
    ColorTargetState, FragmentState, MultisampleState, PrimitiveState, RenderPipelineDescriptor,
    ShaderModule, ShaderModuleDescriptor, ShaderStage, VertexState,
};
use descriptor_bridge::pixel_formats::TextureFormat;
use descriptor_bridge::{Device, DeviceConfig, Error, Features, HeadlessContext};

const VERTEX: &str = "#version 300 es
void main() { gl_Position = vec4(0.0, 0.0, 0.0, 1.0); }
";

const FRAGMENT_WHITE: &str = "#version 300 es
precision mediump float;
out vec4 color;
void main() { color = vec4(1.0); }
";

const FRAGMENT_BLACK: &str = "#version 300 es
precision mediump float;
out vec4 color;
void main() { color = vec4(0.0, 0.0, 0.0, 1.0); }
";

fn device(context: &HeadlessContext) -> Device {
    Device::new(context.clone(), DeviceConfig::default()).unwrap()
}

fn empty_layout(device: &Device) -> PipelineLayout {
    device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[],
    })
}

fn module(device: &Device, stage: ShaderStage, source: &str) -> ShaderModule {
    device
        .create_shader_module(&ShaderModuleDescriptor::new(stage, source))
        .unwrap()
}

fn descriptor<'a>(
    layout: &'a PipelineLayout,
    vertex: &ShaderModule,
    fragment: &ShaderModule,
) -> RenderPipelineDescriptor<'a> {
    RenderPipelineDescriptor {
        label: None,
        layout,
        vertex: VertexState {
            module: vertex.clone(),
            buffers: Vec::new(),
        },
        fragment: FragmentState {
            module: fragment.clone(),
            targets: vec![Some(ColorTargetState::new(TextureFormat::Rgba8Unorm))],
        },
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
    }
}

fn count(context: &HeadlessContext, name: &str) -> usize {
    context.calls().iter().filter(|c| c.name == name).count()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn identical_module_descriptors_share_a_module() {
    let context = HeadlessContext::new();
    let device = device(&context);
    let a = module(&device, ShaderStage::Vertex, VERTEX);
    let b = module(&device, ShaderStage::Vertex, VERTEX);
    assert_eq!(a, b);
    assert_eq!(count(&context, "create_shader"), 1);

    let white = module(&device, ShaderStage::Fragment, FRAGMENT_WHITE);
    let black = module(&device, ShaderStage::Fragment, FRAGMENT_BLACK);
    assert_ne!(white, black);
    assert_eq!(device.cached_module_count(), 3);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn same_modules_link_once() {
    let context = HeadlessContext::new();
    let device = device(&context);
    let layout = empty_layout(&device);
    let vertex = module(&device, ShaderStage::Vertex, VERTEX);
    let white = module(&device, ShaderStage::Fragment, FRAGMENT_WHITE);

    let first = device
        .create_render_pipeline(&descriptor(&layout, &vertex, &white))
        .unwrap();
    let second = device
        .create_render_pipeline(&descriptor(&layout, &vertex, &white))
        .unwrap();
    // distinct pipelines, one program
    assert_ne!(first, second);
    assert!(first.shares_program_with(&second));
    assert_eq!(device.cached_program_count(), 1);
    assert_eq!(count(&context, "link_program"), 1);

    let black = module(&device, ShaderStage::Fragment, FRAGMENT_BLACK);
    let third = device
        .create_render_pipeline(&descriptor(&layout, &vertex, &black))
        .unwrap();
    assert!(!third.shares_program_with(&first));
    assert_eq!(device.cached_program_count(), 2);
    assert_eq!(count(&context, "link_program"), 2);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn async_link_polls_for_completion() {
    let context = HeadlessContext::new().with_extensions(&["GL_KHR_parallel_shader_compile"]);
    context.set_completion_polls(3);
    let device = device(&context);
    assert!(device.features().contains(Features::PARALLEL_SHADER_COMPILE));
    let layout = empty_layout(&device);
    let vertex = module(&device, ShaderStage::Vertex, VERTEX);
    let white = module(&device, ShaderStage::Fragment, FRAGMENT_WHITE);

    let pipeline = test_executors::spin_on(
        device.create_render_pipeline_async(&descriptor(&layout, &vertex, &white), None),
    )
    .unwrap();
    assert_eq!(count(&context, "get_program_completion_status"), 4);

    // the blocking path finds the program the async one linked
    let again = device
        .create_render_pipeline(&descriptor(&layout, &vertex, &white))
        .unwrap();
    assert!(again.shares_program_with(&pipeline));
    assert_eq!(count(&context, "link_program"), 1);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn async_link_without_the_extension_does_not_poll() {
    let context = HeadlessContext::new();
    context.set_completion_polls(3);
    let device = device(&context);
    assert!(!device.features().contains(Features::PARALLEL_SHADER_COMPILE));
    let layout = empty_layout(&device);
    let vertex = module(&device, ShaderStage::Vertex, VERTEX);
    let white = module(&device, ShaderStage::Fragment, FRAGMENT_WHITE);

    test_executors::spin_on(
        device.create_render_pipeline_async(&descriptor(&layout, &vertex, &white), None),
    )
    .unwrap();
    assert_eq!(count(&context, "get_program_completion_status"), 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn async_link_without_the_extension_is_ready_on_first_poll() {
    let context = HeadlessContext::new();
    let device = device(&context);
    let layout = empty_layout(&device);
    let vertex = module(&device, ShaderStage::Vertex, VERTEX);
    let white = module(&device, ShaderStage::Fragment, FRAGMENT_WHITE);
    let desc = descriptor(&layout, &vertex, &white);

    let mut link = pin!(device.create_render_pipeline_async(&desc, None));
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    match link.as_mut().poll(&mut cx) {
        Poll::Ready(Ok(_)) => {}
        other => panic!("expected a linked pipeline, got {other:?}"),
    }
    assert_eq!(device.cached_program_count(), 1);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn cancelled_before_start() {
    let context = HeadlessContext::new();
    let device = device(&context);
    let layout = empty_layout(&device);
    let vertex = module(&device, ShaderStage::Vertex, VERTEX);
    let white = module(&device, ShaderStage::Fragment, FRAGMENT_WHITE);
    let token = CancellationToken::new();
    token.cancel();

    let result = test_executors::spin_on(
        device.create_render_pipeline_async(&descriptor(&layout, &vertex, &white), Some(&token)),
    );
    assert!(matches!(result, Err(Error::Cancelled)), "{result:?}");
    assert_eq!(count(&context, "create_program"), 0);
    assert_eq!(device.cached_program_count(), 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn cancelled_while_linking_releases_the_program() {
    let context = HeadlessContext::new().with_extensions(&["KHR_parallel_shader_compile"]);
    context.set_completion_polls(100);
    let device = device(&context);
    let layout = empty_layout(&device);
    let vertex = module(&device, ShaderStage::Vertex, VERTEX);
    let white = module(&device, ShaderStage::Fragment, FRAGMENT_WHITE);
    let token = CancellationToken::new();
    let desc = descriptor(&layout, &vertex, &white);

    let mut link = pin!(device.create_render_pipeline_async(&desc, Some(&token)));
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    assert!(link.as_mut().poll(&mut cx).is_pending());
    assert_eq!(context.live_objects().programs, 1);

    token.cancel();
    match link.as_mut().poll(&mut cx) {
        Poll::Ready(Err(Error::Cancelled)) => {}
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(context.live_objects().programs, 0);
    assert_eq!(device.cached_program_count(), 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn compile_failure_reports_the_stage_and_log() {
    let context = HeadlessContext::new();
    let device = device(&context);
    let result = device.create_shader_module(&ShaderModuleDescriptor::new(
        ShaderStage::Fragment,
        "#version 300 es\n#error broken\nvoid main() {}\n",
    ));
    match result {
        Err(Error::Compile { stage, log }) => {
            assert_eq!(stage, ShaderStage::Fragment);
            assert!(!log.is_empty());
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert_eq!(device.cached_module_count(), 0);
    assert_eq!(context.live_objects().shaders, 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn link_failure_is_not_cached() {
    let context = HeadlessContext::new();
    let device = device(&context);
    let layout = empty_layout(&device);
    let vertex = module(&device, ShaderStage::Vertex, VERTEX);
    let broken = module(
        &device,
        ShaderStage::Fragment,
        "#version 300 es\n// #link_error\nvoid main() {}\n",
    );

    for _ in 0..2 {
        let result = device.create_render_pipeline(&descriptor(&layout, &vertex, &broken));
        assert!(matches!(result, Err(Error::Link { .. })), "{result:?}");
    }
    // each attempt links again
    assert_eq!(count(&context, "link_program"), 2);
    assert_eq!(device.cached_program_count(), 0);
    assert_eq!(context.live_objects().programs, 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn stages_must_match_their_slot() {
    let context = HeadlessContext::new();
    let device = device(&context);
    let layout = empty_layout(&device);
    let vertex = module(&device, ShaderStage::Vertex, VERTEX);
    let result = device.create_render_pipeline(&descriptor(&layout, &vertex, &vertex));
    assert!(matches!(result, Err(Error::InvalidDescriptor(_))), "{result:?}");
}
