// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! descriptor_bridge runs a modern descriptor-based GPU API on top of an immediate-mode GL context.

Here is a quick chart of how the two models differ, and what this crate does about it:

| Concept          | Descriptor API                        | Immediate-mode GL                         | Bridge                                                       |
|------------------|---------------------------------------|-------------------------------------------|--------------------------------------------------------------|
| Resource binding | `(group, binding)` pairs in layouts   | Flat per-kind slot numbers                | [bindings::slots] assigns slots per pipeline layout          |
| Samplers         | Separate objects, paired in shaders   | Bound per texture unit                    | Pairings resolved at link time, rebound per draw             |
| Pipelines        | Immutable state objects               | Global mutable state                      | Reapplied in full at every draw                              |
| Commands         | Recorded, submitted later             | Executed immediately                      | Deferred operations replayed in order at submit              |
| Render targets   | Attachments with load and store ops   | Framebuffer objects and clears            | Framebuffers created per pass, cleared per load op           |
| Multisampling    | Resolve targets on attachments        | Multisampled renderbuffers plus blits     | Renderbuffers per pass, blitted on end                       |
| Readback         | Async buffer mapping                  | Synchronous reads, fences                 | Fence polling with cooperative yields                        |

# Getting started

Everything starts from a [GlContext]: an implementation of the native entry points.  Wrap one in
a [Device], create resources from it, record a [images::CommandEncoder] and submit through
[images::Queue].

```
use descriptor_bridge::{Device, DeviceConfig, HeadlessContext};
use descriptor_bridge::bindings::{BufferDescriptor, visible_to::BufferUsages};

let device = Device::new(HeadlessContext::new(), DeviceConfig::default()).unwrap();
let buffer = device
    .create_buffer(&BufferDescriptor {
        label: Some("uniforms"),
        size: 64,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
    .unwrap();
device.queue().write_buffer(&buffer, 0, &[0; 16]).unwrap();
```

[HeadlessContext] records and simulates calls without a GPU, which is what the tests run on.

# Threading

A native context belongs to one thread, and so does everything here.  Types are `!Send` on
purpose.  Async operations never block; they poll the context and yield to the executor with
[cooperative::yield_now].
*/

logwise::declare_logging_domain!();

pub mod bindings;
pub mod cooperative;
pub mod images;
mod imp;
pub mod pixel_formats;

pub use images::device::{Device, DeviceConfig, Features, Limits};
pub use imp::gl::{
    GlContext, NativeBuffer, NativeFence, NativeFramebuffer, NativeProgram, NativeRenderbuffer,
    NativeSampler, NativeShader, NativeTexture, NativeUniformLocation, NativeVertexArray, consts,
};
pub use imp::headless::{GlCall, HeadlessContext, LiveObjects};
pub use imp::{Error, UnsupportedOperation};
