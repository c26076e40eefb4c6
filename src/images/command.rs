// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Command recording.

A [CommandEncoder] never touches the context.  Every call appends a deferred operation, and
the operations run in append order when the finished [CommandBuffer] is submitted with
[crate::images::queue::Queue::submit].  That ordering is the only ordering guarantee: a bind
group set before a draw is visible to that draw, a copy recorded after a pass sees what the
pass rendered.

Recording errors are sticky.  The first one invalidates the encoder, and [CommandEncoder::finish]
returns it.
*/

use std::ops::Range;

use crate::bindings::bind_group::BindGroup;
use crate::bindings::buffer::Buffer;
use crate::bindings::visible_to::BufferUsages;
use crate::images::device::Device;
use crate::images::pipeline::{IndexFormat, RenderPipeline};
use crate::images::render_pass::{Color, RenderPassDescriptor};
use crate::imp::Error;
use crate::imp::draw::{self, DrawCall};
use crate::imp::gl::consts as gl;
use crate::imp::pass::PassPlan;
use crate::imp::replay::{DeferredOp, IndexBinding, Viewport};

/// Records operations for one submission.
pub struct CommandEncoder {
    device: Device,
    label: Option<String>,
    ops: Vec<DeferredOp>,
    error: Option<Error>,
}

impl CommandEncoder {
    pub(crate) fn new(device: Device, label: Option<&str>) -> Self {
        CommandEncoder {
            device,
            label: label.map(str::to_string),
            ops: Vec::new(),
            error: None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether an earlier recording error invalidated the encoder.
    pub fn is_invalid(&self) -> bool {
        self.error.is_some()
    }

    fn push(&mut self, op: DeferredOp) {
        if self.error.is_none() {
            self.ops.push(op);
        }
    }

    fn invalidate(&mut self, error: Error) {
        logwise::warn_sync!(
            "encoder {label} invalidated: {error}",
            label = logwise::privacy::LogIt(&self.label),
            error = logwise::privacy::LogIt(&error)
        );
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.ops.clear();
    }

    fn check_device(&mut self, buffer: &Buffer) -> bool {
        if std::rc::Rc::ptr_eq(buffer.device(), &self.device.0) {
            true
        } else {
            self.invalidate(Error::InvalidState(format!(
                "buffer {:?} belongs to another device",
                buffer.label()
            )));
            false
        }
    }

    /// Begins a render pass.  The pass ends when the returned encoder is ended or dropped.
    pub fn begin_render_pass(&mut self, descriptor: &RenderPassDescriptor) -> RenderPassEncoder<'_> {
        let max = self.device.limits().max_color_attachments;
        let plan = if descriptor.color_attachments.len() as u32 > max {
            Err(Error::InvalidDescriptor(format!(
                "{} color attachments exceed the limit of {}",
                descriptor.color_attachments.len(),
                max
            )))
        } else {
            PassPlan::new(descriptor)
        };
        match plan {
            Ok(plan) => {
                self.push(Box::new(move |gl, state| state.begin_pass(gl, plan)));
            }
            Err(e) => self.invalidate(e),
        }
        RenderPassEncoder {
            encoder: self,
            ended: false,
            has_pipeline: false,
            has_index_buffer: false,
        }
    }

    /// Copies `size` bytes between buffers.  Offsets and size must be multiples of 4.
    pub fn copy_buffer_to_buffer(
        &mut self,
        source: &Buffer,
        source_offset: u64,
        destination: &Buffer,
        destination_offset: u64,
        size: u64,
    ) {
        if !self.check_device(source) || !self.check_device(destination) {
            return;
        }
        let invalid = if source_offset % 4 != 0 || destination_offset % 4 != 0 || size % 4 != 0 {
            Some("copy offsets and size must be multiples of 4".to_string())
        } else if source_offset + size > source.size() {
            Some(format!("copy reads past the end of {:?}", source.label()))
        } else if destination_offset + size > destination.size() {
            Some(format!("copy writes past the end of {:?}", destination.label()))
        } else if !source.usage().contains(BufferUsages::COPY_SRC) {
            Some(format!("{:?} lacks COPY_SRC", source.label()))
        } else if !destination.usage().contains(BufferUsages::COPY_DST) {
            Some(format!("{:?} lacks COPY_DST", destination.label()))
        } else {
            None
        };
        if let Some(msg) = invalid {
            self.invalidate(Error::InvalidDescriptor(msg));
            return;
        }
        let source = source.clone();
        let destination = destination.clone();
        self.push(Box::new(move |gl, state| {
            if state.pass.is_some() {
                return Err(Error::InvalidState(
                    "buffer copy inside a render pass".to_string(),
                ));
            }
            gl.bind_buffer(gl::COPY_READ_BUFFER, Some(source.native()?));
            gl.bind_buffer(gl::COPY_WRITE_BUFFER, Some(destination.native()?));
            gl.copy_buffer_sub_data(
                gl::COPY_READ_BUFFER,
                gl::COPY_WRITE_BUFFER,
                source_offset,
                destination_offset,
                size,
            );
            gl.bind_buffer(gl::COPY_READ_BUFFER, None);
            gl.bind_buffer(gl::COPY_WRITE_BUFFER, None);
            Ok(())
        }));
    }

    /// Number of operations recorded so far.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Finishes recording.  Returns the first recording error, if any.
    pub fn finish(self) -> Result<CommandBuffer, Error> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(CommandBuffer {
            device: self.device,
            label: self.label,
            ops: self.ops,
        })
    }
}

impl std::fmt::Debug for CommandEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEncoder")
            .field("label", &self.label)
            .field("ops", &self.ops.len())
            .field("error", &self.error)
            .finish()
    }
}

/// Recorded operations, ready to submit once.
pub struct CommandBuffer {
    pub(crate) device: Device,
    pub(crate) label: Option<String>,
    pub(crate) ops: Vec<DeferredOp>,
}

impl CommandBuffer {
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("label", &self.label)
            .field("ops", &self.ops.len())
            .finish()
    }
}

/// Records into one render pass of a [CommandEncoder].
///
/// Dropping the encoder ends the pass.
pub struct RenderPassEncoder<'e> {
    encoder: &'e mut CommandEncoder,
    ended: bool,
    has_pipeline: bool,
    has_index_buffer: bool,
}

impl RenderPassEncoder<'_> {
    pub fn set_pipeline(&mut self, pipeline: &RenderPipeline) {
        self.has_pipeline = true;
        let pipeline = pipeline.clone();
        self.encoder.push(Box::new(move |_gl, state| {
            state.set_pipeline(pipeline);
            Ok(())
        }));
    }

    /// Binds `group` at group index `index`.  Applied at the next draw, and only if it is a
    /// different group from the one already there.
    pub fn set_bind_group(&mut self, index: u32, group: &BindGroup) {
        let group = group.clone();
        self.encoder.push(Box::new(move |_gl, state| {
            state.set_bind_group(index, group);
            Ok(())
        }));
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: &Buffer, offset: u64) {
        if !self.encoder.check_device(buffer) {
            return;
        }
        if !buffer.usage().contains(BufferUsages::VERTEX) {
            self.encoder.invalidate(Error::InvalidDescriptor(format!(
                "{:?} lacks VERTEX usage",
                buffer.label()
            )));
            return;
        }
        let buffer = buffer.clone();
        self.encoder.push(Box::new(move |_gl, state| {
            state.set_vertex_buffer(slot, buffer, offset);
            Ok(())
        }));
    }

    pub fn set_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat, offset: u64) {
        if !self.encoder.check_device(buffer) {
            return;
        }
        if !buffer.usage().contains(BufferUsages::INDEX) {
            self.encoder.invalidate(Error::InvalidDescriptor(format!(
                "{:?} lacks INDEX usage",
                buffer.label()
            )));
            return;
        }
        self.has_index_buffer = true;
        let buffer = buffer.clone();
        self.encoder.push(Box::new(move |_gl, state| {
            state.index_buffer = Some(IndexBinding {
                buffer,
                format,
                offset,
            });
            Ok(())
        }));
    }

    pub fn set_viewport(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) {
        let viewport = Viewport {
            x,
            y,
            width,
            height,
            min_depth,
            max_depth,
        };
        self.encoder.push(Box::new(move |_gl, state| {
            state.viewport = Some(viewport);
            Ok(())
        }));
    }

    pub fn set_scissor_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.encoder.push(Box::new(move |_gl, state| {
            state.scissor = Some([x, y, width, height]);
            Ok(())
        }));
    }

    pub fn set_blend_constant(&mut self, color: Color) {
        self.encoder.push(Box::new(move |_gl, state| {
            state.blend_constant = [
                color.r as f32,
                color.g as f32,
                color.b as f32,
                color.a as f32,
            ];
            Ok(())
        }));
    }

    pub fn set_stencil_reference(&mut self, reference: u32) {
        self.encoder.push(Box::new(move |_gl, state| {
            state.stencil_reference = reference;
            Ok(())
        }));
    }

    pub fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        if !self.has_pipeline {
            self.encoder
                .invalidate(Error::InvalidState("draw without a pipeline".to_string()));
            return;
        }
        let call = DrawCall::Arrays {
            vertex_count: vertices.len() as u32,
            instance_count: instances.len() as u32,
            first_vertex: vertices.start,
            first_instance: instances.start,
        };
        self.encoder
            .push(Box::new(move |gl, state| draw::draw(gl, state, call)));
    }

    pub fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        if !self.has_pipeline {
            self.encoder
                .invalidate(Error::InvalidState("draw without a pipeline".to_string()));
            return;
        }
        if !self.has_index_buffer {
            self.encoder.invalidate(Error::InvalidState(
                "indexed draw without an index buffer".to_string(),
            ));
            return;
        }
        let call = DrawCall::Elements {
            index_count: indices.len() as u32,
            instance_count: instances.len() as u32,
            first_index: indices.start,
            base_vertex,
            first_instance: instances.start,
        };
        self.encoder
            .push(Box::new(move |gl, state| draw::draw(gl, state, call)));
    }

    /// Ends the pass, resolving it if it is multisampled.
    pub fn end(mut self) {
        self.finish_pass();
    }

    fn finish_pass(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.encoder
            .push(Box::new(|gl, state| state.end_pass(gl)));
    }
}

impl Drop for RenderPassEncoder<'_> {
    fn drop(&mut self) {
        self.finish_pass();
    }
}

impl std::fmt::Debug for RenderPassEncoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPassEncoder")
            .field("encoder", &self.encoder.label)
            .field("ended", &self.ended)
            .finish()
    }
}
