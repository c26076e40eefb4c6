// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Deferred operations and the state they replay against.

Recording pushes boxed closures; submission runs them strictly in push order against one
[ReplayState].  The state tracks what the recorded commands have set so far (pipeline, bind
groups, vertex and index buffers, dynamic state) so each draw can re-derive everything the
context needs.
*/

use std::collections::HashMap;

use crate::bindings::bind_group::BindGroup;
use crate::bindings::buffer::Buffer;
use crate::images::pipeline::{IndexFormat, RenderPipeline};
use crate::imp::Error;
use crate::imp::gl::GlContext;
use crate::imp::pass::{ActivePass, PassPlan};

pub(crate) type DeferredOp =
    Box<dyn FnOnce(&mut dyn GlContext, &mut ReplayState) -> Result<(), Error>>;

#[derive(Debug, Clone)]
pub(crate) struct VertexBinding {
    pub(crate) buffer: Buffer,
    pub(crate) offset: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct IndexBinding {
    pub(crate) buffer: Buffer,
    pub(crate) format: IndexFormat,
    pub(crate) offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Viewport {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) min_depth: f32,
    pub(crate) max_depth: f32,
}

#[derive(Debug)]
pub(crate) struct ReplayState {
    pub(crate) check_framebuffer_status: bool,
    pub(crate) pass: Option<ActivePass>,
    pub(crate) pipeline: Option<RenderPipeline>,
    /// Set when the pipeline changed since the last draw.
    pub(crate) pipeline_dirty: bool,
    pub(crate) bind_groups: Vec<Option<BindGroup>>,
    pub(crate) dirty_groups: Vec<bool>,
    /// (group, texture binding) -> texture unit, filled as groups are applied.
    pub(crate) texture_units: HashMap<(u32, u32), u32>,
    pub(crate) vertex_buffers: Vec<Option<VertexBinding>>,
    pub(crate) index_buffer: Option<IndexBinding>,
    pub(crate) viewport: Option<Viewport>,
    pub(crate) scissor: Option<[u32; 4]>,
    pub(crate) blend_constant: [f32; 4],
    pub(crate) stencil_reference: u32,
    /// Attribute locations enabled by the last draw.
    pub(crate) enabled_attributes: Vec<u32>,
}

impl ReplayState {
    pub(crate) fn new(check_framebuffer_status: bool) -> Self {
        ReplayState {
            check_framebuffer_status,
            pass: None,
            pipeline: None,
            pipeline_dirty: false,
            bind_groups: Vec::new(),
            dirty_groups: Vec::new(),
            texture_units: HashMap::new(),
            vertex_buffers: Vec::new(),
            index_buffer: None,
            viewport: None,
            scissor: None,
            blend_constant: [0.0; 4],
            stencil_reference: 0,
            enabled_attributes: Vec::new(),
        }
    }

    /// Starts a pass.  Nothing set in an earlier pass carries over.
    pub(crate) fn begin_pass(&mut self, gl: &mut dyn GlContext, plan: PassPlan) -> Result<(), Error> {
        if self.pass.is_some() {
            return Err(Error::InvalidState(
                "a pass began before the previous one ended".to_string(),
            ));
        }
        let pass = ActivePass::begin(gl, plan, self.check_framebuffer_status)?;
        self.pass = Some(pass);
        self.pipeline = None;
        self.pipeline_dirty = false;
        self.bind_groups.clear();
        self.dirty_groups.clear();
        self.texture_units.clear();
        self.vertex_buffers.clear();
        self.index_buffer = None;
        self.viewport = None;
        self.scissor = None;
        self.blend_constant = [0.0; 4];
        self.stencil_reference = 0;
        Ok(())
    }

    pub(crate) fn end_pass(&mut self, gl: &mut dyn GlContext) -> Result<(), Error> {
        let pass = self
            .pass
            .take()
            .ok_or_else(|| Error::InvalidState("no pass to end".to_string()))?;
        pass.end(gl)
    }

    pub(crate) fn active_pass(&self) -> Result<&ActivePass, Error> {
        self.pass
            .as_ref()
            .ok_or_else(|| Error::InvalidState("draw outside a render pass".to_string()))
    }

    pub(crate) fn set_pipeline(&mut self, pipeline: RenderPipeline) {
        if self.pipeline.as_ref() != Some(&pipeline) {
            self.pipeline = Some(pipeline);
            self.pipeline_dirty = true;
        }
    }

    pub(crate) fn set_bind_group(&mut self, index: u32, group: BindGroup) {
        let index = index as usize;
        if self.bind_groups.len() <= index {
            self.bind_groups.resize(index + 1, None);
            self.dirty_groups.resize(index + 1, false);
        }
        if self.bind_groups[index].as_ref() != Some(&group) {
            self.bind_groups[index] = Some(group);
            self.dirty_groups[index] = true;
        }
    }

    pub(crate) fn set_vertex_buffer(&mut self, slot: u32, buffer: Buffer, offset: u64) {
        let slot = slot as usize;
        if self.vertex_buffers.len() <= slot {
            self.vertex_buffers.resize(slot + 1, None);
        }
        self.vertex_buffers[slot] = Some(VertexBinding { buffer, offset });
    }

    /// Tears down whatever the failed replay left behind.
    fn abandon(&mut self, gl: &mut dyn GlContext) {
        if let Some(pass) = self.pass.take() {
            pass.abandon(gl);
        }
        gl.use_program(None);
    }
}

/// Runs `ops` in order.  The first error stops the replay and abandons any open pass.
pub(crate) fn replay(
    gl: &mut dyn GlContext,
    ops: Vec<DeferredOp>,
    state: &mut ReplayState,
) -> Result<(), Error> {
    let count = ops.len();
    for (index, op) in ops.into_iter().enumerate() {
        if let Err(e) = op(gl, state) {
            logwise::warn_sync!(
                "replay stopped at operation {index} of {count}: {error}",
                index = index,
                count = count,
                error = logwise::privacy::LogIt(&e)
            );
            state.abandon(gl);
            return Err(e);
        }
    }
    if state.pass.is_some() {
        state.abandon(gl);
        return Err(Error::InvalidState("a pass was never ended".to_string()));
    }
    logwise::trace_sync!("replayed {count} operations", count = count);
    Ok(())
}
