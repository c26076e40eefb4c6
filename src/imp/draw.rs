// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Draw-time state application.

The context has no pipeline objects, so before every draw the whole fixed-function state is
re-derived from the current pipeline and the dynamic state recorded in the pass.  Nothing
set by an earlier draw is trusted.
*/

use crate::bindings::bind_group::{BindGroup, BindingResource};
use crate::images::pipeline::{ColorTargetState, ColorWrites, DepthStencilState, RenderPipeline};
use crate::images::vertex_layout::VertexStepMode;
use crate::imp::Error;
use crate::imp::gl::GlContext;
use crate::imp::gl::consts as gl;
use crate::imp::replay::ReplayState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrawCall {
    Arrays {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    Elements {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
}

impl DrawCall {
    fn base_vertex(self) -> i64 {
        match self {
            DrawCall::Arrays { .. } => 0,
            DrawCall::Elements { base_vertex, .. } => base_vertex as i64,
        }
    }

    fn first_instance(self) -> u64 {
        match self {
            DrawCall::Arrays { first_instance, .. } | DrawCall::Elements { first_instance, .. } => {
                first_instance as u64
            }
        }
    }
}

pub(crate) fn draw(
    gl: &mut dyn GlContext,
    state: &mut ReplayState,
    call: DrawCall,
) -> Result<(), Error> {
    let pipeline = state
        .pipeline
        .clone()
        .ok_or_else(|| Error::InvalidState("draw without a pipeline".to_string()))?;
    apply_fixed_function(gl, state, &pipeline)?;
    gl.use_program(Some(pipeline.0.program.native));
    pipeline.0.program.apply_slots(gl, &pipeline.0.slots);
    apply_bind_groups(gl, state, &pipeline)?;
    apply_vertex_buffers(gl, state, &pipeline, call)?;
    let mode = pipeline.0.primitive.topology.native();
    match call {
        DrawCall::Arrays {
            vertex_count,
            instance_count,
            first_vertex,
            ..
        } => gl.draw_arrays_instanced(
            mode,
            first_vertex as i32,
            vertex_count as i32,
            instance_count as i32,
        ),
        DrawCall::Elements {
            index_count,
            instance_count,
            first_index,
            ..
        } => {
            let index = state
                .index_buffer
                .as_ref()
                .ok_or_else(|| Error::InvalidState("indexed draw without an index buffer".to_string()))?;
            gl.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, Some(index.buffer.native()?));
            let offset = index.offset + first_index as u64 * index.format.size();
            gl.draw_elements_instanced(
                mode,
                index_count as i32,
                index.format.native(),
                offset as i32,
                instance_count as i32,
            );
        }
    }
    state.pipeline_dirty = false;
    Ok(())
}

fn first_target(pipeline: &RenderPipeline) -> Option<&ColorTargetState> {
    pipeline.0.targets.iter().flatten().next()
}

fn apply_fixed_function(
    gl: &mut dyn GlContext,
    state: &ReplayState,
    pipeline: &RenderPipeline,
) -> Result<(), Error> {
    let pass = state.active_pass()?;
    let (width, height) = pass.extent();
    match state.viewport {
        Some(v) => {
            gl.viewport(v.x as i32, v.y as i32, v.width as i32, v.height as i32);
            gl.depth_range_f32(v.min_depth, v.max_depth);
        }
        None => {
            gl.viewport(0, 0, width as i32, height as i32);
            gl.depth_range_f32(0.0, 1.0);
        }
    }
    match state.scissor {
        Some([x, y, w, h]) => {
            gl.enable(gl::SCISSOR_TEST);
            gl.scissor(x as i32, y as i32, w as i32, h as i32);
        }
        None => gl.disable(gl::SCISSOR_TEST),
    }

    let draw_buffers = (0..pass.plan.color_slots)
        .map(|i| {
            let written = pipeline
                .0
                .targets
                .get(i as usize)
                .and_then(Option::as_ref)
                .is_some_and(|t| !t.write_mask.is_empty());
            let attached = pass.plan.colors.iter().any(|c| c.index == i);
            if written && attached {
                gl::COLOR_ATTACHMENT0 + i
            } else {
                gl::NONE
            }
        })
        .collect::<Vec<_>>();
    gl.draw_buffers(&draw_buffers);

    let target = first_target(pipeline);
    let mask = target.map_or(ColorWrites::ALL, |t| t.write_mask);
    gl.color_mask(
        mask.contains(ColorWrites::RED),
        mask.contains(ColorWrites::GREEN),
        mask.contains(ColorWrites::BLUE),
        mask.contains(ColorWrites::ALPHA),
    );

    let primitive = &pipeline.0.primitive;
    match primitive.cull_mode {
        Some(face) => {
            gl.enable(gl::CULL_FACE);
            gl.cull_face(face.native());
        }
        None => gl.disable(gl::CULL_FACE),
    }
    gl.front_face(primitive.front_face.native());

    match target.and_then(|t| t.blend) {
        Some(blend) => {
            gl.enable(gl::BLEND);
            gl.blend_func_separate(
                blend.color.src_factor.native(),
                blend.color.dst_factor.native(),
                blend.alpha.src_factor.native(),
                blend.alpha.dst_factor.native(),
            );
            gl.blend_equation_separate(blend.color.operation.native(), blend.alpha.operation.native());
            let [r, g, b, a] = state.blend_constant;
            gl.blend_color(r, g, b, a);
        }
        None => gl.disable(gl::BLEND),
    }

    match &pipeline.0.depth_stencil {
        Some(ds) => apply_depth_stencil(gl, ds, state.stencil_reference),
        None => {
            gl.disable(gl::DEPTH_TEST);
            // a stale write-disable would stop the next pass's depth clear
            gl.depth_mask(true);
            gl.disable(gl::STENCIL_TEST);
            gl.disable(gl::POLYGON_OFFSET_FILL);
        }
    }

    if pipeline.0.multisample.alpha_to_coverage_enabled {
        gl.enable(gl::SAMPLE_ALPHA_TO_COVERAGE);
    } else {
        gl.disable(gl::SAMPLE_ALPHA_TO_COVERAGE);
    }
    Ok(())
}

fn apply_depth_stencil(gl: &mut dyn GlContext, ds: &DepthStencilState, reference: u32) {
    gl.enable(gl::DEPTH_TEST);
    gl.depth_func(ds.depth_compare.native());
    gl.depth_mask(ds.depth_write_enabled);
    if ds.bias.is_enabled() {
        gl.enable(gl::POLYGON_OFFSET_FILL);
        gl.polygon_offset(ds.bias.slope_scale, ds.bias.constant as f32);
    } else {
        gl.disable(gl::POLYGON_OFFSET_FILL);
    }
    let stencil = &ds.stencil;
    if stencil.is_enabled() {
        gl.enable(gl::STENCIL_TEST);
        for (face, s) in [(gl::FRONT, &stencil.front), (gl::BACK, &stencil.back)] {
            gl.stencil_func_separate(face, s.compare.native(), reference as i32, stencil.read_mask);
            gl.stencil_op_separate(
                face,
                s.fail_op.native(),
                s.depth_fail_op.native(),
                s.pass_op.native(),
            );
            gl.stencil_mask_separate(face, stencil.write_mask);
        }
    } else {
        gl.disable(gl::STENCIL_TEST);
    }
}

/// Rebinds every group that changed, or all of them if the pipeline did.
fn apply_bind_groups(
    gl: &mut dyn GlContext,
    state: &mut ReplayState,
    pipeline: &RenderPipeline,
) -> Result<(), Error> {
    let layouts = pipeline.layout().bind_group_layouts();
    for (index, layout) in layouts.iter().enumerate() {
        let Some(group) = state.bind_groups.get(index).cloned().flatten() else {
            return Err(Error::InvalidState(format!(
                "pipeline {:?} needs bind group {} which was never set",
                pipeline.label(),
                index
            )));
        };
        if group.layout().entries() != layout.entries() {
            return Err(Error::InvalidState(format!(
                "bind group {} does not match the pipeline's layout",
                index
            )));
        }
        let dirty = state.dirty_groups.get(index).copied().unwrap_or(true);
        if dirty || state.pipeline_dirty {
            bind_group(gl, state, pipeline, index as u32, &group)?;
            if let Some(flag) = state.dirty_groups.get_mut(index) {
                *flag = false;
            }
        }
    }
    Ok(())
}

fn bind_group(
    gl: &mut dyn GlContext,
    state: &mut ReplayState,
    pipeline: &RenderPipeline,
    index: u32,
    group: &BindGroup,
) -> Result<(), Error> {
    let slots = &pipeline.0.slots;
    for entry in group.entries() {
        match &entry.resource {
            BindingResource::Buffer(binding) => {
                let Some(slot) = slots.uniform_slot(index, entry.binding) else {
                    continue;
                };
                gl.bind_buffer_range(
                    gl::UNIFORM_BUFFER,
                    slot,
                    Some(binding.buffer.native()?),
                    binding.offset,
                    binding.resolved_size(),
                );
            }
            BindingResource::TextureView(view) => {
                let Some(unit) = slots.texture_slot(index, entry.binding) else {
                    continue;
                };
                let texture = view.texture();
                let target = texture.target().native();
                gl.active_texture(gl::TEXTURE0 + unit);
                gl.bind_texture(target, Some(texture.native()?));
                gl.tex_parameter_i32(target, gl::TEXTURE_BASE_LEVEL, view.base_mip_level() as i32);
                gl.tex_parameter_i32(
                    target,
                    gl::TEXTURE_MAX_LEVEL,
                    (view.base_mip_level() + view.mip_level_count() - 1) as i32,
                );
                state.texture_units.insert((index, entry.binding), unit);
            }
            // paired below, into the unit of the texture it accompanies
            BindingResource::Sampler(_) => {}
        }
    }
    for pairing in pipeline.0.sampler_pairings.iter().filter(|p| p.group == index) {
        let Some(unit) = state.texture_units.get(&(index, pairing.texture_binding)) else {
            logwise::debuginternal_sync!(
                "no texture unit for binding {binding} of group {group}",
                binding = pairing.texture_binding,
                group = index
            );
            continue;
        };
        let Some(sampler) = group.sampler(pairing.sampler_binding) else {
            return Err(Error::InvalidState(format!(
                "bind group {} has no sampler at binding {}",
                index, pairing.sampler_binding
            )));
        };
        gl.bind_sampler(*unit, Some(sampler.native()?));
    }
    Ok(())
}

fn apply_vertex_buffers(
    gl: &mut dyn GlContext,
    state: &mut ReplayState,
    pipeline: &RenderPipeline,
    call: DrawCall,
) -> Result<(), Error> {
    let mut enabled = Vec::new();
    for (slot, layout) in pipeline.0.vertex_buffers.iter().enumerate() {
        if layout.attributes.is_empty() {
            continue;
        }
        let Some(binding) = state.vertex_buffers.get(slot).cloned().flatten() else {
            return Err(Error::InvalidState(format!(
                "pipeline {:?} reads vertex buffer {} which was never set",
                pipeline.label(),
                slot
            )));
        };
        let stride = layout.array_stride as i64;
        let (advance, divisor) = match layout.step_mode {
            VertexStepMode::Vertex => (call.base_vertex() * stride, 0),
            VertexStepMode::Instance => (call.first_instance() as i64 * stride, 1),
        };
        gl.bind_buffer(gl::ARRAY_BUFFER, Some(binding.buffer.native()?));
        for attribute in &layout.attributes {
            let offset = binding.offset as i64 + attribute.offset as i64 + advance;
            if offset < 0 {
                return Err(Error::InvalidState(format!(
                    "base vertex moves attribute {} before the start of its buffer",
                    attribute.shader_location
                )));
            }
            let location = attribute.shader_location;
            let native = attribute.format.native();
            gl.enable_vertex_attrib_array(location);
            if native.integer {
                gl.vertex_attrib_pointer_i32(
                    location,
                    native.components,
                    native.data_type,
                    stride as i32,
                    offset as i32,
                );
            } else {
                gl.vertex_attrib_pointer_f32(
                    location,
                    native.components,
                    native.data_type,
                    native.normalized,
                    stride as i32,
                    offset as i32,
                );
            }
            gl.vertex_attrib_divisor(location, divisor);
            enabled.push(location);
        }
    }
    for stale in state.enabled_attributes.iter().filter(|l| !enabled.contains(l)) {
        gl.disable_vertex_attrib_array(*stale);
    }
    state.enabled_attributes = enabled;
    Ok(())
}
