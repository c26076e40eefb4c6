// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Render pass emulation: transient framebuffers, clears, and multisample resolve.

The attachment plan is worked out when the pass is recorded.  Native objects are only created
when the recorded pass replays, and they are always deleted when it ends, whether it ends
normally or the replay fails partway.
*/

use crate::bindings::texture::{TextureTarget, TextureView};
use crate::images::render_pass::{
    Color, LoadOp, RenderPassDescriptor, RenderPassDepthStencilAttachment, StoreOp,
};
use crate::imp::{Error, UnsupportedOperation};
use crate::imp::gl::consts as gl;
use crate::imp::gl::{GlContext, NativeFramebuffer, NativeRenderbuffer};
use crate::pixel_formats::{SampleKind, TextureFormat};

#[derive(Debug, Clone)]
pub(crate) struct ColorPlan {
    /// Attachment index; `COLOR_ATTACHMENT0 + index`.
    pub(crate) index: u32,
    pub(crate) view: TextureView,
    pub(crate) resolve_target: Option<TextureView>,
    pub(crate) load: LoadOp<Color>,
    #[allow(dead_code)] // contents are always kept
    pub(crate) store: StoreOp,
}

impl ColorPlan {
    /// Where resolved samples land.
    fn resolve_destination(&self) -> &TextureView {
        self.resolve_target.as_ref().unwrap_or(&self.view)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DepthStencilPlan {
    pub(crate) view: TextureView,
    pub(crate) depth_load: Option<LoadOp<f32>>,
    pub(crate) stencil_load: Option<LoadOp<u32>>,
}

impl DepthStencilPlan {
    fn format(&self) -> TextureFormat {
        self.view.format()
    }

    /// Depth-only, stencil-only, or combined attachment point.
    pub(crate) fn attachment_point(&self) -> u32 {
        match (self.format().has_depth(), self.format().has_stencil()) {
            (true, true) => gl::DEPTH_STENCIL_ATTACHMENT,
            (true, false) => gl::DEPTH_ATTACHMENT,
            _ => gl::STENCIL_ATTACHMENT,
        }
    }

    fn blit_mask(&self) -> u32 {
        let mut mask = 0;
        if self.format().has_depth() {
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if self.format().has_stencil() {
            mask |= gl::STENCIL_BUFFER_BIT;
        }
        mask
    }
}

/// What a pass attaches, worked out at record time.
#[derive(Debug, Clone)]
pub(crate) struct PassPlan {
    pub(crate) label: Option<String>,
    pub(crate) colors: Vec<ColorPlan>,
    /// Number of color slots, counting empty ones.
    pub(crate) color_slots: u32,
    pub(crate) depth_stencil: Option<DepthStencilPlan>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) samples: u32,
}

impl PassPlan {
    pub(crate) fn new(descriptor: &RenderPassDescriptor) -> Result<PassPlan, Error> {
        let invalid = |msg: String| {
            Err(Error::InvalidDescriptor(format!(
                "render pass {:?}: {}",
                descriptor.label, msg
            )))
        };
        let mut colors = Vec::new();
        for (index, attachment) in descriptor.color_attachments.iter().enumerate() {
            let Some(attachment) = attachment else {
                continue;
            };
            if attachment.view.format().is_depth_stencil() {
                return invalid(format!("color attachment {} has a depth format", index));
            }
            colors.push(ColorPlan {
                index: index as u32,
                view: attachment.view.clone(),
                resolve_target: attachment.resolve_target.cloned(),
                load: attachment.ops.load,
                store: attachment.ops.store,
            });
        }
        let depth_stencil = descriptor
            .depth_stencil_attachment
            .as_ref()
            .map(|a: &RenderPassDepthStencilAttachment| DepthStencilPlan {
                view: a.view.clone(),
                depth_load: a.depth_ops.map(|o| o.load),
                stencil_load: a.stencil_ops.map(|o| o.load),
            });
        if let Some(ds) = &depth_stencil
            && !ds.format().is_depth_stencil()
        {
            return invalid(format!("{:?} is not a depth or stencil format", ds.format()));
        }

        // extent comes from the first attachment
        let first = colors
            .first()
            .map(|c| &c.view)
            .or(depth_stencil.as_ref().map(|d| &d.view));
        let Some(first) = first else {
            return invalid("no attachments".to_string());
        };
        let (width, height) = first.extent();
        let views = colors
            .iter()
            .map(|c| &c.view)
            .chain(depth_stencil.iter().map(|d| &d.view));
        let mut samples = 1;
        for view in views {
            if view.extent() != (width, height) {
                return invalid(format!(
                    "attachment size {:?} differs from {:?}",
                    view.extent(),
                    (width, height)
                ));
            }
            samples = samples.max(view.texture().sample_count());
        }
        for color in &colors {
            if let Some(resolve) = &color.resolve_target {
                if resolve.extent() != (width, height) {
                    return invalid(format!(
                        "resolve target size {:?} differs from {:?}",
                        resolve.extent(),
                        (width, height)
                    ));
                }
                if resolve.texture().sample_count() != 1 {
                    return invalid("resolve targets must be single-sampled".to_string());
                }
            }
        }
        if samples > 1 {
            let color_loads = colors.iter().any(|c| matches!(c.load, LoadOp::Load));
            // an aspect with no ops keeps its contents too
            let depth_stencil_loads = depth_stencil.as_ref().is_some_and(|ds| {
                (ds.format().has_depth() && !matches!(ds.depth_load, Some(LoadOp::Clear(_))))
                    || (ds.format().has_stencil()
                        && !matches!(ds.stencil_load, Some(LoadOp::Clear(_))))
            });
            if color_loads || depth_stencil_loads {
                return Err(Error::Unsupported(UnsupportedOperation::MultisampledLoad));
            }
        }
        Ok(PassPlan {
            label: descriptor.label.map(str::to_string),
            colors,
            color_slots: descriptor.color_attachments.len() as u32,
            depth_stencil,
            width,
            height,
            samples,
        })
    }

    pub(crate) fn is_multisampled(&self) -> bool {
        self.samples > 1
    }

    /// `COLOR_ATTACHMENTi` for every occupied slot, `NONE` for empty ones.
    fn all_draw_buffers(&self) -> Vec<u32> {
        let mut buffers = vec![gl::NONE; self.color_slots as usize];
        for color in &self.colors {
            buffers[color.index as usize] = gl::COLOR_ATTACHMENT0 + color.index;
        }
        buffers
    }
}

/// Attaches one view to the bound `target` framebuffer.
fn attach_view(
    gl: &mut dyn GlContext,
    target: u32,
    attachment: u32,
    view: &TextureView,
) -> Result<(), Error> {
    let texture = view.texture();
    let native = texture.native()?;
    let level = view.base_mip_level();
    match texture.target() {
        TextureTarget::Texture2D => {
            gl.framebuffer_texture_2d(target, attachment, gl::TEXTURE_2D, Some(native), level)
        }
        TextureTarget::CubeMap => gl.framebuffer_texture_2d(
            target,
            attachment,
            gl::TEXTURE_CUBE_MAP_POSITIVE_X + view.base_array_layer(),
            Some(native),
            level,
        ),
        TextureTarget::Texture2DArray | TextureTarget::Texture3D => gl.framebuffer_texture_layer(
            target,
            attachment,
            Some(native),
            level,
            view.base_array_layer(),
        ),
    }
    Ok(())
}

/// Draw buffer list routing fragment output `index` to `COLOR_ATTACHMENT{index}` only.
fn single_draw_buffer(index: u32) -> Vec<u32> {
    let mut buffers = vec![gl::NONE; index as usize + 1];
    buffers[index as usize] = gl::COLOR_ATTACHMENT0 + index;
    buffers
}

/// A pass between begin and end on the replaying context.
#[derive(Debug)]
pub(crate) struct ActivePass {
    pub(crate) plan: PassPlan,
    framebuffer: NativeFramebuffer,
    renderbuffers: Vec<NativeRenderbuffer>,
}

impl ActivePass {
    /// Creates the pass framebuffer, attaches everything, and runs the clears.
    pub(crate) fn begin(
        gl: &mut dyn GlContext,
        plan: PassPlan,
        check_status: bool,
    ) -> Result<ActivePass, Error> {
        let framebuffer = gl.create_framebuffer().map_err(Error::Native)?;
        gl.bind_framebuffer(gl::FRAMEBUFFER, Some(framebuffer));
        let mut pass = ActivePass {
            plan,
            framebuffer,
            renderbuffers: Vec::new(),
        };
        if let Err(e) = pass.attach(gl, check_status) {
            pass.release(gl);
            return Err(e);
        }
        logwise::trace_sync!(
            "began pass {label}",
            label = logwise::privacy::LogIt(&pass.plan.label)
        );
        pass.clear(gl);
        Ok(pass)
    }

    fn attach(&mut self, gl: &mut dyn GlContext, check_status: bool) -> Result<(), Error> {
        let multisampled = self.plan.is_multisampled();
        let attachments = self
            .plan
            .colors
            .iter()
            .map(|c| (gl::COLOR_ATTACHMENT0 + c.index, c.view.clone()))
            .chain(
                self.plan
                    .depth_stencil
                    .iter()
                    .map(|d| (d.attachment_point(), d.view.clone())),
            )
            .collect::<Vec<_>>();
        for (attachment, view) in attachments {
            if multisampled {
                let renderbuffer = gl.create_renderbuffer().map_err(Error::Native)?;
                self.renderbuffers.push(renderbuffer);
                gl.bind_renderbuffer(gl::RENDERBUFFER, Some(renderbuffer));
                gl.renderbuffer_storage_multisample(
                    gl::RENDERBUFFER,
                    self.plan.samples,
                    view.format().info().internal_format,
                    self.plan.width,
                    self.plan.height,
                );
                gl.framebuffer_renderbuffer(
                    gl::FRAMEBUFFER,
                    attachment,
                    gl::RENDERBUFFER,
                    Some(renderbuffer),
                );
            } else {
                attach_view(gl, gl::FRAMEBUFFER, attachment, &view)?;
            }
        }
        if multisampled {
            gl.bind_renderbuffer(gl::RENDERBUFFER, None);
        }
        gl.draw_buffers(&self.plan.all_draw_buffers());
        if check_status {
            let status = gl.check_framebuffer_status(gl::FRAMEBUFFER);
            if status != gl::FRAMEBUFFER_COMPLETE {
                logwise::error_sync!(
                    "pass {label} framebuffer incomplete: {status}",
                    label = logwise::privacy::LogIt(&self.plan.label),
                    status = status
                );
                return Err(Error::FramebufferIncomplete { status });
            }
        }
        Ok(())
    }

    /// Full-extent viewport, unmasked writes, then the clear load ops.
    fn clear(&self, gl: &mut dyn GlContext) {
        gl.viewport(0, 0, self.plan.width as i32, self.plan.height as i32);
        gl.disable(gl::SCISSOR_TEST);
        gl.color_mask(true, true, true, true);
        gl.depth_mask(true);
        gl.stencil_mask_separate(gl::FRONT_AND_BACK, 0xff);
        for color in &self.plan.colors {
            let LoadOp::Clear(c) = color.load else {
                continue;
            };
            match color.view.format().info().kind {
                SampleKind::Uint => gl.clear_buffer_u32_slice(
                    gl::COLOR,
                    color.index,
                    &[c.r as u32, c.g as u32, c.b as u32, c.a as u32],
                ),
                SampleKind::Sint => gl.clear_buffer_i32_slice(
                    gl::COLOR,
                    color.index,
                    &[c.r as i32, c.g as i32, c.b as i32, c.a as i32],
                ),
                _ => gl.clear_buffer_f32_slice(
                    gl::COLOR,
                    color.index,
                    &[c.r as f32, c.g as f32, c.b as f32, c.a as f32],
                ),
            }
        }
        if let Some(ds) = &self.plan.depth_stencil {
            let depth = match ds.depth_load {
                Some(LoadOp::Clear(d)) if ds.format().has_depth() => Some(d),
                _ => None,
            };
            let stencil = match ds.stencil_load {
                Some(LoadOp::Clear(s)) if ds.format().has_stencil() => Some(s),
                _ => None,
            };
            match (depth, stencil) {
                (Some(d), Some(s)) => {
                    gl.clear_buffer_depth_stencil(gl::DEPTH_STENCIL, 0, d, s as i32)
                }
                (Some(d), None) => gl.clear_buffer_f32_slice(gl::DEPTH, 0, &[d]),
                (None, Some(s)) => gl.clear_buffer_i32_slice(gl::STENCIL, 0, &[s as i32]),
                (None, None) => {}
            }
        }
    }

    /// Resolves if multisampled, then deletes everything the pass created.
    pub(crate) fn end(self, gl: &mut dyn GlContext) -> Result<(), Error> {
        let result = if self.renderbuffers.is_empty() {
            Ok(())
        } else {
            self.resolve(gl)
        };
        logwise::trace_sync!(
            "ended pass {label}",
            label = logwise::privacy::LogIt(&self.plan.label)
        );
        self.release(gl);
        result
    }

    /// Deletes everything without resolving.
    pub(crate) fn abandon(self, gl: &mut dyn GlContext) {
        logwise::warn_sync!(
            "abandoning pass {label}",
            label = logwise::privacy::LogIt(&self.plan.label)
        );
        self.release(gl);
    }

    fn resolve(&self, gl: &mut dyn GlContext) -> Result<(), Error> {
        let _perf = logwise::perfwarn_begin!("resolve");
        let resolve_framebuffer = gl.create_framebuffer().map_err(Error::Native)?;
        let result = self.blit_into(gl, resolve_framebuffer);
        gl.bind_framebuffer(gl::READ_FRAMEBUFFER, None);
        gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, None);
        gl.delete_framebuffer(resolve_framebuffer);
        result
    }

    /// Blits color 0 with depth and stencil, then each further color attachment on its own.
    ///
    /// A blit reads one color buffer, so attachments past the first each need a pass with the
    /// read buffer and draw buffers narrowed to that attachment.
    fn blit_into(
        &self,
        gl: &mut dyn GlContext,
        resolve_framebuffer: NativeFramebuffer,
    ) -> Result<(), Error> {
        gl.bind_framebuffer(gl::READ_FRAMEBUFFER, Some(self.framebuffer));
        gl.bind_framebuffer(gl::DRAW_FRAMEBUFFER, Some(resolve_framebuffer));
        for color in &self.plan.colors {
            attach_view(
                gl,
                gl::DRAW_FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0 + color.index,
                color.resolve_destination(),
            )?;
        }
        if let Some(ds) = &self.plan.depth_stencil {
            attach_view(gl, gl::DRAW_FRAMEBUFFER, ds.attachment_point(), &ds.view)?;
        }
        let (w, h) = (self.plan.width as i32, self.plan.height as i32);
        let mut mask = self
            .plan
            .depth_stencil
            .as_ref()
            .map_or(0, DepthStencilPlan::blit_mask);
        let mut colors = self.plan.colors.iter();
        if let Some(first) = colors.next() {
            gl.read_buffer(gl::COLOR_ATTACHMENT0 + first.index);
            gl.draw_buffers(&single_draw_buffer(first.index));
            mask |= gl::COLOR_BUFFER_BIT;
        }
        if mask != 0 {
            gl.blit_framebuffer(0, 0, w, h, 0, 0, w, h, mask, gl::NEAREST);
        }
        for color in colors {
            gl.read_buffer(gl::COLOR_ATTACHMENT0 + color.index);
            gl.draw_buffers(&single_draw_buffer(color.index));
            gl.blit_framebuffer(0, 0, w, h, 0, 0, w, h, gl::COLOR_BUFFER_BIT, gl::NEAREST);
        }
        Ok(())
    }

    fn release(&self, gl: &mut dyn GlContext) {
        gl.bind_framebuffer(gl::FRAMEBUFFER, None);
        for renderbuffer in &self.renderbuffers {
            gl.delete_renderbuffer(*renderbuffer);
        }
        gl.delete_framebuffer(self.framebuffer);
    }

    pub(crate) fn extent(&self) -> (u32, u32) {
        (self.plan.width, self.plan.height)
    }
}
