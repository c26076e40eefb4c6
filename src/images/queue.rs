// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Submission, uploads and readback.

[Queue::submit] replays recorded command buffers against the context in order.  Uploads
([Queue::write_buffer], [Queue::write_texture]) go to the context immediately, so they land
before anything submitted afterwards.

Readback waits for submitted work first ([Queue::on_submitted_work_done]), polling a fence
once per executor tick instead of blocking the thread.
*/

use std::rc::Rc;

use crate::bindings::buffer::Buffer;
use crate::bindings::texture::{Extent3d, Origin3d, Texture, TextureTarget};
use crate::bindings::visible_to::{BufferUsages, TextureUsages};
use crate::cooperative::yield_now;
use crate::images::command::CommandBuffer;
use crate::images::device::Device;
use crate::imp::Error;
use crate::imp::gl::GlContext;
use crate::imp::gl::consts as gl;
use crate::imp::replay::{self, ReplayState};

#[derive(Debug, Clone)]
pub struct Queue {
    device: Device,
}

impl Queue {
    pub(crate) fn new(device: Device) -> Self {
        Queue { device }
    }

    /// Replays each command buffer in order.
    ///
    /// The first failing buffer stops the submission; its open pass is torn down and the
    /// buffers after it never run.
    pub fn submit(&self, command_buffers: impl IntoIterator<Item = CommandBuffer>) -> Result<(), Error> {
        let _perf = logwise::perfwarn_begin!("submit");
        let mut gl = self.device.0.gl()?;
        let mut result = Ok(());
        for buffer in command_buffers {
            if buffer.device != self.device {
                result = Err(Error::InvalidState(format!(
                    "command buffer {:?} was recorded on another device",
                    buffer.label
                )));
                break;
            }
            logwise::trace_sync!(
                "submitting {label} with {count} operations",
                label = logwise::privacy::LogIt(&buffer.label),
                count = buffer.ops.len()
            );
            let mut state = ReplayState::new(self.device.0.config.check_framebuffer_status);
            let replayed = replay::replay(&mut **gl, buffer.ops, &mut state);
            drop(state);
            self.device.0.drain_released(&mut **gl);
            if let Err(e) = replayed {
                result = Err(e);
                break;
            }
        }
        gl.flush();
        drop(gl);
        result
    }

    /// Uploads `data` into `buffer` at `offset`.  The offset must be a multiple of 4.
    pub fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), Error> {
        self.check_device(buffer.device())?;
        if offset % 4 != 0 {
            return Err(Error::InvalidDescriptor(format!(
                "write offset {} is not a multiple of 4",
                offset
            )));
        }
        if offset + data.len() as u64 > buffer.size() {
            return Err(Error::InvalidDescriptor(format!(
                "write of {} bytes at {} overruns {:?} ({} bytes)",
                data.len(),
                offset,
                buffer.label(),
                buffer.size()
            )));
        }
        if !buffer.usage().contains(BufferUsages::COPY_DST) {
            return Err(Error::InvalidDescriptor(format!(
                "{:?} lacks COPY_DST",
                buffer.label()
            )));
        }
        let native = buffer.native()?;
        let mut gl = self.device.0.gl()?;
        gl.bind_buffer(buffer.target(), Some(native));
        gl.buffer_sub_data(buffer.target(), offset, data);
        gl.bind_buffer(buffer.target(), None);
        Ok(())
    }

    /// Uploads tightly packed texels into a region of one mip level.
    ///
    /// For array and cube textures `origin.z` and `size.depth_or_array_layers` select layers.
    /// Compressed regions must be aligned to whole blocks.
    pub fn write_texture(
        &self,
        texture: &Texture,
        mip_level: u32,
        origin: Origin3d,
        size: Extent3d,
        data: &[u8],
    ) -> Result<(), Error> {
        self.check_device(texture.device())?;
        if !texture.usage().contains(TextureUsages::COPY_DST) {
            return Err(Error::InvalidDescriptor(format!(
                "{:?} lacks COPY_DST",
                texture.label()
            )));
        }
        check_region(texture, mip_level, origin, size, data.len())?;
        let format = texture.format();
        let info = format.info();
        if format.is_compressed() {
            let block = info.block_dimension as u32;
            let extent = texture.mip_extent(mip_level);
            let aligned = |o: u32, s: u32, whole: u32| o % block == 0 && (s % block == 0 || o + s == whole);
            if !aligned(origin.x, size.width, extent.width) || !aligned(origin.y, size.height, extent.height) {
                return Err(Error::InvalidDescriptor(format!(
                    "compressed upload {:?}+{:?} is not block aligned",
                    origin, size
                )));
            }
        }
        let native = texture.native()?;
        let target = texture.target();
        let mut gl = self.device.0.gl()?;
        gl.bind_texture(target.native(), Some(native));
        gl.pixel_store_i32(gl::UNPACK_ALIGNMENT, 1);
        match target {
            TextureTarget::Texture2DArray | TextureTarget::Texture3D => {
                if format.is_compressed() {
                    gl.compressed_tex_sub_image_3d(
                        target.native(),
                        mip_level,
                        origin.x,
                        origin.y,
                        origin.z,
                        size.width,
                        size.height,
                        size.depth_or_array_layers,
                        info.internal_format,
                        data,
                    );
                } else {
                    gl.tex_sub_image_3d(
                        target.native(),
                        mip_level,
                        origin.x,
                        origin.y,
                        origin.z,
                        size.width,
                        size.height,
                        size.depth_or_array_layers,
                        info.transfer_format,
                        info.transfer_type,
                        data,
                    );
                }
            }
            TextureTarget::Texture2D | TextureTarget::CubeMap => {
                let layer_bytes = format.image_byte_size(size.width, size.height);
                for (i, layer) in data.chunks(layer_bytes).enumerate() {
                    let image_target = if target == TextureTarget::CubeMap {
                        gl::TEXTURE_CUBE_MAP_POSITIVE_X + origin.z + i as u32
                    } else {
                        gl::TEXTURE_2D
                    };
                    if format.is_compressed() {
                        gl.compressed_tex_sub_image_2d(
                            image_target,
                            mip_level,
                            origin.x,
                            origin.y,
                            size.width,
                            size.height,
                            info.internal_format,
                            layer,
                        );
                    } else {
                        gl.tex_sub_image_2d(
                            image_target,
                            mip_level,
                            origin.x,
                            origin.y,
                            size.width,
                            size.height,
                            info.transfer_format,
                            info.transfer_type,
                            layer,
                        );
                    }
                }
            }
        }
        gl.pixel_store_i32(gl::UNPACK_ALIGNMENT, 4);
        gl.bind_texture(target.native(), None);
        Ok(())
    }

    /// Waits for everything submitted so far.
    ///
    /// Polls a fence with zero-timeout waits, yielding between polls.
    pub async fn on_submitted_work_done(&self) -> Result<(), Error> {
        let fence = {
            let mut gl = self.device.0.gl()?;
            let fence = gl
                .fence_sync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0)
                .map_err(Error::Native)?;
            gl.flush();
            fence
        };
        let mut flags = gl::SYNC_FLUSH_COMMANDS_BIT;
        let result = loop {
            let status = match self.device.0.gl() {
                Ok(mut gl) => gl.client_wait_sync(fence, flags, 0),
                Err(e) => break Err(e),
            };
            flags = 0;
            match status {
                gl::ALREADY_SIGNALED | gl::CONDITION_SATISFIED => break Ok(()),
                gl::WAIT_FAILED => {
                    logwise::warn_sync!("fence wait failed");
                    break Err(Error::WaitFailed);
                }
                _ => yield_now().await,
            }
        };
        match self.device.0.gl() {
            Ok(mut gl) => gl.delete_sync(fence),
            Err(_) => {
                logwise::warn_sync!("fence leaked; the context was in use");
            }
        }
        result
    }

    /// Reads `size` bytes at `offset` once submitted work completes.
    pub async fn read_buffer(&self, buffer: &Buffer, offset: u64, size: u64) -> Result<Vec<u8>, Error> {
        self.check_device(buffer.device())?;
        if !buffer
            .usage()
            .intersects(BufferUsages::MAP_READ | BufferUsages::COPY_SRC)
        {
            return Err(Error::InvalidDescriptor(format!(
                "{:?} needs MAP_READ or COPY_SRC to be read back",
                buffer.label()
            )));
        }
        if offset + size > buffer.size() {
            return Err(Error::InvalidDescriptor(format!(
                "read of {} bytes at {} overruns {:?} ({} bytes)",
                size,
                offset,
                buffer.label(),
                buffer.size()
            )));
        }
        self.on_submitted_work_done().await?;
        let native = buffer.native()?;
        let mut out = vec![0; size as usize];
        let mut gl = self.device.0.gl()?;
        gl.bind_buffer(gl::COPY_READ_BUFFER, Some(native));
        gl.get_buffer_sub_data(gl::COPY_READ_BUFFER, offset, &mut out);
        gl.bind_buffer(gl::COPY_READ_BUFFER, None);
        Ok(out)
    }

    /// Reads a region of one mip level once submitted work completes.
    ///
    /// Returns tightly packed texels in the texture's format, layer after layer.  Depth,
    /// stencil and compressed formats can't be read back.
    pub async fn read_texture(
        &self,
        texture: &Texture,
        mip_level: u32,
        origin: Origin3d,
        size: Extent3d,
    ) -> Result<Vec<u8>, Error> {
        self.check_device(texture.device())?;
        let format = texture.format();
        if format.is_depth_stencil() || format.is_compressed() {
            return Err(Error::InvalidDescriptor(format!(
                "{:?} can't be read back",
                format
            )));
        }
        if !texture.usage().contains(TextureUsages::COPY_SRC) {
            return Err(Error::InvalidDescriptor(format!(
                "{:?} lacks COPY_SRC",
                texture.label()
            )));
        }
        let layer_bytes = format.image_byte_size(size.width, size.height);
        let total = layer_bytes * size.depth_or_array_layers as usize;
        check_region(texture, mip_level, origin, size, total)?;
        self.on_submitted_work_done().await?;

        let _perf = logwise::perfwarn_begin!("read_texture");
        let native = texture.native()?;
        let info = format.info();
        let mut out = vec![0; total];
        let mut gl = self.device.0.gl()?;
        let framebuffer = gl.create_framebuffer().map_err(Error::Native)?;
        gl.bind_framebuffer(gl::READ_FRAMEBUFFER, Some(framebuffer));
        gl.pixel_store_i32(gl::PACK_ALIGNMENT, 1);
        for (i, layer) in out.chunks_mut(layer_bytes).enumerate() {
            let z = origin.z + i as u32;
            attach_for_read(&mut **gl, texture, native, mip_level, z);
            gl.read_buffer(gl::COLOR_ATTACHMENT0);
            gl.read_pixels(
                origin.x as i32,
                origin.y as i32,
                size.width as i32,
                size.height as i32,
                info.transfer_format,
                info.transfer_type,
                layer,
            );
        }
        gl.pixel_store_i32(gl::PACK_ALIGNMENT, 4);
        gl.bind_framebuffer(gl::READ_FRAMEBUFFER, None);
        gl.delete_framebuffer(framebuffer);
        Ok(out)
    }

    fn check_device(&self, device: &Rc<crate::imp::BoundDevice>) -> Result<(), Error> {
        if Rc::ptr_eq(device, &self.device.0) {
            Ok(())
        } else {
            Err(Error::InvalidState(
                "resource belongs to another device".to_string(),
            ))
        }
    }
}

fn attach_for_read(
    gl: &mut dyn GlContext,
    texture: &Texture,
    native: crate::imp::gl::NativeTexture,
    level: u32,
    layer: u32,
) {
    match texture.target() {
        TextureTarget::Texture2D => gl.framebuffer_texture_2d(
            gl::READ_FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_2D,
            Some(native),
            level,
        ),
        TextureTarget::CubeMap => gl.framebuffer_texture_2d(
            gl::READ_FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_CUBE_MAP_POSITIVE_X + layer,
            Some(native),
            level,
        ),
        TextureTarget::Texture2DArray | TextureTarget::Texture3D => gl.framebuffer_texture_layer(
            gl::READ_FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            Some(native),
            level,
            layer,
        ),
    }
}

/// Checks a region against the mip level and the byte count against the region.
fn check_region(
    texture: &Texture,
    mip_level: u32,
    origin: Origin3d,
    size: Extent3d,
    bytes: usize,
) -> Result<(), Error> {
    if mip_level >= texture.mip_level_count() {
        return Err(Error::InvalidDescriptor(format!(
            "mip level {} of a {}-level texture",
            mip_level,
            texture.mip_level_count()
        )));
    }
    let extent = texture.mip_extent(mip_level);
    let fits = origin.x + size.width <= extent.width
        && origin.y + size.height <= extent.height
        && origin.z + size.depth_or_array_layers <= extent.depth_or_array_layers;
    if !fits || size.width == 0 || size.height == 0 || size.depth_or_array_layers == 0 {
        return Err(Error::InvalidDescriptor(format!(
            "region {:?}+{:?} is outside mip level {} ({:?})",
            origin, size, mip_level, extent
        )));
    }
    let expected = texture.format().image_byte_size(size.width, size.height)
        * size.depth_or_array_layers as usize;
    if bytes != expected {
        return Err(Error::InvalidDescriptor(format!(
            "{} bytes for a region that needs {}",
            bytes, expected
        )));
    }
    Ok(())
}
