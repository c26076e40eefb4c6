// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The native immediate-mode context the emulation runs on.

[`GlContext`] mirrors the GL ES 3.0 / WebGL2 entry points, one method per call, with the
same argument order.  Enumerated parameters are raw GL enums from [`consts`]; object names are
typed handles so a texture can't be passed where a buffer is expected.

Nothing here keeps state of its own.  All binding state lives in the implementation, which is
exactly the global mutable state the rest of the crate has to tame.
*/

pub mod consts;

use std::num::NonZeroU32;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub NonZeroU32);
    };
}

native_handle!(
    /// A buffer object name.
    NativeBuffer
);
native_handle!(
    /// A texture object name.
    NativeTexture
);
native_handle!(
    /// A sampler object name.
    NativeSampler
);
native_handle!(
    /// A shader object name.
    NativeShader
);
native_handle!(
    /// A program object name.
    NativeProgram
);
native_handle!(
    /// A framebuffer object name.
    NativeFramebuffer
);
native_handle!(
    /// A renderbuffer object name.
    NativeRenderbuffer
);
native_handle!(
    /// A vertex array object name.
    NativeVertexArray
);
native_handle!(
    /// A fence sync object.
    NativeFence
);

/// A uniform location within one linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeUniformLocation(pub u32);

/**
Entry points of an immediate-mode GL context.

Creation calls are fallible, like their native counterparts which return a null name on
context loss or exhaustion.  Everything else reports errors the GL way (not at all), which is
why the emulation never relies on an error flag.
*/
pub trait GlContext {
    // ---- queries ----
    /// Names of every extension the context can enable.
    fn supported_extensions(&self) -> Vec<String>;
    /// Enables an extension by name.  Returns whether it is now active.
    fn enable_extension(&mut self, name: &str) -> bool;
    fn get_parameter_u32(&self, pname: u32) -> u32;
    fn get_parameter_f32(&self, pname: u32) -> f32;

    // ---- buffers ----
    fn create_buffer(&mut self) -> Result<NativeBuffer, String>;
    fn delete_buffer(&mut self, buffer: NativeBuffer);
    fn bind_buffer(&mut self, target: u32, buffer: Option<NativeBuffer>);
    fn bind_buffer_range(
        &mut self,
        target: u32,
        index: u32,
        buffer: Option<NativeBuffer>,
        offset: u64,
        size: u64,
    );
    fn buffer_data_size(&mut self, target: u32, size: u64, usage: u32);
    fn buffer_sub_data(&mut self, target: u32, offset: u64, data: &[u8]);
    fn get_buffer_sub_data(&mut self, target: u32, offset: u64, dst: &mut [u8]);
    fn copy_buffer_sub_data(
        &mut self,
        read_target: u32,
        write_target: u32,
        read_offset: u64,
        write_offset: u64,
        size: u64,
    );

    // ---- textures ----
    fn create_texture(&mut self) -> Result<NativeTexture, String>;
    fn delete_texture(&mut self, texture: NativeTexture);
    /// `unit` is the enum value, `TEXTURE0 + n`.
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: u32, texture: Option<NativeTexture>);
    fn tex_storage_2d(
        &mut self,
        target: u32,
        levels: u32,
        internal_format: u32,
        width: u32,
        height: u32,
    );
    fn tex_storage_3d(
        &mut self,
        target: u32,
        levels: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        depth: u32,
    );
    fn tex_parameter_i32(&mut self, target: u32, pname: u32, value: i32);
    /// `UNPACK_ALIGNMENT` / `PACK_ALIGNMENT`.
    fn pixel_store_i32(&mut self, pname: u32, value: i32);
    /// `target` is `TEXTURE_2D` or one cube face.
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_2d(
        &mut self,
        target: u32,
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    );
    #[allow(clippy::too_many_arguments)]
    fn compressed_tex_sub_image_2d(
        &mut self,
        target: u32,
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: u32,
        data: &[u8],
    );
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_3d(
        &mut self,
        target: u32,
        level: u32,
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    );
    /// `format` is the compressed internal format of the texture.
    #[allow(clippy::too_many_arguments)]
    fn compressed_tex_sub_image_3d(
        &mut self,
        target: u32,
        level: u32,
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
        format: u32,
        data: &[u8],
    );

    // ---- samplers ----
    fn create_sampler(&mut self) -> Result<NativeSampler, String>;
    fn delete_sampler(&mut self, sampler: NativeSampler);
    /// `unit` is the plain unit index, not an enum.
    fn bind_sampler(&mut self, unit: u32, sampler: Option<NativeSampler>);
    fn sampler_parameter_i32(&mut self, sampler: NativeSampler, pname: u32, value: i32);
    fn sampler_parameter_f32(&mut self, sampler: NativeSampler, pname: u32, value: f32);

    // ---- shaders and programs ----
    fn create_shader(&mut self, stage: u32) -> Result<NativeShader, String>;
    fn shader_source(&mut self, shader: NativeShader, source: &str);
    fn compile_shader(&mut self, shader: NativeShader);
    fn get_shader_compile_status(&self, shader: NativeShader) -> bool;
    fn get_shader_info_log(&self, shader: NativeShader) -> String;
    fn delete_shader(&mut self, shader: NativeShader);
    fn create_program(&mut self) -> Result<NativeProgram, String>;
    fn attach_shader(&mut self, program: NativeProgram, shader: NativeShader);
    fn link_program(&mut self, program: NativeProgram);
    /// `COMPLETION_STATUS_KHR`.  Contexts without parallel compile report `true`.
    fn get_program_completion_status(&self, program: NativeProgram) -> bool;
    fn get_program_link_status(&self, program: NativeProgram) -> bool;
    fn get_program_info_log(&self, program: NativeProgram) -> String;
    fn delete_program(&mut self, program: NativeProgram);
    fn use_program(&mut self, program: Option<NativeProgram>);
    fn get_uniform_block_index(&self, program: NativeProgram, name: &str) -> Option<u32>;
    fn uniform_block_binding(&mut self, program: NativeProgram, index: u32, binding: u32);
    fn get_uniform_location(
        &self,
        program: NativeProgram,
        name: &str,
    ) -> Option<NativeUniformLocation>;
    fn uniform_1_i32(&mut self, location: &NativeUniformLocation, value: i32);

    // ---- vertex input ----
    fn create_vertex_array(&mut self) -> Result<NativeVertexArray, String>;
    fn delete_vertex_array(&mut self, vertex_array: NativeVertexArray);
    fn bind_vertex_array(&mut self, vertex_array: Option<NativeVertexArray>);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer_f32(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn vertex_attrib_pointer_i32(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        stride: i32,
        offset: i32,
    );
    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32);

    // ---- framebuffers ----
    fn create_framebuffer(&mut self) -> Result<NativeFramebuffer, String>;
    fn delete_framebuffer(&mut self, framebuffer: NativeFramebuffer);
    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<NativeFramebuffer>);
    fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<NativeTexture>,
        level: u32,
    );
    fn framebuffer_texture_layer(
        &mut self,
        target: u32,
        attachment: u32,
        texture: Option<NativeTexture>,
        level: u32,
        layer: u32,
    );
    fn create_renderbuffer(&mut self) -> Result<NativeRenderbuffer, String>;
    fn delete_renderbuffer(&mut self, renderbuffer: NativeRenderbuffer);
    fn bind_renderbuffer(&mut self, target: u32, renderbuffer: Option<NativeRenderbuffer>);
    fn renderbuffer_storage_multisample(
        &mut self,
        target: u32,
        samples: u32,
        internal_format: u32,
        width: u32,
        height: u32,
    );
    fn framebuffer_renderbuffer(
        &mut self,
        target: u32,
        attachment: u32,
        renderbuffer_target: u32,
        renderbuffer: Option<NativeRenderbuffer>,
    );
    fn check_framebuffer_status(&self, target: u32) -> u32;
    fn draw_buffers(&mut self, buffers: &[u32]);
    fn read_buffer(&mut self, src: u32);
    fn clear_buffer_f32_slice(&mut self, buffer: u32, draw_buffer: u32, values: &[f32]);
    fn clear_buffer_i32_slice(&mut self, buffer: u32, draw_buffer: u32, values: &[i32]);
    fn clear_buffer_u32_slice(&mut self, buffer: u32, draw_buffer: u32, values: &[u32]);
    fn clear_buffer_depth_stencil(
        &mut self,
        buffer: u32,
        draw_buffer: u32,
        depth: f32,
        stencil: i32,
    );
    #[allow(clippy::too_many_arguments)]
    fn blit_framebuffer(
        &mut self,
        src_x0: i32,
        src_y0: i32,
        src_x1: i32,
        src_y1: i32,
        dst_x0: i32,
        dst_y0: i32,
        dst_x1: i32,
        dst_y1: i32,
        mask: u32,
        filter: u32,
    );

    // ---- fixed function state ----
    fn enable(&mut self, capability: u32);
    fn disable(&mut self, capability: u32);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn depth_range_f32(&mut self, near: f32, far: f32);
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn cull_face(&mut self, face: u32);
    fn front_face(&mut self, mode: u32);
    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool);
    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);
    fn blend_equation_separate(&mut self, mode_rgb: u32, mode_alpha: u32);
    fn blend_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32);
    fn depth_func(&mut self, func: u32);
    fn depth_mask(&mut self, flag: bool);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn stencil_func_separate(&mut self, face: u32, func: u32, reference: i32, mask: u32);
    fn stencil_op_separate(&mut self, face: u32, fail: u32, depth_fail: u32, pass: u32);
    fn stencil_mask_separate(&mut self, face: u32, mask: u32);

    // ---- draws ----
    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instance_count: i32);
    fn draw_elements_instanced(
        &mut self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: i32,
        instance_count: i32,
    );

    // ---- readback and sync ----
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        dst: &mut [u8],
    );
    fn fence_sync(&mut self, condition: u32, flags: u32) -> Result<NativeFence, String>;
    /// Returns one of `ALREADY_SIGNALED`, `TIMEOUT_EXPIRED`, `CONDITION_SATISFIED`, `WAIT_FAILED`.
    fn client_wait_sync(&mut self, fence: NativeFence, flags: u32, timeout_ns: i32) -> u32;
    fn delete_sync(&mut self, fence: NativeFence);
    fn flush(&mut self);
}
