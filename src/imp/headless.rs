// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
An in-memory [GlContext] for tests and headless tooling.

[HeadlessContext] records every call, in order, and simulates enough of the context to follow
data through it: buffer contents, texture and renderbuffer images, framebuffer attachments,
clears, color and depth blits, `read_pixels`, shader compile and link status, the parallel
compile completion query and fences.  It does not rasterize; draws are only recorded.

Renderbuffers keep one image regardless of their sample count, which is what a resolve of
uniformly cleared samples produces.

Clones share state, so a test can keep one clone and hand the other to a
[crate::images::device::Device].

```
use descriptor_bridge::{Device, DeviceConfig, HeadlessContext};

let context = HeadlessContext::new();
let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
assert!(context.calls().iter().any(|c| c.name == "create_vertex_array"));
# drop(device);
```
*/

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::rc::Rc;

use crate::imp::gl::consts as gl;
use crate::imp::gl::{
    GlContext, NativeBuffer, NativeFence, NativeFramebuffer, NativeProgram, NativeRenderbuffer,
    NativeSampler, NativeShader, NativeTexture, NativeUniformLocation, NativeVertexArray,
};
use crate::pixel_formats::{SampleKind, TextureFormat};

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct GlCall {
    pub name: &'static str,
    /// Numeric arguments in call order.  Object names are their raw values, `None` is 0,
    /// floats are truncated and slices are reduced to their length.
    pub args: Vec<i64>,
    /// The name a uniform call resolved to, or a shader's source.
    pub text: Option<String>,
}

impl GlCall {
    /// Argument `index`, or 0 if there is none.
    pub fn arg(&self, index: usize) -> i64 {
        self.args.get(index).copied().unwrap_or(0)
    }
}

/// Counts of objects that were created and not yet deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveObjects {
    pub buffers: usize,
    pub textures: usize,
    pub samplers: usize,
    pub shaders: usize,
    pub programs: usize,
    pub framebuffers: usize,
    pub renderbuffers: usize,
    pub vertex_arrays: usize,
    pub fences: usize,
}

#[derive(Debug, Clone)]
struct Image {
    format: TextureFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Image {
    fn new(format: TextureFormat, width: u32, height: u32) -> Self {
        Image {
            format,
            width,
            height,
            data: vec![0; format.image_byte_size(width, height)],
        }
    }

    fn block(&self) -> (usize, u32) {
        let info = self.format.info();
        (info.bytes_per_block as usize, info.block_dimension as u32)
    }

    fn row_pitch(&self) -> usize {
        let (bytes, block) = self.block();
        self.width.div_ceil(block) as usize * bytes
    }

    /// Byte range of each row of blocks covering `x..x+w` over `y..y+h`, clipped to the image.
    fn rows(&self, x: u32, y: u32, w: u32, h: u32) -> Vec<std::ops::Range<usize>> {
        let (bytes, block) = self.block();
        let pitch = self.row_pitch();
        let x0 = (x / block).min(self.width.div_ceil(block)) as usize;
        let x1 = (x + w).div_ceil(block).min(self.width.div_ceil(block)) as usize;
        let y0 = y / block;
        let y1 = (y + h).div_ceil(block).min(self.height.div_ceil(block));
        (y0..y1)
            .map(|row| {
                let start = row as usize * pitch;
                start + x0 * bytes..start + x1 * bytes
            })
            .collect()
    }

    fn write(&mut self, x: u32, y: u32, w: u32, h: u32, src: &[u8]) {
        let mut offset = 0;
        for range in self.rows(x, y, w, h) {
            let len = range.len();
            if offset + len > src.len() {
                break;
            }
            self.data[range].copy_from_slice(&src[offset..offset + len]);
            offset += len;
        }
    }

    fn read(&self, x: u32, y: u32, w: u32, h: u32) -> Vec<u8> {
        self.rows(x, y, w, h)
            .into_iter()
            .flat_map(|range| self.data[range].iter().copied())
            .collect()
    }

    fn fill(&mut self, texel: &[u8]) {
        if texel.is_empty() {
            return;
        }
        for chunk in self.data.chunks_mut(texel.len()) {
            let n = chunk.len();
            chunk.copy_from_slice(&texel[..n]);
        }
    }
}

#[derive(Debug, Default)]
struct TextureObject {
    levels: u32,
    images: HashMap<(u32, u32), Image>,
}

#[derive(Debug)]
struct RenderbufferObject {
    samples: u32,
    image: Option<Image>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attachment {
    Texture { texture: u32, level: u32, layer: u32 },
    Renderbuffer(u32),
}

#[derive(Debug)]
struct FramebufferObject {
    attachments: HashMap<u32, Attachment>,
    draw_buffers: Vec<u32>,
    read_buffer: u32,
}

impl Default for FramebufferObject {
    fn default() -> Self {
        FramebufferObject {
            attachments: HashMap::new(),
            draw_buffers: vec![gl::COLOR_ATTACHMENT0],
            read_buffer: gl::COLOR_ATTACHMENT0,
        }
    }
}

#[derive(Debug)]
struct ShaderObject {
    source: String,
    compiled: bool,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<u32>,
    linked: Option<bool>,
    polls_left: u32,
    blocks: Vec<String>,
    uniforms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClearValue {
    Float([f32; 4]),
    Uint([u32; 4]),
    Int([i32; 4]),
}

#[derive(Debug)]
struct State {
    calls: Vec<GlCall>,
    next_name: u32,
    fail_creation: bool,
    extensions: Vec<String>,
    enabled_extensions: Vec<String>,
    parameters: HashMap<u32, f32>,
    compile_failure_marker: String,
    link_failure_marker: String,
    completion_polls: u32,
    fence_polls: u32,
    fence_failure: bool,
    framebuffer_status: Option<u32>,

    buffers: HashMap<u32, Vec<u8>>,
    buffer_bindings: HashMap<u32, u32>,
    textures: HashMap<u32, TextureObject>,
    active_unit: u32,
    texture_bindings: HashMap<(u32, u32), u32>,
    samplers: HashSet<u32>,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    current_program: u32,
    vertex_arrays: HashSet<u32>,
    framebuffers: HashMap<u32, FramebufferObject>,
    read_framebuffer: u32,
    draw_framebuffer: u32,
    renderbuffers: HashMap<u32, RenderbufferObject>,
    bound_renderbuffer: u32,
    fences: HashMap<u32, u32>,
    capabilities: HashSet<u32>,
}

impl State {
    fn new() -> Self {
        let parameters = [
            (gl::MAX_TEXTURE_SIZE, 4096.0),
            (gl::MAX_3D_TEXTURE_SIZE, 2048.0),
            (gl::MAX_ARRAY_TEXTURE_LAYERS, 256.0),
            (gl::MAX_CUBE_MAP_TEXTURE_SIZE, 4096.0),
            (gl::MAX_UNIFORM_BUFFER_BINDINGS, 24.0),
            (gl::MAX_UNIFORM_BLOCK_SIZE, 16384.0),
            (gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT, 256.0),
            (gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS, 32.0),
            (gl::MAX_VERTEX_ATTRIBS, 16.0),
            (gl::MAX_SAMPLES, 4.0),
            (gl::MAX_DRAW_BUFFERS, 4.0),
            (gl::MAX_COLOR_ATTACHMENTS, 4.0),
            (gl::MAX_TEXTURE_MAX_ANISOTROPY_EXT, 16.0),
        ]
        .into_iter()
        .collect();
        State {
            calls: Vec::new(),
            next_name: 0,
            fail_creation: false,
            extensions: Vec::new(),
            enabled_extensions: Vec::new(),
            parameters,
            compile_failure_marker: "#error".to_string(),
            link_failure_marker: "#link_error".to_string(),
            completion_polls: 0,
            fence_polls: 0,
            fence_failure: false,
            framebuffer_status: None,
            buffers: HashMap::new(),
            buffer_bindings: HashMap::new(),
            textures: HashMap::new(),
            active_unit: 0,
            texture_bindings: HashMap::new(),
            samplers: HashSet::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            current_program: 0,
            vertex_arrays: HashSet::new(),
            framebuffers: HashMap::new(),
            read_framebuffer: 0,
            draw_framebuffer: 0,
            renderbuffers: HashMap::new(),
            bound_renderbuffer: 0,
            fences: HashMap::new(),
            capabilities: HashSet::new(),
        }
    }

    fn log(&mut self, name: &'static str, args: &[i64]) {
        self.calls.push(GlCall {
            name,
            args: args.to_vec(),
            text: None,
        });
    }

    fn log_text(&mut self, name: &'static str, args: &[i64], text: &str) {
        self.calls.push(GlCall {
            name,
            args: args.to_vec(),
            text: Some(text.to_string()),
        });
    }

    fn create(&mut self, name: &'static str) -> Result<NonZeroU32, String> {
        if self.fail_creation {
            self.log(name, &[0]);
            return Err(format!("{name}: context lost"));
        }
        let handle = NonZeroU32::MIN.saturating_add(self.next_name);
        self.next_name += 1;
        self.log(name, &[handle.get() as i64]);
        Ok(handle)
    }

    fn bound_texture(&self, target: u32) -> Option<u32> {
        self.texture_bindings.get(&(self.active_unit, target)).copied()
    }

    /// The bound texture and layer an image target addresses.
    fn image_target(&self, target: u32) -> Option<(u32, u32)> {
        let face = target.wrapping_sub(gl::TEXTURE_CUBE_MAP_POSITIVE_X);
        if face < 6 {
            self.bound_texture(gl::TEXTURE_CUBE_MAP).map(|t| (t, face))
        } else {
            self.bound_texture(target).map(|t| (t, 0))
        }
    }

    fn framebuffer_for(&self, target: u32) -> u32 {
        if target == gl::READ_FRAMEBUFFER {
            self.read_framebuffer
        } else {
            self.draw_framebuffer
        }
    }

    fn image(&self, attachment: Attachment) -> Option<&Image> {
        match attachment {
            Attachment::Texture {
                texture,
                level,
                layer,
            } => self.textures.get(&texture)?.images.get(&(level, layer)),
            Attachment::Renderbuffer(rb) => self.renderbuffers.get(&rb)?.image.as_ref(),
        }
    }

    fn image_mut(&mut self, attachment: Attachment) -> Option<&mut Image> {
        match attachment {
            Attachment::Texture {
                texture,
                level,
                layer,
            } => self
                .textures
                .get_mut(&texture)?
                .images
                .get_mut(&(level, layer)),
            Attachment::Renderbuffer(rb) => self.renderbuffers.get_mut(&rb)?.image.as_mut(),
        }
    }

    fn attachment(&self, framebuffer: u32, point: u32) -> Option<Attachment> {
        self.framebuffers
            .get(&framebuffer)?
            .attachments
            .get(&point)
            .copied()
    }

    /// The depth or stencil attachment of a framebuffer, whichever point it was attached at.
    fn depth_stencil_attachment(&self, framebuffer: u32) -> Option<Attachment> {
        [
            gl::DEPTH_STENCIL_ATTACHMENT,
            gl::DEPTH_ATTACHMENT,
            gl::STENCIL_ATTACHMENT,
        ]
        .into_iter()
        .find_map(|p| self.attachment(framebuffer, p))
    }

    fn attach(&mut self, target: u32, point: u32, attachment: Option<Attachment>) {
        let framebuffer = self.framebuffer_for(target);
        let Some(fb) = self.framebuffers.get_mut(&framebuffer) else {
            return;
        };
        let points: &[u32] = if point == gl::DEPTH_STENCIL_ATTACHMENT {
            &[gl::DEPTH_STENCIL_ATTACHMENT, gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT]
        } else {
            &[point]
        };
        for p in points {
            fb.attachments.remove(p);
        }
        if let Some(a) = attachment {
            fb.attachments.insert(point, a);
        }
    }

    fn clear_color(&mut self, draw_buffer: u32, value: ClearValue) {
        let Some(fb) = self.framebuffers.get(&self.draw_framebuffer) else {
            return;
        };
        let Some(point) = fb.draw_buffers.get(draw_buffer as usize).copied() else {
            return;
        };
        if point == gl::NONE {
            return;
        }
        let Some(attachment) = self.attachment(self.draw_framebuffer, point) else {
            return;
        };
        if let Some(image) = self.image_mut(attachment)
            && let Some(texel) = encode_color(image.format, value)
        {
            image.fill(&texel);
        }
    }

    fn clear_depth_stencil(&mut self, depth: Option<f32>, stencil: Option<u8>) {
        let Some(attachment) = self.depth_stencil_attachment(self.draw_framebuffer) else {
            return;
        };
        let Some(image) = self.image_mut(attachment) else {
            return;
        };
        let (bytes, _) = image.block();
        let format = image.format;
        for texel in image.data.chunks_mut(bytes) {
            write_depth_stencil(format, texel, depth, stencil);
        }
    }

    fn blit(&mut self, src: [i32; 4], dst: [i32; 4], mask: u32) {
        let [sx0, sy0, sx1, sy1] = src;
        let [dx0, dy0, dx1, dy1] = dst;
        let w = (sx1 - sx0).min(dx1 - dx0).max(0) as u32;
        let h = (sy1 - sy0).min(dy1 - dy0).max(0) as u32;
        let mut copies = Vec::new();
        if mask & gl::COLOR_BUFFER_BIT != 0
            && let Some(read) = self.framebuffers.get(&self.read_framebuffer)
            && let Some(source) = read.attachments.get(&read.read_buffer).copied()
            && let Some(draw) = self.framebuffers.get(&self.draw_framebuffer)
        {
            for point in draw.draw_buffers.iter().filter(|p| **p != gl::NONE) {
                if let Some(destination) = draw.attachments.get(point) {
                    copies.push((source, *destination));
                }
            }
        }
        if mask & (gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT) != 0
            && let Some(source) = self.depth_stencil_attachment(self.read_framebuffer)
            && let Some(destination) = self.depth_stencil_attachment(self.draw_framebuffer)
        {
            copies.push((source, destination));
        }
        for (source, destination) in copies {
            let Some(image) = self.image(source) else {
                continue;
            };
            let format = image.format;
            let data = image.read(sx0 as u32, sy0 as u32, w, h);
            if let Some(target) = self.image_mut(destination)
                && target.block() == (format.info().bytes_per_block as usize, 1)
            {
                target.write(dx0 as u32, dy0 as u32, w, h, &data);
            }
        }
    }

    fn framebuffer_status(&self, target: u32) -> u32 {
        if let Some(status) = self.framebuffer_status {
            return status;
        }
        let Some(fb) = self.framebuffers.get(&self.framebuffer_for(target)) else {
            return gl::FRAMEBUFFER_COMPLETE;
        };
        if fb.attachments.is_empty() {
            return gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        let mut samples = HashSet::new();
        for attachment in fb.attachments.values() {
            if self.image(*attachment).is_none() {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            samples.insert(match attachment {
                Attachment::Renderbuffer(rb) => {
                    self.renderbuffers.get(rb).map_or(0, |r| r.samples)
                }
                Attachment::Texture { .. } => 0,
            });
        }
        if samples.len() > 1 {
            gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE
        } else {
            gl::FRAMEBUFFER_COMPLETE
        }
    }

    fn program_sources(&self, program: u32) -> Vec<&str> {
        self.programs
            .get(&program)
            .map(|p| {
                p.shaders
                    .iter()
                    .filter_map(|s| self.shaders.get(s))
                    .map(|s| s.source.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn encode_color(format: TextureFormat, value: ClearValue) -> Option<Vec<u8>> {
    let info = format.info();
    let n = info.components as usize;
    let mut out = Vec::with_capacity(info.bytes_per_block as usize);
    match (info.kind, value) {
        (SampleKind::Float, ClearValue::Float(v)) => match info.transfer_type {
            gl::UNSIGNED_BYTE => out.extend(
                v[..n]
                    .iter()
                    .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8),
            ),
            gl::BYTE => out.extend(
                v[..n]
                    .iter()
                    .map(|c| (c.clamp(-1.0, 1.0) * 127.0).round() as i8 as u8),
            ),
            gl::HALF_FLOAT => {
                for c in &v[..n] {
                    out.extend(half::f16::from_f32(*c).to_le_bytes());
                }
            }
            gl::FLOAT => {
                for c in &v[..n] {
                    out.extend(c.to_le_bytes());
                }
            }
            _ => return None,
        },
        (SampleKind::Uint, ClearValue::Uint(v)) => {
            for c in &v[..n] {
                match info.transfer_type {
                    gl::UNSIGNED_BYTE => out.push(*c as u8),
                    gl::UNSIGNED_SHORT => out.extend((*c as u16).to_le_bytes()),
                    _ => out.extend(c.to_le_bytes()),
                }
            }
        }
        (SampleKind::Sint, ClearValue::Int(v)) => {
            for c in &v[..n] {
                match info.transfer_type {
                    gl::BYTE => out.push(*c as i8 as u8),
                    gl::SHORT => out.extend((*c as i16).to_le_bytes()),
                    _ => out.extend(c.to_le_bytes()),
                }
            }
        }
        _ => return None,
    }
    Some(out)
}

/// Updates one depth/stencil texel, leaving the aspect that isn't given alone.
fn write_depth_stencil(format: TextureFormat, texel: &mut [u8], depth: Option<f32>, stencil: Option<u8>) {
    match format {
        TextureFormat::Depth16Unorm => {
            if let Some(d) = depth {
                texel.copy_from_slice(&((d.clamp(0.0, 1.0) * 65535.0).round() as u16).to_le_bytes());
            }
        }
        TextureFormat::Depth24Plus => {
            if let Some(d) = depth {
                texel.copy_from_slice(&((d.clamp(0.0, 1.0) * 16777215.0).round() as u32).to_le_bytes());
            }
        }
        TextureFormat::Depth32Float => {
            if let Some(d) = depth {
                texel.copy_from_slice(&d.to_le_bytes());
            }
        }
        TextureFormat::Depth24PlusStencil8 => {
            let mut packed = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
            if let Some(d) = depth {
                packed = (((d.clamp(0.0, 1.0) * 16777215.0).round() as u32) << 8) | (packed & 0xff);
            }
            if let Some(s) = stencil {
                packed = (packed & !0xff) | s as u32;
            }
            texel.copy_from_slice(&packed.to_le_bytes());
        }
        TextureFormat::Depth32FloatStencil8 => {
            if let Some(d) = depth {
                texel[..4].copy_from_slice(&d.to_le_bytes());
            }
            if let Some(s) = stencil {
                texel[4] = s;
            }
        }
        TextureFormat::Stencil8 => {
            if let Some(s) = stencil {
                texel[0] = s;
            }
        }
        _ => {}
    }
}

fn raw<T: Copy>(handle: Option<T>, get: impl Fn(T) -> u32) -> i64 {
    handle.map_or(0, |h| get(h) as i64)
}

/// A recording, simulating context.  See the module docs.
#[derive(Debug, Clone)]
pub struct HeadlessContext(Rc<RefCell<State>>);

impl Default for HeadlessContext {
    fn default() -> Self {
        HeadlessContext(Rc::new(RefCell::new(State::new())))
    }
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers `extensions` to the device.
    pub fn with_extensions(self, extensions: &[&str]) -> Self {
        self.0.borrow_mut().extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<GlCall> {
        self.0.borrow().calls.clone()
    }

    /// Names of every call so far.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.0.borrow().calls.iter().map(|c| c.name).collect()
    }

    pub fn clear_calls(&self) {
        self.0.borrow_mut().calls.clear();
    }

    pub fn enabled_extensions(&self) -> Vec<String> {
        self.0.borrow().enabled_extensions.clone()
    }

    pub fn set_parameter(&self, pname: u32, value: f32) {
        self.0.borrow_mut().parameters.insert(pname, value);
    }

    /// Programs linked from now on report incomplete for `polls` completion queries.
    pub fn set_completion_polls(&self, polls: u32) {
        self.0.borrow_mut().completion_polls = polls;
    }

    /// Fences created from now on time out `polls` times before signaling.
    pub fn set_fence_polls(&self, polls: u32) {
        self.0.borrow_mut().fence_polls = polls;
    }

    /// Makes every fence wait fail.
    pub fn set_fence_failure(&self, fail: bool) {
        self.0.borrow_mut().fence_failure = fail;
    }

    /// Shaders whose source contains `marker` fail to compile.  Defaults to `#error`.
    pub fn set_compile_failure_marker(&self, marker: &str) {
        self.0.borrow_mut().compile_failure_marker = marker.to_string();
    }

    /// Programs with a shader containing `marker` fail to link.  Defaults to `#link_error`.
    pub fn set_link_failure_marker(&self, marker: &str) {
        self.0.borrow_mut().link_failure_marker = marker.to_string();
    }

    /// Forces every framebuffer status query to return `status`.
    pub fn set_framebuffer_status(&self, status: Option<u32>) {
        self.0.borrow_mut().framebuffer_status = status;
    }

    /// Makes every creation call fail, as after context loss.
    pub fn set_creation_failure(&self, fail: bool) {
        self.0.borrow_mut().fail_creation = fail;
    }

    /// Whether a capability is enabled.
    pub fn is_enabled(&self, capability: u32) -> bool {
        self.0.borrow().capabilities.contains(&capability)
    }

    pub fn live_objects(&self) -> LiveObjects {
        let s = self.0.borrow();
        LiveObjects {
            buffers: s.buffers.len(),
            textures: s.textures.len(),
            samplers: s.samplers.len(),
            shaders: s.shaders.len(),
            programs: s.programs.len(),
            framebuffers: s.framebuffers.len(),
            renderbuffers: s.renderbuffers.len(),
            vertex_arrays: s.vertex_arrays.len(),
            fences: s.fences.len(),
        }
    }
}

impl GlContext for HeadlessContext {
    fn supported_extensions(&self) -> Vec<String> {
        let mut s = self.0.borrow_mut();
        s.log("supported_extensions", &[]);
        s.extensions.clone()
    }

    fn enable_extension(&mut self, name: &str) -> bool {
        let mut s = self.0.borrow_mut();
        s.log_text("enable_extension", &[], name);
        let offered = s.extensions.iter().any(|e| e.strip_prefix("GL_").unwrap_or(e) == name);
        if offered {
            s.enabled_extensions.push(name.to_string());
        }
        offered
    }

    fn get_parameter_u32(&self, pname: u32) -> u32 {
        let s = self.0.borrow();
        s.parameters.get(&pname).copied().unwrap_or(0.0) as u32
    }

    fn get_parameter_f32(&self, pname: u32) -> f32 {
        let s = self.0.borrow();
        s.parameters.get(&pname).copied().unwrap_or(0.0)
    }

    fn create_buffer(&mut self) -> Result<NativeBuffer, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("create_buffer")?;
        s.buffers.insert(name.get(), Vec::new());
        Ok(NativeBuffer(name))
    }

    fn delete_buffer(&mut self, buffer: NativeBuffer) {
        let mut s = self.0.borrow_mut();
        s.log("delete_buffer", &[buffer.0.get() as i64]);
        s.buffers.remove(&buffer.0.get());
        s.buffer_bindings.retain(|_, b| *b != buffer.0.get());
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<NativeBuffer>) {
        let mut s = self.0.borrow_mut();
        s.log("bind_buffer", &[target as i64, raw(buffer, |b| b.0.get())]);
        match buffer {
            Some(b) => s.buffer_bindings.insert(target, b.0.get()),
            None => s.buffer_bindings.remove(&target),
        };
    }

    fn bind_buffer_range(
        &mut self,
        target: u32,
        index: u32,
        buffer: Option<NativeBuffer>,
        offset: u64,
        size: u64,
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "bind_buffer_range",
            &[
                target as i64,
                index as i64,
                raw(buffer, |b| b.0.get()),
                offset as i64,
                size as i64,
            ],
        );
        if let Some(b) = buffer {
            s.buffer_bindings.insert(target, b.0.get());
        }
    }

    fn buffer_data_size(&mut self, target: u32, size: u64, usage: u32) {
        let mut s = self.0.borrow_mut();
        s.log("buffer_data_size", &[target as i64, size as i64, usage as i64]);
        if let Some(b) = s.buffer_bindings.get(&target).copied()
            && let Some(data) = s.buffers.get_mut(&b)
        {
            *data = vec![0; size as usize];
        }
    }

    fn buffer_sub_data(&mut self, target: u32, offset: u64, data: &[u8]) {
        let mut s = self.0.borrow_mut();
        s.log("buffer_sub_data", &[target as i64, offset as i64, data.len() as i64]);
        if let Some(b) = s.buffer_bindings.get(&target).copied()
            && let Some(contents) = s.buffers.get_mut(&b)
        {
            let start = (offset as usize).min(contents.len());
            let end = (start + data.len()).min(contents.len());
            contents[start..end].copy_from_slice(&data[..end - start]);
        }
    }

    fn get_buffer_sub_data(&mut self, target: u32, offset: u64, dst: &mut [u8]) {
        let mut s = self.0.borrow_mut();
        s.log("get_buffer_sub_data", &[target as i64, offset as i64, dst.len() as i64]);
        if let Some(b) = s.buffer_bindings.get(&target).copied()
            && let Some(contents) = s.buffers.get(&b)
        {
            let start = (offset as usize).min(contents.len());
            let end = (start + dst.len()).min(contents.len());
            dst[..end - start].copy_from_slice(&contents[start..end]);
        }
    }

    fn copy_buffer_sub_data(
        &mut self,
        read_target: u32,
        write_target: u32,
        read_offset: u64,
        write_offset: u64,
        size: u64,
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "copy_buffer_sub_data",
            &[
                read_target as i64,
                write_target as i64,
                read_offset as i64,
                write_offset as i64,
                size as i64,
            ],
        );
        let source = s
            .buffer_bindings
            .get(&read_target)
            .and_then(|b| s.buffers.get(b))
            .and_then(|c| c.get(read_offset as usize..(read_offset + size) as usize))
            .map(<[u8]>::to_vec);
        if let Some(source) = source
            && let Some(b) = s.buffer_bindings.get(&write_target).copied()
            && let Some(dst) = s.buffers.get_mut(&b)
            && let Some(range) = dst.get_mut(write_offset as usize..(write_offset + size) as usize)
        {
            range.copy_from_slice(&source);
        }
    }

    fn create_texture(&mut self) -> Result<NativeTexture, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("create_texture")?;
        s.textures.insert(name.get(), TextureObject::default());
        Ok(NativeTexture(name))
    }

    fn delete_texture(&mut self, texture: NativeTexture) {
        let mut s = self.0.borrow_mut();
        s.log("delete_texture", &[texture.0.get() as i64]);
        s.textures.remove(&texture.0.get());
        s.texture_bindings.retain(|_, t| *t != texture.0.get());
    }

    fn active_texture(&mut self, unit: u32) {
        let mut s = self.0.borrow_mut();
        s.log("active_texture", &[unit as i64]);
        s.active_unit = unit.wrapping_sub(gl::TEXTURE0);
    }

    fn bind_texture(&mut self, target: u32, texture: Option<NativeTexture>) {
        let mut s = self.0.borrow_mut();
        s.log("bind_texture", &[target as i64, raw(texture, |t| t.0.get())]);
        let unit = s.active_unit;
        match texture {
            Some(t) => s.texture_bindings.insert((unit, target), t.0.get()),
            None => s.texture_bindings.remove(&(unit, target)),
        };
    }

    fn tex_storage_2d(&mut self, target: u32, levels: u32, internal_format: u32, width: u32, height: u32) {
        let mut s = self.0.borrow_mut();
        s.log(
            "tex_storage_2d",
            &[target as i64, levels as i64, internal_format as i64, width as i64, height as i64],
        );
        let layers = if target == gl::TEXTURE_CUBE_MAP { 6 } else { 1 };
        let Some(format) = TextureFormat::from_internal_format(internal_format) else {
            return;
        };
        if let Some(t) = s.bound_texture(target)
            && let Some(texture) = s.textures.get_mut(&t)
        {
            texture.levels = levels;
            for level in 0..levels {
                let (w, h) = ((width >> level).max(1), (height >> level).max(1));
                for layer in 0..layers {
                    texture.images.insert((level, layer), Image::new(format, w, h));
                }
            }
        }
    }

    fn tex_storage_3d(
        &mut self,
        target: u32,
        levels: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        depth: u32,
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "tex_storage_3d",
            &[
                target as i64,
                levels as i64,
                internal_format as i64,
                width as i64,
                height as i64,
                depth as i64,
            ],
        );
        let Some(format) = TextureFormat::from_internal_format(internal_format) else {
            return;
        };
        if let Some(t) = s.bound_texture(target)
            && let Some(texture) = s.textures.get_mut(&t)
        {
            texture.levels = levels;
            for level in 0..levels {
                let (w, h) = ((width >> level).max(1), (height >> level).max(1));
                let layers = if target == gl::TEXTURE_3D {
                    (depth >> level).max(1)
                } else {
                    depth
                };
                for layer in 0..layers {
                    texture.images.insert((level, layer), Image::new(format, w, h));
                }
            }
        }
    }

    fn tex_parameter_i32(&mut self, target: u32, pname: u32, value: i32) {
        self.0
            .borrow_mut()
            .log("tex_parameter_i32", &[target as i64, pname as i64, value as i64]);
    }

    fn pixel_store_i32(&mut self, pname: u32, value: i32) {
        self.0
            .borrow_mut()
            .log("pixel_store_i32", &[pname as i64, value as i64]);
    }

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
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "tex_sub_image_2d",
            &[
                target as i64,
                level as i64,
                x as i64,
                y as i64,
                width as i64,
                height as i64,
                format as i64,
                ty as i64,
                pixels.len() as i64,
            ],
        );
        if let Some((t, layer)) = s.image_target(target)
            && let Some(image) = s.image_mut(Attachment::Texture {
                texture: t,
                level,
                layer,
            })
        {
            image.write(x, y, width, height, pixels);
        }
    }

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
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "compressed_tex_sub_image_2d",
            &[
                target as i64,
                level as i64,
                x as i64,
                y as i64,
                width as i64,
                height as i64,
                format as i64,
                data.len() as i64,
            ],
        );
        if let Some((t, layer)) = s.image_target(target)
            && let Some(image) = s.image_mut(Attachment::Texture {
                texture: t,
                level,
                layer,
            })
        {
            image.write(x, y, width, height, data);
        }
    }

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
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "tex_sub_image_3d",
            &[
                target as i64,
                level as i64,
                x as i64,
                y as i64,
                z as i64,
                width as i64,
                height as i64,
                depth as i64,
                format as i64,
                ty as i64,
                pixels.len() as i64,
            ],
        );
        let Some(t) = s.bound_texture(target) else {
            return;
        };
        let layer_bytes = pixels.len() / depth.max(1) as usize;
        for (i, layer) in pixels.chunks(layer_bytes.max(1)).take(depth as usize).enumerate() {
            if let Some(image) = s.image_mut(Attachment::Texture {
                texture: t,
                level,
                layer: z + i as u32,
            }) {
                image.write(x, y, width, height, layer);
            }
        }
    }

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
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "compressed_tex_sub_image_3d",
            &[
                target as i64,
                level as i64,
                x as i64,
                y as i64,
                z as i64,
                width as i64,
                height as i64,
                depth as i64,
                format as i64,
                data.len() as i64,
            ],
        );
        let Some(t) = s.bound_texture(target) else {
            return;
        };
        let layer_bytes = data.len() / depth.max(1) as usize;
        for (i, layer) in data.chunks(layer_bytes.max(1)).take(depth as usize).enumerate() {
            if let Some(image) = s.image_mut(Attachment::Texture {
                texture: t,
                level,
                layer: z + i as u32,
            }) {
                image.write(x, y, width, height, layer);
            }
        }
    }

    fn create_sampler(&mut self) -> Result<NativeSampler, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("create_sampler")?;
        s.samplers.insert(name.get());
        Ok(NativeSampler(name))
    }

    fn delete_sampler(&mut self, sampler: NativeSampler) {
        let mut s = self.0.borrow_mut();
        s.log("delete_sampler", &[sampler.0.get() as i64]);
        s.samplers.remove(&sampler.0.get());
    }

    fn bind_sampler(&mut self, unit: u32, sampler: Option<NativeSampler>) {
        self.0
            .borrow_mut()
            .log("bind_sampler", &[unit as i64, raw(sampler, |s| s.0.get())]);
    }

    fn sampler_parameter_i32(&mut self, sampler: NativeSampler, pname: u32, value: i32) {
        self.0.borrow_mut().log(
            "sampler_parameter_i32",
            &[sampler.0.get() as i64, pname as i64, value as i64],
        );
    }

    fn sampler_parameter_f32(&mut self, sampler: NativeSampler, pname: u32, value: f32) {
        self.0.borrow_mut().log(
            "sampler_parameter_f32",
            &[sampler.0.get() as i64, pname as i64, value as i64],
        );
    }

    fn create_shader(&mut self, stage: u32) -> Result<NativeShader, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("create_shader")?;
        s.shaders.insert(
            name.get(),
            ShaderObject {
                source: String::new(),
                compiled: false,
            },
        );
        if let Some(call) = s.calls.last_mut() {
            call.args.push(stage as i64);
        }
        Ok(NativeShader(name))
    }

    fn shader_source(&mut self, shader: NativeShader, source: &str) {
        let mut s = self.0.borrow_mut();
        s.log_text("shader_source", &[shader.0.get() as i64], source);
        if let Some(obj) = s.shaders.get_mut(&shader.0.get()) {
            obj.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: NativeShader) {
        let mut s = self.0.borrow_mut();
        s.log("compile_shader", &[shader.0.get() as i64]);
        let marker = s.compile_failure_marker.clone();
        if let Some(obj) = s.shaders.get_mut(&shader.0.get()) {
            obj.compiled = !obj.source.contains(&marker);
        }
    }

    fn get_shader_compile_status(&self, shader: NativeShader) -> bool {
        let s = self.0.borrow();
        s.shaders.get(&shader.0.get()).is_some_and(|o| o.compiled)
    }

    fn get_shader_info_log(&self, shader: NativeShader) -> String {
        let s = self.0.borrow();
        match s.shaders.get(&shader.0.get()) {
            Some(o) if !o.compiled => format!("ERROR: 0:1: '{}' : compilation failed", s.compile_failure_marker),
            _ => String::new(),
        }
    }

    fn delete_shader(&mut self, shader: NativeShader) {
        let mut s = self.0.borrow_mut();
        s.log("delete_shader", &[shader.0.get() as i64]);
        s.shaders.remove(&shader.0.get());
    }

    fn create_program(&mut self) -> Result<NativeProgram, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("create_program")?;
        s.programs.insert(name.get(), ProgramObject::default());
        Ok(NativeProgram(name))
    }

    fn attach_shader(&mut self, program: NativeProgram, shader: NativeShader) {
        let mut s = self.0.borrow_mut();
        s.log("attach_shader", &[program.0.get() as i64, shader.0.get() as i64]);
        if let Some(p) = s.programs.get_mut(&program.0.get()) {
            p.shaders.push(shader.0.get());
        }
    }

    fn link_program(&mut self, program: NativeProgram) {
        let mut s = self.0.borrow_mut();
        s.log("link_program", &[program.0.get() as i64]);
        let marker = s.link_failure_marker.clone();
        let polls = s.completion_polls;
        let sources_ok = s
            .program_sources(program.0.get())
            .iter()
            .all(|src| !src.contains(&marker));
        let compiled = s.programs.get(&program.0.get()).is_some_and(|p| {
            p.shaders.len() >= 2
                && p
                    .shaders
                    .iter()
                    .all(|sh| s.shaders.get(sh).is_some_and(|o| o.compiled))
        });
        if let Some(p) = s.programs.get_mut(&program.0.get()) {
            p.linked = Some(sources_ok && compiled);
            p.polls_left = polls;
        }
    }

    fn get_program_completion_status(&self, program: NativeProgram) -> bool {
        let mut s = self.0.borrow_mut();
        s.log("get_program_completion_status", &[program.0.get() as i64]);
        match s.programs.get_mut(&program.0.get()) {
            Some(p) if p.polls_left > 0 => {
                p.polls_left -= 1;
                false
            }
            _ => true,
        }
    }

    fn get_program_link_status(&self, program: NativeProgram) -> bool {
        let s = self.0.borrow();
        s.programs
            .get(&program.0.get())
            .is_some_and(|p| p.linked == Some(true))
    }

    fn get_program_info_log(&self, program: NativeProgram) -> String {
        let s = self.0.borrow();
        match s.programs.get(&program.0.get()) {
            Some(p) if p.linked != Some(true) => "link failed".to_string(),
            _ => String::new(),
        }
    }

    fn delete_program(&mut self, program: NativeProgram) {
        let mut s = self.0.borrow_mut();
        s.log("delete_program", &[program.0.get() as i64]);
        s.programs.remove(&program.0.get());
        if s.current_program == program.0.get() {
            s.current_program = 0;
        }
    }

    fn use_program(&mut self, program: Option<NativeProgram>) {
        let mut s = self.0.borrow_mut();
        s.log("use_program", &[raw(program, |p| p.0.get())]);
        s.current_program = program.map_or(0, |p| p.0.get());
    }

    fn get_uniform_block_index(&self, program: NativeProgram, name: &str) -> Option<u32> {
        let mut s = self.0.borrow_mut();
        let declared = s
            .program_sources(program.0.get())
            .iter()
            .any(|src| src.contains(name));
        if !declared {
            return None;
        }
        let p = s.programs.get_mut(&program.0.get())?;
        let index = match p.blocks.iter().position(|b| b == name) {
            Some(i) => i,
            None => {
                p.blocks.push(name.to_string());
                p.blocks.len() - 1
            }
        };
        Some(index as u32)
    }

    fn uniform_block_binding(&mut self, program: NativeProgram, index: u32, binding: u32) {
        let mut s = self.0.borrow_mut();
        let name = s
            .programs
            .get(&program.0.get())
            .and_then(|p| p.blocks.get(index as usize))
            .cloned()
            .unwrap_or_default();
        s.log_text(
            "uniform_block_binding",
            &[program.0.get() as i64, index as i64, binding as i64],
            &name,
        );
    }

    fn get_uniform_location(&self, program: NativeProgram, name: &str) -> Option<NativeUniformLocation> {
        let mut s = self.0.borrow_mut();
        let declared = s
            .program_sources(program.0.get())
            .iter()
            .any(|src| src.contains(name));
        if !declared {
            return None;
        }
        let p = s.programs.get_mut(&program.0.get())?;
        let index = match p.uniforms.iter().position(|u| u == name) {
            Some(i) => i,
            None => {
                p.uniforms.push(name.to_string());
                p.uniforms.len() - 1
            }
        };
        Some(NativeUniformLocation(index as u32))
    }

    fn uniform_1_i32(&mut self, location: &NativeUniformLocation, value: i32) {
        let mut s = self.0.borrow_mut();
        let name = s
            .programs
            .get(&s.current_program)
            .and_then(|p| p.uniforms.get(location.0 as usize))
            .cloned()
            .unwrap_or_default();
        s.log_text("uniform_1_i32", &[location.0 as i64, value as i64], &name);
    }

    fn create_vertex_array(&mut self) -> Result<NativeVertexArray, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("create_vertex_array")?;
        s.vertex_arrays.insert(name.get());
        Ok(NativeVertexArray(name))
    }

    fn delete_vertex_array(&mut self, vertex_array: NativeVertexArray) {
        let mut s = self.0.borrow_mut();
        s.log("delete_vertex_array", &[vertex_array.0.get() as i64]);
        s.vertex_arrays.remove(&vertex_array.0.get());
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<NativeVertexArray>) {
        self.0
            .borrow_mut()
            .log("bind_vertex_array", &[raw(vertex_array, |v| v.0.get())]);
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.0
            .borrow_mut()
            .log("enable_vertex_attrib_array", &[index as i64]);
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.0
            .borrow_mut()
            .log("disable_vertex_attrib_array", &[index as i64]);
    }

    fn vertex_attrib_pointer_f32(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.0.borrow_mut().log(
            "vertex_attrib_pointer_f32",
            &[
                index as i64,
                size as i64,
                data_type as i64,
                normalized as i64,
                stride as i64,
                offset as i64,
            ],
        );
    }

    fn vertex_attrib_pointer_i32(&mut self, index: u32, size: i32, data_type: u32, stride: i32, offset: i32) {
        self.0.borrow_mut().log(
            "vertex_attrib_pointer_i32",
            &[
                index as i64,
                size as i64,
                data_type as i64,
                stride as i64,
                offset as i64,
            ],
        );
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.0
            .borrow_mut()
            .log("vertex_attrib_divisor", &[index as i64, divisor as i64]);
    }

    fn create_framebuffer(&mut self) -> Result<NativeFramebuffer, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("create_framebuffer")?;
        s.framebuffers.insert(name.get(), FramebufferObject::default());
        Ok(NativeFramebuffer(name))
    }

    fn delete_framebuffer(&mut self, framebuffer: NativeFramebuffer) {
        let mut s = self.0.borrow_mut();
        s.log("delete_framebuffer", &[framebuffer.0.get() as i64]);
        s.framebuffers.remove(&framebuffer.0.get());
        if s.read_framebuffer == framebuffer.0.get() {
            s.read_framebuffer = 0;
        }
        if s.draw_framebuffer == framebuffer.0.get() {
            s.draw_framebuffer = 0;
        }
    }

    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<NativeFramebuffer>) {
        let mut s = self.0.borrow_mut();
        s.log("bind_framebuffer", &[target as i64, raw(framebuffer, |f| f.0.get())]);
        let name = framebuffer.map_or(0, |f| f.0.get());
        if target != gl::DRAW_FRAMEBUFFER {
            s.read_framebuffer = name;
        }
        if target != gl::READ_FRAMEBUFFER {
            s.draw_framebuffer = name;
        }
    }

    fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<NativeTexture>,
        level: u32,
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "framebuffer_texture_2d",
            &[
                target as i64,
                attachment as i64,
                texture_target as i64,
                raw(texture, |t| t.0.get()),
                level as i64,
            ],
        );
        let face = texture_target.wrapping_sub(gl::TEXTURE_CUBE_MAP_POSITIVE_X);
        let layer = if face < 6 { face } else { 0 };
        let a = texture.map(|t| Attachment::Texture {
            texture: t.0.get(),
            level,
            layer,
        });
        s.attach(target, attachment, a);
    }

    fn framebuffer_texture_layer(
        &mut self,
        target: u32,
        attachment: u32,
        texture: Option<NativeTexture>,
        level: u32,
        layer: u32,
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "framebuffer_texture_layer",
            &[
                target as i64,
                attachment as i64,
                raw(texture, |t| t.0.get()),
                level as i64,
                layer as i64,
            ],
        );
        let a = texture.map(|t| Attachment::Texture {
            texture: t.0.get(),
            level,
            layer,
        });
        s.attach(target, attachment, a);
    }

    fn create_renderbuffer(&mut self) -> Result<NativeRenderbuffer, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("create_renderbuffer")?;
        s.renderbuffers.insert(
            name.get(),
            RenderbufferObject {
                samples: 0,
                image: None,
            },
        );
        Ok(NativeRenderbuffer(name))
    }

    fn delete_renderbuffer(&mut self, renderbuffer: NativeRenderbuffer) {
        let mut s = self.0.borrow_mut();
        s.log("delete_renderbuffer", &[renderbuffer.0.get() as i64]);
        s.renderbuffers.remove(&renderbuffer.0.get());
    }

    fn bind_renderbuffer(&mut self, target: u32, renderbuffer: Option<NativeRenderbuffer>) {
        let mut s = self.0.borrow_mut();
        s.log("bind_renderbuffer", &[target as i64, raw(renderbuffer, |r| r.0.get())]);
        s.bound_renderbuffer = renderbuffer.map_or(0, |r| r.0.get());
    }

    fn renderbuffer_storage_multisample(
        &mut self,
        target: u32,
        samples: u32,
        internal_format: u32,
        width: u32,
        height: u32,
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "renderbuffer_storage_multisample",
            &[target as i64, samples as i64, internal_format as i64, width as i64, height as i64],
        );
        let bound = s.bound_renderbuffer;
        let format = TextureFormat::from_internal_format(internal_format);
        if let Some(rb) = s.renderbuffers.get_mut(&bound) {
            rb.samples = samples;
            rb.image = format.map(|f| Image::new(f, width, height));
        }
    }

    fn framebuffer_renderbuffer(
        &mut self,
        target: u32,
        attachment: u32,
        renderbuffer_target: u32,
        renderbuffer: Option<NativeRenderbuffer>,
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "framebuffer_renderbuffer",
            &[
                target as i64,
                attachment as i64,
                renderbuffer_target as i64,
                raw(renderbuffer, |r| r.0.get()),
            ],
        );
        s.attach(target, attachment, renderbuffer.map(|r| Attachment::Renderbuffer(r.0.get())));
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        let mut s = self.0.borrow_mut();
        s.log("check_framebuffer_status", &[target as i64]);
        s.framebuffer_status(target)
    }

    fn draw_buffers(&mut self, buffers: &[u32]) {
        let mut s = self.0.borrow_mut();
        let args = buffers.iter().map(|b| *b as i64).collect::<Vec<_>>();
        s.log("draw_buffers", &args);
        let draw = s.draw_framebuffer;
        if let Some(fb) = s.framebuffers.get_mut(&draw) {
            fb.draw_buffers = buffers.to_vec();
        }
    }

    fn read_buffer(&mut self, src: u32) {
        let mut s = self.0.borrow_mut();
        s.log("read_buffer", &[src as i64]);
        let read = s.read_framebuffer;
        if let Some(fb) = s.framebuffers.get_mut(&read) {
            fb.read_buffer = src;
        }
    }

    fn clear_buffer_f32_slice(&mut self, buffer: u32, draw_buffer: u32, values: &[f32]) {
        let mut s = self.0.borrow_mut();
        s.log("clear_buffer_f32_slice", &[buffer as i64, draw_buffer as i64]);
        match buffer {
            gl::COLOR => {
                let mut v = [0.0; 4];
                for (d, x) in v.iter_mut().zip(values) {
                    *d = *x;
                }
                s.clear_color(draw_buffer, ClearValue::Float(v));
            }
            gl::DEPTH => s.clear_depth_stencil(values.first().copied(), None),
            _ => {}
        }
    }

    fn clear_buffer_i32_slice(&mut self, buffer: u32, draw_buffer: u32, values: &[i32]) {
        let mut s = self.0.borrow_mut();
        s.log("clear_buffer_i32_slice", &[buffer as i64, draw_buffer as i64]);
        match buffer {
            gl::COLOR => {
                let mut v = [0; 4];
                for (d, x) in v.iter_mut().zip(values) {
                    *d = *x;
                }
                s.clear_color(draw_buffer, ClearValue::Int(v));
            }
            gl::STENCIL => s.clear_depth_stencil(None, values.first().map(|v| *v as u8)),
            _ => {}
        }
    }

    fn clear_buffer_u32_slice(&mut self, buffer: u32, draw_buffer: u32, values: &[u32]) {
        let mut s = self.0.borrow_mut();
        s.log("clear_buffer_u32_slice", &[buffer as i64, draw_buffer as i64]);
        if buffer == gl::COLOR {
            let mut v = [0; 4];
            for (d, x) in v.iter_mut().zip(values) {
                *d = *x;
            }
            s.clear_color(draw_buffer, ClearValue::Uint(v));
        }
    }

    fn clear_buffer_depth_stencil(&mut self, buffer: u32, draw_buffer: u32, depth: f32, stencil: i32) {
        let mut s = self.0.borrow_mut();
        s.log(
            "clear_buffer_depth_stencil",
            &[buffer as i64, draw_buffer as i64, depth as i64, stencil as i64],
        );
        s.clear_depth_stencil(Some(depth), Some(stencil as u8));
    }

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
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "blit_framebuffer",
            &[
                src_x0 as i64,
                src_y0 as i64,
                src_x1 as i64,
                src_y1 as i64,
                dst_x0 as i64,
                dst_y0 as i64,
                dst_x1 as i64,
                dst_y1 as i64,
                mask as i64,
                filter as i64,
            ],
        );
        s.blit([src_x0, src_y0, src_x1, src_y1], [dst_x0, dst_y0, dst_x1, dst_y1], mask);
    }

    fn enable(&mut self, capability: u32) {
        let mut s = self.0.borrow_mut();
        s.log("enable", &[capability as i64]);
        s.capabilities.insert(capability);
    }

    fn disable(&mut self, capability: u32) {
        let mut s = self.0.borrow_mut();
        s.log("disable", &[capability as i64]);
        s.capabilities.remove(&capability);
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.0
            .borrow_mut()
            .log("viewport", &[x as i64, y as i64, width as i64, height as i64]);
    }

    fn depth_range_f32(&mut self, near: f32, far: f32) {
        self.0
            .borrow_mut()
            .log("depth_range_f32", &[near as i64, far as i64]);
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.0
            .borrow_mut()
            .log("scissor", &[x as i64, y as i64, width as i64, height as i64]);
    }

    fn cull_face(&mut self, face: u32) {
        self.0.borrow_mut().log("cull_face", &[face as i64]);
    }

    fn front_face(&mut self, mode: u32) {
        self.0.borrow_mut().log("front_face", &[mode as i64]);
    }

    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.0.borrow_mut().log(
            "color_mask",
            &[red as i64, green as i64, blue as i64, alpha as i64],
        );
    }

    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        self.0.borrow_mut().log(
            "blend_func_separate",
            &[src_rgb as i64, dst_rgb as i64, src_alpha as i64, dst_alpha as i64],
        );
    }

    fn blend_equation_separate(&mut self, mode_rgb: u32, mode_alpha: u32) {
        self.0
            .borrow_mut()
            .log("blend_equation_separate", &[mode_rgb as i64, mode_alpha as i64]);
    }

    fn blend_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.0.borrow_mut().log(
            "blend_color",
            &[red as i64, green as i64, blue as i64, alpha as i64],
        );
    }

    fn depth_func(&mut self, func: u32) {
        self.0.borrow_mut().log("depth_func", &[func as i64]);
    }

    fn depth_mask(&mut self, flag: bool) {
        self.0.borrow_mut().log("depth_mask", &[flag as i64]);
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.0
            .borrow_mut()
            .log("polygon_offset", &[factor as i64, units as i64]);
    }

    fn stencil_func_separate(&mut self, face: u32, func: u32, reference: i32, mask: u32) {
        self.0.borrow_mut().log(
            "stencil_func_separate",
            &[face as i64, func as i64, reference as i64, mask as i64],
        );
    }

    fn stencil_op_separate(&mut self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
        self.0.borrow_mut().log(
            "stencil_op_separate",
            &[face as i64, fail as i64, depth_fail as i64, pass as i64],
        );
    }

    fn stencil_mask_separate(&mut self, face: u32, mask: u32) {
        self.0
            .borrow_mut()
            .log("stencil_mask_separate", &[face as i64, mask as i64]);
    }

    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instance_count: i32) {
        self.0.borrow_mut().log(
            "draw_arrays_instanced",
            &[mode as i64, first as i64, count as i64, instance_count as i64],
        );
    }

    fn draw_elements_instanced(
        &mut self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: i32,
        instance_count: i32,
    ) {
        self.0.borrow_mut().log(
            "draw_elements_instanced",
            &[
                mode as i64,
                count as i64,
                element_type as i64,
                offset as i64,
                instance_count as i64,
            ],
        );
    }

    fn read_pixels(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        dst: &mut [u8],
    ) {
        let mut s = self.0.borrow_mut();
        s.log(
            "read_pixels",
            &[
                x as i64,
                y as i64,
                width as i64,
                height as i64,
                format as i64,
                ty as i64,
                dst.len() as i64,
            ],
        );
        let source = s
            .framebuffers
            .get(&s.read_framebuffer)
            .and_then(|fb| fb.attachments.get(&fb.read_buffer))
            .copied();
        if let Some(source) = source
            && let Some(image) = s.image(source)
        {
            let data = image.read(x as u32, y as u32, width as u32, height as u32);
            let n = data.len().min(dst.len());
            dst[..n].copy_from_slice(&data[..n]);
        }
    }

    fn fence_sync(&mut self, condition: u32, flags: u32) -> Result<NativeFence, String> {
        let mut s = self.0.borrow_mut();
        let name = s.create("fence_sync")?;
        if let Some(call) = s.calls.last_mut() {
            call.args.extend([condition as i64, flags as i64]);
        }
        let polls = s.fence_polls;
        s.fences.insert(name.get(), polls);
        Ok(NativeFence(name))
    }

    fn client_wait_sync(&mut self, fence: NativeFence, flags: u32, timeout_ns: i32) -> u32 {
        let mut s = self.0.borrow_mut();
        s.log(
            "client_wait_sync",
            &[fence.0.get() as i64, flags as i64, timeout_ns as i64],
        );
        if s.fence_failure {
            return gl::WAIT_FAILED;
        }
        match s.fences.get_mut(&fence.0.get()) {
            None => gl::WAIT_FAILED,
            Some(polls) if *polls > 0 => {
                *polls -= 1;
                gl::TIMEOUT_EXPIRED
            }
            Some(_) => gl::CONDITION_SATISFIED,
        }
    }

    fn delete_sync(&mut self, fence: NativeFence) {
        let mut s = self.0.borrow_mut();
        s.log("delete_sync", &[fence.0.get() as i64]);
        s.fences.remove(&fence.0.get());
    }

    fn flush(&mut self) {
        self.0.borrow_mut().log("flush", &[]);
    }
}
