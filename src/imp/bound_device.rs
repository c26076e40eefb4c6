// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::cell::{Cell, RefCell, RefMut};
use std::fmt::Formatter;

use crate::images::device::{DeviceConfig, Features, Limits};
use crate::imp::Error;
use crate::imp::gl::{GlContext, NativeBuffer, NativeSampler, NativeTexture, NativeVertexArray};
use crate::imp::program::ProgramCache;

/// A native object whose owner went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NativeObject {
    Buffer(NativeBuffer),
    Texture(NativeTexture),
    Sampler(NativeSampler),
}

impl NativeObject {
    fn delete(self, gl: &mut dyn GlContext) {
        match self {
            NativeObject::Buffer(b) => gl.delete_buffer(b),
            NativeObject::Texture(t) => gl.delete_texture(t),
            NativeObject::Sampler(s) => gl.delete_sampler(s),
        }
    }
}

/// The context plus everything the device owns on it.
///
/// Resources hold this through an `Rc`, so it outlives all of them.  Nothing cached here holds
/// it back.
pub(crate) struct BoundDevice {
    gl: RefCell<Box<dyn GlContext>>,
    /// Deletions requested while the context was borrowed (during a submit).
    released: RefCell<Vec<NativeObject>>,
    pub(crate) programs: RefCell<ProgramCache>,
    pub(crate) features: Features,
    pub(crate) limits: Limits,
    pub(crate) config: DeviceConfig,
    vertex_array: NativeVertexArray,
    next_id: Cell<u64>,
}

impl BoundDevice {
    pub(crate) fn bind(mut gl: Box<dyn GlContext>, config: DeviceConfig) -> Result<Self, Error> {
        let features = Features::enable(&mut *gl);
        let limits = Limits::query(&*gl, features);
        // all vertex attribute state lives on one array object
        let vertex_array = gl.create_vertex_array().map_err(Error::Native)?;
        gl.bind_vertex_array(Some(vertex_array));
        logwise::info_sync!(
            "bound device {label} with features {features}",
            label = logwise::privacy::LogIt(&config.label),
            features = logwise::privacy::LogIt(&features)
        );
        Ok(BoundDevice {
            gl: RefCell::new(gl),
            released: RefCell::new(Vec::new()),
            programs: RefCell::new(ProgramCache::default()),
            features,
            limits,
            config,
            vertex_array,
            next_id: Cell::new(1),
        })
    }

    /// Borrows the context.
    ///
    /// Fails if the context is already borrowed, which means a caller re-entered the device
    /// from inside an operation.
    pub(crate) fn gl(&self) -> Result<RefMut<'_, Box<dyn GlContext>>, Error> {
        self.gl
            .try_borrow_mut()
            .map_err(|_| Error::InvalidState("the context is in use".to_string()))
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Deletes a native object now, or after the current submit if the context is busy.
    pub(crate) fn release(&self, object: NativeObject) {
        match self.gl.try_borrow_mut() {
            Ok(mut gl) => object.delete(&mut **gl),
            Err(_) => self.released.borrow_mut().push(object),
        }
    }

    /// Deletes everything [Self::release] deferred.
    pub(crate) fn drain_released(&self, gl: &mut dyn GlContext) {
        let released = std::mem::take(&mut *self.released.borrow_mut());
        for object in released {
            object.delete(gl);
        }
    }
}

impl std::fmt::Debug for BoundDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundDevice")
            .field("label", &self.config.label)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

impl Drop for BoundDevice {
    fn drop(&mut self) {
        let gl = self.gl.get_mut();
        let (programs, shaders) = self.programs.get_mut().drain();
        logwise::debuginternal_sync!(
            "tearing down device: {programs} programs, {shaders} shaders",
            programs = programs.len(),
            shaders = shaders.len()
        );
        gl.use_program(None);
        for program in programs {
            gl.delete_program(program);
        }
        for shader in shaders {
            gl.delete_shader(shader);
        }
        for object in self.released.get_mut().drain(..) {
            object.delete(&mut **gl);
        }
        gl.bind_vertex_array(None);
        gl.delete_vertex_array(self.vertex_array);
    }
}
