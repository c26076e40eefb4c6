// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
GPU buffers.

A buffer lives on one native bind target for its whole life, chosen from its usage (see
[BufferUsages::native_target]).  Sizes are rounded up to a multiple of 4.

Mapping is limited to what an immediate-mode context can do without stalling: a buffer created
with `mapped_at_creation` gets a CPU staging copy of its whole range, which is uploaded in one
call on [Buffer::unmap].  Sub-range mapping and asynchronous mapping are not available.  Use
[crate::images::queue::Queue::write_buffer] and [crate::images::queue::Queue::read_buffer]
instead.
*/

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::bindings::visible_to::BufferUsages;
use crate::imp::gl::NativeBuffer;
use crate::imp::{BoundDevice, Error, NativeObject, UnsupportedOperation};

#[derive(Debug, Clone, Default)]
pub struct BufferDescriptor<'a> {
    pub label: Option<&'a str>,
    /// Requested size in bytes.  Rounded up to a multiple of 4.
    pub size: u64,
    pub usage: BufferUsages,
    pub mapped_at_creation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Unmapped,
    /// Mapped since creation; the staging copy is live.
    Mapped,
}

#[derive(Debug)]
pub(crate) struct BufferInner {
    device: Rc<BoundDevice>,
    native: Cell<Option<NativeBuffer>>,
    label: Option<String>,
    size: u64,
    usage: BufferUsages,
    target: u32,
    staging: RefCell<Option<Vec<u8>>>,
}

/// Clones share the native buffer.
#[derive(Debug, Clone)]
pub struct Buffer(pub(crate) Rc<BufferInner>);

pub(crate) const fn padded_size(size: u64) -> u64 {
    (size + 3) & !3
}

impl Buffer {
    pub(crate) fn new(device: &Rc<BoundDevice>, descriptor: &BufferDescriptor) -> Result<Self, Error> {
        let size = padded_size(descriptor.size);
        let target = descriptor.usage.native_target();
        let mut gl = device.gl()?;
        let native = gl.create_buffer().map_err(Error::Native)?;
        gl.bind_buffer(target, Some(native));
        gl.buffer_data_size(target, size, descriptor.usage.native_hint());
        gl.bind_buffer(target, None);
        drop(gl);
        logwise::trace_sync!(
            "created buffer {label} of {size} bytes",
            label = logwise::privacy::LogIt(&descriptor.label),
            size = size
        );
        let staging = descriptor
            .mapped_at_creation
            .then(|| vec![0u8; size as usize]);
        Ok(Buffer(Rc::new(BufferInner {
            device: device.clone(),
            native: Cell::new(Some(native)),
            label: descriptor.label.map(str::to_string),
            size,
            usage: descriptor.usage,
            target,
            staging: RefCell::new(staging),
        })))
    }

    /// Size in bytes, after padding.
    pub fn size(&self) -> u64 {
        self.0.size
    }

    pub fn usage(&self) -> BufferUsages {
        self.0.usage
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    pub fn map_state(&self) -> MapState {
        if self.0.staging.borrow().is_some() {
            MapState::Mapped
        } else {
            MapState::Unmapped
        }
    }

    fn check_full_range(&self, offset: u64, size: Option<u64>) -> Result<(), Error> {
        let full = offset == 0 && size.is_none_or(|s| s == self.0.size);
        if full {
            Ok(())
        } else {
            Err(Error::Unsupported(UnsupportedOperation::PartialRangeMapping))
        }
    }

    /// Read access to the staging copy.
    ///
    /// Only the whole buffer can be viewed: `offset` must be 0 and `size` absent or the full
    /// (padded) size.
    pub fn get_mapped_range(&self, offset: u64, size: Option<u64>) -> Result<Ref<'_, [u8]>, Error> {
        self.check_full_range(offset, size)?;
        let staging = self
            .0
            .staging
            .try_borrow()
            .map_err(|_| Error::InvalidState("mapped range is borrowed mutably".to_string()))?;
        Ref::filter_map(staging, |s| s.as_deref())
            .map_err(|_| Error::InvalidState("buffer is not mapped".to_string()))
    }

    /// Write access to the staging copy.  Same range rules as [Self::get_mapped_range].
    pub fn get_mapped_range_mut(
        &self,
        offset: u64,
        size: Option<u64>,
    ) -> Result<RefMut<'_, [u8]>, Error> {
        self.check_full_range(offset, size)?;
        let staging = self
            .0
            .staging
            .try_borrow_mut()
            .map_err(|_| Error::InvalidState("mapped range is already borrowed".to_string()))?;
        RefMut::filter_map(staging, |s| s.as_deref_mut())
            .map_err(|_| Error::InvalidState("buffer is not mapped".to_string()))
    }

    /// Uploads the staging copy and drops it.  Fails on a buffer that isn't mapped.
    pub fn unmap(&self) -> Result<(), Error> {
        let mut staging = self
            .0
            .staging
            .try_borrow_mut()
            .map_err(|_| Error::InvalidState("mapped range is still borrowed".to_string()))?;
        let Some(data) = staging.take() else {
            return Err(Error::InvalidState("buffer is not mapped".to_string()));
        };
        drop(staging);
        let native = self.native()?;
        let mut gl = self.0.device.gl()?;
        gl.bind_buffer(self.0.target, Some(native));
        gl.buffer_sub_data(self.0.target, 0, &data);
        gl.bind_buffer(self.0.target, None);
        Ok(())
    }

    /// Always fails.  Asynchronous mapping would need a readback-and-wait the context can't
    /// express; use [crate::images::queue::Queue::read_buffer].
    pub async fn map_async(&self, _offset: u64, _size: Option<u64>) -> Result<(), Error> {
        Err(Error::Unsupported(UnsupportedOperation::AsyncMapping))
    }

    /// Deletes the native buffer.  Idempotent.
    pub fn destroy(&self) {
        if let Ok(mut staging) = self.0.staging.try_borrow_mut() {
            *staging = None;
        }
        if let Some(native) = self.0.native.take() {
            self.0.device.release(NativeObject::Buffer(native));
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.native.get().is_none()
    }

    pub(crate) fn native(&self) -> Result<NativeBuffer, Error> {
        self.0
            .native
            .get()
            .ok_or_else(|| Error::InvalidState(format!("buffer {:?} was destroyed", self.0.label)))
    }

    pub(crate) fn target(&self) -> u32 {
        self.0.target
    }

    pub(crate) fn device(&self) -> &Rc<BoundDevice> {
        &self.0.device
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        if let Some(native) = self.native.take() {
            self.device.release(NativeObject::Buffer(native));
        }
    }
}
