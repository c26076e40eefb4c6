// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Bind groups: concrete resources for the bindings of one layout.

Nothing native happens at creation.  A bind group is applied at draw time, against whichever
pipeline is current then, because slot numbers come from the pipeline's layout.
*/

use std::rc::Rc;

use crate::bindings::buffer::Buffer;
use crate::bindings::layout::{BindGroupLayout, BindingKind};
use crate::bindings::sampler::Sampler;
use crate::bindings::texture::TextureView;
use crate::imp::Error;

/// A range of a uniform buffer.
#[derive(Debug, Clone)]
pub struct BufferBinding {
    pub buffer: Buffer,
    pub offset: u64,
    /// `None` binds from `offset` to the end.
    pub size: Option<u64>,
}

impl BufferBinding {
    pub fn whole(buffer: &Buffer) -> Self {
        Self {
            buffer: buffer.clone(),
            offset: 0,
            size: None,
        }
    }

    pub(crate) fn resolved_size(&self) -> u64 {
        self.size
            .unwrap_or(self.buffer.size().saturating_sub(self.offset))
    }
}

#[derive(Debug, Clone)]
pub enum BindingResource {
    Buffer(BufferBinding),
    TextureView(TextureView),
    Sampler(Sampler),
}

impl BindingResource {
    fn kind(&self) -> BindingKind {
        match self {
            BindingResource::Buffer(_) => BindingKind::Buffer,
            BindingResource::TextureView(_) => BindingKind::Texture,
            BindingResource::Sampler(_) => BindingKind::Sampler,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    pub label: Option<&'a str>,
    pub layout: &'a BindGroupLayout,
    pub entries: &'a [BindGroupEntry],
}

#[derive(Debug)]
pub(crate) struct BindGroupInner {
    label: Option<String>,
    layout: BindGroupLayout,
    /// Sorted by binding.
    entries: Vec<BindGroupEntry>,
}

/// Identity matters: setting the same group again is not a change.
#[derive(Debug, Clone)]
pub struct BindGroup(pub(crate) Rc<BindGroupInner>);

impl BindGroup {
    pub(crate) fn new(descriptor: &BindGroupDescriptor) -> Result<Self, Error> {
        let mut entries = descriptor.entries.to_vec();
        entries.sort_by_key(|e| e.binding);
        if let Some(pair) = entries.windows(2).find(|w| w[0].binding == w[1].binding) {
            return Err(Error::InvalidDescriptor(format!(
                "binding {} set twice in bind group {:?}",
                pair[0].binding, descriptor.label
            )));
        }
        for entry in &entries {
            let Some(declared) = descriptor.layout.entry(entry.binding) else {
                return Err(Error::InvalidDescriptor(format!(
                    "binding {} is not in layout {:?}",
                    entry.binding,
                    descriptor.layout.label()
                )));
            };
            if declared.kind != entry.resource.kind() {
                return Err(Error::InvalidDescriptor(format!(
                    "binding {} is declared {:?} but given {:?}",
                    entry.binding,
                    declared.kind,
                    entry.resource.kind()
                )));
            }
            if let BindingResource::Buffer(b) = &entry.resource
                && b.offset + b.resolved_size() > b.buffer.size()
            {
                return Err(Error::InvalidDescriptor(format!(
                    "binding {} range overruns a {} byte buffer",
                    entry.binding,
                    b.buffer.size()
                )));
            }
        }
        if entries.len() != descriptor.layout.entries().len() {
            return Err(Error::InvalidDescriptor(format!(
                "bind group {:?} sets {} of {} bindings",
                descriptor.label,
                entries.len(),
                descriptor.layout.entries().len()
            )));
        }
        Ok(BindGroup(Rc::new(BindGroupInner {
            label: descriptor.label.map(str::to_string),
            layout: descriptor.layout.clone(),
            entries,
        })))
    }

    pub fn layout(&self) -> &BindGroupLayout {
        &self.0.layout
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    /// Entries in binding order.
    pub fn entries(&self) -> &[BindGroupEntry] {
        &self.0.entries
    }

    pub fn resource(&self, binding: u32) -> Option<&BindingResource> {
        self.0
            .entries
            .binary_search_by_key(&binding, |e| e.binding)
            .ok()
            .map(|i| &self.0.entries[i].resource)
    }

    pub(crate) fn sampler(&self, binding: u32) -> Option<&Sampler> {
        match self.resource(binding) {
            Some(BindingResource::Sampler(s)) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for BindGroup {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
