// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Bind group layouts and pipeline layouts.

A bind group layout is an ordered set of binding declarations for one group.  A pipeline layout
is the ordered list of group layouts a pipeline uses, with group `i` at index `i`.  Neither
creates any native object; they only feed slot allocation ([super::slots]).
*/

use std::rc::Rc;

use crate::bindings::visible_to::ShaderStages;
use crate::imp::Error;

/// The kind of resource a binding holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// A uniform buffer, bound to a uniform block.
    Buffer,
    /// A sampled texture, bound to a texture unit.
    Texture,
    /// A sampler object, paired at draw time with a texture binding.  Takes no slot.
    Sampler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    pub kind: BindingKind,
}

impl BindGroupLayoutEntry {
    pub const fn new(binding: u32, visibility: ShaderStages, kind: BindingKind) -> Self {
        Self {
            binding,
            visibility,
            kind,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BindGroupLayoutDescriptor<'a> {
    pub label: Option<&'a str>,
    pub entries: &'a [BindGroupLayoutEntry],
}

#[derive(Debug)]
pub(crate) struct BindGroupLayoutInner {
    label: Option<String>,
    /// Sorted by binding index.
    entries: Vec<BindGroupLayoutEntry>,
}

/// Shared, immutable.  Clones compare equal.
#[derive(Debug, Clone)]
pub struct BindGroupLayout(pub(crate) Rc<BindGroupLayoutInner>);

impl BindGroupLayout {
    pub(crate) fn new(descriptor: &BindGroupLayoutDescriptor) -> Result<Self, Error> {
        let mut entries = descriptor.entries.to_vec();
        entries.sort_by_key(|e| e.binding);
        if let Some(pair) = entries.windows(2).find(|w| w[0].binding == w[1].binding) {
            return Err(Error::InvalidDescriptor(format!(
                "binding {} declared twice in bind group layout {:?}",
                pair[0].binding, descriptor.label
            )));
        }
        Ok(BindGroupLayout(Rc::new(BindGroupLayoutInner {
            label: descriptor.label.map(str::to_string),
            entries,
        })))
    }

    /// Entries in binding order.
    pub fn entries(&self) -> &[BindGroupLayoutEntry] {
        &self.0.entries
    }

    pub fn entry(&self, binding: u32) -> Option<&BindGroupLayoutEntry> {
        self.0
            .entries
            .binary_search_by_key(&binding, |e| e.binding)
            .ok()
            .map(|i| &self.0.entries[i])
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    pub fn buffer_count(&self) -> u32 {
        self.count(BindingKind::Buffer)
    }

    pub fn texture_count(&self) -> u32 {
        self.count(BindingKind::Texture)
    }

    fn count(&self, kind: BindingKind) -> u32 {
        self.0.entries.iter().filter(|e| e.kind == kind).count() as u32
    }
}

impl PartialEq for BindGroupLayout {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineLayoutDescriptor<'a> {
    pub label: Option<&'a str>,
    /// Group `i` is `bind_group_layouts[i]`.
    pub bind_group_layouts: &'a [&'a BindGroupLayout],
}

#[derive(Debug)]
pub(crate) struct PipelineLayoutInner {
    label: Option<String>,
    groups: Vec<BindGroupLayout>,
}

#[derive(Debug, Clone)]
pub struct PipelineLayout(pub(crate) Rc<PipelineLayoutInner>);

impl PipelineLayout {
    pub(crate) fn new(descriptor: &PipelineLayoutDescriptor) -> Self {
        PipelineLayout(Rc::new(PipelineLayoutInner {
            label: descriptor.label.map(str::to_string),
            groups: descriptor
                .bind_group_layouts
                .iter()
                .map(|l| (*l).clone())
                .collect(),
        }))
    }

    pub fn bind_group_layouts(&self) -> &[BindGroupLayout] {
        &self.0.groups
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }
}

impl PartialEq for PipelineLayout {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
