// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shader modules.

A module is one compiled GLSL ES stage.  Modules are compiled when created, so a compile error
comes back from [crate::images::device::Device::create_shader_module] rather than from pipeline
creation.  Creating a module from the same stage and source twice returns the same module.
*/

use std::rc::Rc;

use crate::bindings::annotations::{self, BindingAnnotation};
use crate::imp::gl::NativeShader;
use crate::imp::gl::consts as gl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) const fn native(self) -> u32 {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    pub label: Option<&'a str>,
    pub stage: ShaderStage,
    /// GLSL ES 3.0 source.
    pub source: &'a str,
    /// Binding manifest from the shader generator.
    ///
    /// When `None`, annotations are read from comments in `source` (see
    /// [crate::bindings::annotations]).
    pub bindings: Option<Vec<BindingAnnotation>>,
}

impl<'a> ShaderModuleDescriptor<'a> {
    pub fn new(stage: ShaderStage, source: &'a str) -> Self {
        Self {
            label: None,
            stage,
            source,
            bindings: None,
        }
    }
}

/// Key of the module cache.  A manifest is part of the identity: the same source with a
/// different manifest binds differently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ModuleKey {
    pub(crate) stage: ShaderStage,
    pub(crate) source: String,
    pub(crate) manifest: Option<Vec<BindingAnnotation>>,
}

impl ModuleKey {
    pub(crate) fn new(descriptor: &ShaderModuleDescriptor) -> Self {
        Self {
            stage: descriptor.stage,
            source: descriptor.source.to_string(),
            manifest: descriptor.bindings.clone(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ShaderModuleInner {
    pub(crate) id: u64,
    pub(crate) label: Option<String>,
    pub(crate) stage: ShaderStage,
    pub(crate) native: NativeShader,
    pub(crate) annotations: Vec<BindingAnnotation>,
}

/// A compiled stage.  Owned by the device's cache; clones share it.
#[derive(Debug, Clone)]
pub struct ShaderModule(pub(crate) Rc<ShaderModuleInner>);

impl ShaderModule {
    pub(crate) fn new(
        id: u64,
        descriptor: &ShaderModuleDescriptor,
        native: NativeShader,
    ) -> Self {
        let annotations = match &descriptor.bindings {
            Some(manifest) => manifest.clone(),
            None => annotations::scan(descriptor.source),
        };
        ShaderModule(Rc::new(ShaderModuleInner {
            id,
            label: descriptor.label.map(str::to_string),
            stage: descriptor.stage,
            native,
            annotations,
        }))
    }

    pub fn stage(&self) -> ShaderStage {
        self.0.stage
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    /// Binding annotations, from the manifest or the source comments.
    pub fn annotations(&self) -> &[BindingAnnotation] {
        &self.0.annotations
    }

    pub(crate) fn id(&self) -> u64 {
        self.0.id
    }
}

impl PartialEq for ShaderModule {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
