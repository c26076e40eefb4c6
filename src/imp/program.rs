// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shader compilation, program linking, and the caches behind them.

Modules are cached by (stage, source, manifest); programs by (vertex module, fragment module).
A cached program can be shared by pipelines with different layouts, so the slot assignment a
program carries is tracked and re-applied when a pipeline with a different table draws with it.
*/

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bindings::annotations::BindingAnnotation;
use crate::bindings::slots::SlotTable;
use crate::cooperative::{CancellationToken, yield_now};
use crate::images::device::Features;
use crate::images::shader::{ModuleKey, ShaderModule, ShaderModuleDescriptor};
use crate::imp::gl::{GlContext, NativeProgram, NativeShader};
use crate::imp::{BoundDevice, Error};

/// A texture binding and the sampler binding to pair with it at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SamplerPairing {
    pub(crate) group: u32,
    pub(crate) texture_binding: u32,
    pub(crate) sampler_binding: u32,
}

#[derive(Debug)]
pub(crate) struct LinkedProgram {
    pub(crate) native: NativeProgram,
    pub(crate) vertex: ShaderModule,
    pub(crate) fragment: ShaderModule,
    applied_slots: RefCell<Option<SlotTable>>,
}

impl LinkedProgram {
    fn annotations(&self) -> impl Iterator<Item = &BindingAnnotation> {
        self.vertex
            .annotations()
            .iter()
            .chain(self.fragment.annotations())
    }

    /// Points uniform blocks and sampler uniforms at the slots in `slots`.
    ///
    /// The program must be current.  Does nothing if `slots` is already applied.
    pub(crate) fn apply_slots(&self, gl: &mut dyn GlContext, slots: &SlotTable) {
        if self.applied_slots.borrow().as_ref() == Some(slots) {
            return;
        }
        for annotation in self.annotations() {
            match annotation {
                BindingAnnotation::UniformBlock {
                    group,
                    binding,
                    name,
                } => {
                    let Some(slot) = slots.uniform_slot(*group, *binding) else {
                        logwise::warn_sync!(
                            "uniform block {name} refers to a binding the layout doesn't have",
                            name = name.clone()
                        );
                        continue;
                    };
                    match gl.get_uniform_block_index(self.native, name) {
                        Some(index) => gl.uniform_block_binding(self.native, index, slot),
                        None => {
                            logwise::debuginternal_sync!(
                                "uniform block {name} is inactive",
                                name = name.clone()
                            );
                        }
                    }
                }
                BindingAnnotation::Texture {
                    group,
                    binding,
                    name,
                    ..
                } => {
                    let Some(slot) = slots.texture_slot(*group, *binding) else {
                        logwise::warn_sync!(
                            "texture {name} refers to a binding the layout doesn't have",
                            name = name.clone()
                        );
                        continue;
                    };
                    match gl.get_uniform_location(self.native, name) {
                        Some(location) => gl.uniform_1_i32(&location, slot as i32),
                        None => {
                            logwise::debuginternal_sync!(
                                "sampler uniform {name} is inactive",
                                name = name.clone()
                            );
                        }
                    }
                }
            }
        }
        *self.applied_slots.borrow_mut() = Some(slots.clone());
    }
}

/// Sampler pairings declared by a program's annotations, without duplicates.
pub(crate) fn sampler_pairings(program: &LinkedProgram) -> Vec<SamplerPairing> {
    let mut pairings = Vec::new();
    for annotation in program.annotations() {
        if let BindingAnnotation::Texture {
            group,
            binding,
            sampler_binding: Some(sampler_binding),
            ..
        } = annotation
        {
            let pairing = SamplerPairing {
                group: *group,
                texture_binding: *binding,
                sampler_binding: *sampler_binding,
            };
            if !pairings.contains(&pairing) {
                pairings.push(pairing);
            }
        }
    }
    pairings
}

#[derive(Debug, Default)]
pub(crate) struct ProgramCache {
    modules: HashMap<ModuleKey, ShaderModule>,
    /// vertex module id -> fragment module id -> program
    programs: HashMap<u64, HashMap<u64, Rc<LinkedProgram>>>,
}

impl ProgramCache {
    fn program(&self, vertex: &ShaderModule, fragment: &ShaderModule) -> Option<Rc<LinkedProgram>> {
        self.programs
            .get(&vertex.id())
            .and_then(|by_fragment| by_fragment.get(&fragment.id()))
            .cloned()
    }

    fn insert_program(&mut self, program: Rc<LinkedProgram>) {
        self.programs
            .entry(program.vertex.id())
            .or_default()
            .insert(program.fragment.id(), program);
    }

    pub(crate) fn program_count(&self) -> usize {
        self.programs.values().map(HashMap::len).sum()
    }

    pub(crate) fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Empties the cache, returning the native objects to delete.
    pub(crate) fn drain(&mut self) -> (Vec<NativeProgram>, Vec<NativeShader>) {
        let programs = self
            .programs
            .drain()
            .flat_map(|(_, by_fragment)| by_fragment.into_values())
            .map(|p| p.native)
            .collect();
        let shaders = self.modules.drain().map(|(_, m)| m.0.native).collect();
        (programs, shaders)
    }
}

/// Compiles a module, or returns the cached one for the same stage, source and manifest.
pub(crate) fn compile_module(
    device: &BoundDevice,
    descriptor: &ShaderModuleDescriptor,
) -> Result<ShaderModule, Error> {
    let key = ModuleKey::new(descriptor);
    if let Some(module) = device.programs.borrow().modules.get(&key) {
        return Ok(module.clone());
    }
    let _perf = logwise::perfwarn_begin!("compile_module");
    let mut gl = device.gl()?;
    let shader = gl
        .create_shader(descriptor.stage.native())
        .map_err(Error::Native)?;
    gl.shader_source(shader, descriptor.source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        logwise::warn_sync!(
            "{stage} shader {label} failed to compile: {log}",
            stage = logwise::privacy::LogIt(&descriptor.stage),
            label = logwise::privacy::LogIt(&descriptor.label),
            log = log.clone()
        );
        return Err(Error::Compile {
            stage: descriptor.stage,
            log,
        });
    }
    drop(gl);
    let module = ShaderModule::new(device.next_id(), descriptor, shader);
    device
        .programs
        .borrow_mut()
        .modules
        .insert(key, module.clone());
    Ok(module)
}

fn start_link(
    gl: &mut dyn GlContext,
    vertex: &ShaderModule,
    fragment: &ShaderModule,
) -> Result<NativeProgram, Error> {
    let program = gl.create_program().map_err(Error::Native)?;
    gl.attach_shader(program, vertex.0.native);
    gl.attach_shader(program, fragment.0.native);
    gl.link_program(program);
    Ok(program)
}

fn finish_link(
    gl: &mut dyn GlContext,
    native: NativeProgram,
    vertex: &ShaderModule,
    fragment: &ShaderModule,
    slots: &SlotTable,
) -> Result<Rc<LinkedProgram>, Error> {
    if !gl.get_program_link_status(native) {
        let log = gl.get_program_info_log(native);
        gl.delete_program(native);
        logwise::warn_sync!("program failed to link: {log}", log = log.clone());
        return Err(Error::Link { log });
    }
    let program = Rc::new(LinkedProgram {
        native,
        vertex: vertex.clone(),
        fragment: fragment.clone(),
        applied_slots: RefCell::new(None),
    });
    gl.use_program(Some(native));
    program.apply_slots(gl, slots);
    gl.use_program(None);
    Ok(program)
}

/// Links the program for a module pair, blocking on the result.
pub(crate) fn link(
    device: &BoundDevice,
    vertex: &ShaderModule,
    fragment: &ShaderModule,
    slots: &SlotTable,
) -> Result<Rc<LinkedProgram>, Error> {
    if let Some(program) = device.programs.borrow().program(vertex, fragment) {
        return Ok(program);
    }
    let _perf = logwise::perfwarn_begin!("link");
    let mut gl = device.gl()?;
    let native = start_link(&mut **gl, vertex, fragment)?;
    let program = finish_link(&mut **gl, native, vertex, fragment, slots)?;
    drop(gl);
    device.programs.borrow_mut().insert_program(program.clone());
    Ok(program)
}

/// Links the program for a module pair, yielding until the context reports completion.
///
/// Without parallel compilation the link status query blocks, so this finishes without
/// yielding, like [link].
pub(crate) async fn link_async(
    device: &BoundDevice,
    vertex: &ShaderModule,
    fragment: &ShaderModule,
    slots: &SlotTable,
    cancel: Option<&CancellationToken>,
) -> Result<Rc<LinkedProgram>, Error> {
    let cancelled = || cancel.is_some_and(CancellationToken::is_cancelled);
    if cancelled() {
        return Err(Error::Cancelled);
    }
    if let Some(program) = device.programs.borrow().program(vertex, fragment) {
        return Ok(program);
    }
    let native = {
        let mut gl = device.gl()?;
        start_link(&mut **gl, vertex, fragment)?
    };
    let poll = device.features.contains(Features::PARALLEL_SHADER_COMPILE)
        && device.config.parallel_compile;
    loop {
        if cancelled() {
            device.gl()?.delete_program(native);
            logwise::debuginternal_sync!("link cancelled");
            return Err(Error::Cancelled);
        }
        let complete = !poll || device.gl()?.get_program_completion_status(native);
        if complete {
            break;
        }
        yield_now().await;
    }
    // another task may have finished the same pair while we were suspended
    let existing = device.programs.borrow().program(vertex, fragment);
    if let Some(program) = existing {
        device.gl()?.delete_program(native);
        return Ok(program);
    }
    let program = {
        let mut gl = device.gl()?;
        finish_link(&mut **gl, native, vertex, fragment, slots)?
    };
    device.programs.borrow_mut().insert_program(program.clone());
    Ok(program)
}
