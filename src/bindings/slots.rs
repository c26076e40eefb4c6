// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Flattening (group, binding) pairs into native slots.

The native context has two flat namespaces: uniform buffer binding points and texture units.
Slots are handed out by walking the pipeline layout in group order, and within each group in
binding order, with one counter per namespace.  Buffers take the next uniform slot, textures the
next texture slot, samplers take nothing.

The result depends only on the layout, so two pipelines built from the same layout agree on
every slot, and a bind group can be applied under either.
*/

use std::collections::BTreeMap;

use crate::bindings::layout::{BindingKind, PipelineLayout};

/// Slot assignment for one pipeline layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotTable {
    uniform: BTreeMap<(u32, u32), u32>,
    texture: BTreeMap<(u32, u32), u32>,
}

impl SlotTable {
    pub fn allocate(layout: &PipelineLayout) -> Self {
        let mut table = SlotTable::default();
        let mut next_uniform = 0;
        let mut next_texture = 0;
        for (group, group_layout) in layout.bind_group_layouts().iter().enumerate() {
            let group = group as u32;
            for entry in group_layout.entries() {
                match entry.kind {
                    BindingKind::Buffer => {
                        table.uniform.insert((group, entry.binding), next_uniform);
                        next_uniform += 1;
                    }
                    BindingKind::Texture => {
                        table.texture.insert((group, entry.binding), next_texture);
                        next_texture += 1;
                    }
                    BindingKind::Sampler => {}
                }
            }
        }
        table
    }

    pub fn uniform_slot(&self, group: u32, binding: u32) -> Option<u32> {
        self.uniform.get(&(group, binding)).copied()
    }

    pub fn texture_slot(&self, group: u32, binding: u32) -> Option<u32> {
        self.texture.get(&(group, binding)).copied()
    }

    pub fn uniform_slot_count(&self) -> u32 {
        self.uniform.len() as u32
    }

    pub fn texture_slot_count(&self) -> u32 {
        self.texture.len() as u32
    }
}
