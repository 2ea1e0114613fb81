// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Archetype storage with row allocation and removal

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::buffer::GrowBuffer;
use crate::entity::Entity;
use crate::error::Result;
use crate::sparse::PagedSparseIndex;

/// Sorted, deduplicated component ids of one archetype
pub type Composition = SmallVec<[Entity; 8]>;

/// Stable index of an archetype in the world's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// Archetype of entities with no components; always index 0
    pub const EMPTY: ArchetypeId = ArchetypeId(0);
    pub(crate) const INVALID: ArchetypeId = ArchetypeId(u32::MAX);

    pub(crate) fn new(index: usize) -> Self {
        debug_assert!(index < u32::MAX as usize);
        ArchetypeId(index as u32)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn is_invalid(self) -> bool {
        self.0 == u32::MAX
    }
}

/// Archetype: Structure of Arrays storage
///
/// Row `i` of every column together with `entities[i]` describes one entity.
/// The composition is fixed once the first entity is stored.
#[derive(Debug)]
pub struct Archetype {
    id: ArchetypeId,
    composition: Composition,
    columns: Vec<GrowBuffer>,
    column_indices: FxHashMap<Entity, usize>,
    entities: Vec<Entity>,
    add_edges: PagedSparseIndex<ArchetypeId>,
    remove_edges: PagedSparseIndex<ArchetypeId>,
    row_capacity: usize,
}

impl Archetype {
    /// Create an archetype with no columns
    pub fn new(id: ArchetypeId, row_capacity: usize) -> Self {
        Self {
            id,
            composition: Composition::new(),
            columns: Vec::new(),
            column_indices: FxHashMap::default(),
            entities: Vec::with_capacity(row_capacity),
            add_edges: PagedSparseIndex::new(),
            remove_edges: PagedSparseIndex::new(),
            row_capacity,
        }
    }

    /// Column-less archetype already holding `entities` in order
    pub(crate) fn with_entities(id: ArchetypeId, row_capacity: usize, entities: &[Entity]) -> Self {
        let mut archetype = Self::new(id, row_capacity.max(entities.len()));
        archetype.entities.extend_from_slice(entities);
        archetype
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Sorted component ids
    pub fn composition(&self) -> &[Entity] {
        &self.composition
    }

    /// Add a column for `component` while the archetype is still empty.
    ///
    /// The column is placed so the composition stays sorted.
    pub fn add_row(&mut self, component: Entity, size: usize) -> Result<()> {
        debug_assert!(self.entities.is_empty(), "columns are fixed once rows exist");
        let Err(position) = self.composition.binary_search(&component) else {
            return Ok(());
        };
        let column = GrowBuffer::with_capacity(size, self.row_capacity)?;
        self.composition.insert(position, component);
        self.columns.insert(position, column);

        self.column_indices.clear();
        for (index, &id) in self.composition.iter().enumerate() {
            self.column_indices.insert(id, index);
        }
        Ok(())
    }

    /// Append a zero-filled row for `entity`; returns the row index
    pub fn add_entity(&mut self, entity: Entity) -> Result<usize> {
        // Reserve everything first so a failure leaves all columns the same length
        self.entities.try_reserve(1)?;
        for column in &mut self.columns {
            column.reserve(1)?;
        }

        let row = self.entities.len();
        self.entities.push(entity);
        for column in &mut self.columns {
            column.push_zeroed()?;
        }
        Ok(row)
    }

    /// Swap-remove `row` from every column.
    ///
    /// Returns the entity that was moved from the last row into `row`; its
    /// location must be patched by the caller.
    pub fn remove_entity(&mut self, row: usize) -> Option<Entity> {
        if row >= self.entities.len() {
            return None;
        }
        self.entities.swap_remove(row);
        for column in &mut self.columns {
            column.remove_fast(row);
        }
        self.entities.get(row).copied()
    }

    pub fn has_component(&self, component: Entity) -> bool {
        self.column_indices.contains_key(&component)
    }

    /// Get column index for a component id
    pub fn column_index(&self, component: Entity) -> Option<usize> {
        self.column_indices.get(&component).copied()
    }

    /// Get column immutably
    pub fn column(&self, component: Entity) -> Option<&GrowBuffer> {
        self.columns.get(self.column_index(component)?)
    }

    /// Get column mutably
    pub fn column_mut(&mut self, component: Entity) -> Option<&mut GrowBuffer> {
        let index = self.column_index(component)?;
        self.columns.get_mut(index)
    }

    /// Two distinct columns mutably at once
    pub fn column_pair_mut(
        &mut self,
        first: Entity,
        second: Entity,
    ) -> Option<(&mut GrowBuffer, &mut GrowBuffer)> {
        let a = self.column_index(first)?;
        let b = self.column_index(second)?;
        if a == b {
            return None;
        }
        if a < b {
            let (left, right) = self.columns.split_at_mut(b);
            Some((&mut left[a], &mut right[0]))
        } else {
            let (left, right) = self.columns.split_at_mut(a);
            Some((&mut right[0], &mut left[b]))
        }
    }

    pub fn columns(&self) -> &[GrowBuffer] {
        &self.columns
    }

    /// Bytes of `component` at `row`
    pub fn get_component(&self, row: usize, component: Entity) -> Option<&[u8]> {
        self.column(component)?.get(row)
    }

    pub fn get_component_mut(&mut self, row: usize, component: Entity) -> Option<&mut [u8]> {
        self.column_mut(component)?.get_mut(row)
    }

    /// Get all entities
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if archetype is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Cached destination when `component` is added
    pub fn add_edge(&self, component: Entity) -> Option<ArchetypeId> {
        self.add_edges.get(component.sparse_key().ok()?).copied()
    }

    /// Cached destination when `component` is removed
    pub fn remove_edge(&self, component: Entity) -> Option<ArchetypeId> {
        self.remove_edges.get(component.sparse_key().ok()?).copied()
    }

    pub(crate) fn set_add_edge(&mut self, component: Entity, to: ArchetypeId) -> Result<()> {
        self.add_edges.insert(component.sparse_key()?, to)?;
        Ok(())
    }

    pub(crate) fn set_remove_edge(&mut self, component: Entity, to: ArchetypeId) -> Result<()> {
        self.remove_edges.insert(component.sparse_key()?, to)?;
        Ok(())
    }

    /// Number of cached transitions in both directions
    pub fn edge_count(&self) -> usize {
        self.add_edges.len() + self.remove_edges.len()
    }

    /// Copy every column both archetypes share, matching ids pairwise.
    ///
    /// O(n * m); used the first time a transition is discovered.
    pub(crate) fn copy_row_intersecting(
        &mut self,
        row: usize,
        source: &Archetype,
        source_row: usize,
    ) {
        for (index, id) in self.composition.iter().enumerate() {
            for (source_index, source_id) in source.composition.iter().enumerate() {
                if id == source_id {
                    copy_cell(
                        &mut self.columns[index],
                        row,
                        &source.columns[source_index],
                        source_row,
                    );
                }
            }
        }
    }

    /// Copy a row from an archetype whose composition is a subset of ours.
    ///
    /// Single merge over both sorted compositions; used for cached adds.
    pub(crate) fn copy_row_from_subset(
        &mut self,
        row: usize,
        source: &Archetype,
        source_row: usize,
    ) {
        let mut source_index = 0;
        for (index, id) in self.composition.iter().enumerate() {
            if source.composition.get(source_index) == Some(id) {
                copy_cell(
                    &mut self.columns[index],
                    row,
                    &source.columns[source_index],
                    source_row,
                );
                source_index += 1;
            }
        }
        debug_assert_eq!(source_index, source.composition.len());
    }

    /// Copy a row from an archetype whose composition is a superset of ours.
    ///
    /// Single merge over both sorted compositions; used for cached removes.
    pub(crate) fn copy_row_from_superset(
        &mut self,
        row: usize,
        source: &Archetype,
        source_row: usize,
    ) {
        let mut index = 0;
        for (source_index, source_id) in source.composition.iter().enumerate() {
            if self.composition.get(index) == Some(source_id) {
                copy_cell(
                    &mut self.columns[index],
                    row,
                    &source.columns[source_index],
                    source_row,
                );
                index += 1;
            }
        }
        debug_assert_eq!(index, self.composition.len());
    }

    /// Reserve space for additional rows
    pub fn reserve_rows(&mut self, additional: usize) -> Result<()> {
        self.entities.try_reserve(additional)?;
        for column in &mut self.columns {
            column.reserve(additional)?;
        }
        Ok(())
    }
}

fn copy_cell(target: &mut GrowBuffer, row: usize, source: &GrowBuffer, source_row: usize) {
    if let (Some(to), Some(from)) = (target.get_mut(row), source.get(source_row)) {
        to.copy_from_slice(from);
    }
}

/// Insert `component` into a sorted composition; `None` if already present
pub(crate) fn with_component(composition: &[Entity], component: Entity) -> Option<Composition> {
    let position = composition.binary_search(&component).err()?;
    let mut next = Composition::with_capacity(composition.len() + 1);
    next.extend_from_slice(&composition[..position]);
    next.push(component);
    next.extend_from_slice(&composition[position..]);
    Some(next)
}

/// Remove `component` from a sorted composition; `None` if absent
pub(crate) fn without_component(composition: &[Entity], component: Entity) -> Option<Composition> {
    let position = composition.binary_search(&component).ok()?;
    let mut next = Composition::from_slice(composition);
    next.remove(position);
    Some(next)
}
