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

//! Entity identifiers, location metadata and the index allocator.
//!
//! An [`Entity`] is a 64-bit handle with two readings that share one layout:
//!
//! ```text
//! plain: | flags (16) | generation (16) | index (32)    |
//! pair:  | PAIR | ... | target (16)     | relation (32) |
//! ```
//!
//! Index 0 is the null entity. Inside a pair, a target of 0 is the wildcard.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::archetype::ArchetypeId;
use crate::error::{EcsError, Result};
use crate::sparse::KEY_BITS;

const INDEX_MASK: u64 = 0xFFFF_FFFF;
const GENERATION_SHIFT: u32 = 32;
const GENERATION_MASK: u64 = 0xFFFF;

/// Flag bit marking a relationship pair
pub const PAIR_FLAG: u64 = 1 << 63;

/// Highest relation index whose pairs still fit the sparse key space
const MAX_PAIR_RELATION: u32 = (1 << (KEY_BITS - 1 - 16)) - 1;

/// Versioned entity handle (or relationship pair)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Reserved null handle
    pub const NULL: Entity = Entity(0);

    pub(crate) const fn from_parts(index: u32, generation: u16) -> Self {
        Entity(index as u64 | ((generation as u64) << GENERATION_SHIFT))
    }

    pub const fn from_bits(bits: u64) -> Self {
        Entity(bits)
    }

    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Index half (relation index for pairs)
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// Generation of a plain handle
    pub const fn generation(self) -> u16 {
        ((self.0 >> GENERATION_SHIFT) & GENERATION_MASK) as u16
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn is_pair(self) -> bool {
        self.0 & PAIR_FLAG != 0
    }

    /// Encode a (relation, target) pair.
    ///
    /// The target keeps only its 16-bit index; its generation is dropped.
    pub fn pair(relation: Entity, target: Entity) -> Result<Entity> {
        let relation = Self::check_relation(relation)?;
        if target.is_pair() || target.is_null() {
            return Err(EcsError::InvalidPair(format!(
                "target {target:?} must be a plain, non-null entity"
            )));
        }
        if target.index() > u16::MAX as u32 {
            return Err(EcsError::InvalidPair(format!(
                "target index {} does not fit 16 bits",
                target.index()
            )));
        }
        Ok(Self::raw_pair(relation, target.index() as u16))
    }

    /// The `(relation, *)` marker carried by every entity holding a pair of `relation`
    pub fn wildcard(relation: Entity) -> Result<Entity> {
        Ok(Self::raw_pair(Self::check_relation(relation)?, 0))
    }

    fn check_relation(relation: Entity) -> Result<u32> {
        if relation.is_pair() || relation.is_null() {
            return Err(EcsError::InvalidPair(format!(
                "relation {relation:?} must be a plain, non-null entity"
            )));
        }
        if relation.index() > MAX_PAIR_RELATION {
            return Err(EcsError::InvalidPair(format!(
                "relation index {} exceeds {MAX_PAIR_RELATION}",
                relation.index()
            )));
        }
        Ok(relation.index())
    }

    const fn raw_pair(relation: u32, target: u16) -> Entity {
        Entity(PAIR_FLAG | relation as u64 | ((target as u64) << GENERATION_SHIFT))
    }

    /// Relation index of a pair
    pub fn relation(self) -> Option<u32> {
        self.is_pair().then(|| self.index())
    }

    /// Target index of a pair (0 for the wildcard marker)
    pub fn target(self) -> Option<u16> {
        self.is_pair().then(|| self.generation())
    }

    /// True for `(relation, *)` markers
    pub fn is_wildcard(self) -> bool {
        self.target() == Some(0)
    }

    /// Marker pair for this pair's relation
    pub(crate) fn wildcard_marker(self) -> Option<Entity> {
        self.relation().map(|relation| Self::raw_pair(relation, 0))
    }

    /// Key of this id inside a [`PagedSparseIndex`](crate::sparse::PagedSparseIndex).
    ///
    /// Plain ids map to their index. Pairs occupy the upper half of the key
    /// space: `1 << 37 | relation << 16 | target`.
    pub fn sparse_key(self) -> Result<u64> {
        if !self.is_pair() {
            return Ok(self.index() as u64);
        }
        let relation = self.index();
        if relation > MAX_PAIR_RELATION {
            return Err(EcsError::KeyOutOfRange(self.0));
        }
        Ok((1 << (KEY_BITS - 1)) | ((relation as u64) << 16) | self.generation() as u64)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.relation(), self.target()) {
            (Some(relation), Some(0)) => write!(f, "Pair({relation}, *)"),
            (Some(relation), Some(target)) => write!(f, "Pair({relation}, {target})"),
            _ => write!(f, "Entity({}v{})", self.index(), self.generation()),
        }
    }
}

/// Entity location in archetype (archetype_id, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: ArchetypeId,
    pub archetype_row: usize,
}

impl EntityLocation {
    /// Record of a freed index
    pub(crate) const DEAD: EntityLocation = EntityLocation {
        archetype_id: ArchetypeId::INVALID,
        archetype_row: usize::MAX,
    };

    pub(crate) const fn is_dead(&self) -> bool {
        self.archetype_id.is_invalid()
    }
}

/// Issues entity handles and tracks where each one lives
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    generations: Vec<u16>,
    locations: Vec<EntityLocation>,
    free: Vec<u32>,
    alive: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut generations = Vec::with_capacity(capacity + 1);
        let mut locations = Vec::with_capacity(capacity + 1);
        // Index 0 is the null entity and is never handed out
        generations.push(0);
        locations.push(EntityLocation::DEAD);
        Self {
            generations,
            locations,
            free: Vec::new(),
            alive: 0,
        }
    }

    /// Allocator whose indices `1..=count` are already live, placed at rows
    /// `0..count` of `archetype`
    pub(crate) fn with_reserved(capacity: usize, count: u32, archetype: ArchetypeId) -> Self {
        let mut allocator = Self::with_capacity(capacity.max(count as usize));
        for row in 0..count as usize {
            allocator.generations.push(0);
            allocator.locations.push(EntityLocation {
                archetype_id: archetype,
                archetype_row: row,
            });
        }
        allocator.alive = count as usize;
        allocator
    }

    /// Hand out a recycled index (generation as stored) or a fresh one.
    ///
    /// The new entity's location is left dead until the caller places it.
    pub fn allocate(&mut self) -> Result<Entity> {
        if let Some(index) = self.free.pop() {
            self.alive += 1;
            let slot = index as usize;
            self.locations[slot] = EntityLocation::DEAD;
            return Ok(Entity::from_parts(index, self.generations[slot]));
        }

        let index = u32::try_from(self.generations.len())
            .map_err(|_| EcsError::EntityCapacityExhausted)?;
        self.generations.try_reserve(1)?;
        self.locations.try_reserve(1)?;
        self.generations.push(0);
        self.locations.push(EntityLocation::DEAD);
        self.alive += 1;
        Ok(Entity::from_parts(index, 0))
    }

    /// Alive iff the handle's generation matches and its slot is placed
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_pair() || entity.is_null() {
            return false;
        }
        let slot = entity.index() as usize;
        match (self.generations.get(slot), self.locations.get(slot)) {
            (Some(&generation), Some(location)) => {
                generation == entity.generation() && !location.is_dead()
            }
            _ => false,
        }
    }

    /// Release `index`; bumps its generation so stale handles stop resolving
    pub fn kill(&mut self, index: u32) {
        let slot = index as usize;
        if slot == 0 || slot >= self.generations.len() || self.locations[slot].is_dead() {
            return;
        }
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.locations[slot] = EntityLocation::DEAD;
        self.free.push(index);
        self.alive -= 1;
    }

    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        if !self.is_alive(entity) {
            return None;
        }
        self.locations.get(entity.index() as usize).copied()
    }

    pub(crate) fn set_location(&mut self, index: u32, location: EntityLocation) {
        if let Some(slot) = self.locations.get_mut(index as usize) {
            *slot = location;
        }
    }

    /// Patch only the row; used after another entity's swap-removal
    pub(crate) fn set_row(&mut self, index: u32, row: usize) {
        if let Some(slot) = self.locations.get_mut(index as usize) {
            slot.archetype_row = row;
        }
    }

    /// Current live handle for a bare index (e.g. a pair target)
    pub fn resolve(&self, index: u32) -> Option<Entity> {
        let slot = index as usize;
        let generation = *self.generations.get(slot)?;
        let entity = Entity::from_parts(index, generation);
        self.is_alive(entity).then_some(entity)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Number of indices handed out so far, including recycled ones
    pub fn high_water_mark(&self) -> usize {
        self.generations.len() - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(allocator: &mut EntityAllocator, entity: Entity) {
        allocator.set_location(
            entity.index(),
            EntityLocation {
                archetype_id: ArchetypeId::EMPTY,
                archetype_row: 0,
            },
        );
    }

    #[test]
    fn test_first_index_is_not_null() {
        let mut allocator = EntityAllocator::new();
        let entity = allocator.allocate().unwrap();
        assert_eq!(entity.index(), 1);
        assert_eq!(entity.generation(), 0);
        assert!(!allocator.is_alive(Entity::NULL));
    }

    #[test]
    fn test_kill_bumps_generation_and_recycles() {
        let mut allocator = EntityAllocator::new();
        let first = allocator.allocate().unwrap();
        place(&mut allocator, first);
        assert!(allocator.is_alive(first));

        allocator.kill(first.index());
        assert!(!allocator.is_alive(first));
        assert_eq!(allocator.len(), 0);

        let second = allocator.allocate().unwrap();
        place(&mut allocator, second);
        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), 1);
        assert!(allocator.is_alive(second));
        assert!(!allocator.is_alive(first));
        assert_eq!(allocator.high_water_mark(), 1);
    }

    #[test]
    fn test_double_kill_is_ignored() {
        let mut allocator = EntityAllocator::new();
        let entity = allocator.allocate().unwrap();
        place(&mut allocator, entity);
        allocator.kill(entity.index());
        allocator.kill(entity.index());

        let a = allocator.allocate().unwrap();
        let b = allocator.allocate().unwrap();
        assert_ne!(a.index(), b.index());
    }

    #[test]
    fn test_pair_layout() {
        let relation = Entity::from_parts(7, 3);
        let target = Entity::from_parts(9, 1);
        let pair = Entity::pair(relation, target).unwrap();

        assert!(pair.is_pair());
        assert_eq!(pair.relation(), Some(7));
        assert_eq!(pair.target(), Some(9));
        assert!(!pair.is_wildcard());
        assert_eq!(pair.wildcard_marker(), Some(Entity::wildcard(relation).unwrap()));
        assert!(Entity::wildcard(relation).unwrap().is_wildcard());
    }

    #[test]
    fn test_pair_rejects_wide_target() {
        let relation = Entity::from_parts(7, 0);
        let target = Entity::from_parts(70_000, 0);
        assert!(matches!(
            Entity::pair(relation, target),
            Err(EcsError::InvalidPair(_))
        ));
        assert!(Entity::pair(relation, Entity::NULL).is_err());
    }

    #[test]
    fn test_sparse_keys_do_not_collide() {
        let plain = Entity::from_parts(5, 0);
        let pair = Entity::pair(plain, Entity::from_parts(5, 0)).unwrap();
        let plain_key = plain.sparse_key().unwrap();
        let pair_key = pair.sparse_key().unwrap();

        assert_eq!(plain_key, 5);
        assert_ne!(plain_key, pair_key);
        assert!(pair_key < 1 << KEY_BITS);
    }

    #[test]
    fn test_pairs_sort_after_plain_ids() {
        let plain = Entity::from_parts(u32::MAX, u16::MAX);
        let pair = Entity::wildcard(Entity::from_parts(1, 0)).unwrap();
        assert!(plain < pair);
    }
}
