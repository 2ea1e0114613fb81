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

//! Archetype directory: composition -> archetype id
//!
//! Fixed-capacity open-addressed table with linear probing. It is the only
//! place that decides whether an archetype for an exact composition exists.
//! Alongside it lives a per-component list of the archetypes containing that
//! component, which query registration uses to narrow its scan.

use crate::archetype::{Archetype, ArchetypeId};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::sparse::PagedSparseIndex;

/// Number of buckets in the directory table
pub const DIRECTORY_BUCKETS: usize = 8192;
const BUCKET_MASK: u64 = (DIRECTORY_BUCKETS - 1) as u64;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-style mix over the 64-bit words of a sorted composition
pub fn hash_composition(composition: &[Entity]) -> u64 {
    let mut hash = FNV_OFFSET;
    for id in composition {
        hash ^= id.to_bits();
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= hash >> 29;
    }
    hash
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    hash: u64,
    id: ArchetypeId,
}

#[derive(Debug)]
pub struct ArchetypeDirectory {
    buckets: Box<[Option<Bucket>]>,
    len: usize,
    containing: PagedSparseIndex<Vec<ArchetypeId>>,
}

impl ArchetypeDirectory {
    pub fn new() -> Self {
        Self {
            buckets: vec![None; DIRECTORY_BUCKETS].into_boxed_slice(),
            len: 0,
            containing: PagedSparseIndex::new(),
        }
    }

    /// Directory already mapping the empty composition to [`ArchetypeId::EMPTY`]
    pub fn with_empty_archetype() -> Self {
        let mut directory = Self::new();
        let hash = hash_composition(&[]);
        directory.buckets[(hash & BUCKET_MASK) as usize] = Some(Bucket {
            hash,
            id: ArchetypeId::EMPTY,
        });
        directory.len = 1;
        directory
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == DIRECTORY_BUCKETS
    }

    /// Archetype with exactly `composition`, if one exists
    pub fn find(&self, composition: &[Entity], archetypes: &[Archetype]) -> Option<ArchetypeId> {
        let hash = hash_composition(composition);
        let start = (hash & BUCKET_MASK) as usize;
        for probe in 0..DIRECTORY_BUCKETS {
            let bucket = self.buckets[(start + probe) % DIRECTORY_BUCKETS]?;
            if bucket.hash == hash
                && archetypes
                    .get(bucket.id.index())
                    .is_some_and(|archetype| archetype.composition() == composition)
            {
                return Some(bucket.id);
            }
        }
        None
    }

    /// Map `composition` to `id`, overwriting an entry with an equal composition
    pub fn insert(
        &mut self,
        composition: &[Entity],
        id: ArchetypeId,
        archetypes: &[Archetype],
    ) -> Result<()> {
        let hash = hash_composition(composition);
        let start = (hash & BUCKET_MASK) as usize;
        for probe in 0..DIRECTORY_BUCKETS {
            let slot = &mut self.buckets[(start + probe) % DIRECTORY_BUCKETS];
            match slot {
                None => {
                    *slot = Some(Bucket { hash, id });
                    self.len += 1;
                    return Ok(());
                }
                Some(bucket)
                    if bucket.hash == hash
                        && archetypes
                            .get(bucket.id.index())
                            .is_some_and(|archetype| archetype.composition() == composition) =>
                {
                    bucket.id = id;
                    return Ok(());
                }
                Some(_) => {}
            }
        }
        Err(EcsError::DirectoryFull)
    }

    /// Make room to record one more archetype under every component of
    /// `composition`
    pub fn reserve_components(&mut self, composition: &[Entity]) -> Result<()> {
        for component in composition {
            self.containing
                .get_or_insert_with(component.sparse_key()?, Vec::new)?
                .try_reserve(1)?;
        }
        Ok(())
    }

    /// Record `id` under every component of its composition
    pub fn index_components(&mut self, composition: &[Entity], id: ArchetypeId) -> Result<()> {
        self.reserve_components(composition)?;
        for component in composition {
            let key = component.sparse_key()?;
            if let Some(list) = self.containing.get_mut(key) {
                // Ids of one index share a list
                if list.last() != Some(&id) {
                    list.push(id);
                }
            }
        }
        Ok(())
    }

    /// Archetypes containing `component`, in creation order
    pub fn containing(&self, component: Entity) -> &[ArchetypeId] {
        component
            .sparse_key()
            .ok()
            .and_then(|key| self.containing.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for ArchetypeDirectory {
    fn default() -> Self {
        Self::new()
    }
}
