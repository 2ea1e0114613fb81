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

//! Query system with archetype filtering
//!
//! A query is a short term list over component ids. Its cache holds the ids
//! of every archetype whose composition satisfies the terms, in archetype
//! creation order; the world appends to each cache as archetypes are created
//! so registered queries never rescan.
//!
//! Iteration yields one run per non-empty matching archetype. A run exposes
//! the archetype's dense columns directly. Runs borrow the world, so the
//! store cannot be mutated while one is alive.

use std::borrow::Cow;

use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeId};
use crate::buffer::GrowBuffer;
use crate::directory::ArchetypeDirectory;
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

/// Maximum number of terms in one query
pub const MAX_TERMS: usize = 8;

/// Term operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermOp {
    /// Component must be present
    #[default]
    Match,
    /// Component must be absent
    Negate,
}

/// One query term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    /// Component id, pair, or `(relation, *)` wildcard
    pub id: Entity,
    #[serde(default)]
    pub op: TermOp,
    /// Data comes from the component's own entity; ignored when matching
    #[serde(default)]
    pub singleton: bool,
}

impl Term {
    pub fn with(id: Entity) -> Self {
        Self {
            id,
            op: TermOp::Match,
            singleton: false,
        }
    }

    pub fn without(id: Entity) -> Self {
        Self {
            id,
            op: TermOp::Negate,
            singleton: false,
        }
    }

    pub fn singleton(id: Entity) -> Self {
        Self {
            id,
            op: TermOp::Match,
            singleton: true,
        }
    }
}

/// Validated term list (at most [`MAX_TERMS`] entries)
///
/// This is the data format the query DSL hands to the store; it round-trips
/// through serde as a plain array of terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Term>", into = "Vec<Term>")]
pub struct Terms(SmallVec<[Term; MAX_TERMS]>);

impl Terms {
    pub fn new<I>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = Term>,
    {
        let mut list = Terms::default();
        for term in terms {
            list.push(term)?;
        }
        Ok(list)
    }

    pub fn push(&mut self, term: Term) -> Result<()> {
        if self.0.len() == MAX_TERMS {
            return Err(EcsError::TooManyTerms(MAX_TERMS + 1));
        }
        self.0.push(term);
        Ok(())
    }

    /// Decode a JSON array of terms
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| EcsError::TermParse(err.to_string()))
    }

    pub fn as_slice(&self) -> &[Term] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, composition: &[Entity]) -> bool {
        matches(&self.0, composition)
    }
}

impl TryFrom<Vec<Term>> for Terms {
    type Error = EcsError;

    fn try_from(terms: Vec<Term>) -> Result<Self> {
        if terms.len() > MAX_TERMS {
            return Err(EcsError::TooManyTerms(terms.len()));
        }
        Ok(Terms(terms.into_iter().collect()))
    }
}

impl From<Terms> for Vec<Term> {
    fn from(terms: Terms) -> Self {
        terms.0.into_vec()
    }
}

/// Does `composition` satisfy every non-singleton term?
///
/// Linear scan per term; stops at the first violated term. An empty term
/// list matches everything.
pub fn matches(terms: &[Term], composition: &[Entity]) -> bool {
    terms
        .iter()
        .filter(|term| !term.singleton)
        .all(|term| {
            let present = composition.iter().any(|&id| id == term.id);
            match term.op {
                TermOp::Match => present,
                TermOp::Negate => !present,
            }
        })
}

/// Identifier of a registered query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(u32);

impl QueryId {
    pub(crate) fn new(index: usize) -> Self {
        QueryId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Cached list of archetypes matching a term list
#[derive(Debug, Clone)]
pub struct QueryCache {
    terms: Terms,
    archetypes: Vec<ArchetypeId>,
}

impl QueryCache {
    /// Build a cache for `terms` against the current archetypes.
    ///
    /// When a match term has a per-component candidate list, only the
    /// narrowest such list is scanned; otherwise every archetype is.
    pub fn build(
        terms: Terms,
        archetypes: &[Archetype],
        directory: &ArchetypeDirectory,
    ) -> Result<Self> {
        #[cfg(feature = "profiling")]
        let span = info_span!(
            "query_cache.build",
            terms = terms.len(),
            archetype_count = archetypes.len()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let mut cache = Self {
            terms,
            archetypes: Vec::new(),
        };
        match narrowest_candidates(&cache.terms, directory) {
            Some(candidates) => {
                for id in candidates {
                    if let Some(archetype) = archetypes.get(id.index()) {
                        cache.notify(archetype)?;
                    }
                }
            }
            None => {
                for archetype in archetypes {
                    cache.notify(archetype)?;
                }
            }
        }
        Ok(cache)
    }

    /// Offer a newly created archetype; returns whether it was appended
    pub(crate) fn notify(&mut self, archetype: &Archetype) -> Result<bool> {
        let matched = self.prepare(archetype)?;
        if matched {
            self.append(archetype.id());
        }
        Ok(matched)
    }

    /// Whether `archetype` belongs here, with room reserved for it if so
    pub(crate) fn prepare(&mut self, archetype: &Archetype) -> Result<bool> {
        if !self.terms.matches(archetype.composition()) {
            return Ok(false);
        }
        self.archetypes.try_reserve(1)?;
        Ok(true)
    }

    /// Record an archetype accepted by [`QueryCache::prepare`]
    pub(crate) fn append(&mut self, id: ArchetypeId) {
        self.archetypes.push(id);
    }

    pub fn terms(&self) -> &Terms {
        &self.terms
    }

    /// Matching archetype ids in creation order
    pub fn archetypes(&self) -> &[ArchetypeId] {
        &self.archetypes
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub(crate) fn into_archetypes(self) -> Vec<ArchetypeId> {
        self.archetypes
    }
}

/// Smallest "archetypes containing X" list over the match terms
fn narrowest_candidates<'d>(
    terms: &Terms,
    directory: &'d ArchetypeDirectory,
) -> Option<&'d [ArchetypeId]> {
    terms
        .as_slice()
        .iter()
        .filter(|term| term.op == TermOp::Match && !term.singleton)
        .map(|term| directory.containing(term.id))
        .min_by_key(|candidates| candidates.len())
}

/// Iterator over the non-empty archetypes of a query
pub struct QueryIter<'w> {
    world: &'w World,
    ids: Cow<'w, [ArchetypeId]>,
    cursor: usize,
}

impl<'w> QueryIter<'w> {
    pub(crate) fn new(world: &'w World, ids: Cow<'w, [ArchetypeId]>) -> Self {
        Self {
            world,
            ids,
            cursor: 0,
        }
    }

    /// Total entities left in the remaining runs
    pub fn entity_count(&self) -> usize {
        self.ids[self.cursor..]
            .iter()
            .filter_map(|&id| self.world.archetype(id))
            .map(Archetype::len)
            .sum()
    }
}

impl<'w> Iterator for QueryIter<'w> {
    type Item = ArchetypeRun<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&id) = self.ids.get(self.cursor) {
            self.cursor += 1;
            let Some(archetype) = self.world.archetype(id) else {
                continue;
            };
            if archetype.is_empty() {
                continue;
            }
            return Some(ArchetypeRun {
                world: self.world,
                archetype,
            });
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ids.len() - self.cursor))
    }
}

/// One archetype's worth of matching entities
#[derive(Clone, Copy)]
pub struct ArchetypeRun<'w> {
    world: &'w World,
    archetype: &'w Archetype,
}

impl<'w> ArchetypeRun<'w> {
    pub fn len(&self) -> usize {
        self.archetype.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetype.is_empty()
    }

    pub fn archetype(&self) -> &'w Archetype {
        self.archetype
    }

    pub fn entities(&self) -> &'w [Entity] {
        self.archetype.entities()
    }

    /// Packed bytes of `component` for every entity in the run
    pub fn column(&self, component: Entity) -> Result<&'w [u8]> {
        Ok(column_of(self.archetype, component)?.as_bytes())
    }

    pub fn column_as<T: Pod>(&self, component: Entity) -> Result<&'w [T]> {
        column_of(self.archetype, component)?.as_slice()
    }

    /// Value of a singleton term, stored on the component's own entity
    pub fn singleton(&self, component: Entity) -> Result<&'w [u8]> {
        self.world.get(component, component)
    }

    pub fn singleton_as<T: Pod>(&self, component: Entity) -> Result<&'w T> {
        self.world.get_as(component, component)
    }
}

/// Mutable iterator over the non-empty archetypes of a query
pub struct QueryIterMut<'w> {
    archetypes: std::slice::IterMut<'w, Archetype>,
    next_index: usize,
    ids: Cow<'w, [ArchetypeId]>,
    cursor: usize,
}

impl<'w> QueryIterMut<'w> {
    /// `ids` must be ascending, which creation order guarantees
    pub(crate) fn new(archetypes: &'w mut [Archetype], ids: Cow<'w, [ArchetypeId]>) -> Self {
        debug_assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        Self {
            archetypes: archetypes.iter_mut(),
            next_index: 0,
            ids,
            cursor: 0,
        }
    }
}

impl<'w> Iterator for QueryIterMut<'w> {
    type Item = ArchetypeRunMut<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&id) = self.ids.get(self.cursor) {
            self.cursor += 1;
            let skip = id.index().checked_sub(self.next_index)?;
            let archetype = self.archetypes.nth(skip)?;
            self.next_index = id.index() + 1;
            if archetype.is_empty() {
                continue;
            }
            return Some(ArchetypeRunMut { archetype });
        }
        None
    }
}

/// One archetype's worth of matching entities, with writable columns
pub struct ArchetypeRunMut<'w> {
    archetype: &'w mut Archetype,
}

impl<'w> ArchetypeRunMut<'w> {
    pub fn len(&self) -> usize {
        self.archetype.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetype.is_empty()
    }

    pub fn archetype_id(&self) -> ArchetypeId {
        self.archetype.id()
    }

    pub fn entities(&self) -> &[Entity] {
        self.archetype.entities()
    }

    pub fn column(&self, component: Entity) -> Result<&[u8]> {
        Ok(column_of(self.archetype, component)?.as_bytes())
    }

    pub fn column_mut(&mut self, component: Entity) -> Result<&mut [u8]> {
        Ok(column_of_mut(self.archetype, component)?.as_bytes_mut())
    }

    pub fn column_as<T: Pod>(&self, component: Entity) -> Result<&[T]> {
        column_of(self.archetype, component)?.as_slice()
    }

    pub fn column_as_mut<T: Pod>(&mut self, component: Entity) -> Result<&mut [T]> {
        column_of_mut(self.archetype, component)?.as_slice_mut()
    }

    /// Two distinct columns, both writable
    pub fn column_pair_as_mut<A: Pod, B: Pod>(
        &mut self,
        first: Entity,
        second: Entity,
    ) -> Result<(&mut [A], &mut [B])> {
        let missing = EcsError::ColumnNotFound {
            archetype: self.archetype.id(),
            component: if self.archetype.has_component(first) {
                second
            } else {
                first
            },
        };
        let (a, b) = self
            .archetype
            .column_pair_mut(first, second)
            .ok_or(missing)?;
        Ok((a.as_slice_mut()?, b.as_slice_mut()?))
    }
}

fn column_of(archetype: &Archetype, component: Entity) -> Result<&GrowBuffer> {
    archetype
        .column(component)
        .ok_or(EcsError::ColumnNotFound {
            archetype: archetype.id(),
            component,
        })
}

fn column_of_mut(archetype: &mut Archetype, component: Entity) -> Result<&mut GrowBuffer> {
    let archetype_id = archetype.id();
    archetype
        .column_mut(component)
        .ok_or(EcsError::ColumnNotFound {
            archetype: archetype_id,
            component,
        })
}
