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

//! Archetype Store - entity-component data store
//!
//! Entities carry runtime-registered components (plain byte blobs of a fixed
//! size, or zero-size tags). Entities with the same component set share an
//! archetype whose columns are stored densely; registered queries keep an
//! incrementally updated list of matching archetypes so iteration never
//! rescans.
//!
//! ```
//! use archetype_store::{Term, Terms, World};
//!
//! # fn main() -> archetype_store::Result<()> {
//! let mut world = World::new();
//! let position = world.component::<[f32; 2]>()?;
//! let e = world.new_entity()?;
//! world.set_as(e, position, &[1.0f32, 2.0])?;
//!
//! let query = world.register_query(Terms::new([Term::with(position)])?)?;
//! for run in world.iter(query)? {
//!     let positions = run.column_as::<[f32; 2]>(position)?;
//!     assert_eq!(positions, &[[1.0, 2.0]]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod archetype;
pub mod buffer;
pub mod component;
pub mod config;
pub mod directory;
pub mod entity;
pub mod error;
pub mod prelude;
pub mod query;
pub mod sparse;
pub mod world;

#[cfg(test)]
mod tests;

pub use archetype::{Archetype, ArchetypeId, Composition};
pub use buffer::{GrowBuffer, Relocation};
pub use component::{
    ComponentInfo, ComponentRegistry, HookKind, ObserverKey, Trigger, ON_ADD, ON_REMOVE, ON_SET,
};
pub use config::WorldConfig;
pub use directory::ArchetypeDirectory;
pub use entity::{Entity, EntityAllocator, EntityLocation};
pub use error::{EcsError, Result};
pub use query::{
    ArchetypeRun, ArchetypeRunMut, QueryCache, QueryId, QueryIter, QueryIterMut, Term, TermOp,
    Terms, MAX_TERMS,
};
pub use sparse::{PagedSparseIndex, SparseRemoval};
pub use world::{QueryCacheStats, World};
