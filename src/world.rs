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

//! World: central entity and archetype storage

use std::any::TypeId;
use std::borrow::Cow;
use std::sync::Arc;

use ahash::AHashMap;
use bytemuck::Pod;
use smallvec::SmallVec;

#[cfg(feature = "profiling")]
use tracing::{debug, info_span};

use crate::archetype::{with_component, without_component, Archetype, ArchetypeId, Composition};
use crate::component::{ComponentRegistry, HookKind, ObserverKey, Trigger, BUILTIN_EVENTS};
use crate::config::WorldConfig;
use crate::directory::ArchetypeDirectory;
use crate::entity::{Entity, EntityAllocator, EntityLocation};
use crate::error::{EcsError, Result};
use crate::query::{QueryCache, QueryId, QueryIter, QueryIterMut, Terms};

/// How a migrating row finds its columns in the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Migration {
    /// First traversal of an edge: pairwise id comparison
    Intersect,
    /// Cached add: source composition is a subset
    FromSubset,
    /// Cached remove: source composition is a superset
    FromSuperset,
}

/// Central entity-component store
///
/// Owns the entity allocator, the component registry, the archetype arena
/// and directory, and every registered query cache. Several worlds can live
/// side by side; nothing is global.
pub struct World {
    /// Generations and locations per entity index
    entities: EntityAllocator,

    /// Component sizes, names, hooks and observers
    components: ComponentRegistry,

    /// All archetypes, addressed by `ArchetypeId`; never shrinks
    archetypes: Vec<Archetype>,

    /// Composition -> archetype, plus per-component containment lists
    directory: ArchetypeDirectory,

    /// Registered query caches, addressed by `QueryId`
    queries: Vec<QueryCache>,

    /// Term list -> registered query, so identical queries share a cache
    query_index: AHashMap<Terms, QueryId>,

    /// (entity, component) pairs whose remove hook is currently running
    removing: SmallVec<[(Entity, Entity); 4]>,

    config: WorldConfig,
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a world with explicit initial capacities
    pub fn with_config(config: WorldConfig) -> Self {
        // The empty archetype is always index 0 and starts out holding the
        // built-in event entities
        let root = Archetype::with_entities(
            ArchetypeId::EMPTY,
            config.column_capacity,
            &BUILTIN_EVENTS,
        );
        let mut archetypes = Vec::with_capacity(config.archetype_capacity.max(1));
        archetypes.push(root);

        Self {
            entities: EntityAllocator::with_reserved(
                config.entity_capacity,
                BUILTIN_EVENTS.len() as u32,
                ArchetypeId::EMPTY,
            ),
            components: ComponentRegistry::new(),
            archetypes,
            directory: ArchetypeDirectory::with_empty_archetype(),
            queries: Vec::with_capacity(config.query_capacity),
            query_index: AHashMap::with_capacity(config.query_capacity),
            removing: SmallVec::new(),
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Create an entity with no components
    pub fn new_entity(&mut self) -> Result<Entity> {
        let root = &mut self.archetypes[ArchetypeId::EMPTY.index()];
        root.reserve_rows(1)?;
        let entity = self.entities.allocate()?;
        let row = self.archetypes[ArchetypeId::EMPTY.index()].add_entity(entity)?;
        self.entities.set_location(
            entity.index(),
            EntityLocation {
                archetype_id: ArchetypeId::EMPTY,
                archetype_row: row,
            },
        );
        Ok(entity)
    }

    /// Check if an entity is alive
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    fn location(&self, entity: Entity) -> Result<EntityLocation> {
        self.entities
            .location(entity)
            .ok_or(EcsError::EntityNotFound(entity))
    }

    // ------------------------------------------------------------------
    // Component registration
    // ------------------------------------------------------------------

    /// Register the byte size of component `id` (an entity of this world)
    pub fn register_component(&mut self, id: Entity, size: usize) -> Result<()> {
        self.location(id)?;
        self.components.register(id, size, None)
    }

    /// Register a component under a unique name
    pub fn register_named(&mut self, id: Entity, size: usize, name: &str) -> Result<()> {
        self.location(id)?;
        self.components.register(id, size, Some(name))
    }

    /// Allocate an entity and register it as a `size`-byte component
    pub fn new_component(&mut self, size: usize) -> Result<Entity> {
        let id = self.new_entity()?;
        self.components.register(id, size, None)?;
        Ok(id)
    }

    /// Allocate a zero-size component
    pub fn new_tag(&mut self) -> Result<Entity> {
        self.new_component(0)
    }

    /// Component id for `T`, registering it on first use
    pub fn component<T: Pod>(&mut self) -> Result<Entity> {
        let type_id = TypeId::of::<T>();
        if let Some(id) = self.components.type_component(type_id) {
            return Ok(id);
        }
        if std::mem::align_of::<T>() > std::mem::align_of::<u64>() {
            return Err(EcsError::Layout(format!(
                "{} needs {}-byte alignment",
                std::any::type_name::<T>(),
                std::mem::align_of::<T>()
            )));
        }
        let id = self.new_entity()?;
        self.components.register(
            id,
            std::mem::size_of::<T>(),
            Some(std::any::type_name::<T>()),
        )?;
        self.components.bind_type(type_id, id);
        Ok(id)
    }

    /// Component id for `T` if it was registered through [`World::component`]
    pub fn component_id<T: Pod>(&self) -> Option<Entity> {
        self.components.type_component(TypeId::of::<T>())
    }

    pub fn component_name(&self, id: Entity) -> Option<&str> {
        self.components.info(id)?.name()
    }

    /// Component registered under `name`
    pub fn lookup(&self, name: &str) -> Option<Entity> {
        self.components.lookup(name)
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    // ------------------------------------------------------------------
    // Composition changes
    // ------------------------------------------------------------------

    /// Check if `entity` currently carries `component`
    pub fn has(&self, entity: Entity, component: Entity) -> bool {
        self.entities.location(entity).is_some_and(|location| {
            self.archetypes[location.archetype_id.index()].has_component(component)
        })
    }

    /// Add `component` (zero-filled) to `entity`. No-op if already present.
    ///
    /// Adding a pair also adds its relation's `(relation, *)` marker.
    pub fn add(&mut self, entity: Entity, component: Entity) -> Result<()> {
        let mut location = self.location(entity)?;
        if self.archetypes[location.archetype_id.index()].has_component(component) {
            return Ok(());
        }
        // Validates registration (plain ids) and key range (pairs) up front
        self.components.column_size(component)?;
        component.sparse_key()?;

        if let Some(marker) = component.wildcard_marker() {
            if marker != component
                && !self.archetypes[location.archetype_id.index()].has_component(marker)
            {
                location = self.migrate_add(entity, location, marker)?;
            }
        }
        self.migrate_add(entity, location, component)?;
        self.fire(HookKind::Add, entity, component);
        Ok(())
    }

    /// Remove `component` from `entity`. No-op if absent.
    ///
    /// Removing a `(relation, *)` marker removes every pair of that relation.
    pub fn remove(&mut self, entity: Entity, component: Entity) -> Result<()> {
        let location = self.location(entity)?;
        let archetype = &self.archetypes[location.archetype_id.index()];
        if !archetype.has_component(component) {
            return Ok(());
        }

        if component.is_wildcard() {
            let relation = component.relation();
            let pairs: Composition = archetype
                .composition()
                .iter()
                .copied()
                .filter(|id| id.relation() == relation && !id.is_wildcard())
                .collect();
            for pair in pairs {
                self.remove(entity, pair)?;
            }
            // Marker goes with the last pair; only a bare marker is left here
            if self.has(entity, component) {
                let location = self.location(entity)?;
                self.migrate_remove(entity, location, component)?;
            }
            return Ok(());
        }

        self.fire_remove(entity, component);

        // The hook may already have removed it, or killed the entity
        let Ok(location) = self.location(entity) else {
            return Ok(());
        };
        if !self.archetypes[location.archetype_id.index()].has_component(component) {
            return Ok(());
        }
        let location = self.migrate_remove(entity, location, component)?;

        if let (Some(relation), Some(marker)) = (component.relation(), component.wildcard_marker()) {
            let remaining = self.archetypes[location.archetype_id.index()]
                .composition()
                .iter()
                .any(|id| id.relation() == Some(relation) && !id.is_wildcard());
            if !remaining {
                self.migrate_remove(entity, location, marker)?;
            }
        }
        Ok(())
    }

    /// Write `bytes` as the value of `component`, adding it first if needed
    pub fn set(&mut self, entity: Entity, component: Entity, bytes: &[u8]) -> Result<()> {
        let size = self.components.column_size(component)?;
        if bytes.len() != size {
            return Err(EcsError::SizeMismatch {
                component,
                expected: size,
                actual: bytes.len(),
            });
        }
        self.add(entity, component)?;

        let location = self.location(entity)?;
        self.archetypes[location.archetype_id.index()]
            .get_component_mut(location.archetype_row, component)
            .ok_or(EcsError::ComponentNotFound { entity, component })?
            .copy_from_slice(bytes);
        self.fire(HookKind::Set, entity, component);
        Ok(())
    }

    /// Bytes of `component` on `entity`
    pub fn get(&self, entity: Entity, component: Entity) -> Result<&[u8]> {
        let location = self.location(entity)?;
        self.archetypes[location.archetype_id.index()]
            .get_component(location.archetype_row, component)
            .ok_or(EcsError::ComponentNotFound { entity, component })
    }

    /// Mutable bytes of `component`; does not fire set hooks
    pub fn get_mut(&mut self, entity: Entity, component: Entity) -> Result<&mut [u8]> {
        let location = self.location(entity)?;
        self.archetypes[location.archetype_id.index()]
            .get_component_mut(location.archetype_row, component)
            .ok_or(EcsError::ComponentNotFound { entity, component })
    }

    pub fn set_as<T: Pod>(&mut self, entity: Entity, component: Entity, value: &T) -> Result<()> {
        self.set(entity, component, bytemuck::bytes_of(value))
    }

    pub fn get_as<T: Pod>(&self, entity: Entity, component: Entity) -> Result<&T> {
        Ok(bytemuck::try_from_bytes(self.get(entity, component)?)?)
    }

    pub fn get_as_mut<T: Pod>(&mut self, entity: Entity, component: Entity) -> Result<&mut T> {
        Ok(bytemuck::try_from_bytes_mut(self.get_mut(entity, component)?)?)
    }

    /// Add and set the component registered for `T`
    pub fn insert<T: Pod>(&mut self, entity: Entity, value: T) -> Result<()> {
        let component = self.component::<T>()?;
        self.set_as(entity, component, &value)
    }

    /// Destroy `entity`.
    ///
    /// Remove hooks fire for every component it carries before the row is
    /// released. Pairs targeting `entity` elsewhere are left in place.
    /// If `entity` is a component its registration is dropped, so a later
    /// entity reusing the index starts unregistered. Built-in event entities
    /// cannot be destroyed.
    pub fn kill(&mut self, entity: Entity) -> Result<()> {
        let location = self.location(entity)?;
        if BUILTIN_EVENTS.contains(&entity) {
            return Ok(());
        }

        #[cfg(feature = "profiling")]
        let span = info_span!(
            "world.kill",
            entity = ?entity,
            archetype = location.archetype_id.index()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let composition =
            Composition::from_slice(self.archetypes[location.archetype_id.index()].composition());
        for component in composition {
            if self.has(entity, component) {
                self.fire_remove(entity, component);
            }
        }

        // A hook may have killed it already
        let Ok(location) = self.location(entity) else {
            return Ok(());
        };
        let archetype = &mut self.archetypes[location.archetype_id.index()];
        if let Some(moved) = archetype.remove_entity(location.archetype_row) {
            self.entities.set_row(moved.index(), location.archetype_row);
        }
        self.entities.kill(entity.index());
        // Archetypes keep the dead id in their composition; only the
        // registration goes
        self.components.unregister(entity);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    /// Encode a `(relation, target)` pair usable as a component id
    pub fn pair(&self, relation: Entity, target: Entity) -> Result<Entity> {
        Entity::pair(relation, target)
    }

    /// Live targets of `relation` on `entity`, in composition order
    pub fn targets(&self, entity: Entity, relation: Entity) -> Result<SmallVec<[Entity; 4]>> {
        let marker = Entity::wildcard(relation)?;
        let location = self.location(entity)?;
        Ok(self.archetypes[location.archetype_id.index()]
            .composition()
            .iter()
            .filter(|id| id.relation() == marker.relation() && !id.is_wildcard())
            .filter_map(|id| id.target())
            .filter_map(|target| self.entities.resolve(target as u32))
            .collect())
    }

    // ------------------------------------------------------------------
    // Hooks, observers, singletons
    // ------------------------------------------------------------------

    /// Run `hook` after `component` is added to any entity
    pub fn on_add<F>(&mut self, component: Entity, hook: F) -> Result<()>
    where
        F: Fn(&mut World, Entity) + Send + Sync + 'static,
    {
        self.components.set_hook(component, HookKind::Add, Arc::new(hook))
    }

    /// Run `hook` before `component` is removed from any entity
    pub fn on_remove<F>(&mut self, component: Entity, hook: F) -> Result<()>
    where
        F: Fn(&mut World, Entity) + Send + Sync + 'static,
    {
        self.components
            .set_hook(component, HookKind::Remove, Arc::new(hook))
    }

    /// Run `hook` after `component` is written through [`World::set`]
    pub fn on_set<F>(&mut self, component: Entity, hook: F) -> Result<()>
    where
        F: Fn(&mut World, Entity) + Send + Sync + 'static,
    {
        self.components.set_hook(component, HookKind::Set, Arc::new(hook))
    }

    /// Call `callback` whenever `event` fires for `component`
    pub fn observe<F>(&mut self, component: Entity, event: Entity, callback: F) -> Result<ObserverKey>
    where
        F: Fn(&mut World, Trigger) + Send + Sync + 'static,
    {
        self.components.observe(component, event, Arc::new(callback))
    }

    pub fn unobserve(&mut self, key: ObserverKey) -> bool {
        self.components.unobserve(key)
    }

    /// Fire a custom `event` for `component` on `entity`; returns how many
    /// observers ran
    pub fn emit(&mut self, event: Entity, entity: Entity, component: Entity) -> Result<usize> {
        self.location(entity)?;
        let observers = self.components.observers_for(component, event);
        let trigger = Trigger {
            event,
            entity,
            component,
        };
        let count = observers.len();
        for observer in observers {
            observer(self, trigger);
        }
        Ok(count)
    }

    fn fire(&mut self, kind: HookKind, entity: Entity, component: Entity) {
        if let Some(hook) = self.components.hook(component, kind) {
            hook(self, entity);
        }
        let event = kind.event();
        let trigger = Trigger {
            event,
            entity,
            component,
        };
        for observer in self.components.observers_for(component, event) {
            observer(self, trigger);
        }
    }

    /// Remove hook and observers, skipped if already running for this pair
    /// further up the stack
    fn fire_remove(&mut self, entity: Entity, component: Entity) {
        if self.removing.contains(&(entity, component)) {
            return;
        }
        self.removing.push((entity, component));
        self.fire(HookKind::Remove, entity, component);
        self.removing.retain(|pending| *pending != (entity, component));
    }

    /// Store `value` on `T`'s own component entity
    pub fn set_singleton<T: Pod>(&mut self, value: T) -> Result<Entity> {
        let component = self.component::<T>()?;
        self.set_as(component, component, &value)?;
        Ok(component)
    }

    pub fn singleton<T: Pod>(&self) -> Option<&T> {
        let component = self.component_id::<T>()?;
        self.get_as(component, component).ok()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Register a cached query; identical term lists share one cache
    pub fn register_query(&mut self, terms: Terms) -> Result<QueryId> {
        if let Some(&id) = self.query_index.get(&terms) {
            return Ok(id);
        }

        #[cfg(feature = "profiling")]
        let span = info_span!(
            "world.register_query",
            terms = terms.len(),
            archetype_count = self.archetypes.len()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let cache = QueryCache::build(terms.clone(), &self.archetypes, &self.directory)?;
        let id = QueryId::new(self.queries.len());
        self.queries.try_reserve(1)?;
        self.query_index.try_reserve(1)?;

        #[cfg(feature = "profiling")]
        debug!(query = id.index(), matched = cache.len(), "registered query");

        self.queries.push(cache);
        self.query_index.insert(terms, id);
        Ok(id)
    }

    pub fn query_cache(&self, query: QueryId) -> Result<&QueryCache> {
        self.queries
            .get(query.index())
            .ok_or(EcsError::QueryNotFound(query))
    }

    /// Matching archetype ids of a registered query, in creation order
    pub fn query_archetypes(&self, query: QueryId) -> Result<&[ArchetypeId]> {
        Ok(self.query_cache(query)?.archetypes())
    }

    /// Iterate the non-empty archetypes of a registered query
    pub fn iter(&self, query: QueryId) -> Result<QueryIter<'_>> {
        let ids = self.query_cache(query)?.archetypes();
        Ok(QueryIter::new(self, Cow::Borrowed(ids)))
    }

    /// Iterate a registered query with writable columns
    pub fn iter_mut(&mut self, query: QueryId) -> Result<QueryIterMut<'_>> {
        let ids = self
            .queries
            .get(query.index())
            .ok_or(EcsError::QueryNotFound(query))?
            .archetypes();
        Ok(QueryIterMut::new(&mut self.archetypes, Cow::Borrowed(ids)))
    }

    /// One-shot query: matched now, not cached
    pub fn query(&self, terms: &Terms) -> Result<QueryIter<'_>> {
        let cache = QueryCache::build(terms.clone(), &self.archetypes, &self.directory)?;
        Ok(QueryIter::new(self, Cow::Owned(cache.into_archetypes())))
    }

    pub fn query_mut(&mut self, terms: &Terms) -> Result<QueryIterMut<'_>> {
        let cache = QueryCache::build(terms.clone(), &self.archetypes, &self.directory)?;
        Ok(QueryIterMut::new(
            &mut self.archetypes,
            Cow::Owned(cache.into_archetypes()),
        ))
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Live entities, not counting the built-in event entities
    pub fn entity_count(&self) -> usize {
        self.entities.len() - BUILTIN_EVENTS.len()
    }

    pub fn entity_location(&self, entity: Entity) -> Option<EntityLocation> {
        self.entities.location(entity)
    }

    /// Get query cache statistics for diagnostics
    pub fn query_cache_stats(&self) -> QueryCacheStats {
        QueryCacheStats {
            num_cached_queries: self.queries.len(),
            total_cached_archetypes: self.queries.iter().map(QueryCache::len).sum(),
            total_archetypes: self.archetypes.len(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Archetype with exactly `composition`, created (and announced to every
    /// query cache) if missing.
    ///
    /// Columns already present in `source` keep its element size, so entities
    /// still carrying a destroyed component can migrate.
    fn get_or_create(&mut self, composition: &[Entity], source: ArchetypeId) -> Result<ArchetypeId> {
        if let Some(id) = self.directory.find(composition, &self.archetypes) {
            return Ok(id);
        }
        if self.directory.is_full() {
            return Err(EcsError::DirectoryFull);
        }

        #[cfg(feature = "profiling")]
        let span = info_span!(
            "world.get_or_create",
            components = composition.len(),
            archetype_count = self.archetypes.len()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let id = ArchetypeId::new(self.archetypes.len());
        let mut archetype = Archetype::new(id, self.config.column_capacity);
        for &component in composition {
            let size = match self.archetypes[source.index()].column(component) {
                Some(column) => column.element_size(),
                None => self.components.column_size(component)?,
            };
            archetype.add_row(component, size)?;
        }

        // Everything that can fail happens before the directory learns the id
        self.archetypes.try_reserve(1)?;
        let mut matched: SmallVec<[usize; 8]> = SmallVec::new();
        for (index, cache) in self.queries.iter_mut().enumerate() {
            if cache.prepare(&archetype)? {
                matched.push(index);
            }
        }
        self.directory.reserve_components(composition)?;

        self.directory.insert(composition, id, &self.archetypes)?;
        self.directory.index_components(composition, id)?;
        for index in matched {
            self.queries[index].append(id);
        }
        self.archetypes.push(archetype);

        #[cfg(feature = "profiling")]
        debug!(archetype = id.index(), ?composition, "created archetype");

        Ok(id)
    }

    fn migrate_add(
        &mut self,
        entity: Entity,
        location: EntityLocation,
        component: Entity,
    ) -> Result<EntityLocation> {
        let source = location.archetype_id;
        // Edges are keyed by index; a stale generation's edge leads elsewhere
        let cached = self.archetypes[source.index()]
            .add_edge(component)
            .filter(|target| self.archetypes[target.index()].has_component(component));
        if let Some(target) = cached {
            return self.move_entity(entity, location, target, Migration::FromSubset);
        }

        let Some(composition) =
            with_component(self.archetypes[source.index()].composition(), component)
        else {
            return Ok(location);
        };
        let target = self.get_or_create(&composition, source)?;
        self.archetypes[source.index()].set_add_edge(component, target)?;
        self.archetypes[target.index()].set_remove_edge(component, source)?;
        self.move_entity(entity, location, target, Migration::Intersect)
    }

    fn migrate_remove(
        &mut self,
        entity: Entity,
        location: EntityLocation,
        component: Entity,
    ) -> Result<EntityLocation> {
        let source = location.archetype_id;
        let cached = self.archetypes[source.index()]
            .remove_edge(component)
            .filter(|target| !self.archetypes[target.index()].has_component(component));
        if let Some(target) = cached {
            return self.move_entity(entity, location, target, Migration::FromSuperset);
        }

        let Some(composition) =
            without_component(self.archetypes[source.index()].composition(), component)
        else {
            return Ok(location);
        };
        let target = self.get_or_create(&composition, source)?;
        self.archetypes[source.index()].set_remove_edge(component, target)?;
        self.archetypes[target.index()].set_add_edge(component, source)?;
        self.move_entity(entity, location, target, Migration::Intersect)
    }

    /// Internal: Move entity from one archetype to another
    fn move_entity(
        &mut self,
        entity: Entity,
        old_loc: EntityLocation,
        new_archetype_id: ArchetypeId,
        migration: Migration,
    ) -> Result<EntityLocation> {
        #[cfg(feature = "profiling")]
        let span = info_span!(
            "world.move_entity",
            from = old_loc.archetype_id.index(),
            to = new_archetype_id.index()
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let (old_arch, new_arch) =
            pair_mut(&mut self.archetypes, old_loc.archetype_id, new_archetype_id);

        let new_row = new_arch.add_entity(entity)?;
        match migration {
            Migration::Intersect => {
                new_arch.copy_row_intersecting(new_row, old_arch, old_loc.archetype_row)
            }
            Migration::FromSubset => {
                new_arch.copy_row_from_subset(new_row, old_arch, old_loc.archetype_row)
            }
            Migration::FromSuperset => {
                new_arch.copy_row_from_superset(new_row, old_arch, old_loc.archetype_row)
            }
        }

        if let Some(swapped) = old_arch.remove_entity(old_loc.archetype_row) {
            self.entities.set_row(swapped.index(), old_loc.archetype_row);
        }

        let location = EntityLocation {
            archetype_id: new_archetype_id,
            archetype_row: new_row,
        };
        self.entities.set_location(entity.index(), location);
        Ok(location)
    }
}

/// Two distinct archetypes mutably at once
fn pair_mut(
    archetypes: &mut [Archetype],
    first: ArchetypeId,
    second: ArchetypeId,
) -> (&mut Archetype, &mut Archetype) {
    let (a, b) = (first.index(), second.index());
    debug_assert_ne!(a, b, "migration within one archetype");
    if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Statistics about the query cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCacheStats {
    /// Number of registered queries
    pub num_cached_queries: usize,
    /// Total number of archetype matches across all registered queries
    pub total_cached_archetypes: usize,
    /// Total number of archetypes in the world
    pub total_archetypes: usize,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("archetypes", &self.archetypes.len())
            .field("queries", &self.queries.len())
            .field("components", &self.components)
            .finish()
    }
}
