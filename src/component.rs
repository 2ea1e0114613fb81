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

//! Component registry
//!
//! Components are entities used as type tags. The registry is owned by the
//! world and records, per component id, its byte size, optional name,
//! lifecycle hooks and observers.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::sparse::PagedSparseIndex;
use crate::world::World;

/// Event entity fired after a component is added
pub const ON_ADD: Entity = Entity::from_parts(1, 0);
/// Event entity fired before a component is removed
pub const ON_REMOVE: Entity = Entity::from_parts(2, 0);
/// Event entity fired after a component value is written
pub const ON_SET: Entity = Entity::from_parts(3, 0);

/// Entities every world reserves at startup, in allocation order
pub(crate) const BUILTIN_EVENTS: [Entity; 3] = [ON_ADD, ON_REMOVE, ON_SET];

/// Lifecycle callback: `(world, entity)`
pub type Hook = Arc<dyn Fn(&mut World, Entity) + Send + Sync>;

/// Observer callback
pub type ObserverFn = Arc<dyn Fn(&mut World, Trigger) + Send + Sync>;

new_key_type! {
    /// Handle returned by [`World::observe`]
    pub struct ObserverKey;
}

/// What an observer is told when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub event: Entity,
    pub entity: Entity,
    pub component: Entity,
}

/// Which lifecycle hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Add,
    Remove,
    Set,
}

impl HookKind {
    /// Built-in event entity matching this hook
    pub fn event(self) -> Entity {
        match self {
            HookKind::Add => ON_ADD,
            HookKind::Remove => ON_REMOVE,
            HookKind::Set => ON_SET,
        }
    }
}

#[derive(Clone, Default)]
pub struct ComponentHooks {
    on_add: Option<Hook>,
    on_remove: Option<Hook>,
    on_set: Option<Hook>,
}

impl ComponentHooks {
    fn slot(&mut self, kind: HookKind) -> &mut Option<Hook> {
        match kind {
            HookKind::Add => &mut self.on_add,
            HookKind::Remove => &mut self.on_remove,
            HookKind::Set => &mut self.on_set,
        }
    }

    pub fn get(&self, kind: HookKind) -> Option<&Hook> {
        match kind {
            HookKind::Add => self.on_add.as_ref(),
            HookKind::Remove => self.on_remove.as_ref(),
            HookKind::Set => self.on_set.as_ref(),
        }
    }
}

impl fmt::Debug for ComponentHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHooks")
            .field("on_add", &self.on_add.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .field("on_set", &self.on_set.is_some())
            .finish()
    }
}

/// Registered metadata of one component id
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    id: Entity,
    size: usize,
    name: Option<String>,
    hooks: ComponentHooks,
    observers: FxHashMap<Entity, SmallVec<[ObserverKey; 4]>>,
}

impl ComponentInfo {
    pub fn id(&self) -> Entity {
        self.id
    }

    /// Byte size of one value; 0 for tags
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_tag(&self) -> bool {
        self.size == 0
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn hooks(&self) -> &ComponentHooks {
        &self.hooks
    }
}

struct ObserverEntry {
    component: Entity,
    event: Entity,
    callback: ObserverFn,
}

/// Per-world component metadata
#[derive(Default)]
pub struct ComponentRegistry {
    infos: PagedSparseIndex<ComponentInfo>,
    by_type: FxHashMap<TypeId, Entity>,
    by_name: AHashMap<String, Entity>,
    observers: SlotMap<ObserverKey, ObserverEntry>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `size` (and optionally a name) for component `id`
    pub fn register(&mut self, id: Entity, size: usize, name: Option<&str>) -> Result<()> {
        if id.is_pair() || id.is_null() {
            return Err(EcsError::InvalidPair(format!(
                "component id {id:?} must be a plain entity"
            )));
        }
        let key = id.sparse_key()?;
        if let Some(existing) = self.infos.get(key) {
            if existing.id == id {
                return Err(EcsError::ComponentAlreadyRegistered(id));
            }
            // Earlier generation of this index; its entity is gone
            let stale = existing.id;
            self.unregister(stale);
        }
        if name.is_some_and(|name| self.by_name.contains_key(name)) {
            return Err(EcsError::ComponentAlreadyRegistered(id));
        }
        self.infos.insert(
            key,
            ComponentInfo {
                id,
                size,
                name: name.map(str::to_owned),
                hooks: ComponentHooks::default(),
                observers: FxHashMap::default(),
            },
        )?;
        if let Some(name) = name {
            self.by_name.insert(name.to_owned(), id);
        }
        Ok(())
    }

    /// Forget component `id` along with its name, type binding and observers
    pub fn unregister(&mut self, id: Entity) -> Option<ComponentInfo> {
        self.info(id)?;
        let info = self.infos.remove(id.sparse_key().ok()?)?.value;
        if let Some(name) = info.name() {
            self.by_name.remove(name);
        }
        self.by_type.retain(|_, bound| *bound != id);
        self.observers.retain(|_, entry| entry.component != id);
        Some(info)
    }

    pub fn is_registered(&self, id: Entity) -> bool {
        self.info(id).is_some()
    }

    /// Registration of exactly `id`; an entry left by another generation of
    /// the same index does not count
    pub fn info(&self, id: Entity) -> Option<&ComponentInfo> {
        self.infos
            .get(id.sparse_key().ok()?)
            .filter(|info| info.id == id)
    }

    fn info_mut(&mut self, id: Entity) -> Result<&mut ComponentInfo> {
        self.infos
            .get_mut(id.sparse_key()?)
            .filter(|info| info.id == id)
            .ok_or(EcsError::ComponentNotRegistered(id))
    }

    /// Registration a component id resolves to.
    ///
    /// A pair borrows its relation's registration; wildcard markers and pairs
    /// of unregistered relations behave as tags.
    pub fn resolve(&self, id: Entity) -> Option<&ComponentInfo> {
        match id.relation() {
            Some(_) if id.is_wildcard() => None,
            Some(relation) => self.infos.get(relation as u64),
            None => self.info(id),
        }
    }

    /// Column element size for `id`
    pub fn column_size(&self, id: Entity) -> Result<usize> {
        if id.is_pair() {
            return Ok(self.resolve(id).map_or(0, ComponentInfo::size));
        }
        self.info(id)
            .map(ComponentInfo::size)
            .ok_or(EcsError::ComponentNotRegistered(id))
    }

    pub fn set_hook(&mut self, id: Entity, kind: HookKind, hook: Hook) -> Result<()> {
        *self.info_mut(id)?.hooks.slot(kind) = Some(hook);
        Ok(())
    }

    /// Hook to run for `id`, cloned out so the caller can hand it `&mut World`
    pub fn hook(&self, id: Entity, kind: HookKind) -> Option<Hook> {
        self.resolve(id)?.hooks.get(kind).cloned()
    }

    pub fn observe(
        &mut self,
        component: Entity,
        event: Entity,
        callback: ObserverFn,
    ) -> Result<ObserverKey> {
        if !self.is_registered(component) {
            return Err(EcsError::ComponentNotRegistered(component));
        }
        let key = self.observers.insert(ObserverEntry {
            component,
            event,
            callback,
        });
        self.info_mut(component)?
            .observers
            .entry(event)
            .or_default()
            .push(key);
        Ok(key)
    }

    pub fn unobserve(&mut self, key: ObserverKey) -> bool {
        let Some(entry) = self.observers.remove(key) else {
            return false;
        };
        if let Ok(info) = self.info_mut(entry.component) {
            if let Some(list) = info.observers.get_mut(&entry.event) {
                list.retain(|registered| *registered != key);
            }
        }
        true
    }

    /// Observers of `event` on `component`, in registration order
    pub fn observers_for(&self, component: Entity, event: Entity) -> SmallVec<[ObserverFn; 4]> {
        let Some(keys) = self
            .resolve(component)
            .and_then(|info| info.observers.get(&event))
        else {
            return SmallVec::new();
        };
        keys.iter()
            .filter_map(|key| self.observers.get(*key))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn bind_type(&mut self, type_id: TypeId, id: Entity) {
        self.by_type.insert(type_id, id);
    }

    pub fn type_component(&self, type_id: TypeId) -> Option<Entity> {
        self.by_type.get(&type_id).copied()
    }

    pub fn lookup(&self, name: &str) -> Option<Entity> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.infos.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}
