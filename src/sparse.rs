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

//! Paged sparse set
//!
//! Maps a key to a slot in a dense array through a fixed four-level page
//! tree: three 1024-way node levels and a 256-slot leaf page, for 38 usable
//! key bits. Pages are allocated the first time a key in their range is
//! touched, so sparse key spaces cost memory only where they are used.

use crate::error::{EcsError, Result};

const NODE_BITS: u32 = 10;
const LEAF_BITS: u32 = 8;
const NODE_FANOUT: usize = 1 << NODE_BITS;
const LEAF_SIZE: usize = 1 << LEAF_BITS;
const NODE_MASK: u64 = (NODE_FANOUT - 1) as u64;
const LEAF_MASK: u64 = (LEAF_SIZE - 1) as u64;

/// Number of usable key bits
pub const KEY_BITS: u32 = NODE_BITS * 3 + LEAF_BITS;

/// Leaf slot sentinel
const ABSENT: u32 = u32::MAX;

type Leaf = Box<[u32]>;
type Node<T> = Box<[Option<T>]>;
type Inner = Node<Leaf>;
type Middle = Node<Inner>;
type Root = Node<Middle>;

/// Outcome of [`PagedSparseIndex::remove`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseRemoval<T> {
    pub value: T,
    /// Key whose dense entry was moved into the vacated slot
    pub relocated: Option<u64>,
}

/// Sparse-to-dense map over a paged key space
#[derive(Debug)]
pub struct PagedSparseIndex<T> {
    root: Option<Root>,
    dense: Vec<T>,
    keys: Vec<u64>,
    pages: usize,
}

impl<T> PagedSparseIndex<T> {
    /// Create an empty index. Nothing is allocated until the first insert.
    pub fn new() -> Self {
        Self {
            root: None,
            dense: Vec::new(),
            keys: Vec::new(),
            pages: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Number of leaf pages allocated so far
    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Leaf page for `key`, allocating every missing level on the way down
    pub fn get_page(&mut self, key: u64) -> Result<&mut [u32]> {
        Self::page_in(&mut self.root, &mut self.pages, key)
    }

    fn page_in<'a>(
        root: &'a mut Option<Root>,
        pages: &mut usize,
        key: u64,
    ) -> Result<&'a mut [u32]> {
        let [a, b, c, _] = split(key)?;
        let root = fill(root, alloc_node)?;
        let middle = fill(&mut root[a], alloc_node)?;
        let inner = fill(&mut middle[b], alloc_node)?;
        if inner[c].is_none() {
            *pages += 1;
        }
        let leaf = fill(&mut inner[c], alloc_leaf)?;
        Ok(&mut leaf[..])
    }

    fn slot(&self, key: u64) -> Option<u32> {
        let [a, b, c, d] = split(key).ok()?;
        let leaf = self.root.as_ref()?[a].as_ref()?[b].as_ref()?[c].as_ref()?;
        let slot = leaf[d];
        (slot != ABSENT).then_some(slot)
    }

    fn slot_mut(&mut self, key: u64) -> Option<&mut u32> {
        let [a, b, c, d] = split(key).ok()?;
        let leaf = self.root.as_mut()?[a].as_mut()?[b].as_mut()?[c].as_mut()?;
        Some(&mut leaf[d])
    }

    /// Insert or overwrite the value for `key`; returns the previous value
    pub fn insert(&mut self, key: u64, value: T) -> Result<Option<T>> {
        let leaf = Self::page_in(&mut self.root, &mut self.pages, key)?;
        let offset = (key & LEAF_MASK) as usize;
        let slot = leaf[offset];
        if slot != ABSENT {
            let previous = std::mem::replace(&mut self.dense[slot as usize], value);
            return Ok(Some(previous));
        }

        let index = u32::try_from(self.dense.len())
            .ok()
            .filter(|&index| index != ABSENT)
            .ok_or(EcsError::KeyOutOfRange(key))?;
        self.dense.try_reserve(1)?;
        self.keys.try_reserve(1)?;
        self.dense.push(value);
        self.keys.push(key);
        leaf[offset] = index;
        Ok(None)
    }

    pub fn get(&self, key: u64) -> Option<&T> {
        self.slot(key).map(|slot| &self.dense[slot as usize])
    }

    pub fn get_mut(&mut self, key: u64) -> Option<&mut T> {
        let slot = self.slot(key)?;
        self.dense.get_mut(slot as usize)
    }

    /// Value for `key`, inserting `make()` first if absent
    pub fn get_or_insert_with<F>(&mut self, key: u64, make: F) -> Result<&mut T>
    where
        F: FnOnce() -> T,
    {
        let slot = match self.slot(key) {
            Some(slot) => slot as usize,
            None => {
                self.insert(key, make())?;
                self.dense.len() - 1
            }
        };
        Ok(&mut self.dense[slot])
    }

    pub fn exists(&self, key: u64) -> bool {
        self.slot(key).is_some()
    }

    /// Swap-remove the entry for `key`.
    ///
    /// The last dense entry moves into the vacated slot and its sparse slot
    /// is patched; the moved key is reported back.
    pub fn remove(&mut self, key: u64) -> Option<SparseRemoval<T>> {
        let slot = self.slot(key)? as usize;
        if let Some(sparse) = self.slot_mut(key) {
            *sparse = ABSENT;
        }

        let value = self.dense.swap_remove(slot);
        self.keys.swap_remove(slot);

        let relocated = self.keys.get(slot).copied();
        if let Some(moved) = relocated {
            if let Some(sparse) = self.slot_mut(moved) {
                *sparse = slot as u32;
            }
        }
        Some(SparseRemoval { value, relocated })
    }

    /// Dense `(key, value)` pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> {
        self.keys.iter().copied().zip(self.dense.iter())
    }

    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    pub fn values(&self) -> &[T] {
        &self.dense
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.dense
    }

    /// Drop every entry; allocated pages are released too
    pub fn clear(&mut self) {
        self.root = None;
        self.dense.clear();
        self.keys.clear();
        self.pages = 0;
    }
}

impl<T> Default for PagedSparseIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn split(key: u64) -> Result<[usize; 4]> {
    if key >> KEY_BITS != 0 {
        return Err(EcsError::KeyOutOfRange(key));
    }
    let leaf = key & LEAF_MASK;
    let c = (key >> LEAF_BITS) & NODE_MASK;
    let b = (key >> (LEAF_BITS + NODE_BITS)) & NODE_MASK;
    let a = (key >> (LEAF_BITS + NODE_BITS * 2)) & NODE_MASK;
    Ok([a as usize, b as usize, c as usize, leaf as usize])
}

fn fill<T>(slot: &mut Option<T>, make: fn() -> Result<T>) -> Result<&mut T> {
    if slot.is_none() {
        *slot = Some(make()?);
    }
    slot.as_mut().ok_or(EcsError::AllocationFailed(0))
}

fn alloc_node<T>() -> Result<Node<T>> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(NODE_FANOUT)
        .map_err(|_| {
            EcsError::AllocationFailed(NODE_FANOUT * std::mem::size_of::<Option<T>>())
        })?;
    slots.resize_with(NODE_FANOUT, || None);
    Ok(slots.into_boxed_slice())
}

fn alloc_leaf() -> Result<Leaf> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(LEAF_SIZE)
        .map_err(|_| EcsError::AllocationFailed(LEAF_SIZE * std::mem::size_of::<u32>()))?;
    slots.resize(LEAF_SIZE, ABSENT);
    Ok(slots.into_boxed_slice())
}
