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

//! Growable byte buffer with a runtime element size
//!
//! Backing storage for every archetype column. Elements are `element_size`
//! bytes wide and packed back to back; the allocation itself is made of
//! `u64` words so typed views of up to 8-byte alignment can be taken with
//! `bytemuck` without copying.

use bytemuck::Pod;

use crate::error::{EcsError, Result};

const GROWTH_FACTOR: usize = 2;
const MIN_CAPACITY: usize = 4;
const WORD: usize = std::mem::size_of::<u64>();

/// Result of a swap-removal: the element at `from` now lives at `to`.
///
/// Every caller must forward this to whatever index points at `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub from: usize,
    pub to: usize,
}

/// Contiguous, resizable array of fixed-size byte elements
#[derive(Debug, Clone)]
pub struct GrowBuffer {
    words: Vec<u64>,
    element_size: usize,
    len: usize,
    capacity: usize,
}

impl GrowBuffer {
    /// Create an empty buffer. Does not allocate.
    pub fn new(element_size: usize) -> Self {
        Self {
            words: Vec::new(),
            element_size,
            len: 0,
            capacity: 0,
        }
    }

    /// Create a buffer with room for `capacity` elements
    pub fn with_capacity(element_size: usize, capacity: usize) -> Result<Self> {
        let mut buffer = Self::new(element_size);
        buffer.reserve(capacity)?;
        Ok(buffer)
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Make room for `additional` more elements, growing geometrically
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(EcsError::AllocationFailed(usize::MAX))?;
        if needed <= self.capacity {
            return Ok(());
        }

        let new_capacity = needed.max(self.capacity * GROWTH_FACTOR).max(MIN_CAPACITY);
        let bytes = new_capacity
            .checked_mul(self.element_size)
            .ok_or(EcsError::AllocationFailed(usize::MAX))?;
        let words = bytes.div_ceil(WORD);
        if words > self.words.len() {
            self.words
                .try_reserve_exact(words - self.words.len())
                .map_err(|_| EcsError::AllocationFailed(bytes))?;
            self.words.resize(words, 0);
        }
        self.capacity = new_capacity;
        Ok(())
    }

    /// Append one element and return the stored slot
    pub fn push(&mut self, element: &[u8]) -> Result<&mut [u8]> {
        debug_assert_eq!(element.len(), self.element_size);
        self.reserve(1)?;
        let index = self.len;
        self.len += 1;
        let slot = self.slot_mut(index);
        slot.copy_from_slice(element);
        Ok(slot)
    }

    /// Append one zero-filled element and return its index
    pub fn push_zeroed(&mut self) -> Result<usize> {
        self.reserve(1)?;
        let index = self.len;
        self.len += 1;
        self.slot_mut(index).fill(0);
        Ok(index)
    }

    /// Append every element packed in `elements`; returns the first new index
    pub fn push_batch(&mut self, elements: &[u8]) -> Result<usize> {
        let first = self.len;
        if self.element_size == 0 {
            return Ok(first);
        }
        debug_assert_eq!(elements.len() % self.element_size, 0);
        let count = elements.len() / self.element_size;
        self.reserve(count)?;
        self.len += count;
        let start = first * self.element_size;
        self.bytes_mut()[start..start + elements.len()].copy_from_slice(elements);
        Ok(first)
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        (index < self.len).then(|| self.slot(index))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        if index >= self.len {
            return None;
        }
        Some(self.slot_mut(index))
    }

    pub fn get_last(&self) -> Option<&[u8]> {
        self.len.checked_sub(1).map(|last| self.slot(last))
    }

    /// Write `element` at `index`, growing and zero-filling any gap
    pub fn set(&mut self, index: usize, element: &[u8]) -> Result<()> {
        debug_assert_eq!(element.len(), self.element_size);
        if index >= self.len {
            self.reserve(index + 1 - self.len)?;
            let gap_start = self.len * self.element_size;
            let gap_end = (index + 1) * self.element_size;
            self.len = index + 1;
            self.bytes_mut()[gap_start..gap_end].fill(0);
        }
        self.slot_mut(index).copy_from_slice(element);
        Ok(())
    }

    /// Swap-remove `index`; O(1), does not preserve order.
    ///
    /// Returns the relocation of the former last element, or `None` when the
    /// removed element was the last one (or `index` was out of range).
    pub fn remove_fast(&mut self, index: usize) -> Option<Relocation> {
        if index >= self.len {
            return None;
        }
        let last = self.len - 1;
        let size = self.element_size;
        let relocation = if index != last {
            let bytes = self.bytes_mut();
            bytes.copy_within(last * size..(last + 1) * size, index * size);
            Some(Relocation {
                from: last,
                to: index,
            })
        } else {
            None
        };
        self.len = last;
        relocation
    }

    /// Remove `index` shifting the tail left; O(n), preserves order
    pub fn remove_ordered(&mut self, index: usize) {
        if index >= self.len {
            return;
        }
        let size = self.element_size;
        let end = self.len * size;
        self.bytes_mut()
            .copy_within((index + 1) * size..end, index * size);
        self.len -= 1;
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Live elements as packed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len * self.element_size]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let end = self.len * self.element_size;
        &mut self.bytes_mut()[..end]
    }

    /// Typed view of the live elements
    pub fn as_slice<T: Pod>(&self) -> Result<&[T]> {
        self.check_type::<T>()?;
        Ok(bytemuck::try_cast_slice(self.as_bytes())?)
    }

    pub fn as_slice_mut<T: Pod>(&mut self) -> Result<&mut [T]> {
        self.check_type::<T>()?;
        Ok(bytemuck::try_cast_slice_mut(self.as_bytes_mut())?)
    }

    fn check_type<T>(&self) -> Result<()> {
        let size = std::mem::size_of::<T>();
        if size == 0 || size != self.element_size {
            return Err(EcsError::Layout(format!(
                "{} is {size} bytes, column holds {}-byte elements",
                std::any::type_name::<T>(),
                self.element_size
            )));
        }
        Ok(())
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)
    }

    fn slot(&self, index: usize) -> &[u8] {
        let start = index * self.element_size;
        &bytemuck::cast_slice::<u64, u8>(&self.words)[start..start + self.element_size]
    }

    fn slot_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.element_size;
        let size = self.element_size;
        &mut self.bytes_mut()[start..start + size]
    }
}
