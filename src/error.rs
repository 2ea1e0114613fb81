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

//! Error types

use std::collections::TryReserveError;
use std::fmt;

use crate::archetype::ArchetypeId;
use crate::entity::Entity;
use crate::query::QueryId;

/// Store error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity handle is dead or was never allocated
    EntityNotFound(Entity),

    /// Entity index space exhausted
    EntityCapacityExhausted,

    /// Component id has no registered size
    ComponentNotRegistered(Entity),

    /// Component id was registered twice
    ComponentAlreadyRegistered(Entity),

    /// Entity does not carry the component
    ComponentNotFound { entity: Entity, component: Entity },

    /// Archetype has no column for the component
    ColumnNotFound {
        archetype: ArchetypeId,
        component: Entity,
    },

    /// Byte payload does not match the registered component size
    SizeMismatch {
        component: Entity,
        expected: usize,
        actual: usize,
    },

    /// Term list longer than `MAX_TERMS`
    TooManyTerms(usize),

    /// Unknown query id
    QueryNotFound(QueryId),

    /// Relationship pair could not be encoded
    InvalidPair(String),

    /// Sparse key outside the paged index key space
    KeyOutOfRange(u64),

    /// Archetype directory has no free bucket left
    DirectoryFull,

    /// Growing a buffer or paging an index failed
    AllocationFailed(usize),

    /// Typed view over a column failed (size or alignment)
    Layout(String),

    /// Term list could not be decoded
    TermParse(String),

    /// Configuration could not be decoded
    Config(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotFound(entity) => write!(f, "Entity not found: {entity:?}"),
            EcsError::EntityCapacityExhausted => write!(f, "Entity index space exhausted"),
            EcsError::ComponentNotRegistered(id) => {
                write!(f, "Component not registered: {id:?}")
            }
            EcsError::ComponentAlreadyRegistered(id) => {
                write!(f, "Component already registered: {id:?}")
            }
            EcsError::ComponentNotFound { entity, component } => {
                write!(f, "Entity {entity:?} has no component {component:?}")
            }
            EcsError::ColumnNotFound {
                archetype,
                component,
            } => write!(f, "Archetype {archetype:?} has no column {component:?}"),
            EcsError::SizeMismatch {
                component,
                expected,
                actual,
            } => write!(
                f,
                "Size mismatch for {component:?}: expected {expected} bytes, got {actual}"
            ),
            EcsError::TooManyTerms(count) => write!(
                f,
                "Too many query terms: {count} (max {})",
                crate::query::MAX_TERMS
            ),
            EcsError::QueryNotFound(id) => write!(f, "Query not found: {id:?}"),
            EcsError::InvalidPair(msg) => write!(f, "Invalid pair: {msg}"),
            EcsError::KeyOutOfRange(key) => write!(f, "Sparse key out of range: {key:#x}"),
            EcsError::DirectoryFull => write!(
                f,
                "Archetype directory full ({} buckets)",
                crate::directory::DIRECTORY_BUCKETS
            ),
            EcsError::AllocationFailed(bytes) => {
                write!(f, "Allocation failed while reserving {bytes} bytes")
            }
            EcsError::Layout(msg) => write!(f, "Layout error: {msg}"),
            EcsError::TermParse(msg) => write!(f, "Term parse error: {msg}"),
            EcsError::Config(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

impl From<TryReserveError> for EcsError {
    fn from(_: TryReserveError) -> Self {
        // TryReserveError does not expose the requested size on stable
        EcsError::AllocationFailed(0)
    }
}

impl From<bytemuck::PodCastError> for EcsError {
    fn from(err: bytemuck::PodCastError) -> Self {
        EcsError::Layout(format!("{err:?}"))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
