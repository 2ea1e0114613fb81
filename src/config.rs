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

//! World construction settings

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, Result};

/// Initial capacities for a [`World`](crate::World)
///
/// All values are hints; every structure still grows on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Entity slots reserved up front
    pub entity_capacity: usize,
    /// Archetype arena slots reserved up front
    pub archetype_capacity: usize,
    /// Rows reserved in every newly created archetype
    pub column_capacity: usize,
    /// Registered query slots reserved up front
    pub query_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1024,
            archetype_capacity: 64,
            column_capacity: 16,
            query_capacity: 32,
        }
    }
}

impl WorldConfig {
    /// Parse a JSON object; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| EcsError::Config(err.to_string()))
    }
}
