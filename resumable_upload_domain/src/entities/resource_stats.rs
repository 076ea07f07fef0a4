// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Bookkeeping record kept by the resource accountant (C9) for each live
//! resource it tracks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Chunk,
    Buffer,
    Stream,
    Worker,
    Cache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStats {
    pub resource_type: ResourceType,
    pub size: usize,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl ResourceStats {
    pub fn new(resource_type: ResourceType, size: usize, created_at: DateTime<Utc>) -> Self {
        ResourceStats {
            resource_type,
            size,
            created_at,
            metadata: HashMap::new(),
        }
    }
}
