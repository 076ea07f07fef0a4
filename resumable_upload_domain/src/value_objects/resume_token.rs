// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Opaque token minted by the state store at `initializeState` time, sent
//! back to the server with every chunk so it can correlate a resumed upload
//! session with prior partial state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken(Uuid);

impl ResumeToken {
    pub fn new() -> Self {
        ResumeToken(Uuid::new_v4())
    }
}

impl Default for ResumeToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
