// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Access Token
//!
//! Security-gate (C8) token format: `"{userId}:{uuid}:{epochMs}"`. The
//! struct only knows how to format and parse this layout and to check
//! expiration against a caller-supplied "now"; the active-token set and the
//! per-user cap are infrastructure (Security Gate) concerns.

use crate::UploadError;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    user_id: String,
    nonce: Uuid,
    issued_at_ms: i64,
}

impl AccessToken {
    pub fn issue(user_id: impl Into<String>, issued_at_ms: i64) -> Self {
        AccessToken {
            user_id: user_id.into(),
            nonce: Uuid::new_v4(),
            issued_at_ms,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn issued_at_ms(&self) -> i64 {
        self.issued_at_ms
    }

    pub fn is_expired(&self, now_ms: i64, expiration_ms: i64) -> bool {
        now_ms.saturating_sub(self.issued_at_ms) >= expiration_ms
    }

    pub fn parse(raw: &str) -> Result<Self, UploadError> {
        let mut parts = raw.splitn(3, ':');
        let user_id = parts
            .next()
            .ok_or_else(|| UploadError::validation("malformed access token"))?;
        let nonce = parts
            .next()
            .ok_or_else(|| UploadError::validation("malformed access token"))?;
        let issued_at_ms = parts
            .next()
            .ok_or_else(|| UploadError::validation("malformed access token"))?;

        let nonce = Uuid::parse_str(nonce).map_err(|e| UploadError::validation(format!("bad token nonce: {e}")))?;
        let issued_at_ms: i64 = issued_at_ms
            .parse()
            .map_err(|_| UploadError::validation("bad token timestamp"))?;

        Ok(AccessToken {
            user_id: user_id.to_string(),
            nonce,
            issued_at_ms,
        })
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.user_id, self.nonce, self.issued_at_ms)
    }
}
