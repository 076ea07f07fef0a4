// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Validated, lower-cased MIME type string, and the glob-style pattern
//! matching used to select a file's `FileTypeConfig`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MimeType(String);

impl MimeType {
    /// Sanitizes an untrusted MIME string per the security gate's rule:
    /// lower-cased, matching `^[A-Za-z0-9]+/[A-Za-z0-9.+-]+$`, else the
    /// generic octet-stream type.
    pub fn sanitize(raw: &str) -> Self {
        let candidate = raw.trim().to_lowercase();
        if is_well_formed(&candidate) {
            MimeType(candidate)
        } else {
            MimeType("application/octet-stream".to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Matches this MIME against a configured pattern: an exact match, or a
    /// `type/*` prefix match.
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if pattern == "*/*" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            return self.0.starts_with(prefix) && self.0.as_bytes().get(prefix.len()) == Some(&b'/');
        }
        self.0 == pattern.to_lowercase()
    }
}

fn is_well_formed(s: &str) -> bool {
    let Some((type_part, subtype_part)) = s.split_once('/') else {
        return false;
    };
    if type_part.is_empty() || subtype_part.is_empty() {
        return false;
    }
    let alnum = |c: char| c.is_ascii_alphanumeric();
    type_part.chars().all(alnum)
        && subtype_part
            .chars()
            .all(|c| alnum(c) || matches!(c, '.' | '+' | '-'))
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_octet_stream_for_malformed_input() {
        assert_eq!(MimeType::sanitize("not a mime").as_str(), "application/octet-stream");
        assert_eq!(MimeType::sanitize("").as_str(), "application/octet-stream");
    }

    #[test]
    fn accepts_well_formed_mime_and_lowercases() {
        assert_eq!(MimeType::sanitize("TEXT/CSV").as_str(), "text/csv");
    }

    #[test]
    fn prefix_pattern_matches_subtype() {
        let mime = MimeType::sanitize("image/png");
        assert!(mime.matches_pattern("image/*"));
        assert!(!mime.matches_pattern("text/*"));
        assert!(mime.matches_pattern("image/png"));
        assert!(!MimeType::sanitize("image2/png").matches_pattern("image/*"));
    }
}
