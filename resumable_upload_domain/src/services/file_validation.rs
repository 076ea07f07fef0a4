// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Validation (C8, validation half)
//!
//! Pure evaluation of the security gate's `validateFile` rules. The
//! infrastructure adapter reads the file's size, name, MIME, and leading
//! bytes and hands them here; this module never touches the filesystem
//! itself, so every rule is directly unit-testable.

use crate::value_objects::MimeType;

/// Built-in magic-byte signatures checked when signature validation is
/// enabled. Unknown MIME types pass this check vacuously.
pub fn known_signature(mime: &str) -> Option<&'static [u8]> {
    match mime {
        "image/jpeg" => Some(&[0xFF, 0xD8, 0xFF]),
        "image/png" => Some(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
        "image/gif" => Some(&[0x47, 0x49, 0x46, 0x38]),
        "application/pdf" => Some(&[0x25, 0x50, 0x44, 0x46]),
        _ => None,
    }
}

/// Headers treated as suspicious when `enable_virus_scan` is set, checked
/// against the first bytes of every 1 MiB streaming window.
pub fn is_suspicious_header(window: &[u8]) -> bool {
    window.starts_with(&[0x4D, 0x5A]) || window.starts_with(&[0x7F, 0x45, 0x4C, 0x46])
}

#[derive(Debug, Clone)]
pub struct FileValidationInput<'a> {
    pub size: u64,
    pub mime: &'a MimeType,
    pub extension: &'a str,
    pub leading_bytes: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct FileValidationConfig<'a> {
    pub max_file_size: u64,
    pub allowed_mime_types: &'a [String],
    pub allowed_extensions: &'a [String],
    pub validate_file_signature: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FileValidationResult {
    pub errors: Vec<String>,
}

impl FileValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Evaluates every rule and accumulates all failures rather than
/// short-circuiting on the first one, so a caller sees the complete set of
/// problems with a rejected file.
pub fn validate_file(input: &FileValidationInput, config: &FileValidationConfig) -> FileValidationResult {
    let mut errors = Vec::new();

    if input.size > config.max_file_size {
        errors.push(format!(
            "file size {} exceeds maximum of {} bytes",
            input.size, config.max_file_size
        ));
    }

    if !config.allowed_mime_types.is_empty()
        && !config.allowed_mime_types.iter().any(|p| input.mime.matches_pattern(p))
    {
        errors.push(format!("mime type {} is not allowed", input.mime));
    }

    if !config.allowed_extensions.is_empty()
        && !config
            .allowed_extensions
            .iter()
            .any(|e| e == "*" || e.eq_ignore_ascii_case(input.extension))
    {
        errors.push(format!("extension {} is not allowed", input.extension));
    }

    if config.validate_file_signature {
        if let Some(signature) = known_signature(input.mime.as_str()) {
            if !input.leading_bytes.starts_with(signature) {
                errors.push("file signature does not match declared mime type".to_string());
            }
        }
    }

    FileValidationResult { errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(allowed_mime: &[String], allowed_ext: &[String]) -> FileValidationConfig<'_> {
        FileValidationConfig {
            max_file_size: 1000,
            allowed_mime_types: allowed_mime,
            allowed_extensions: allowed_ext,
            validate_file_signature: true,
        }
    }

    #[test]
    fn accepts_file_at_exactly_the_size_limit() {
        let mime = MimeType::sanitize("application/octet-stream");
        let allowed = vec!["*/*".to_string()];
        let allowed_ext = vec!["*".to_string()];
        let config = base_config(&allowed, &allowed_ext);
        let input = FileValidationInput {
            size: 1000,
            mime: &mime,
            extension: "bin",
            leading_bytes: &[],
        };
        assert!(validate_file(&input, &config).is_valid());
    }

    #[test]
    fn rejects_file_one_byte_over_the_limit() {
        let mime = MimeType::sanitize("application/octet-stream");
        let allowed = vec!["*/*".to_string()];
        let allowed_ext = vec!["*".to_string()];
        let config = base_config(&allowed, &allowed_ext);
        let input = FileValidationInput {
            size: 1001,
            mime: &mime,
            extension: "bin",
            leading_bytes: &[],
        };
        assert!(!validate_file(&input, &config).is_valid());
    }

    #[test]
    fn accumulates_every_failing_rule() {
        let mime = MimeType::sanitize("image/png");
        let allowed = vec!["text/*".to_string()];
        let allowed_ext = vec!["txt".to_string()];
        let config = base_config(&allowed, &allowed_ext);
        let input = FileValidationInput {
            size: 2000,
            mime: &mime,
            extension: "png",
            leading_bytes: &[0, 0, 0],
        };
        let result = validate_file(&input, &config);
        assert_eq!(result.errors.len(), 4);
    }

    #[test]
    fn unknown_mime_passes_signature_check_vacuously() {
        let mime = MimeType::sanitize("application/octet-stream");
        let allowed = vec!["*/*".to_string()];
        let allowed_ext = vec!["*".to_string()];
        let config = base_config(&allowed, &allowed_ext);
        let input = FileValidationInput {
            size: 10,
            mime: &mime,
            extension: "bin",
            leading_bytes: &[1, 2, 3],
        };
        assert!(validate_file(&input, &config).is_valid());
    }

    #[test]
    fn detects_known_malware_magic_bytes() {
        assert!(is_suspicious_header(&[0x4D, 0x5A, 0x00]));
        assert!(is_suspicious_header(&[0x7F, 0x45, 0x4C, 0x46]));
        assert!(!is_suspicious_header(&[0x00, 0x01]));
    }
}
