// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sanitizer (C2)
//!
//! Normalizes untrusted strings before they leave this process: cell
//! content, CSV fields, filenames, and free-form JSON. Pure, synchronous,
//! no I/O -- a textbook domain service.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn control_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("static pattern"))
}

/// One entry in a cell-sanitation allow-list: a tag name plus the
/// attributes permitted on it. A tag not named here is stripped entirely;
/// an attribute not named on an allowed tag is dropped from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedTag {
    pub name: String,
    pub attributes: Vec<String>,
}

impl AllowedTag {
    pub fn new(name: impl Into<String>, attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Tunables for [`DefaultSanitizer`]: which HTML tags/attributes survive
/// `sanitize_cell`, and an optional cap on sanitized cell length. Empty
/// `allowed_tags` and `max_cell_length = None` reproduce the engine's
/// original strip-everything, no-truncation behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    pub allowed_tags: Vec<AllowedTag>,
    pub max_cell_length: Option<usize>,
}

pub trait Sanitizer: Send + Sync {
    fn sanitize_cell(&self, raw: &str) -> String;
    fn sanitize_csv_field(&self, raw: &str) -> String;
    fn sanitize_filename(&self, raw: &str) -> String;
    fn sanitize_json(&self, raw: &str) -> Result<String, ()>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultSanitizer {
    config: SanitizerConfig,
}

impl DefaultSanitizer {
    pub fn new(config: SanitizerConfig) -> Self {
        Self { config }
    }

    /// Strips (or allow-list-preserves) HTML tags, trims, normalizes line
    /// endings to `\n`, removes C0 control characters other than
    /// tab/newline, and truncates to `max_cell_length` if configured.
    fn normalize_cell(&self, raw: &str) -> String {
        let no_html = strip_html(raw, &self.config.allowed_tags);
        let normalized_newlines = no_html.replace("\r\n", "\n").replace('\r', "\n");
        let cleaned = control_chars().replace_all(normalized_newlines.trim(), "").into_owned();
        match self.config.max_cell_length {
            Some(max) if cleaned.chars().count() > max => cleaned.chars().take(max).collect(),
            _ => cleaned,
        }
    }
}

/// Removes every tag not named in `allowed_tags`; tags that are named keep
/// only the attributes listed for them. Text outside of tag markers is
/// always preserved.
fn strip_html(raw: &str, allowed_tags: &[AllowedTag]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    loop {
        match chars.next() {
            None => break,
            Some('<') => {
                let mut tag_content = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '>' {
                        closed = true;
                        break;
                    }
                    tag_content.push(c);
                }
                if !closed {
                    break;
                }
                if let Some(rendered) = render_allowed_tag(&tag_content, allowed_tags) {
                    out.push_str(&rendered);
                }
            }
            Some(c) => out.push(c),
        }
    }
    out
}

/// Re-renders one tag body (the text between `<` and `>`, exclusive) if its
/// name is on the allow-list, keeping only its allowed attributes; returns
/// `None` to drop the tag entirely.
fn render_allowed_tag(tag_content: &str, allowed_tags: &[AllowedTag]) -> Option<String> {
    let trimmed = tag_content.trim();
    let is_closing = trimmed.starts_with('/');
    let body = trimmed.trim_start_matches('/').trim_end_matches('/').trim();
    let mut parts = body.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    if name.is_empty() {
        return None;
    }
    let allowed = allowed_tags.iter().find(|t| t.name.eq_ignore_ascii_case(name))?;

    if is_closing {
        return Some(format!("</{}>", allowed.name));
    }

    let attrs_str = parts.next().unwrap_or("");
    let kept: Vec<String> = parse_attributes(attrs_str)
        .into_iter()
        .filter(|(attr_name, _)| allowed.attributes.iter().any(|a| a.eq_ignore_ascii_case(attr_name)))
        .map(|(attr_name, value)| match value {
            Some(v) => format!(r#"{attr_name}="{v}""#),
            None => attr_name,
        })
        .collect();

    if kept.is_empty() {
        Some(format!("<{}>", allowed.name))
    } else {
        Some(format!("<{} {}>", allowed.name, kept.join(" ")))
    }
}

/// Minimal `name="value"` / `name='value'` / bare-`name` attribute parser,
/// sufficient for the allow-list filtering above -- not a full HTML parser.
fn parse_attributes(s: &str) -> Vec<(String, Option<String>)> {
    let mut attrs = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        let name_end = rest.find(|c: char| c == '=' || c.is_whitespace()).unwrap_or(rest.len());
        let name = rest[..name_end].trim();
        if name.is_empty() {
            break;
        }
        rest = rest[name_end..].trim_start();

        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            if let Some(quote) = after_eq.chars().next().filter(|c| *c == '"' || *c == '\'') {
                if let Some(end) = after_eq[quote.len_utf8()..].find(quote) {
                    let value_end = quote.len_utf8() + end;
                    let value = &after_eq[quote.len_utf8()..value_end];
                    attrs.push((name.to_string(), Some(value.to_string())));
                    rest = after_eq[value_end + quote.len_utf8()..].trim_start();
                    continue;
                }
            }
            let value_end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
            attrs.push((name.to_string(), Some(after_eq[..value_end].to_string())));
            rest = after_eq[value_end..].trim_start();
        } else {
            attrs.push((name.to_string(), None));
        }
    }
    attrs
}

impl Sanitizer for DefaultSanitizer {
    fn sanitize_cell(&self, raw: &str) -> String {
        self.normalize_cell(raw)
    }

    /// After cell sanitation, neutralizes spreadsheet-formula injection and
    /// quotes fields that contain a comma, quote, or newline.
    fn sanitize_csv_field(&self, raw: &str) -> String {
        let cell = self.normalize_cell(raw);
        let neutralized = if cell.starts_with(['=', '+', '-', '@']) {
            format!("'{cell}")
        } else {
            cell
        };
        if neutralized.contains(',') || neutralized.contains('"') || neutralized.contains('\n') {
            format!("\"{}\"", neutralized.replace('"', "\"\""))
        } else {
            neutralized
        }
    }

    /// Strips any directory prefix, drops C0/DEL characters, replaces
    /// reserved filesystem characters with `_`, and caps the result at 255
    /// characters while keeping the extension intact.
    fn sanitize_filename(&self, raw: &str) -> String {
        let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
        let no_control: String = base.chars().filter(|c| !c.is_control()).collect();
        let replaced: String = no_control
            .chars()
            .map(|c| if "<>:\"/\\|?*".contains(c) { '_' } else { c })
            .collect();

        if replaced.len() <= 255 {
            return replaced;
        }
        match replaced.rfind('.') {
            Some(dot) if dot > 0 => {
                let ext = &replaced[dot..];
                let keep = 255 - ext.len();
                format!("{}{}", &replaced[..keep.min(dot)], ext)
            }
            _ => replaced.chars().take(255).collect(),
        }
    }

    fn sanitize_json(&self, raw: &str) -> Result<String, ()> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|_| ())?;
        let sanitized = sanitize_json_value(value, self);
        serde_json::to_string(&sanitized).map_err(|_| ())
    }
}

fn sanitize_json_value(value: serde_json::Value, sanitizer: &DefaultSanitizer) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::String(s) => Value::String(sanitizer.sanitize_cell(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| sanitize_json_value(v, sanitizer)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (sanitizer.sanitize_cell(&k), sanitize_json_value(v, sanitizer)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_html_and_trims_whitespace() {
        let s = DefaultSanitizer::default();
        assert_eq!(s.sanitize_cell("  <b>hi</b>  "), "hi");
    }

    #[test]
    fn allow_listed_tag_and_attribute_survive() {
        let s = DefaultSanitizer::new(SanitizerConfig {
            allowed_tags: vec![AllowedTag::new("a", ["href"])],
            max_cell_length: None,
        });
        assert_eq!(
            s.sanitize_cell(r#"<a href="https://example.com" onclick="evil()">link</a>"#),
            r#"<a href="https://example.com">link</a>"#
        );
    }

    #[test]
    fn tag_not_on_allow_list_is_still_stripped() {
        let s = DefaultSanitizer::new(SanitizerConfig {
            allowed_tags: vec![AllowedTag::new("b", Vec::<String>::new())],
            max_cell_length: None,
        });
        assert_eq!(s.sanitize_cell("<script>alert(1)</script>text"), "alert(1)text");
    }

    #[test]
    fn max_cell_length_truncates() {
        let s = DefaultSanitizer::new(SanitizerConfig {
            allowed_tags: Vec::new(),
            max_cell_length: Some(5),
        });
        assert_eq!(s.sanitize_cell("abcdefgh"), "abcde");
    }

    #[test]
    fn neutralizes_formula_injection_prefixes() {
        let s = DefaultSanitizer::default();
        assert_eq!(s.sanitize_csv_field("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(s.sanitize_csv_field("+1"), "'+1");
        assert_eq!(s.sanitize_csv_field("plain"), "plain");
    }

    #[test]
    fn quotes_fields_containing_delimiters() {
        let s = DefaultSanitizer::default();
        assert_eq!(s.sanitize_csv_field("a,b"), "\"a,b\"");
        assert_eq!(s.sanitize_csv_field("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn sanitizes_path_traversal_and_reserved_characters_in_filenames() {
        let s = DefaultSanitizer::default();
        assert_eq!(s.sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(s.sanitize_filename("a:b*c?.txt"), "a_b_c_.txt");
    }

    #[test]
    fn truncates_long_filenames_preserving_extension() {
        let s = DefaultSanitizer::default();
        let long_name = format!("{}.txt", "a".repeat(300));
        let sanitized = s.sanitize_filename(&long_name);
        assert!(sanitized.len() <= 255);
        assert!(sanitized.ends_with(".txt"));
    }

    #[test]
    fn sanitizes_nested_json_strings() {
        let s = DefaultSanitizer::default();
        let out = s.sanitize_json(r#"{"a": "<b>x</b>"}"#).unwrap();
        assert!(out.contains("\"x\""));
    }

    #[test]
    fn invalid_json_is_rejected() {
        let s = DefaultSanitizer::default();
        assert!(s.sanitize_json("not json").is_err());
    }
}
