//! Header sanitization, the size-bounded headers attribute, and advisory validation.
//!
//! # Responsibilities
//! - Drop the reserved `headers` entry before headers travel anywhere
//! - Serialize headers into a single message attribute that never exceeds its budget
//! - Flag oversized or markup-looking headers without ever rejecting the request
//!
//! # Design Decisions
//! - Sanitization is an exact, case-insensitive key match; `x-headers` survives
//! - Truncated output is deliberately not valid JSON; consumers only need the marker
//! - Validation returns issues for logging and never fails

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Key removed by [`sanitize_headers`], compared after lower-casing.
pub const RESERVED_HEADER_KEY: &str = "headers";

/// Characters reserved at the end of a truncated attribute.
pub const TRUNCATION_BUDGET: usize = 20;

/// Marker appended to a truncated attribute. Shorter than [`TRUNCATION_BUDGET`],
/// so truncated output ends up one character under the cap.
pub const TRUNCATION_SUFFIX: &str = r#","_truncated":true}"#;

/// Header values above this many bytes are reported by [`validate_headers`].
pub const MAX_HEADER_VALUE_BYTES: usize = 8192;

/// Remove every entry whose lower-cased key is exactly `headers`.
pub fn sanitize_headers<V: Clone>(headers: &BTreeMap<String, V>) -> BTreeMap<String, V> {
    headers
        .iter()
        .filter(|(key, _)| !key.eq_ignore_ascii_case(RESERVED_HEADER_KEY))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Serialize sanitized headers into a message attribute bounded by `max_size` characters.
///
/// Returns `None` for an empty map. Output longer than `max_size` is cut to
/// `max_size - 20` characters and closed with [`TRUNCATION_SUFFIX`].
pub fn create_headers_attribute<V>(headers: &BTreeMap<String, V>, max_size: usize) -> Option<String>
where
    V: Clone + Serialize,
{
    if headers.is_empty() {
        return None;
    }

    let serialized = match serde_json::to_string(&sanitize_headers(headers)) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize headers attribute");
            return None;
        }
    };

    if serialized.chars().count() <= max_size {
        return Some(serialized);
    }

    let keep = max_size.saturating_sub(TRUNCATION_BUDGET);
    let mut truncated: String = serialized.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    Some(truncated)
}

/// Where a suspicious pattern was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLocation {
    Key,
    Value,
}

/// An advisory finding about one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderIssue {
    /// Value exceeds [`MAX_HEADER_VALUE_BYTES`].
    Oversized { name: String, size: usize },
    /// Key or value contains markup or a script scheme.
    Suspicious {
        name: String,
        pattern: &'static str,
        location: IssueLocation,
    },
}

impl fmt::Display for HeaderIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderIssue::Oversized { name, size } => write!(
                f,
                "header '{name}' is {size} bytes (limit {MAX_HEADER_VALUE_BYTES})"
            ),
            HeaderIssue::Suspicious {
                name,
                pattern,
                location,
            } => {
                let place = match location {
                    IssueLocation::Key => "name",
                    IssueLocation::Value => "value",
                };
                write!(f, "header '{name}' {place} contains {pattern}")
            }
        }
    }
}

/// Report oversized values and suspicious content. Never blocks ingestion.
pub fn validate_headers(headers: &BTreeMap<String, String>) -> Vec<HeaderIssue> {
    let mut issues = Vec::new();

    for (name, value) in headers {
        if value.len() > MAX_HEADER_VALUE_BYTES {
            issues.push(HeaderIssue::Oversized {
                name: name.clone(),
                size: value.len(),
            });
        }

        let locations = [
            (name.as_str(), IssueLocation::Key),
            (value.as_str(), IssueLocation::Value),
        ];
        for (text, location) in locations {
            if let Some(pattern) = suspicious_pattern(text) {
                issues.push(HeaderIssue::Suspicious {
                    name: name.clone(),
                    pattern,
                    location,
                });
            }
        }
    }

    issues
}

/// First suspicious pattern found in `text`, most specific first.
fn suspicious_pattern(text: &str) -> Option<&'static str> {
    let lowered = text.to_ascii_lowercase();
    if lowered.contains("<script") {
        Some("a script tag")
    } else if contains_html_tag(&lowered) {
        Some("an HTML tag")
    } else if lowered.contains("javascript:") {
        Some("a javascript: URI")
    } else {
        None
    }
}

/// Matches `<name ...>` or `</name>`.
fn contains_html_tag(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        if b != b'<' {
            return false;
        }
        let rest = &bytes[i + 1..];
        let name_start = match rest.first() {
            Some(b'/') => 1,
            _ => 0,
        };
        rest.get(name_start).is_some_and(u8::is_ascii_alphabetic)
            && rest[name_start..].contains(&b'>')
    })
}
