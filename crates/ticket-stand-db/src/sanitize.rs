//! Field sanitizers applied before rows are written.
//!
//! Every function here is idempotent: feeding its output back in returns
//! the same value. Stripping steps run to a fixed point so that removing
//! one fragment cannot expose another.

use std::sync::OnceLock;

use regex::Regex;
use stand_schema::{Record, SqlValue};

fn blocks_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

fn octet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"%[0-9a-fA-F]{2}").expect("valid regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn handler_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]*)"#).expect("valid regex")
    })
}

fn script_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(java|vb)script\s*:").expect("valid regex"))
}

fn slug_junk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s_-]").expect("valid regex"))
}

fn dashes_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").expect("valid regex"))
}

/// Applies `step` until the text stops changing.
fn fixed_point(input: &str, step: impl Fn(&str) -> String) -> String {
    let mut current = input.to_string();
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_all_tags(input: &str) -> String {
    fixed_point(input, |s| {
        let s = blocks_regex().replace_all(s, "");
        tag_regex().replace_all(&s, "").into_owned()
    })
}

/// Plain single-line text: tags, percent-encoded octets and runs of
/// whitespace removed, ends trimmed.
#[must_use]
pub fn sanitize_text_field(input: &str) -> String {
    let stripped = fixed_point(input, |s| {
        let s = strip_all_tags(s);
        octet_regex().replace_all(&s, "").into_owned()
    });
    whitespace_regex()
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// URL slug: lowercase ASCII letters, digits, `_` and single dashes.
#[must_use]
pub fn sanitize_title(input: &str) -> String {
    let text = strip_all_tags(input).to_lowercase();
    let text = slug_junk_regex().replace_all(&text, "");
    let text = whitespace_regex().replace_all(&text, "-");
    let text = dashes_regex().replace_all(&text, "-");
    text.trim_matches('-').to_string()
}

/// Rich text that keeps markup but loses scripts, styles, inline event
/// handlers and script URLs.
#[must_use]
pub fn kses_post(input: &str) -> String {
    fixed_point(input, |s| {
        let s = blocks_regex().replace_all(s, "");
        let s = handler_regex().replace_all(&s, "");
        script_url_regex().replace_all(&s, "").into_owned()
    })
}

/// Leading numeric prefix of `text`, as accepted by a lenient parse.
fn numeric_prefix(text: &str, allow_fraction: bool) -> &str {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if allow_fraction && !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    &text[..end]
}

/// Non-negative integer. Text is read up to its first non-digit; anything
/// unreadable becomes 0.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn absint(value: &SqlValue) -> i64 {
    let n = match value {
        SqlValue::Int(n) => *n,
        SqlValue::Bool(b) => i64::from(*b),
        SqlValue::Float(f) if f.is_finite() => f.trunc() as i64,
        SqlValue::Text(s) => {
            let prefix = numeric_prefix(s, false);
            prefix.parse::<i64>().unwrap_or_else(|_| {
                // Overflowing digit runs saturate
                if prefix.len() > 1 && prefix.bytes().skip(1).all(|b| b.is_ascii_digit()) {
                    i64::MAX
                } else {
                    0
                }
            })
        }
        _ => 0,
    };
    n.checked_abs().unwrap_or(i64::MAX)
}

/// Float coercion. Text is read up to its first non-numeric character.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn to_float(value: &SqlValue) -> f64 {
    match value {
        SqlValue::Float(f) if f.is_finite() => *f,
        SqlValue::Int(n) => *n as f64,
        SqlValue::Bool(b) => f64::from(u8::from(*b)),
        SqlValue::Text(s) => numeric_prefix(s, true).parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Rewrites a text field in place when present and not NULL.
pub(crate) fn text_field(record: &mut Record, field: &str, clean: fn(&str) -> String) {
    if let Some(SqlValue::Text(text)) = record.get_mut(field) {
        *text = clean(text);
    }
}

/// Rewrites a text field only when it is non-empty.
pub(crate) fn optional_text_field(record: &mut Record, field: &str, clean: fn(&str) -> String) {
    if let Some(SqlValue::Text(text)) = record.get_mut(field) {
        if !text.is_empty() {
            *text = clean(text);
        }
    }
}

/// Coerces an id column to a non-negative integer.
pub(crate) fn id_field(record: &mut Record, field: &str) {
    if let Some(value) = record.get_mut(field) {
        if !value.is_null() {
            *value = SqlValue::Int(absint(value));
        }
    }
}

/// Coerces a money column to a float.
pub(crate) fn float_field(record: &mut Record, field: &str) {
    if let Some(value) = record.get_mut(field) {
        if !value.is_null() {
            *value = SqlValue::Float(to_float(value));
        }
    }
}
