//! Reading and patching the `---` metadata block at the top of an MDX file.

use std::borrow::Cow;

use serde_json::Value;

use crate::models::Frontmatter;

/// Byte offsets of the metadata block: `(block_start, block_end, body_start)`.
/// The block excludes both `---` delimiter lines.
fn block_bounds(content: &str) -> Option<(usize, usize, usize)> {
    let start = if content.starts_with("---\n") {
        4
    } else if content.starts_with("---\r\n") {
        5
    } else {
        return None;
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some((start, offset, offset + line.len()));
        }
        offset += line.len();
    }
    None
}

/// A top-level `key: value` line of the block. Indented (nested) lines and
/// comments are not fields.
struct Field<'a> {
    key: &'a str,
    value: &'a str,
}

fn parse_field(line: &str) -> Option<Field<'_>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.starts_with(char::is_whitespace) || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some(Field { key, value: value.trim() })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn is_true(value: &str) -> bool {
    unquote(value).eq_ignore_ascii_case("true")
}

fn to_value(raw: &str) -> Value {
    if raw.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Value>(&raw.replace('\'', "\"")) {
            return list;
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(unquote(raw).to_string()),
    }
}

/// Parses the leading metadata block into a map. Content without a block
/// yields an empty map.
pub fn parse_frontmatter(content: &str) -> Frontmatter {
    let mut fields = Frontmatter::new();
    if let Some((start, end, _)) = block_bounds(content) {
        for line in content[start..end].lines() {
            if let Some(field) = parse_field(line) {
                fields.insert(field.key.to_string(), to_value(field.value));
            }
        }
    }
    fields
}

/// The MDX body with the metadata block and the blank lines after it removed.
pub fn strip_frontmatter(content: &str) -> &str {
    match block_bounds(content) {
        Some((_, _, body_start)) => content[body_start..].trim_start_matches(['\r', '\n']),
        None => content,
    }
}

/// Rewrites the first top-level `draft` field holding `true` to `draft: false`.
///
/// Every other byte of the document is kept. Returns the input unchanged when
/// there is no block or the flag is not set, so applying it twice is the same
/// as applying it once.
pub fn mark_published(content: &str) -> Cow<'_, str> {
    let Some((start, end, _)) = block_bounds(content) else {
        return Cow::Borrowed(content);
    };

    let mut offset = start;
    for line in content[start..end].split_inclusive('\n') {
        if let Some(field) = parse_field(line) {
            if field.key == "draft" && is_true(field.value) {
                let ending = &line[line.trim_end_matches(['\r', '\n']).len()..];
                let mut updated = String::with_capacity(content.len() + 1);
                updated.push_str(&content[..offset]);
                updated.push_str("draft: false");
                updated.push_str(ending);
                updated.push_str(&content[offset + line.len()..]);
                return Cow::Owned(updated);
            }
        }
        offset += line.len();
    }

    Cow::Borrowed(content)
}
