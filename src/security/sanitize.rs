//! Context-aware scrubbing of untrusted text.
//!
//! No markup is allowed through in any context: angle brackets and quote
//! characters are removed and surrounding whitespace trimmed. Format checks
//! for email and URL values belong to a separate validator.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which scrubbing rules apply to a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizationContext {
    Text,
    Html,
    Email,
    Url,
}

impl fmt::Display for SanitizationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SanitizationContext::Text => "text",
            SanitizationContext::Html => "html",
            SanitizationContext::Email => "email",
            SanitizationContext::Url => "url",
        };
        f.write_str(name)
    }
}

impl FromStr for SanitizationContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(SanitizationContext::Text),
            "html" => Ok(SanitizationContext::Html),
            "email" => Ok(SanitizationContext::Email),
            "url" => Ok(SanitizationContext::Url),
            other => Err(format!("unknown sanitization context `{other}`")),
        }
    }
}

fn is_stripped(c: char) -> bool {
    matches!(c, '<' | '>' | '"' | '\'')
}

/// Scrub `input` for `context`. Idempotent.
pub fn sanitize_text(input: &str, context: SanitizationContext) -> String {
    match context {
        SanitizationContext::Text
        | SanitizationContext::Html
        | SanitizationContext::Email
        | SanitizationContext::Url => {
            let stripped: String = input.chars().filter(|c| !is_stripped(*c)).collect();
            stripped.trim().to_string()
        }
    }
}

/// Scrub the string fields named in `schema`.
///
/// Fields not in the schema, and listed fields that are not strings, are
/// copied unchanged. Nested objects are not visited; give each level its
/// own schema.
pub fn sanitize_object(
    obj: &Map<String, Value>,
    schema: &HashMap<String, SanitizationContext>,
) -> Map<String, Value> {
    obj.iter()
        .map(|(field, value)| {
            let value = match (schema.get(field), value) {
                (Some(context), Value::String(s)) => Value::String(sanitize_text(s, *context)),
                _ => value.clone(),
            };
            (field.clone(), value)
        })
        .collect()
}
