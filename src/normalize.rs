//! Payload normalization for agent responses and stored records
//!
//! Upstream services and storage layers hand us values in inconsistent shapes:
//! structured payloads sometimes arrive as JSON-encoded strings (occasionally
//! double-encoded), and text content sometimes carries markup fragments and
//! HTML entities. Everything that enters the pipeline passes through this
//! module first so the rest of the system only ever sees canonical shapes.
//!
//! Both functions are pure, never fail, and never panic on malformed input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Envelope field that deep parsing descends through on records
///
/// Wrapper objects nest their payload under this field; other record fields
/// are taken at face value.
pub const ENVELOPE_FIELD: &str = "data";

/// Recursion ceiling for deep parsing
const MAX_PARSE_DEPTH: usize = 20;

/// Pass ceiling for the sanitizer fixpoint loop
const MAX_SANITIZE_PASSES: usize = 20;

fn markup_tag_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"<[^>]*>").expect("Valid markup tag regex")
    });
    &PATTERN
}

/// Recursively normalize a value that may contain JSON-encoded strings
///
/// Strings are decoded as JSON where possible and the decoded value is
/// normalized in turn, which unwraps double-serialized payloads. Arrays are
/// normalized element-wise. Records are passed through untouched except for
/// their [`ENVELOPE_FIELD`], which is normalized recursively. Strings that do
/// not decode are returned unchanged, so the function is total.
///
/// Idempotent for any input within the depth ceiling.
pub fn deep_parse(value: Value) -> Value {
    deep_parse_at(value, 0)
}

fn deep_parse_at(value: Value, depth: usize) -> Value {
    if depth >= MAX_PARSE_DEPTH {
        return value;
    }

    match value {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(decoded) => deep_parse_at(decoded, depth + 1),
            Err(_) => Value::String(s),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| deep_parse_at(item, depth + 1))
                .collect(),
        ),
        Value::Object(mut map) => {
            if let Some(data) = map.get_mut(ENVELOPE_FIELD) {
                let taken = std::mem::take(data);
                *data = deep_parse_at(taken, depth + 1);
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// One strip-then-decode pass
///
/// Order matters: tags are removed before entities are decoded, and `&amp;`
/// decodes last so a double-encoded entity unwraps exactly one level per pass.
fn strip_and_decode(input: &str) -> String {
    let stripped = markup_tag_pattern().replace_all(input, "");
    stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Reduce text to canonical plain form: no markup tags, entities decoded
///
/// Runs strip-and-decode passes until the text stops changing, so entity
/// encodings that reveal new tag syntax are fully resolved and the function is
/// idempotent. Text that is already canonical comes back unchanged.
pub fn sanitize_to_canonical_text(input: &str) -> String {
    let mut current = strip_and_decode(input);
    for _ in 1..MAX_SANITIZE_PASSES {
        let next = strip_and_decode(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}
