//! Tolerant extraction of one JSON object from free-text model output.
//!
//! Completions routinely arrive wrapped in prose or markdown fences. Rather
//! than parse the whole document, we scan for the first balanced top-level
//! `{...}` (string- and escape-aware) and hand that substring to serde.
//! Extraction failure and decode failure are treated identically by callers.

use serde::de::DeserializeOwned;

/// Locate the first balanced top-level `{...}` substring, if any.
pub fn first_json_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = None;

    for (index, ch) in text.char_indices() {
        if start.is_none() {
            if ch == '{' {
                start = Some(index);
                depth = 1;
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|begin| &text[begin..=index]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Extract and decode the first balanced object in one step.
pub fn parse_first_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    first_json_object(text).and_then(|raw| serde_json::from_str(raw).ok())
}
