//! Row-scoped filter templates.
//!
//! A template such as `team:{{team.id}} AND status:{{status:active}}` is
//! rendered against the host row once per session. Each `{{path}}` token is
//! replaced by the value at `path`; `{{path:default}}` falls back to the
//! literal after the first `:` when the path is missing or null.

use serde_json::Value;

const TOKEN_OPEN: &str = "{{";
const TOKEN_CLOSE: &str = "}}";

/// Render `template` against `row`. An empty template renders to an empty filter.
pub fn render(template: &str, row: &Value) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut remainder = template;

    while let Some(open_index) = remainder.find(TOKEN_OPEN) {
        rendered.push_str(&remainder[..open_index]);
        let after_open = &remainder[open_index + TOKEN_OPEN.len()..];
        let Some(close_index) = after_open.find(TOKEN_CLOSE) else {
            // unterminated token, keep verbatim
            rendered.push_str(&remainder[open_index..]);
            return rendered;
        };
        rendered.push_str(&render_token(&after_open[..close_index], row));
        remainder = &after_open[close_index + TOKEN_CLOSE.len()..];
    }

    rendered.push_str(remainder);
    rendered
}

fn render_token(token: &str, row: &Value) -> String {
    let (path, default_literal) = match token.split_once(':') {
        Some((path, default_literal)) => (path.trim(), default_literal),
        None => (token.trim(), ""),
    };

    match lookup(row, path) {
        Some(Value::Null) | None => default_literal.to_string(),
        Some(value) => format_json_value(value),
    }
}

/// Resolve a dotted path with numeric segments or `[n]` indices (`a.b`, `a.0.b`, `a[0].b`).
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut current = root;
    for segment in path.split('.') {
        let (key, indices) = split_indices(segment);
        if !key.is_empty() {
            current = match current {
                Value::Object(fields) => fields.get(key)?,
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        for index in indices {
            current = current.get(index)?;
        }
    }
    Some(current)
}

fn split_indices(segment: &str) -> (&str, Vec<usize>) {
    let Some(key_end) = segment.find('[') else {
        return (segment, Vec::new());
    };

    let indices = segment[key_end..]
        .split('[')
        .filter_map(|part| part.strip_suffix(']'))
        .filter_map(|index| index.parse::<usize>().ok())
        .collect();
    (&segment[..key_end], indices)
}

fn format_json_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
