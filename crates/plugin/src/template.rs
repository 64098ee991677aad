//! Statement templating
//!
//! Every SQL string the plugin sends to the server is produced here: a
//! template is decoded, split on `;` into individual statements, and each
//! statement has its `{{key}}` placeholders replaced with runtime values.
//!
//! Substitution is literal. Values are **not** escaped, so anything fed in
//! must already be free of statement-breaking characters; the credential
//! producer guarantees this for generated usernames and passwords.
//!
//! Unknown placeholders are left in place verbatim. A malformed statement
//! surfaces later as an execution error, never as a templating error.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Separator between statements inside one template
pub const STATEMENT_SEPARATOR: char = ';';

/// Named values substituted into a template.
///
/// Keys are matched against `{{key}}` markers. Later entries with the same
/// key win.
#[derive(Clone, Default)]
pub struct Placeholders<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Placeholders<'a> {
    /// Empty set
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Add a `key → value` pair
    pub fn with(mut self, key: &'a str, value: &'a str) -> Self {
        self.pairs.push((key, value));
        self
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

// Values are frequently passwords.
impl std::fmt::Debug for Placeholders<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.pairs.iter().map(|(k, _)| k))
            .finish()
    }
}

/// Substitute `{{key}}` markers in a single pass.
///
/// Substituted values are never rescanned, so a value that itself contains
/// `{{...}}` is inserted as-is.
pub fn render(statement: &str, values: &Placeholders<'_>) -> String {
    let mut out = String::with_capacity(statement.len());
    let mut rest = statement;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after_open[..close];
        match values.get(key.trim()) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(key);
                out.push_str("}}");
            }
        }
        rest = &after_open[close + 2..];
    }

    out.push_str(rest);
    out
}

/// Split a template into trimmed, non-empty statements.
pub fn split_statements(template: &str) -> Vec<&str> {
    template
        .split(STATEMENT_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Decode, split and render one template.
pub fn render_statements(template: &str, values: &Placeholders<'_>) -> Vec<String> {
    match decode_template(template) {
        Decoded::List(items) => items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(|item| render(item, values))
            .collect(),
        Decoded::Text(text) => split_statements(&text)
            .into_iter()
            .map(|statement| render(statement, values))
            .collect(),
    }
}

/// Render every template of a statement list, preserving order.
pub fn render_all<S: AsRef<str>>(templates: &[S], values: &Placeholders<'_>) -> Vec<String> {
    templates
        .iter()
        .flat_map(|template| render_statements(template.as_ref(), values))
        .collect()
}

enum Decoded<'t> {
    List(Vec<String>),
    Text(Cow<'t, str>),
}

/// Templates may arrive as a JSON array of statements, or base64-encoded.
fn decode_template(template: &str) -> Decoded<'_> {
    let trimmed = template.trim();

    if let Some(list) = parse_json_list(trimmed) {
        return Decoded::List(list);
    }

    if let Some(decoded) = decode_base64(trimmed) {
        if let Some(list) = parse_json_list(decoded.trim()) {
            return Decoded::List(list);
        }
        return Decoded::Text(Cow::Owned(decoded));
    }

    Decoded::Text(Cow::Borrowed(template))
}

fn parse_json_list(input: &str) -> Option<Vec<String>> {
    if !(input.starts_with('[') && input.ends_with(']')) {
        return None;
    }
    serde_json::from_str::<Vec<String>>(input).ok()
}

fn decode_base64(input: &str) -> Option<String> {
    if input.is_empty() || input.len() % 4 != 0 {
        return None;
    }
    let bytes = STANDARD.decode(input).ok()?;
    String::from_utf8(bytes).ok()
}
