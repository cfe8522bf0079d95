//! Macro table and `%{...}` expansion.
//!
//! Supported forms:
//! - `%{name}` and `%name` - value of `name`; left verbatim when undefined
//! - `%{?name}` - value of `name`, empty when undefined
//! - `%{?name:text}` - `text` when `name` is defined, empty otherwise
//! - `%{!?name:text}` - `text` when `name` is undefined, empty otherwise
//! - `%%` - a literal `%`
//!
//! Values are stored unexpanded and expanded on use, so a macro may refer to
//! macros defined after it.

use log::warn;
use std::collections::BTreeMap;

/// Expansion stops after this many nested substitutions.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroTable {
    values: BTreeMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Raw, unexpanded value.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Fully expanded value of a macro.
    pub fn get(&self, name: &str) -> Option<String> {
        self.raw(name).map(|value| self.expand(value))
    }

    /// Parse a `%define name value` / `%global name value` body (`name value`).
    pub fn define_from_line(&mut self, body: &str) -> bool {
        let body = body.trim();
        let Some((name, value)) = body.split_once(char::is_whitespace) else {
            return false;
        };
        if !is_identifier(name) {
            return false;
        }
        self.define(name, value.trim());
        true
    }

    pub fn expand(&self, text: &str) -> String {
        self.expand_depth(text, 0)
    }

    fn expand_depth(&self, text: &str, depth: usize) -> String {
        if depth >= MAX_DEPTH {
            warn!("Macro expansion too deep, stopping at: {}", text);
            return text.to_string();
        }
        if !text.contains('%') {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(stripped) = after.strip_prefix('%') {
                out.push('%');
                rest = stripped;
            } else if let Some(braced) = after.strip_prefix('{') {
                match find_closing_brace(braced) {
                    Some(end) => {
                        let body = &braced[..end];
                        out.push_str(&self.expand_braced(body, depth));
                        rest = &braced[end + 1..];
                    }
                    None => {
                        out.push('%');
                        rest = after;
                    }
                }
            } else {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                let name = &after[..end];
                match self.raw(name) {
                    Some(value) if is_identifier(name) => {
                        out.push_str(&self.expand_depth(value, depth + 1));
                    }
                    _ => {
                        out.push('%');
                        out.push_str(name);
                    }
                }
                rest = &after[end..];
            }
        }
        out.push_str(rest);
        out
    }

    fn expand_braced(&self, body: &str, depth: usize) -> String {
        let (negate, conditional, body) = if let Some(b) = body.strip_prefix("!?") {
            (true, true, b)
        } else if let Some(b) = body.strip_prefix('?') {
            (false, true, b)
        } else {
            (false, false, body)
        };

        let (name, alternative) = match body.split_once(':') {
            Some((name, alt)) => (name, Some(alt)),
            None => (body, None),
        };
        let defined = self.is_defined(name);

        if conditional {
            return match (alternative, defined != negate) {
                (Some(alt), true) => self.expand_depth(alt, depth + 1),
                (None, true) if !negate => self.expand_depth(self.raw(name).unwrap_or(""), depth + 1),
                _ => String::new(),
            };
        }

        match self.raw(name) {
            Some(value) => self.expand_depth(value, depth + 1),
            None => {
                warn!("Undefined macro %{{{}}} left unexpanded", name);
                format!("%{{{}}}", body)
            }
        }
    }
}

fn find_closing_brace(s: &str) -> Option<usize> {
    let mut level = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => level += 1,
            '}' if level == 0 => return Some(i),
            '}' => level -= 1,
            _ => {}
        }
    }
    None
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
