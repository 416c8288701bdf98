//! Attribute block parsing.
//!
//! Parses the `{#id .class key="value"}` annotations authors attach to
//! headings, list items, inline spans and container directives.
//!
//! The grammar is strict: a block containing any token that is not `#id`,
//! `.class` or `key=value` is rejected as a whole and stays literal text.
//! Keys starting with `on` are dropped so annotations cannot smuggle in
//! inline event handlers.

use std::fmt::Write;

use crate::util::escape_html;

/// Parsed attribute annotation.
///
/// # Example
///
/// ```
/// use quill_markup::Attributes;
///
/// let attrs = Attributes::parse(r#"#intro .lead .wide lang="en" onclick=x"#).unwrap();
/// assert_eq!(attrs.id.as_deref(), Some("intro"));
/// assert_eq!(attrs.classes, vec!["lead", "wide"]);
/// assert_eq!(attrs.get("lang"), Some("en"));
/// assert_eq!(attrs.get("onclick"), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    /// Element id from `#id` or `id=…`; later values win.
    pub id: Option<String>,
    /// Classes from `.class` tokens, in source order.
    pub classes: Vec<String>,
    /// Remaining `key=value` pairs, in source order.
    pub pairs: Vec<(String, String)>,
}

impl Attributes {
    /// Parse the inside of an attribute block (without braces).
    ///
    /// Returns `None` if the block is empty or contains a token outside the
    /// grammar.
    #[must_use]
    pub fn parse(body: &str) -> Option<Self> {
        let mut attrs = Self::default();
        let mut rest = body.trim();
        if rest.is_empty() {
            return None;
        }

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('#') {
                let (name, tail) = take_name(after)?;
                attrs.id = Some(name.to_owned());
                rest = tail;
            } else if let Some(after) = rest.strip_prefix('.') {
                let (name, tail) = take_name(after)?;
                attrs.push_class(name);
                rest = tail;
            } else {
                let (key, value, tail) = parse_key_value(rest)?;
                attrs.set(key, value);
                rest = tail;
            }
            rest = rest.trim_start();
        }

        Some(attrs)
    }

    /// Parse text that is exactly one `{…}` block, ignoring surrounding whitespace.
    #[must_use]
    pub fn parse_braced(text: &str) -> Option<Self> {
        let inner = text.trim().strip_prefix('{')?.strip_suffix('}')?;
        if inner.contains(['{', '}']) {
            return None;
        }
        Self::parse(inner)
    }

    /// Split a recognized trailing `{…}` block off `text`.
    ///
    /// Returns the text before the block (untrimmed) and the parsed attributes.
    #[must_use]
    pub fn split_trailing(text: &str) -> Option<(&str, Self)> {
        let trimmed = text.trim_end();
        let inner = trimmed.strip_suffix('}')?;
        let open = inner.rfind('{')?;
        let attrs = Self::parse(&inner[open + 1..])?;
        Some((&text[..open], attrs))
    }

    /// Split a recognized leading `{…}` block off `text`.
    ///
    /// Returns the parsed attributes and the text after the block.
    #[must_use]
    pub fn split_leading(text: &str) -> Option<(Self, &str)> {
        let body = text.strip_prefix('{')?;
        let close = body.find('}')?;
        let inner = &body[..close];
        if inner.contains('{') {
            return None;
        }
        let attrs = Self::parse(inner)?;
        Some((attrs, &body[close + 1..]))
    }

    /// Look up a `key=value` pair.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove and return a `key=value` pair.
    pub fn take(&mut self, key: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(index).1)
    }

    /// Check whether a class is present.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Whether nothing survived parsing (e.g. only `on*` keys).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.classes.is_empty() && self.pairs.is_empty()
    }

    /// Write the attributes as HTML, prefixing `leading_classes` to the class list.
    ///
    /// Output starts with a space when non-empty, ready to follow a tag name.
    pub fn write_html(&self, leading_classes: &[&str], out: &mut String) {
        if let Some(id) = &self.id {
            write!(out, r#" id="{}""#, escape_html(id)).unwrap();
        }

        let classes: Vec<&str> = leading_classes
            .iter()
            .copied()
            .chain(self.classes.iter().map(String::as_str))
            .collect();
        if !classes.is_empty() {
            write!(out, r#" class="{}""#, escape_html(&classes.join(" "))).unwrap();
        }

        for (key, value) in &self.pairs {
            write!(out, r#" {key}="{}""#, escape_html(value)).unwrap();
        }
    }

    fn push_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_owned());
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        if is_event_handler(key) {
            return;
        }
        match key {
            "id" => self.id = Some(value.to_owned()),
            "class" => value.split_whitespace().for_each(|c| self.push_class(c)),
            _ => {
                if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| k == key) {
                    value.clone_into(&mut slot.1);
                } else {
                    self.pairs.push((key.to_owned(), value.to_owned()));
                }
            }
        }
    }
}

/// Attribute keys that would install inline script handlers.
pub(crate) fn is_event_handler(key: &str) -> bool {
    key.get(..2)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

/// Take an `#id` or `.class` name. Compact forms like `.a.b` and `#x.y` stop
/// at the next marker.
fn take_name(s: &str) -> Option<(&str, &str)> {
    let end = s
        .find(|c: char| c.is_whitespace() || c == '.' || c == '#')
        .unwrap_or(s.len());
    let name = &s[..end];
    if name.is_empty() || name.contains(['=', '"', '\'', '{', '}']) {
        return None;
    }
    Some((name, &s[end..]))
}

/// Parse `key="value"`, `key='value'` or `key=value`.
fn parse_key_value(s: &str) -> Option<(&str, &str, &str)> {
    let key_end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')))
        .unwrap_or(s.len());
    let key = &s[..key_end];
    if key.is_empty() || !key.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }

    let after_eq = s[key_end..].strip_prefix('=')?;

    for quote in ['"', '\''] {
        if let Some(quoted) = after_eq.strip_prefix(quote) {
            let close = quoted.find(quote)?;
            let tail = &quoted[close + 1..];
            if !tail.is_empty() && !tail.starts_with(char::is_whitespace) {
                return None;
            }
            return Some((key, &quoted[..close], tail));
        }
    }

    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
    let value = &after_eq[..end];
    if value.is_empty() || value.contains(['"', '\'', '=']) {
        return None;
    }
    Some((key, value, &after_eq[end..]))
}
