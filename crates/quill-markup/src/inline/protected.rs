//! Protected-region splitting for text-level inline passes.
//!
//! Fenced code, inline code, math, link destinations and raw HTML tags must
//! never be rewritten by text passes. A single priority-ordered alternation finds those regions;
//! everything between them goes through the transform.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Regions copied verbatim, in priority order.
static PROTECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?ms:^[ \t]*```.*?(?:^[ \t]*```[ \t]*$|\z))",
        r"|(?ms:^[ \t]*~~~.*?(?:^[ \t]*~~~[ \t]*$|\z))",
        r"|``[^\n]+?``",
        r"|`[^`\n]+`",
        r"|(?s:\$\$.+?\$\$)",
        r"|\$[^$\n]+\$",
        r"|\]\([^)\n]*\)",
        r"|(?m:^[ \t]{0,3}\[[^\]\n]+\]:[ \t]*\S+)",
        r"|<[A-Za-z/!][^>\n]*>",
    ))
    .expect("invalid protected region regex")
});

static SUBSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~([^\s~{}^]+)~").expect("invalid subscript regex"));

static SUPERSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\^([^\s^{}~]+)\^").expect("invalid superscript regex"));

/// Apply `transform` to every segment of `text` outside protected regions.
///
/// Protected regions are copied unchanged and never passed to `transform`;
/// segments are concatenated back in their original order.
///
/// # Example
///
/// ```
/// use quill_markup::split_protected;
///
/// let out = split_protected("a `b` c", |s| s.to_uppercase().into());
/// assert_eq!(out, "A `b` C");
/// ```
pub fn split_protected<F>(text: &str, mut transform: F) -> String
where
    F: FnMut(&str) -> Cow<'_, str>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for region in PROTECTED.find_iter(text) {
        out.push_str(&transform(&text[last..region.start()]));
        out.push_str(region.as_str());
        last = region.end();
    }
    out.push_str(&transform(&text[last..]));
    out
}

/// Rewrite `~x~` to `<sub>x</sub>` and `^x^` to `<sup>x</sup>`.
///
/// Content may not contain whitespace, braces or either delimiter. Runs of
/// doubled tildes are strikethrough and are left alone.
#[must_use]
pub fn sub_sup(text: &str) -> String {
    split_protected(text, |segment| {
        let subbed = replace_single(segment, &SUBSCRIPT, '~', "sub");
        let supped = match replace_single(&subbed, &SUPERSCRIPT, '^', "sup") {
            Cow::Owned(both) => Some(both),
            Cow::Borrowed(_) => None,
        };
        match supped {
            Some(both) => Cow::Owned(both),
            None => subbed,
        }
    })
}

/// Replace matches whose delimiters are not part of a longer run.
fn replace_single<'a>(text: &'a str, pattern: &Regex, delim: char, tag: &str) -> Cow<'a, str> {
    pattern.replace_all(text, |caps: &Captures<'_>| {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let doubled_before = text[..whole.start].ends_with(delim);
        let doubled_after = text[whole.end..].starts_with(delim);
        if doubled_before || doubled_after {
            caps[0].to_owned()
        } else {
            format!("<{tag}>{}</{tag}>", &caps[1])
        }
    })
}
