//! Lexical cleanup of author HTML before it reaches the XML tokenizer.
//!
//! HTML accepts markup an XML reader rejects or misreads:
//!
//! - a bare `&` that starts no reference;
//! - a `<` that starts no tag (`a < b`);
//! - markup-like text inside `<script>`, `<style>` and `<textarea>`.
//!
//! These are escaped so the tokenizer reports them as text, and the parser
//! decodes them back to the characters the author wrote. Named HTML entities
//! are replaced by their characters here as well. Comments are copied as is.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::entities::named_entity;

/// Comments and the opening tags of raw-text elements.
static OPAQUE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s:<!--.*?(?:-->|\z))|(?i:<(script|style|textarea)(?:\s[^>]*)?>)")
        .expect("invalid raw text regex")
});

/// References and tag openers in ordinary markup; a lone `&` or `<` is text.
static LOOSE_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#[0-9]+;|#[xX][0-9a-fA-F]+;|([a-zA-Z][a-zA-Z0-9]*);)?|<[A-Za-z/!?]?")
        .expect("invalid loose markup regex")
});

/// Make `html` readable by the XML tokenizer without changing its meaning.
pub(crate) fn prepare_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + 16);
    let mut pos = 0;

    while let Some(caps) = OPAQUE_START.captures_at(html, pos) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        out.push_str(&escape_loose(&html[pos..whole.start()]));

        let Some(name) = caps.get(1) else {
            out.push_str(whole.as_str());
            pos = whole.end();
            continue;
        };

        out.push_str(&escape_loose(whole.as_str()));
        let body_start = whole.end();
        let closer = format!("</{}", name.as_str().to_ascii_lowercase());
        let body_end = html[body_start..]
            .to_ascii_lowercase()
            .find(&closer)
            .map_or(html.len(), |offset| body_start + offset);
        let body = &html[body_start..body_end];
        if name.as_str().eq_ignore_ascii_case("textarea") {
            out.push_str(&escape_loose(&body.replace('<', "&lt;")));
        } else {
            escape_raw_text(body, &mut out);
        }
        pos = body_end;
    }

    out.push_str(&escape_loose(&html[pos..]));
    out
}

fn escape_loose(text: &str) -> Cow<'_, str> {
    LOOSE_MARKUP.replace_all(text, |caps: &Captures<'_>| {
        let matched = &caps[0];
        match matched {
            "&" => "&amp;".to_owned(),
            "<" => "&lt;".to_owned(),
            _ => caps
                .get(1)
                .and_then(|name| named_entity(name.as_str()))
                .map_or_else(|| matched.to_owned(), str::to_owned),
        }
    })
}

fn escape_raw_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}
