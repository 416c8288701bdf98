//! AST-level inline rewrites.
//!
//! Runs on merged text events after pulldown-cmark has already split code
//! and math into their own events, so no protection pass is needed here.
//!
//! | Syntax             | Output                                              |
//! |--------------------|-----------------------------------------------------|
//! | `{日本^に ほん}`     | `<ruby>` with one annotation per base character     |
//! | `{base^=word}`     | `<ruby>` over the whole base                        |
//! | `{base^*}`         | `<span class="emphasis-dot">`                       |
//! | `!!text!!`         | interactive spoiler                                 |
//! | `!!text!!{.blur}`  | `<span class="spoiler blur">`                       |
//! | `++text++{attrs}`  | `<ins>`                                             |
//! | `==text=={attrs}`  | `<mark>`                                            |

use std::collections::VecDeque;
use std::sync::LazyLock;

use pulldown_cmark::{CowStr, Event, Tag, TagEnd};
use regex::{Captures, Regex};

use crate::attrs::Attributes;

/// Nesting limit for spoiler/ins/mark content rewritten recursively.
const MAX_INLINE_NESTING: usize = 8;

static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\{(?P<rb>[^{}.^][^{}^]*)\^(?P<rt>[^{}]+)\}",
        r"|!!(?P<sp>.+?)!!(?P<spa>\{[^{}]*\})?",
        r"|\+\+(?P<ins>\S(?:.*?\S)?)\+\+(?P<insa>\{[^{}]*\})?",
        r"|==(?P<mark>\S(?:.*?\S)?)==(?P<marka>\{[^{}]*\})?",
    ))
    .expect("invalid inline syntax regex")
});

/// A rewritten run of inline content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Piece {
    /// Plain text, escaped by the renderer.
    Text(String),
    /// Trusted markup.
    Html(String),
}

/// Rewrite inline syntax in one text node.
///
/// Returns `None` when nothing matched, so callers can keep the original event.
#[must_use]
pub fn rewrite_inline(text: &str) -> Option<Vec<Piece>> {
    let mut pieces = Vec::new();
    rewrite_into(text, 0, &mut pieces).then_some(pieces)
}

/// Concatenate pieces into HTML, escaping text.
#[must_use]
pub fn pieces_to_html(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|piece| match piece {
            Piece::Text(text) => crate::util::escape_html(text),
            Piece::Html(html) => html.clone(),
        })
        .collect()
}

fn rewrite_into(text: &str, depth: usize, out: &mut Vec<Piece>) -> bool {
    let mut last = 0;
    let mut matched = false;

    for caps in INLINE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push_text(out, &text[last..whole.start()]);
        last = whole.end();
        matched = true;

        if let (Some(base), Some(annotation)) = (caps.name("rb"), caps.name("rt")) {
            ruby(base.as_str(), annotation.as_str(), out);
        } else if let Some(content) = caps.name("sp") {
            spoiler(content.as_str(), &caps, depth, out);
        } else if let Some(content) = caps.name("ins") {
            wrap("ins", content.as_str(), caps.name("insa").map(|m| m.as_str()), depth, out);
        } else if let Some(content) = caps.name("mark") {
            wrap("mark", content.as_str(), caps.name("marka").map(|m| m.as_str()), depth, out);
        }
    }

    if matched {
        push_text(out, &text[last..]);
    }
    matched
}

/// Rewrite nested content, falling back to plain text past the nesting limit.
fn rewrite_nested(text: &str, depth: usize, out: &mut Vec<Piece>) {
    if depth >= MAX_INLINE_NESTING || !rewrite_into(text, depth + 1, out) {
        push_text(out, text);
    }
}

fn ruby(base: &str, annotation: &str, out: &mut Vec<Piece>) {
    if annotation == "*" {
        out.push(Piece::Html(r#"<span class="emphasis-dot">"#.to_owned()));
        push_text(out, base);
        out.push(Piece::Html("</span>".to_owned()));
        return;
    }

    out.push(Piece::Html("<ruby>".to_owned()));
    let parts: Vec<&str> = annotation.split_whitespace().collect();
    let chars: Vec<char> = base.chars().collect();

    if let Some(word) = annotation.strip_prefix('=') {
        annotate(base, word.trim(), out);
    } else if parts.len() > 1 && parts.len() == chars.len() {
        let mut buf = [0; 4];
        for (ch, part) in chars.iter().zip(&parts) {
            annotate(ch.encode_utf8(&mut buf), part, out);
        }
    } else {
        annotate(base, annotation.trim(), out);
    }
    out.push(Piece::Html("</ruby>".to_owned()));
}

fn annotate(base: &str, annotation: &str, out: &mut Vec<Piece>) {
    push_text(out, base);
    out.push(Piece::Html("<rp>(</rp><rt>".to_owned()));
    push_text(out, annotation);
    out.push(Piece::Html("</rt><rp>)</rp>".to_owned()));
}

fn spoiler(content: &str, caps: &Captures<'_>, depth: usize, out: &mut Vec<Piece>) {
    let raw_attrs = caps.name("spa").map(|m| m.as_str());
    let attrs = raw_attrs.and_then(Attributes::parse_braced);

    let mut open = String::from("<span");
    match &attrs {
        Some(attrs) if attrs.has_class("blur") => {
            attrs.write_html(&["spoiler"], &mut open);
            open.push('>');
            out.push(Piece::Html(open));
            rewrite_nested(content, depth, out);
            out.push(Piece::Html("</span>".to_owned()));
        }
        _ => {
            attrs
                .as_ref()
                .unwrap_or(&Attributes::default())
                .write_html(&["spoiler"], &mut open);
            open.push_str(
                r#" role="button" tabindex="0" aria-expanded="false"><span class="spoiler-content">"#,
            );
            out.push(Piece::Html(open));
            rewrite_nested(content, depth, out);
            out.push(Piece::Html("</span></span>".to_owned()));
        }
    }

    if attrs.is_none()
        && let Some(raw) = raw_attrs
    {
        push_text(out, raw);
    }
}

fn wrap(tag: &str, content: &str, raw_attrs: Option<&str>, depth: usize, out: &mut Vec<Piece>) {
    let attrs = raw_attrs.and_then(Attributes::parse_braced);

    let mut open = format!("<{tag}");
    if let Some(attrs) = &attrs {
        attrs.write_html(&[], &mut open);
    }
    open.push('>');
    out.push(Piece::Html(open));
    rewrite_nested(content, depth, out);
    out.push(Piece::Html(format!("</{tag}>")));

    if attrs.is_none()
        && let Some(raw) = raw_attrs
    {
        push_text(out, raw);
    }
}

/// Append text, merging with a preceding text piece.
fn push_text(out: &mut Vec<Piece>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Piece::Text(last)) = out.last_mut() {
        last.push_str(text);
    } else {
        out.push(Piece::Text(text.to_owned()));
    }
}

/// Event adapter applying [`rewrite_inline`] to text outside code blocks.
///
/// Expects merged text events (wrap the parser in
/// [`TextMergeStream`](pulldown_cmark::TextMergeStream)).
pub struct InlineRewriter<'a, I> {
    inner: I,
    queue: VecDeque<Event<'a>>,
    code_depth: usize,
}

impl<'a, I> InlineRewriter<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            queue: VecDeque::new(),
            code_depth: 0,
        }
    }
}

impl<'a, I> Iterator for InlineRewriter<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.queue.pop_front() {
            return Some(event);
        }

        let event = self.inner.next()?;
        match &event {
            Event::Start(Tag::CodeBlock(_)) => self.code_depth += 1,
            Event::End(TagEnd::CodeBlock) => self.code_depth = self.code_depth.saturating_sub(1),
            Event::Text(text) if self.code_depth == 0 => {
                if let Some(pieces) = rewrite_inline(text) {
                    self.queue.extend(pieces.into_iter().map(|piece| match piece {
                        Piece::Text(text) => Event::Text(CowStr::from(text)),
                        Piece::Html(html) => Event::InlineHtml(CowStr::from(html)),
                    }));
                    return self.queue.pop_front();
                }
            }
            _ => {}
        }
        Some(event)
    }
}
