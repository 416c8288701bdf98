//! Attribute decoration of the rendered HTML tree.
//!
//! Authors annotate block and inline content with `{#id .class key=value}`
//! blocks that pulldown-cmark leaves as literal text. Four passes run in
//! order, each walking the whole tree:
//!
//! 1. a paragraph holding only `{…}` is removed and its attributes go to the
//!    nearest preceding element sibling;
//! 2. a list item whose own trailing text ends in `{…}` takes those
//!    attributes (the text may sit directly in the `<li>`, in its last `<p>`,
//!    or just before a nested list);
//! 3. a `{…}` block at the start of a text node directly after an element,
//!    or at the end of an element's last text child, goes to the element
//!    sibling just before that text;
//! 4. `[text]{…}` inside text becomes `<span …>text</span>`.
//!
//! Unrecognized blocks stay as literal text. `code`, `pre`, `script` and
//! `style` subtrees are never touched.

use std::sync::LazyLock;

use regex::Regex;

use crate::attrs::Attributes;
use crate::tree::{Document, Element, NodeId};

/// Subtrees the decorator never enters.
const OPAQUE_TAGS: [&str; 4] = ["code", "pre", "script", "style"];

static BRACKET_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]\n]+)\]\{([^{}\n]*)\}").expect("invalid bracket span regex")
});

/// Run all four decoration passes.
pub fn decorate(doc: &mut Document) {
    for_each_container(doc, attach_attribute_paragraphs);
    for_each_container(doc, attach_list_item_attributes);
    for_each_container(doc, attach_inline_attributes);
    for_each_container(doc, wrap_bracket_spans);
}

/// Visit the root and every element outside opaque subtrees, parents first.
fn for_each_container(doc: &mut Document, mut visit: impl FnMut(&mut Document, NodeId)) {
    let mut stack = vec![doc.root()];
    while let Some(node) = stack.pop() {
        visit(doc, node);
        for &child in doc.children(node).iter().rev() {
            if doc
                .element(child)
                .is_some_and(|el| !OPAQUE_TAGS.contains(&el.tag.as_str()))
            {
                stack.push(child);
            }
        }
    }
}

fn is_blank_text(doc: &Document, id: NodeId) -> bool {
    doc.text(id).is_some_and(|text| text.trim().is_empty())
}

fn last_content(doc: &Document, nodes: &[NodeId]) -> Option<NodeId> {
    nodes.iter().rev().copied().find(|&id| !is_blank_text(doc, id))
}

/// Pass 1: `<p>{…}</p>` after an element.
fn attach_attribute_paragraphs(doc: &mut Document, parent: NodeId) {
    let children = doc.children(parent).to_vec();
    let mut kept = Vec::with_capacity(children.len());
    let mut changed = false;

    for child in children {
        if let Some(attrs) = attribute_paragraph(doc, child)
            && let Some(target) = last_content(doc, &kept)
            && let Some(element) = doc.element_mut(target)
        {
            element.merge(&attrs);
            changed = true;
            continue;
        }
        kept.push(child);
    }

    if changed {
        doc.set_children(parent, kept);
    }
}

fn attribute_paragraph(doc: &Document, id: NodeId) -> Option<Attributes> {
    if doc.tag(id)? != "p" {
        return None;
    }
    let &[only] = doc.children(id) else {
        return None;
    };
    Attributes::parse_braced(doc.text(only)?)
}

/// Pass 2: `<li>text {…}</li>`.
fn attach_list_item_attributes(doc: &mut Document, node: NodeId) {
    if doc.tag(node) != Some("li") {
        return;
    }
    let Some(text_id) = list_item_trailing_text(doc, node) else {
        return;
    };
    let Some((before, attrs)) = doc.text(text_id).and_then(Attributes::split_trailing) else {
        return;
    };

    let before = before.trim_end().to_owned();
    doc.set_text(text_id, before);
    if let Some(item) = doc.element_mut(node) {
        item.merge(&attrs);
    }
}

fn list_item_trailing_text(doc: &Document, item: NodeId) -> Option<NodeId> {
    let children = doc.children(item);
    let end = children
        .iter()
        .position(|&c| matches!(doc.tag(c), Some("ul" | "ol")))
        .unwrap_or(children.len());
    let last = last_content(doc, &children[..end])?;

    if doc.text(last).is_some() {
        return Some(last);
    }
    if doc.tag(last) == Some("p") {
        let inner = last_content(doc, doc.children(last))?;
        return doc.text(inner).is_some().then_some(inner);
    }
    None
}

/// Pass 3: `<el>…</el>{…} rest` and `<el>…</el> rest {…}`.
fn attach_inline_attributes(doc: &mut Document, parent: NodeId) {
    attach_leading_attributes(doc, parent);
    attach_trailing_attributes(doc, parent);
}

fn attach_leading_attributes(doc: &mut Document, parent: NodeId) {
    let children = doc.children(parent).to_vec();
    for pair in children.windows(2) {
        let &[prev, next] = pair else {
            continue;
        };
        if doc.element(prev).is_none() {
            continue;
        }
        let Some((attrs, rest)) = doc.text(next).and_then(Attributes::split_leading) else {
            continue;
        };

        let rest = rest.to_owned();
        doc.set_text(next, rest);
        if let Some(element) = doc.element_mut(prev) {
            element.merge(&attrs);
        }
    }
}

fn attach_trailing_attributes(doc: &mut Document, parent: NodeId) {
    let children = doc.children(parent);
    let Some(index) = children.iter().rposition(|&c| !is_blank_text(doc, c)) else {
        return;
    };
    let last = children[index];
    let Some(target) = index
        .checked_sub(1)
        .map(|prev| children[prev])
        .filter(|&prev| doc.element(prev).is_some())
    else {
        return;
    };
    let Some((before, attrs)) = doc.text(last).and_then(Attributes::split_trailing) else {
        return;
    };
    // `[text]{…}` belongs to pass 4.
    if before.ends_with(']') {
        return;
    }

    let before = before.trim_end().to_owned();
    doc.set_text(last, before);
    if let Some(element) = doc.element_mut(target) {
        element.merge(&attrs);
    }
}

/// Pass 4: `[text]{…}` spans.
fn wrap_bracket_spans(doc: &mut Document, parent: NodeId) {
    let children = doc.children(parent).to_vec();
    let mut rebuilt = Vec::with_capacity(children.len());
    let mut changed = false;

    for child in children {
        let Some(text) = doc.text(child).filter(|t| t.contains("]{")).map(str::to_owned) else {
            rebuilt.push(child);
            continue;
        };

        let mut pieces = Vec::new();
        let mut last = 0;
        for caps in BRACKET_SPAN.captures_iter(&text) {
            let (Some(whole), Some(attrs)) = (caps.get(0), Attributes::parse(&caps[2])) else {
                continue;
            };
            if whole.start() > last {
                pieces.push(doc.create_text(&text[last..whole.start()]));
            }
            let mut span = Element::new("span");
            span.merge(&attrs);
            let span = doc.create_element(span);
            let inner = doc.create_text(&caps[1]);
            doc.append(span, inner);
            pieces.push(span);
            last = whole.end();
        }

        if pieces.is_empty() {
            rebuilt.push(child);
            continue;
        }
        if last < text.len() {
            pieces.push(doc.create_text(&text[last..]));
        }
        rebuilt.extend(pieces);
        changed = true;
    }

    if changed {
        doc.set_children(parent, rebuilt);
    }
}
