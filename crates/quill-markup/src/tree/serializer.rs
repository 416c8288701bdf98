//! Tree to HTML serialization.

use std::fmt::Write;

use super::{Document, NodeData, NodeId, is_raw_text_element, is_void_element};

enum Step {
    Open(NodeId),
    Close(NodeId),
}

/// Write `id` and its subtree as HTML.
///
/// Void elements are self-closed; every other element gets an explicit end
/// tag even when empty. Script and style text is written unescaped.
pub(super) fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    let mut stack = vec![Step::Open(id)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(node) => match doc.data(node) {
                NodeData::Document => {
                    stack.extend(doc.children(node).iter().rev().map(|&c| Step::Open(c)));
                }
                NodeData::Text(text) => {
                    let raw = doc
                        .parent(node)
                        .and_then(|parent| doc.tag(parent))
                        .is_some_and(is_raw_text_element);
                    if raw {
                        out.push_str(text);
                    } else {
                        escape_text(text, out);
                    }
                }
                NodeData::Comment(text) => write!(out, "<!--{text}-->").unwrap(),
                NodeData::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag);
                    for (key, value) in &element.attrs {
                        write!(out, " {key}=\"").unwrap();
                        escape_attr(value, out);
                        out.push('"');
                    }
                    if is_void_element(&element.tag) {
                        out.push_str(" />");
                    } else {
                        out.push('>');
                        stack.push(Step::Close(node));
                        stack.extend(doc.children(node).iter().rev().map(|&c| Step::Open(c)));
                    }
                }
            },
            Step::Close(node) => {
                if let Some(tag) = doc.tag(node) {
                    write!(out, "</{tag}>").unwrap();
                }
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
