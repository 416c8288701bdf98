//! HTML fragment tokenizing with quick-xml.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::entities::decode_reference;
use super::prepare::prepare_html;
use super::{Document, Element, NodeData, TreeError, is_void_element};

/// Parse `html` and append its content to the document root.
///
/// Open elements are tracked on an explicit stack: an end tag closes the
/// nearest open element with the same name (and everything opened after it);
/// an end tag with no open counterpart is dropped.
pub(super) fn parse_into(doc: &mut Document, html: &str) -> Result<(), TreeError> {
    let html = prepare_html(html);
    let mut reader = Reader::from_str(&html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let root = doc.root();
    let mut open = vec![root];

    loop {
        let parent = open.last().copied().unwrap_or(root);
        match reader.read_event()? {
            Event::Start(e) => {
                let element = decode_element(&reader, &e);
                let void = is_void_element(&element.tag);
                let id = doc.create_element(element);
                doc.append(parent, id);
                if !void {
                    open.push(id);
                }
            }
            Event::Empty(e) => {
                let id = doc.create_element(decode_element(&reader, &e));
                doc.append(parent, id);
            }
            Event::End(e) => {
                let name = decode_name(&reader, e.name().as_ref());
                let matching = open
                    .iter()
                    .rposition(|&id| doc.tag(id).is_some_and(|tag| tag.eq_ignore_ascii_case(&name)));
                if let Some(index) = matching
                    && index > 0
                {
                    open.truncate(index);
                }
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e)?;
                doc.append_text(parent, &text);
            }
            Event::GeneralRef(e) => {
                let entity = reader.decoder().decode(&e)?;
                doc.append_text(parent, &decode_reference(&entity));
            }
            Event::CData(e) => {
                doc.append_text(parent, &String::from_utf8_lossy(&e));
            }
            Event::Comment(e) => {
                let text = reader.decoder().decode(&e)?.into_owned();
                let id = doc.push(NodeData::Comment(text));
                doc.append(parent, id);
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => return Ok(()),
        }
    }
}

fn decode_element(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Element {
    let mut element = Element::new(decode_name(reader, e.name().as_ref()));
    for attr in e.html_attributes().flatten() {
        let key = decode_name(reader, attr.key.as_ref());
        let value = attr
            .unescape_value()
            .map_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned(), Cow::into_owned);
        element.set_attr(&key, value);
    }
    element
}

fn decode_name(reader: &Reader<&[u8]>, name: &[u8]) -> String {
    reader
        .decoder()
        .decode(name)
        .map_or_else(|_| String::from_utf8_lossy(name).into_owned(), Cow::into_owned)
}
