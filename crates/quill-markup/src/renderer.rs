//! HTML renderer for pulldown-cmark events.
//!
//! Output is well-formed enough for the tree parser: void elements are
//! self-closed and every attribute value is quoted and escaped.

use std::fmt::Write;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};

use crate::attrs::is_event_handler;
use crate::state::{CodeBlockState, HeadingState, ImageState, TableState, TocEntry};
use crate::util::{escape_html, heading_level_to_num};

/// Result of rendering markdown events.
#[derive(Clone, Debug)]
pub struct RenderResult {
    pub html: String,
    /// Text of the first H1, when title extraction is enabled.
    pub title: Option<String>,
    pub toc: Vec<TocEntry>,
}

/// Markdown event renderer.
pub struct HtmlRenderer {
    output: String,
    code: CodeBlockState,
    table: TableState,
    image: ImageState,
    heading: HeadingState,
}

impl HtmlRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            output: String::with_capacity(4096),
            code: CodeBlockState::default(),
            table: TableState::default(),
            image: ImageState::default(),
            heading: HeadingState::new(false),
        }
    }

    /// Use the first H1 as the page title (it is still rendered).
    #[must_use]
    pub fn with_title_extraction(mut self) -> Self {
        self.heading = HeadingState::new(true);
        self
    }

    /// Render events and return the result.
    pub fn render<'a, I>(&mut self, events: I) -> RenderResult
    where
        I: Iterator<Item = Event<'a>>,
    {
        for event in events {
            self.process_event(event);
        }

        RenderResult {
            html: std::mem::take(&mut self.output),
            title: self.heading.take_title(),
            toc: self.heading.take_toc(),
        }
    }

    /// Push markup to the open heading or to the output.
    fn push_inline(&mut self, html: &str) {
        if self.heading.is_active() {
            self.heading.push_html(html);
        } else {
            self.output.push_str(html);
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::InlineMath(math) => self.math("math-inline", &math),
            Event::DisplayMath(math) => self.math("math-display", &math),
            Event::Html(html) | Event::InlineHtml(html) => self.raw_html(&html),
            Event::SoftBreak => self.text("\n"),
            Event::HardBreak => self.push_inline("<br />"),
            Event::Rule => self.output.push_str("<hr />"),
            Event::TaskListMarker(checked) => {
                self.output.push_str(if checked {
                    r#"<input type="checkbox" checked="checked" disabled="disabled" />"#
                } else {
                    r#"<input type="checkbox" disabled="disabled" />"#
                });
            }
            Event::FootnoteReference(_) => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.output.push_str("<p>"),
            Tag::Heading {
                level,
                id,
                classes,
                attrs,
            } => {
                let extra = heading_attrs(&classes, &attrs);
                self.heading.start(
                    heading_level_to_num(level),
                    id.map(|id| id.to_string()),
                    extra,
                );
            }
            Tag::BlockQuote(_) => self.output.push_str("<blockquote>"),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_owned),
                    CodeBlockKind::Indented => None,
                };
                self.code.start(language);
            }
            Tag::List(Some(1)) => self.output.push_str("<ol>"),
            Tag::List(Some(start)) => write!(self.output, r#"<ol start="{start}">"#).unwrap(),
            Tag::List(None) => self.output.push_str("<ul>"),
            Tag::Item => self.output.push_str("<li>"),
            Tag::DefinitionList => self.output.push_str("<dl>"),
            Tag::DefinitionListTitle => self.output.push_str("<dt>"),
            Tag::DefinitionListDefinition => self.output.push_str("<dd>"),
            Tag::Table(alignments) => {
                self.table.start(alignments);
                self.output.push_str("<table>");
            }
            Tag::TableHead => {
                self.table.set_head(true);
                self.output.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                self.table.start_row();
                self.output.push_str("<tr>");
            }
            Tag::TableCell => {
                write!(
                    self.output,
                    "<{}{}>",
                    self.table.cell_tag(),
                    self.table.alignment_style()
                )
                .unwrap();
            }
            Tag::Emphasis => self.push_inline("<em>"),
            Tag::Strong => self.push_inline("<strong>"),
            Tag::Strikethrough => self.push_inline("<s>"),
            Tag::Superscript => self.push_inline("<sup>"),
            Tag::Subscript => self.push_inline("<sub>"),
            Tag::Link {
                dest_url, title, ..
            } => {
                let mut open = format!(r#"<a href="{}""#, escape_html(&dest_url));
                if !title.is_empty() {
                    write!(open, r#" title="{}""#, escape_html(&title)).unwrap();
                }
                open.push('>');
                self.push_inline(&open);
            }
            Tag::Image {
                dest_url, title, ..
            } => self.image.start(dest_url.to_string(), title.to_string()),
            Tag::HtmlBlock | Tag::FootnoteDefinition(_) | Tag::MetadataBlock(_) => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.output.push_str("</p>"),
            TagEnd::Heading(_) => {
                if let Some(heading) = self.heading.complete() {
                    write!(
                        self.output,
                        r#"<h{level} id="{id}"{attrs}>{html}</h{level}>"#,
                        level = heading.level,
                        id = escape_html(&heading.id),
                        attrs = heading.attrs,
                        html = heading.html,
                    )
                    .unwrap();
                }
            }
            TagEnd::BlockQuote(_) => self.output.push_str("</blockquote>"),
            TagEnd::CodeBlock => {
                let (language, content) = self.code.end();
                match language {
                    Some(lang) => write!(
                        self.output,
                        r#"<pre><code class="language-{}">{}</code></pre>"#,
                        escape_html(&lang),
                        escape_html(&content)
                    )
                    .unwrap(),
                    None => {
                        write!(self.output, "<pre><code>{}</code></pre>", escape_html(&content))
                            .unwrap();
                    }
                }
            }
            TagEnd::List(ordered) => self.output.push_str(if ordered { "</ol>" } else { "</ul>" }),
            TagEnd::Item => self.output.push_str("</li>"),
            TagEnd::DefinitionList => self.output.push_str("</dl>"),
            TagEnd::DefinitionListTitle => self.output.push_str("</dt>"),
            TagEnd::DefinitionListDefinition => self.output.push_str("</dd>"),
            TagEnd::Table => self.output.push_str("</tbody></table>"),
            TagEnd::TableHead => {
                self.output.push_str("</tr></thead><tbody>");
                self.table.set_head(false);
            }
            TagEnd::TableRow => self.output.push_str("</tr>"),
            TagEnd::TableCell => {
                write!(self.output, "</{}>", self.table.cell_tag()).unwrap();
                self.table.next_cell();
            }
            TagEnd::Emphasis => self.push_inline("</em>"),
            TagEnd::Strong => self.push_inline("</strong>"),
            TagEnd::Strikethrough => self.push_inline("</s>"),
            TagEnd::Superscript => self.push_inline("</sup>"),
            TagEnd::Subscript => self.push_inline("</sub>"),
            TagEnd::Link => self.push_inline("</a>"),
            TagEnd::Image => {
                if let Some((src, title, alt)) = self.image.end() {
                    let mut img = format!(r#"<img src="{}" alt="{}""#, escape_html(&src), escape_html(&alt));
                    if !title.is_empty() {
                        write!(img, r#" title="{}""#, escape_html(&title)).unwrap();
                    }
                    img.push_str(" />");
                    self.push_inline(&img);
                }
            }
            TagEnd::HtmlBlock | TagEnd::FootnoteDefinition | TagEnd::MetadataBlock(_) => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.code.is_active() {
            self.code.push_str(text);
        } else if self.image.is_active() {
            self.image.push_str(text);
        } else if self.heading.is_active() {
            self.heading.push_text(text, &escape_html(text));
        } else {
            self.output.push_str(&escape_html(text));
        }
    }

    fn inline_code(&mut self, code: &str) {
        let html = format!("<code>{}</code>", escape_html(code));
        if self.image.is_active() {
            self.image.push_str(code);
        } else if self.heading.is_active() {
            self.heading.push_text(code, &html);
        } else {
            self.output.push_str(&html);
        }
    }

    /// Math is passed through for a client-side renderer.
    fn math(&mut self, class: &str, source: &str) {
        let html = format!(r#"<span class="math {class}">{}</span>"#, escape_html(source));
        if self.heading.is_active() {
            self.heading.push_text(source, &html);
        } else {
            self.output.push_str(&html);
        }
    }

    fn raw_html(&mut self, html: &str) {
        if self.image.is_active() {
            return;
        }
        self.push_inline(html);
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `{.class key=value}` heading attributes, dropping event handlers.
fn heading_attrs(classes: &[CowStr<'_>], attrs: &[(CowStr<'_>, Option<CowStr<'_>>)]) -> String {
    let mut out = String::new();
    if !classes.is_empty() {
        let joined: Vec<&str> = classes.iter().map(AsRef::as_ref).collect();
        write!(out, r#" class="{}""#, escape_html(&joined.join(" "))).unwrap();
    }
    for (key, value) in attrs {
        if is_event_handler(key) || !is_attr_name(key) {
            continue;
        }
        let value = value.as_deref().unwrap_or("");
        write!(out, r#" {key}="{}""#, escape_html(value)).unwrap();
    }
    out
}

fn is_attr_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}
