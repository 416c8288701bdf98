//! State tracked while walking pulldown-cmark events.

use std::collections::HashMap;

use pulldown_cmark::Alignment;

use crate::util::slugify;

/// Fallback anchor for headings whose text produces an empty slug.
const EMPTY_SLUG_ID: &str = "section";

/// Fenced or indented code block being collected.
#[derive(Default)]
pub(crate) struct CodeBlockState {
    active: bool,
    language: Option<String>,
    buffer: String,
}

impl CodeBlockState {
    pub(crate) fn start(&mut self, language: Option<String>) {
        self.active = true;
        self.language = language;
        self.buffer.clear();
    }

    /// Finish the block, returning its language and content.
    pub(crate) fn end(&mut self) -> (Option<String>, String) {
        self.active = false;
        (self.language.take(), std::mem::take(&mut self.buffer))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

/// Current table's alignments and cell position.
#[derive(Default)]
pub(crate) struct TableState {
    in_head: bool,
    alignments: Vec<Alignment>,
    cell_index: usize,
}

impl TableState {
    pub(crate) fn start(&mut self, alignments: Vec<Alignment>) {
        self.alignments = alignments;
        self.in_head = false;
        self.cell_index = 0;
    }

    pub(crate) fn set_head(&mut self, in_head: bool) {
        self.in_head = in_head;
        self.cell_index = 0;
    }

    pub(crate) fn start_row(&mut self) {
        self.cell_index = 0;
    }

    pub(crate) fn next_cell(&mut self) {
        self.cell_index += 1;
    }

    pub(crate) fn cell_tag(&self) -> &'static str {
        if self.in_head { "th" } else { "td" }
    }

    pub(crate) fn alignment_style(&self) -> &'static str {
        match self.alignments.get(self.cell_index) {
            Some(Alignment::Left) => r#" style="text-align:left""#,
            Some(Alignment::Center) => r#" style="text-align:center""#,
            Some(Alignment::Right) => r#" style="text-align:right""#,
            Some(Alignment::None) | None => "",
        }
    }
}

/// Image whose alt text is being collected.
#[derive(Default)]
pub(crate) struct ImageState {
    /// `(src, title)` of the open image.
    pending: Option<(String, String)>,
    alt: String,
}

impl ImageState {
    pub(crate) fn start(&mut self, src: String, title: String) {
        self.pending = Some((src, title));
        self.alt.clear();
    }

    /// Finish the image, returning `(src, title, alt)`.
    pub(crate) fn end(&mut self) -> Option<(String, String, String)> {
        let (src, title) = self.pending.take()?;
        Some((src, title, std::mem::take(&mut self.alt)))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.alt.push_str(text);
    }
}

/// Table of contents entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    /// Heading level (1-6).
    pub level: u8,
    /// Heading text.
    pub title: String,
    /// Anchor id.
    pub id: String,
}

/// A finished heading, ready to write.
#[derive(Debug)]
pub(crate) struct CompletedHeading {
    pub level: u8,
    pub id: String,
    /// Rendered ` class="…" key="…"` attributes, possibly empty.
    pub attrs: String,
    pub html: String,
}

struct OpenHeading {
    level: u8,
    explicit_id: Option<String>,
    attrs: String,
    text: String,
    html: String,
}

/// Heading capture, anchor ids, title extraction and table of contents.
pub(crate) struct HeadingState {
    extract_title: bool,
    title: Option<String>,
    current: Option<OpenHeading>,
    toc: Vec<TocEntry>,
    id_counts: HashMap<String, usize>,
}

impl HeadingState {
    /// With `extract_title`, the first H1 becomes the page title and is left
    /// out of the table of contents. It is still rendered.
    pub(crate) fn new(extract_title: bool) -> Self {
        Self {
            extract_title,
            title: None,
            current: None,
            toc: Vec::new(),
            id_counts: HashMap::new(),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Start a heading. `explicit_id` comes from `{#id}` and wins over the slug.
    pub(crate) fn start(&mut self, level: u8, explicit_id: Option<String>, attrs: String) {
        self.current = Some(OpenHeading {
            level,
            explicit_id,
            attrs,
            text: String::new(),
            html: String::new(),
        });
    }

    /// Append plain text (for the slug and toc) and its escaped HTML.
    pub(crate) fn push_text(&mut self, text: &str, html: &str) {
        if let Some(open) = self.current.as_mut() {
            open.text.push_str(text);
            open.html.push_str(html);
        }
    }

    /// Append markup that contributes no text.
    pub(crate) fn push_html(&mut self, html: &str) {
        if let Some(open) = self.current.as_mut() {
            open.html.push_str(html);
        }
    }

    pub(crate) fn complete(&mut self) -> Option<CompletedHeading> {
        let open = self.current.take()?;
        let title = open.text.trim().to_owned();
        let id = match open.explicit_id {
            Some(id) => self.reserve_id(id),
            None => self.generate_id(&title),
        };

        let is_title = self.extract_title && open.level == 1 && self.title.is_none();
        if is_title {
            self.title = Some(title);
        } else {
            self.toc.push(TocEntry {
                level: open.level,
                title,
                id: id.clone(),
            });
        }

        Some(CompletedHeading {
            level: open.level,
            id,
            attrs: open.attrs,
            html: open.html.trim().to_owned(),
        })
    }

    pub(crate) fn take_title(&mut self) -> Option<String> {
        self.title.take()
    }

    pub(crate) fn take_toc(&mut self) -> Vec<TocEntry> {
        std::mem::take(&mut self.toc)
    }

    /// Record an author-chosen id so later slugs do not collide with it.
    fn reserve_id(&mut self, id: String) -> String {
        *self.id_counts.entry(id.clone()).or_default() += 1;
        id
    }

    fn generate_id(&mut self, text: &str) -> String {
        let mut base = slugify(text);
        if base.is_empty() {
            EMPTY_SLUG_ID.clone_into(&mut base);
        }
        let count = self.id_counts.entry(base.clone()).or_default();
        let id = match *count {
            0 => base,
            n => format!("{base}-{n}"),
        };
        *count += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn heading(state: &mut HeadingState, level: u8, text: &str) -> CompletedHeading {
        state.start(level, None, String::new());
        state.push_text(text, text);
        state.complete().unwrap()
    }

    #[test]
    fn test_title_extracted_but_rendered() {
        let mut state = HeadingState::new(true);
        let h1 = heading(&mut state, 1, "My Title");
        assert_eq!(h1.id, "my-title");
        heading(&mut state, 2, "Section");

        assert_eq!(state.take_title(), Some("My Title".to_owned()));
        let toc = state.take_toc();
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].title, "Section");
    }

    #[test]
    fn test_duplicate_ids_numbered() {
        let mut state = HeadingState::new(false);
        let ids: Vec<String> = (0..3).map(|_| heading(&mut state, 2, "FAQ").id).collect();
        assert_eq!(ids, vec!["faq", "faq-1", "faq-2"]);
    }

    #[test]
    fn test_explicit_id_reserved() {
        let mut state = HeadingState::new(false);
        state.start(2, Some("faq".to_owned()), r#" class="big""#.to_owned());
        state.push_text("Questions", "Questions");
        let explicit = state.complete().unwrap();
        assert_eq!(explicit.id, "faq");
        assert_eq!(explicit.attrs, r#" class="big""#);

        assert_eq!(heading(&mut state, 2, "FAQ").id, "faq-1");
    }

    #[test]
    fn test_empty_slug_fallback() {
        let mut state = HeadingState::new(false);
        assert_eq!(heading(&mut state, 3, "???").id, "section");
        assert_eq!(heading(&mut state, 3, "!!!").id, "section-1");
    }

    #[test]
    fn test_table_alignment() {
        let mut state = TableState::default();
        state.start(vec![Alignment::Left, Alignment::None]);
        state.set_head(true);
        assert_eq!(state.cell_tag(), "th");
        assert_eq!(state.alignment_style(), r#" style="text-align:left""#);
        state.next_cell();
        assert_eq!(state.alignment_style(), "");
        state.set_head(false);
        assert_eq!(state.cell_tag(), "td");
    }

    #[test]
    fn test_image_state() {
        let mut state = ImageState::default();
        assert!(!state.is_active());
        state.start("a.png".to_owned(), String::new());
        state.push_str("alt");
        assert_eq!(
            state.end(),
            Some(("a.png".to_owned(), String::new(), "alt".to_owned()))
        );
        assert!(!state.is_active());
    }
}
