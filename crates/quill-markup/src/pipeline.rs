//! Source-to-tree rendering pipeline.
//!
//! Order of operations:
//!
//! 1. front matter split and parse
//! 2. container scanner (block directives, tab groups, hexo tags)
//! 3. sub/superscript text pass
//! 4. pulldown-cmark with inline rewrites (ruby, spoiler, ins, mark)
//! 5. HTML tree parse and attribute decoration
//! 6. registered [`RenderPass`]es, in registration order
//!
//! Encryption is not part of this crate; it consumes the [`RenderedPage`]
//! after every pass above has run.

use pulldown_cmark::{Options, Parser, TextMergeStream};
use thiserror::Error;
use tracing::{debug, warn};

use crate::decorate::decorate;
use crate::frontmatter::{FrontMatter, split_front_matter};
use crate::inline::{InlineRewriter, sub_sup};
use crate::renderer::HtmlRenderer;
use crate::scanner::{ContainerScanner, MAX_CONTAINER_DEPTH, ScanOptions};
use crate::state::TocEntry;
use crate::tree::{Document, TreeError};

/// Attribute carrying a block password between the scanner and encryption.
pub const PASSWORD_ATTR: &str = "data-password";

/// Error rendering a document.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("rendered HTML could not be parsed: {0}")]
    Tree(#[from] TreeError),
}

/// Feature switches for the markup extensions.
#[derive(Clone, Debug)]
pub struct MarkupOptions {
    /// `:::`, `+++` and `;;;` containers.
    pub containers: bool,
    /// `{% links %}` and `{% media %}` tags.
    pub hexo_tags: bool,
    /// Sub/superscript, ruby, spoiler, ins and mark.
    pub inline_syntax: bool,
    /// `{…}` attribute decoration, including heading attributes.
    pub attributes: bool,
    pub max_container_depth: usize,
    /// Use the first H1 as page title.
    pub extract_title: bool,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            containers: true,
            hexo_tags: true,
            inline_syntax: true,
            attributes: true,
            max_container_depth: MAX_CONTAINER_DEPTH,
            extract_title: true,
        }
    }
}

/// Context handed to each [`RenderPass`].
pub struct PassContext<'a> {
    pub front_matter: &'a FrontMatter,
    warnings: &'a mut Vec<String>,
}

impl PassContext<'_> {
    /// Record a warning on the rendered page.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// A post-render tree pass such as syntax highlighting or math rendering.
///
/// Passes run after decoration and before encryption, so anything they add
/// inside an encrypted block is encrypted with it.
pub trait RenderPass: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn apply(&self, doc: &mut Document, ctx: &mut PassContext<'_>);
}

/// Rendered body of a page.
#[derive(Clone, Debug)]
pub enum PageContent {
    /// Parsed and decorated tree.
    Tree(Document),
    /// HTML the tree parser rejected, kept undecorated.
    Raw(String),
}

impl PageContent {
    #[must_use]
    pub fn to_html(&self) -> String {
        match self {
            Self::Tree(doc) => doc.serialize(),
            Self::Raw(html) => html.clone(),
        }
    }
}

/// Output of [`Pipeline::render`].
#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub front_matter: FrontMatter,
    pub content: PageContent,
    /// Front matter title, falling back to the first H1.
    pub title: Option<String>,
    pub toc: Vec<TocEntry>,
    /// Recoverable problems found while rendering.
    pub warnings: Vec<String>,
}

/// Markdown-to-tree pipeline with the blog extensions.
///
/// # Example
///
/// ```
/// use quill_markup::{MarkupOptions, Pipeline};
///
/// let page = Pipeline::new(MarkupOptions::default())
///     .render("# Hello\n\n:::info\nH~2~O is ==wet==\n:::\n")
///     .unwrap();
/// let html = page.content.to_html();
/// assert!(html.contains(r#"<div class="note-block note-info">"#));
/// assert!(html.contains("H<sub>2</sub>O is <mark>wet</mark>"));
/// assert_eq!(page.title.as_deref(), Some("Hello"));
/// ```
pub struct Pipeline {
    options: MarkupOptions,
    passes: Vec<Box<dyn RenderPass>>,
}

impl Pipeline {
    #[must_use]
    pub fn new(options: MarkupOptions) -> Self {
        Self {
            options,
            passes: Vec::new(),
        }
    }

    /// Register a post-render pass.
    #[must_use]
    pub fn with_pass<P: RenderPass + 'static>(mut self, pass: P) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    #[must_use]
    pub fn options(&self) -> &MarkupOptions {
        &self.options
    }

    /// Render a source file (front matter plus markdown).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FrontMatter`] for malformed front matter, and
    /// [`PipelineError::Tree`] when the rendered HTML cannot be parsed but the
    /// page has content to encrypt. Otherwise parse failures degrade to
    /// [`PageContent::Raw`] with a warning.
    pub fn render(&self, source: &str) -> Result<RenderedPage, PipelineError> {
        let (yaml, body) = split_front_matter(source);
        let front_matter = match yaml {
            Some(yaml) => FrontMatter::parse(yaml)?,
            None => FrontMatter::default(),
        };
        let mut warnings = Vec::new();

        let scanned = if self.options.containers || self.options.hexo_tags {
            let mut scanner = ContainerScanner::new(ScanOptions {
                containers: self.options.containers,
                hexo_tags: self.options.hexo_tags,
                max_depth: self.options.max_container_depth,
            });
            let text = scanner.scan(body);
            warnings.extend(scanner.into_warnings());
            text
        } else {
            body.to_owned()
        };

        let markdown = if self.options.inline_syntax {
            sub_sup(&scanned)
        } else {
            scanned
        };
        debug!(bytes = markdown.len(), "text passes done");

        let mut renderer = HtmlRenderer::new();
        if self.options.extract_title {
            renderer = renderer.with_title_extraction();
        }
        let parser = TextMergeStream::new(Parser::new_ext(&markdown, self.markdown_options()));
        let result = if self.options.inline_syntax {
            renderer.render(InlineRewriter::new(parser))
        } else {
            renderer.render(parser)
        };

        let title = front_matter.title.clone().or(result.title);
        let mut doc = match Document::parse(&result.html) {
            Ok(doc) => doc,
            Err(err) if front_matter.password().is_some() || result.html.contains(PASSWORD_ATTR) => {
                return Err(err.into());
            }
            Err(err) => {
                let message = format!("HTML tree unavailable, attributes not applied: {err}");
                warn!("{message}");
                warnings.push(message);
                return Ok(RenderedPage {
                    front_matter,
                    content: PageContent::Raw(result.html),
                    title,
                    toc: result.toc,
                    warnings,
                });
            }
        };

        if self.options.attributes {
            decorate(&mut doc);
        }

        let mut ctx = PassContext {
            front_matter: &front_matter,
            warnings: &mut warnings,
        };
        for pass in &self.passes {
            debug!(pass = pass.name(), "applying render pass");
            pass.apply(&mut doc, &mut ctx);
        }

        Ok(RenderedPage {
            front_matter,
            content: PageContent::Tree(doc),
            title,
            toc: result.toc,
            warnings,
        })
    }

    fn markdown_options(&self) -> Options {
        let mut options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_MATH;
        if self.options.attributes {
            options |= Options::ENABLE_HEADING_ATTRIBUTES;
        }
        options
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(MarkupOptions::default())
    }
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::Pipeline: Send, Sync);
    static_assertions::assert_impl_all!(super::RenderedPage: Send);

    use super::*;

    use pretty_assertions::assert_eq;

    fn render(source: &str) -> RenderedPage {
        Pipeline::default().render(source).unwrap()
    }

    fn html(source: &str) -> String {
        render(source).content.to_html()
    }

    #[test]
    fn test_plain_markdown() {
        assert_eq!(html("Hello *world*"), "<p>Hello <em>world</em></p>");
    }

    #[test]
    fn test_note_with_markdown_inside() {
        let out = html(":::warning\n**Careful**\n:::\n");
        assert!(out.starts_with("<div class=\"note-block note-warning\">"));
        assert!(out.contains("<p><strong>Careful</strong></p>"));
        assert!(out.trim_end().ends_with("</div>"));
    }

    #[test]
    fn test_collapse_block() {
        let out = html("+++info Click me\nHidden *text*\n+++\n");
        assert!(out.contains(r#"<details class="collapse-block collapse-info">"#));
        assert!(out.contains("<summary>Click me</summary>"));
        assert!(out.contains("<p>Hidden <em>text</em></p>"));
    }

    #[test]
    fn test_tab_group_rendered_as_one_block() {
        let out = html(";;;os macOS\nbrew\n;;;\n\n;;;os Linux\napt\n;;;\n");
        assert_eq!(out.matches("tabs-block").count(), 1);
        assert!(out.contains("<p>brew</p>"));
        assert!(out.contains("<p>apt</p>"));
    }

    #[test]
    fn test_inline_scenarios() {
        assert_eq!(
            html("!!secret!!{.blur}"),
            r#"<p><span class="spoiler blur">secret</span></p>"#
        );
        assert_eq!(
            html("!!secret!!"),
            r#"<p><span class="spoiler" role="button" tabindex="0" aria-expanded="false"><span class="spoiler-content">secret</span></span></p>"#
        );
        assert_eq!(
            html("{日^にち}"),
            "<p><ruby>日<rp>(</rp><rt>にち</rt><rp>)</rp></ruby></p>"
        );
    }

    #[test]
    fn test_inline_code_not_rewritten() {
        assert_eq!(
            html("`==x== ~1~` ==y=="),
            "<p><code>==x== ~1~</code> <mark>y</mark></p>"
        );
    }

    #[test]
    fn test_fenced_directives_are_literal() {
        let out = html("```\n:::info\n!!x!!\n:::\n```\n");
        assert_eq!(out, "<pre><code>:::info\n!!x!!\n:::\n</code></pre>");
    }

    #[test]
    fn test_attribute_decoration() {
        let out = html("Para\n\n{.lead}\n\n- one {.a}\n- two\n\n[hi]{#x}");
        assert_eq!(
            out,
            r#"<p class="lead">Para</p><ul><li class="a">one</li><li>two</li></ul><p><span id="x">hi</span></p>"#
        );
    }

    #[test]
    fn test_trailing_inline_attributes() {
        assert_eq!(
            html("==x== more words {.wavy}"),
            r#"<p><mark class="wavy">x</mark> more words</p>"#
        );
    }

    #[test]
    fn test_link_destination_keeps_tildes() {
        assert_eq!(
            html("[home](https://x.org/~a~/b) H~2~O"),
            r#"<p><a href="https://x.org/~a~/b">home</a> H<sub>2</sub>O</p>"#
        );
    }

    #[test]
    fn test_raw_html_with_bare_ampersand_is_decorated() {
        let page = render("<div>Tom & Jerry</div>\n\nPara\n\n{.lead}\n");
        assert!(page.warnings.is_empty());
        let out = page.content.to_html();
        assert!(out.contains("<div>Tom &amp; Jerry</div>"));
        assert!(out.contains(r#"<p class="lead">Para</p>"#));
    }

    #[test]
    fn test_script_block_survives() {
        let page = render("<script>\nif (a < b) { x(); }\n</script>\n");
        assert!(page.warnings.is_empty());
        assert!(matches!(page.content, PageContent::Tree(_)));
        assert_eq!(
            page.content.to_html().trim_end(),
            "<script>\nif (a < b) { x(); }\n</script>"
        );
    }

    #[test]
    fn test_heading_attributes() {
        assert_eq!(
            html("# Heading {.big #sec1}"),
            r#"<h1 id="sec1" class="big">Heading</h1>"#
        );
    }

    #[test]
    fn test_encrypted_block_keeps_password_attr_for_encryption() {
        let out = html(":::encrypted{password=\"pw\"}\nSecret\n:::\n");
        assert!(out.contains(r#"<div class="encrypted-block" data-password="pw">"#));
        assert!(out.contains("<p>Secret</p>"));
    }

    #[test]
    fn test_front_matter_title_wins() {
        let page = render("---\ntitle: From YAML\n---\n# From H1\n\n## Part\n");
        assert_eq!(page.title.as_deref(), Some("From YAML"));
        assert_eq!(page.toc.len(), 1);
    }

    #[test]
    fn test_malformed_front_matter_is_error() {
        let result = Pipeline::default().render("---\ntitle: [oops\n---\nbody");
        assert!(matches!(result, Err(PipelineError::FrontMatter(_))));
    }

    #[test]
    fn test_scanner_warnings_surface() {
        let page = render(":::info\nnever closed\n");
        assert_eq!(page.warnings.len(), 1);
        assert!(page.warnings[0].contains("unclosed"));
        assert!(page.content.to_html().contains("never closed"));
    }

    #[test]
    fn test_disabled_features_stay_literal() {
        let options = MarkupOptions {
            containers: false,
            hexo_tags: false,
            inline_syntax: false,
            attributes: false,
            ..MarkupOptions::default()
        };
        let page = Pipeline::new(options)
            .render(":::info\n==x== H~2~O\n:::\n\n{.lead}\n")
            .unwrap();
        let out = page.content.to_html();
        assert!(out.contains(":::info"));
        assert!(out.contains("==x=="));
        assert!(out.contains("{.lead}"));
        assert!(!out.contains("<sub>"));
    }

    struct MarkExternalLinks;

    impl RenderPass for MarkExternalLinks {
        fn name(&self) -> &str {
            "external-links"
        }

        fn apply(&self, doc: &mut Document, ctx: &mut PassContext<'_>) {
            let links: Vec<_> = doc
                .descendants(doc.root())
                .into_iter()
                .filter(|&id| {
                    doc.element(id)
                        .and_then(|el| el.attr("href"))
                        .is_some_and(|href| href.starts_with("http"))
                })
                .collect();
            for id in links {
                if let Some(el) = doc.element_mut(id) {
                    el.set_attr("rel", "noopener");
                }
            }
            ctx.warn(format!("{} tagged", ctx.front_matter.tags.len()));
        }
    }

    #[test]
    fn test_render_pass_runs_after_decoration() {
        let page = Pipeline::default()
            .with_pass(MarkExternalLinks)
            .render("---\ntags: [a]\n---\n[x](https://a.example)\n")
            .unwrap();
        assert_eq!(
            page.content.to_html(),
            r#"<p><a href="https://a.example" rel="noopener">x</a></p>"#
        );
        assert_eq!(page.warnings, vec!["1 tagged"]);
    }

    #[test]
    fn test_unparseable_html_degrades_to_raw() {
        let page = render("<!-- never closed\n");
        assert!(matches!(page.content, PageContent::Raw(_)));
        assert_eq!(page.warnings.len(), 1);
    }

    #[test]
    fn test_unparseable_html_with_password_is_error() {
        let result = Pipeline::default().render("---\npassword: pw\n---\n<!-- never closed\n");
        assert!(matches!(result, Err(PipelineError::Tree(_))));
    }
}
