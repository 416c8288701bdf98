//! Markup extensions for blog posts.
//!
//! Turns a markdown post with custom block directives, inline syntax and
//! `{…}` attribute annotations into a decorated HTML tree:
//!
//! - [`ContainerScanner`]: fence-aware block directive scanner with tab
//!   grouping and hexo tags
//! - [`sub_sup`] and [`InlineRewriter`]: inline syntax
//! - [`HtmlRenderer`]: pulldown-cmark events to HTML
//! - [`Document`]: arena HTML tree
//! - [`decorate`]: attribute decoration passes
//! - [`Pipeline`]: all of the above in order, plus [`RenderPass`] hooks
//!
//! # Example
//!
//! ```
//! use quill_markup::Pipeline;
//!
//! let page = Pipeline::default()
//!     .render("- first {.done}\n- second\n")
//!     .unwrap();
//! assert_eq!(
//!     page.content.to_html(),
//!     r#"<ul><li class="done">first</li><li>second</li></ul>"#
//! );
//! ```

mod attrs;
mod decorate;
mod fence;
mod frontmatter;
mod hexo;
mod inline;
mod pipeline;
mod renderer;
mod scanner;
mod state;
mod tabs;
pub mod tree;
mod util;

pub use attrs::Attributes;
pub use decorate::decorate;
pub use frontmatter::{FrontMatter, split_front_matter};
pub use hexo::MediaKind;
pub use inline::{InlineRewriter, Piece, pieces_to_html, rewrite_inline, split_protected, sub_sup};
pub use pipeline::{
    MarkupOptions, PASSWORD_ATTR, PageContent, PassContext, Pipeline, PipelineError, RenderPass,
    RenderedPage,
};
pub use renderer::{HtmlRenderer, RenderResult};
pub use scanner::{ContainerKind, ContainerScanner, MAX_CONTAINER_DEPTH, ScanOptions};
pub use state::TocEntry;
pub use tree::{Document, Element, NodeData, NodeId, TreeError};
pub use util::{escape_html, slugify};
