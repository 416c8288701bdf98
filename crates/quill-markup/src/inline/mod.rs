//! Inline syntax passes.
//!
//! [`protected`] holds the text-level pass (sub/superscript) that runs before
//! markdown parsing; [`rewrite`] holds the event-level pass for ruby,
//! spoilers, insertions and marks.

mod protected;
mod rewrite;

pub use protected::{split_protected, sub_sup};
pub use rewrite::{InlineRewriter, Piece, pieces_to_html, rewrite_inline};
