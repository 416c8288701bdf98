//! Build-time encryption of rendered pages.

use std::collections::HashSet;

use quill_markup::{Document, Element, NodeId, PASSWORD_ATTR, PageContent, RenderedPage};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cipher::{KdfParams, encrypt};
use crate::error::EncryptError;
use crate::payload::{CIPHER_ATTR, EncryptedPayload};

/// Class of a block-mode encrypted container.
pub const BLOCK_CLASS: &str = "encrypted-block";
/// Class of the element replacing a whole encrypted page.
pub const POST_CLASS: &str = "encrypted-post";

/// What [`EncryptionStage::apply`] did to a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncryptionSummary {
    pub blocks: usize,
    pub document: bool,
}

/// Encrypts `.encrypted-block` subtrees and password-protected pages.
///
/// Runs last: the plaintext it protects is the final HTML produced by every
/// earlier pass.
#[derive(Clone, Debug)]
pub struct EncryptionStage {
    params: KdfParams,
    strict_passwords: bool,
}

struct BlockJob {
    node: NodeId,
    password: String,
    html: String,
}

impl EncryptionStage {
    /// Create a stage that rejects blocks without a password.
    #[must_use]
    pub fn new(params: KdfParams) -> Self {
        Self {
            params,
            strict_passwords: true,
        }
    }

    /// When `false`, blocks without a password are left unencrypted with a
    /// warning instead of failing the page.
    #[must_use]
    pub fn with_strict_passwords(mut self, strict: bool) -> Self {
        self.strict_passwords = strict;
        self
    }

    #[must_use]
    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Encrypt every encrypted block in `doc`, innermost blocks first.
    ///
    /// Returns the number of blocks encrypted. On error `doc` may hold a mix
    /// of encrypted and plaintext blocks and must be discarded.
    pub fn encrypt_blocks(
        &self,
        doc: &mut Document,
        warnings: &mut Vec<String>,
    ) -> Result<usize, EncryptError> {
        let blocks = find_blocks(doc);
        let mut by_depth: Vec<Vec<NodeId>> = Vec::new();
        for (index, &(node, depth)) in blocks.iter().enumerate() {
            let has_password = doc
                .element(node)
                .and_then(|el| el.attr(PASSWORD_ATTR))
                .is_some_and(|pw| !pw.is_empty());
            if has_password {
                if by_depth.len() <= depth {
                    by_depth.resize_with(depth + 1, Vec::new);
                }
                by_depth[depth].push(node);
            } else if self.strict_passwords {
                return Err(EncryptError::MissingPassword { index });
            } else {
                let message = format!("encrypted block {index} has no password, left unencrypted");
                warn!("{message}");
                warnings.push(message);
            }
        }

        let mut encrypted = 0;
        for batch in by_depth.into_iter().rev().filter(|batch| !batch.is_empty()) {
            let jobs: Vec<BlockJob> = batch
                .into_iter()
                .filter_map(|node| {
                    let password = doc.element_mut(node)?.remove_attr(PASSWORD_ATTR)?;
                    Some(BlockJob {
                        node,
                        password,
                        html: doc.serialize_children(node),
                    })
                })
                .collect();
            debug!(blocks = jobs.len(), "encrypting batch");

            let params = self.params;
            let sealed: Vec<(NodeId, EncryptedPayload)> = jobs
                .into_par_iter()
                .map(|job| {
                    let payload = encrypt(job.html.as_bytes(), &job.password, params)?;
                    Ok::<_, EncryptError>((job.node, payload))
                })
                .collect::<Result<_, EncryptError>>()?;

            for (node, payload) in sealed {
                doc.take_children(node);
                if let Some(element) = doc.element_mut(node) {
                    payload.write_attrs(element);
                }
                encrypted += 1;
            }
        }

        strip_passwords(doc);
        Ok(encrypted)
    }

    /// Encrypt a whole document, returning the placeholder that replaces it.
    pub fn encrypt_document(&self, doc: &Document, password: &str) -> Result<Document, EncryptError> {
        let html = doc.serialize();
        let payload = encrypt(html.as_bytes(), password, self.params)?;

        let mut out = Document::new();
        let mut element = Element::new("div");
        element.add_class(POST_CLASS);
        payload.write_attrs(&mut element);
        let node = out.create_element(element);
        out.append(out.root(), node);
        Ok(out)
    }

    /// Encrypt a rendered page in place: blocks first, then the whole page if
    /// its front matter sets a password.
    ///
    /// Table of contents entries that point into encrypted content are
    /// removed, and the front matter password is cleared.
    pub fn apply(&self, page: &mut RenderedPage) -> Result<EncryptionSummary, EncryptError> {
        let password = page.front_matter.password.take().filter(|pw| !pw.is_empty());
        let doc = match &mut page.content {
            PageContent::Tree(doc) => doc,
            PageContent::Raw(html) => {
                if password.is_some() || html.contains(PASSWORD_ATTR) {
                    return Err(EncryptError::Unparsed);
                }
                return Ok(EncryptionSummary::default());
            }
        };

        let hidden = hidden_ids(doc);
        let blocks = self.encrypt_blocks(doc, &mut page.warnings)?;
        page.toc.retain(|entry| !hidden.contains(&entry.id));

        let mut summary = EncryptionSummary {
            blocks,
            document: false,
        };
        if let Some(password) = password {
            *doc = self.encrypt_document(doc, &password)?;
            page.toc.clear();
            summary.document = true;
        }
        if summary != EncryptionSummary::default() {
            info!(blocks = summary.blocks, document = summary.document, "encrypted page content");
        }
        Ok(summary)
    }
}

impl Default for EncryptionStage {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

/// Plaintext encrypted blocks with their nesting depth, in document order.
///
/// A block is a scanner-emitted `.encrypted-block` carrying `data-password`
/// (empty when the directive had none). The class alone, as added by
/// attribute decoration, does not make a block.
fn find_blocks(doc: &Document) -> Vec<(NodeId, usize)> {
    let mut out = Vec::new();
    let mut stack: Vec<(NodeId, usize)> =
        doc.children(doc.root()).iter().rev().map(|&id| (id, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        let is_block = doc.element(node).is_some_and(|el| {
            el.has_class(BLOCK_CLASS)
                && el.attr(PASSWORD_ATTR).is_some()
                && el.attr(CIPHER_ATTR).is_none()
        });
        if is_block {
            out.push((node, depth));
        }
        let child_depth = if is_block { depth + 1 } else { depth };
        stack.extend(doc.children(node).iter().rev().map(|&child| (child, child_depth)));
    }
    out
}

/// Ids of elements inside blocks that carry a password.
fn hidden_ids(doc: &Document) -> HashSet<String> {
    let mut ids = HashSet::new();
    for (node, _) in find_blocks(doc) {
        if doc.element(node).and_then(|el| el.attr(PASSWORD_ATTR)).is_none_or(str::is_empty) {
            continue;
        }
        for inner in doc.descendants(node) {
            if let Some(id) = doc.element(inner).and_then(|el| el.attr("id")) {
                ids.insert(id.to_owned());
            }
        }
    }
    ids
}

fn strip_passwords(doc: &mut Document) {
    for node in doc.descendants(doc.root()) {
        if let Some(element) = doc.element_mut(node)
            && element.remove_attr(PASSWORD_ATTR).is_some()
        {
            debug!(tag = %element.tag, "removed stray password attribute");
        }
    }
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::EncryptionStage: Send, Sync);

    use super::*;

    use pretty_assertions::assert_eq;
    use quill_markup::Pipeline;

    use crate::cipher::decrypt;

    const FAST: KdfParams = KdfParams { iterations: 1000 };

    fn stage() -> EncryptionStage {
        EncryptionStage::new(FAST)
    }

    fn render(source: &str) -> RenderedPage {
        Pipeline::default().render(source).unwrap()
    }

    fn tree(page: &RenderedPage) -> &Document {
        match &page.content {
            PageContent::Tree(doc) => doc,
            PageContent::Raw(_) => panic!("expected tree"),
        }
    }

    fn decrypt_node(doc: &Document, node: NodeId, password: &str) -> String {
        let payload = EncryptedPayload::from_element(doc.element(node).unwrap()).unwrap();
        String::from_utf8(decrypt(&payload, password, FAST).unwrap()).unwrap()
    }

    #[test]
    fn test_block_encrypted_and_emptied() {
        let mut page = render("Intro\n\n:::encrypted{password=\"pw\"}\nSecret **text**\n:::\n");
        let summary = stage().apply(&mut page).unwrap();
        assert_eq!(summary, EncryptionSummary { blocks: 1, document: false });

        let doc = tree(&page);
        let block = doc.find_by_class(doc.root(), BLOCK_CLASS)[0];
        assert!(doc.children(block).is_empty());
        let element = doc.element(block).unwrap();
        assert_eq!(element.attr("data-pagefind-ignore"), Some("all"));
        assert_eq!(element.attr(PASSWORD_ATTR), None);

        let html = doc.serialize();
        assert!(!html.contains("Secret"));
        assert!(!html.contains("data-password"));
        assert!(!html.contains("\"pw\""));
        assert!(html.starts_with("<p>Intro</p>"));

        assert_eq!(
            decrypt_node(doc, block, "pw").trim(),
            "<p>Secret <strong>text</strong></p>"
        );
    }

    #[test]
    fn test_nested_blocks_encrypted_inner_first() {
        let source = ":::encrypted{password=\"outer\"}\nA\n\n:::encrypted{password=\"inner\"}\nB\n:::\n:::\n";
        let mut page = render(source);
        assert_eq!(stage().apply(&mut page).unwrap().blocks, 2);

        let doc = tree(&page);
        let outer = doc.find_by_class(doc.root(), BLOCK_CLASS)[0];
        let revealed = decrypt_node(doc, outer, "outer");
        assert!(revealed.contains("<p>A</p>"));
        assert!(revealed.contains("data-cipher"));
        assert!(!revealed.contains("<p>B</p>"));

        let inner_doc = Document::parse(&revealed).unwrap();
        let inner = inner_doc.find_by_class(inner_doc.root(), BLOCK_CLASS)[0];
        assert_eq!(decrypt_node(&inner_doc, inner, "inner").trim(), "<p>B</p>");
    }

    #[test]
    fn test_missing_password_strict_fails() {
        let mut page = render(":::encrypted\nSecret\n:::\n");
        let err = stage().apply(&mut page).unwrap_err();
        assert!(matches!(err, EncryptError::MissingPassword { index: 0 }));
    }

    #[test]
    fn test_missing_password_lenient_passes_through() {
        let mut page = render(":::encrypted\nVisible\n:::\n");
        let summary = stage().with_strict_passwords(false).apply(&mut page).unwrap();
        assert_eq!(summary.blocks, 0);
        assert_eq!(page.warnings.len(), 1);
        let html = page.content.to_html();
        assert!(html.contains("Visible"));
        assert!(!html.contains("data-password"));
    }

    #[test]
    fn test_document_mode_replaces_body() {
        let mut page = render("---\npassword: letmein\n---\n# Title\n\n## Part\n\nBody\n");
        assert_eq!(page.toc.len(), 1);
        let summary = stage().apply(&mut page).unwrap();
        assert!(summary.document);
        assert!(page.toc.is_empty());
        assert_eq!(page.front_matter.password, None);

        let doc = tree(&page);
        assert_eq!(doc.children(doc.root()).len(), 1);
        let post = doc.children(doc.root())[0];
        assert_eq!(doc.element(post).unwrap().attr("class"), Some(POST_CLASS));
        let html = decrypt_node(doc, post, "letmein");
        assert!(html.contains("<p>Body</p>"));
        assert!(!page.content.to_html().contains("letmein"));
    }

    #[test]
    fn test_toc_entries_inside_blocks_removed() {
        let mut page = render("# T\n\n## Public\n\n:::encrypted{password=\"pw\"}\n## Hidden\n:::\n");
        assert_eq!(page.toc.len(), 2);
        stage().apply(&mut page).unwrap();
        let titles: Vec<_> = page.toc.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Public"]);
    }

    #[test]
    fn test_decorated_class_is_not_a_block() {
        let mut page = render("Public note\n\n{.encrypted-block}\n");
        let summary = stage().apply(&mut page).unwrap();
        assert_eq!(summary, EncryptionSummary::default());
        assert_eq!(
            page.content.to_html(),
            r#"<p class="encrypted-block">Public note</p>"#
        );
    }

    #[test]
    fn test_raw_html_with_bare_ampersand_encrypts() {
        let mut page = render(":::encrypted{password=\"pw\"}\n<div>Tom & Jerry</div>\n:::\n");
        assert_eq!(stage().apply(&mut page).unwrap().blocks, 1);

        let doc = tree(&page);
        let block = doc.find_by_class(doc.root(), BLOCK_CLASS)[0];
        assert!(decrypt_node(doc, block, "pw").contains("<div>Tom &amp; Jerry</div>"));
    }

    #[test]
    fn test_stray_password_attribute_removed() {
        let mut doc = Document::parse(r#"<p data-password="x">hi</p>"#).unwrap();
        let count = stage().encrypt_blocks(&mut doc, &mut Vec::new()).unwrap();
        assert_eq!(count, 0);
        assert_eq!(doc.serialize(), "<p>hi</p>");
    }

    #[test]
    fn test_already_encrypted_block_untouched() {
        let html = r#"<div class="encrypted-block" data-cipher="AA==" data-iv="AA==" data-salt="AA=="></div>"#;
        let mut doc = Document::parse(html).unwrap();
        assert_eq!(stage().encrypt_blocks(&mut doc, &mut Vec::new()).unwrap(), 0);
        assert_eq!(doc.serialize(), html);
    }

    #[test]
    fn test_raw_content_with_password_is_error() {
        let mut page = render("plain");
        page.content = PageContent::Raw("<p>plain</p>".to_owned());
        page.front_matter.password = Some("pw".to_owned());
        assert!(matches!(stage().apply(&mut page), Err(EncryptError::Unparsed)));
    }
}
