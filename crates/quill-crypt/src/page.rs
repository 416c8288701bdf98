//! Revealing decrypted content in a page tree.

use std::time::{Duration, Instant};

use quill_markup::{Document, NodeId, TocEntry};
use tracing::{debug, info};

use crate::cipher::KdfParams;
use crate::error::{DecryptError, UnlockError, WidgetError};
use crate::payload::{CIPHER_ATTR, IV_ATTR, SALT_ATTR, SEARCH_IGNORE_ATTR};
use crate::stage::{BLOCK_CLASS, POST_CLASS};
use crate::widget::{DecryptJob, DecryptOutcome, DecryptWidget, WidgetState};

/// Page-level notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    /// Decrypted content was inserted. `roots` are the new top-level nodes.
    ContentRevealed { roots: Vec<NodeId> },
}

/// A page feature that re-indexes content when it changes.
pub trait PageObserver {
    fn on_event(&mut self, doc: &Document, event: &PageEvent);
}

/// Unlocks a whole-page `.encrypted-post` placeholder.
#[derive(Debug)]
pub struct PageUnlocker {
    widget: DecryptWidget,
    placeholder: NodeId,
    revealed: bool,
}

impl PageUnlocker {
    /// Find the page placeholder in `doc`.
    #[must_use]
    pub fn locate(doc: &Document, params: KdfParams, error_revert: Duration) -> Option<Self> {
        let placeholder = *doc.find_by_class(doc.root(), POST_CLASS).first()?;
        let element = doc.element(placeholder)?;
        Some(Self {
            widget: DecryptWidget::from_element(element, params, error_revert),
            placeholder,
            revealed: false,
        })
    }

    #[must_use]
    pub fn widget(&self) -> &DecryptWidget {
        &self.widget
    }

    #[must_use]
    pub fn state(&self) -> WidgetState {
        self.widget.state()
    }

    pub fn submit(&mut self, password: &str) -> Result<DecryptJob, WidgetError> {
        self.widget.submit(password)
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.widget.tick(now)
    }

    pub fn unmount(&mut self) {
        self.widget.unmount();
    }

    /// Apply a finished attempt to the page.
    ///
    /// On success the placeholder is replaced by the decrypted content and
    /// every observer receives [`PageEvent::ContentRevealed`] once. Returns
    /// `Ok(false)` for a stale outcome.
    pub fn complete(
        &mut self,
        doc: &mut Document,
        outcome: DecryptOutcome,
        now: Instant,
        observers: &mut [&mut dyn PageObserver],
    ) -> Result<bool, UnlockError> {
        if !self.widget.is_pending(outcome.ticket) {
            return Ok(self.widget.complete(outcome, now));
        }
        let parsed = outcome.result.as_deref().ok().map(Document::parse);
        let fragment = match parsed {
            Some(Ok(fragment)) => Some(fragment),
            Some(Err(err)) => {
                self.fail(outcome, now);
                return Err(err.into());
            }
            None => None,
        };
        let Some(parent) = doc.parent(self.placeholder) else {
            self.fail(outcome, now);
            return Err(UnlockError::Detached);
        };

        self.widget.complete(outcome, now);
        let Some(fragment) = fragment else {
            return Ok(true);
        };
        if self.revealed {
            return Ok(true);
        }

        let roots = doc.import_children(&fragment);
        let siblings: Vec<NodeId> = doc
            .children(parent)
            .iter()
            .flat_map(|&child| {
                if child == self.placeholder {
                    roots.clone()
                } else {
                    vec![child]
                }
            })
            .collect();
        doc.set_children(parent, siblings);
        self.revealed = true;
        info!(nodes = roots.len(), "page content revealed");

        let event = PageEvent::ContentRevealed { roots };
        for observer in observers.iter_mut() {
            observer.on_event(doc, &event);
        }
        Ok(true)
    }

    fn fail(&mut self, outcome: DecryptOutcome, now: Instant) {
        self.widget.complete(
            DecryptOutcome {
                ticket: outcome.ticket,
                result: Err(DecryptError),
            },
            now,
        );
    }
}

/// Replace the children of an encrypted block with decrypted HTML and drop
/// its payload attributes. Returns the inserted nodes.
pub fn reveal_block(doc: &mut Document, block: NodeId, html: &str) -> Result<Vec<NodeId>, UnlockError> {
    let fragment = Document::parse(html)?;
    let roots = doc.import_children(&fragment);
    doc.set_children(block, roots.clone());
    if let Some(element) = doc.element_mut(block) {
        for attr in [CIPHER_ATTR, IV_ATTR, SALT_ATTR, SEARCH_IGNORE_ATTR] {
            element.remove_attr(attr);
        }
    }
    debug!(nodes = roots.len(), "block revealed");
    Ok(roots)
}

/// Encrypted blocks in `doc` that still carry a payload.
#[must_use]
pub fn locked_blocks(doc: &Document) -> Vec<NodeId> {
    doc.find_by_class(doc.root(), BLOCK_CLASS)
        .into_iter()
        .filter(|&node| doc.element(node).is_some_and(|el| el.attr(CIPHER_ATTR).is_some()))
        .collect()
}

/// Collects headings from revealed content.
#[derive(Debug, Default)]
pub struct HeadingIndex {
    pub entries: Vec<TocEntry>,
    pub runs: usize,
}

impl PageObserver for HeadingIndex {
    fn on_event(&mut self, doc: &Document, event: &PageEvent) {
        let PageEvent::ContentRevealed { roots } = event;
        self.runs += 1;
        for &root in roots {
            for node in std::iter::once(root).chain(doc.descendants(root)) {
                let Some(element) = doc.element(node) else {
                    continue;
                };
                let level = match element.tag.as_str() {
                    "h1" => 1,
                    "h2" => 2,
                    "h3" => 3,
                    "h4" => 4,
                    "h5" => 5,
                    "h6" => 6,
                    _ => continue,
                };
                let Some(id) = element.attr("id") else {
                    continue;
                };
                self.entries.push(TocEntry {
                    level,
                    title: doc.text_content(node).trim().to_owned(),
                    id: id.to_owned(),
                });
            }
        }
    }
}

/// Kinds of element that need client-side behaviour attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractiveKind {
    Tabs,
    Spoiler,
    Collapse,
    EncryptedBlock,
}

/// Finds interactive elements in revealed content.
#[derive(Debug, Default)]
pub struct InteractiveBlockScanner {
    pub found: Vec<(InteractiveKind, NodeId)>,
    pub runs: usize,
}

impl PageObserver for InteractiveBlockScanner {
    fn on_event(&mut self, doc: &Document, event: &PageEvent) {
        let PageEvent::ContentRevealed { roots } = event;
        self.runs += 1;
        for &root in roots {
            for node in std::iter::once(root).chain(doc.descendants(root)) {
                let Some(element) = doc.element(node) else {
                    continue;
                };
                let kind = if element.has_class("tabs-block") {
                    InteractiveKind::Tabs
                } else if element.has_class("spoiler") && element.attr("role") == Some("button") {
                    InteractiveKind::Spoiler
                } else if element.has_class("collapse-block") {
                    InteractiveKind::Collapse
                } else if element.has_class(BLOCK_CLASS) && element.attr(CIPHER_ATTR).is_some() {
                    InteractiveKind::EncryptedBlock
                } else {
                    continue;
                };
                self.found.push((kind, node));
            }
        }
    }
}
