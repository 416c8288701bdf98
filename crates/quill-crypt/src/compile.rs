//! Source-to-HTML compilation with encryption.

use quill_markup::{Pipeline, TocEntry};
use tracing::debug;

use crate::error::CompileError;
use crate::stage::EncryptionStage;

/// A finished page, safe to publish.
#[derive(Clone, Debug)]
pub struct CompiledPage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub toc: Vec<TocEntry>,
    pub html: String,
    pub encrypted_blocks: usize,
    pub document_encrypted: bool,
    pub warnings: Vec<String>,
}

/// Runs the markup pipeline and then the encryption stage.
pub struct Compiler {
    pipeline: Pipeline,
    stage: EncryptionStage,
}

impl Compiler {
    #[must_use]
    pub fn new(pipeline: Pipeline, stage: EncryptionStage) -> Self {
        Self { pipeline, stage }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn stage(&self) -> &EncryptionStage {
        &self.stage
    }

    /// Compile one source file.
    ///
    /// Fails rather than returning a page with unencrypted protected content.
    pub fn compile(&self, source: &str) -> Result<CompiledPage, CompileError> {
        let mut page = self.pipeline.render(source)?;
        let summary = self.stage.apply(&mut page)?;
        let html = page.content.to_html();
        debug!(bytes = html.len(), "page compiled");

        Ok(CompiledPage {
            title: page.title,
            description: page.front_matter.description,
            tags: page.front_matter.tags,
            toc: page.toc,
            html,
            encrypted_blocks: summary.blocks,
            document_encrypted: summary.document,
            warnings: page.warnings,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Pipeline::default(), EncryptionStage::default())
    }
}
