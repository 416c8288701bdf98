//! `quill decrypt` command implementation.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use quill_config::{CliSettings, Config};
use quill_crypt::{
    DecryptWidget, HeadingIndex, InteractiveBlockScanner, KdfParams, PageUnlocker, WidgetState,
    locked_blocks, reveal_block,
};
use quill_markup::Document;
use tracing::info;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the decrypt command.
#[derive(Args)]
pub(crate) struct DecryptArgs {
    /// Compiled HTML page.
    file: PathBuf,

    /// Password to unlock with.
    #[arg(short, long, env = "QUILL_PASSWORD", hide_env_values = true)]
    password: String,

    /// Path to configuration file (default: auto-discover quill.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PBKDF2 iteration count used when the page was built (overrides config).
    #[arg(long, env = "QUILL_ITERATIONS")]
    iterations: Option<u32>,
}

impl DecryptArgs {
    /// Execute the decrypt command.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be read or parsed, or the password
    /// opens none of its encrypted content.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            iterations: self.iterations,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let params = KdfParams {
            iterations: config.encryption.iterations,
        };

        let html = std::fs::read_to_string(&self.file).map_err(|source| CliError::Read {
            path: self.file.clone(),
            source,
        })?;
        let mut doc = Document::parse(&html)?;

        let unlocked = unlock(&mut doc, &self.password, params, config.widget.error_revert())?;
        let remaining = locked_blocks(&doc).len();

        output.content(&doc.serialize());
        if unlocked == 0 && remaining == 0 {
            output.warning("No encrypted content found");
        } else {
            output.success(&format!("Unlocked {unlocked} encrypted section(s)"));
        }
        if remaining > 0 {
            output.warning(&format!("{remaining} block(s) use a different password"));
        }
        Ok(())
    }
}

/// Unlock everything in `doc` that `password` opens: the page placeholder
/// first, then encrypted blocks, including blocks revealed by other blocks.
///
/// Returns the number of sections unlocked.
pub(crate) fn unlock(
    doc: &mut Document,
    password: &str,
    params: KdfParams,
    error_revert: Duration,
) -> Result<usize, CliError> {
    let mut unlocked = 0;

    if let Some(mut unlocker) = PageUnlocker::locate(doc, params, error_revert) {
        let job = unlocker.submit(password)?;
        let mut headings = HeadingIndex::default();
        let mut interactive = InteractiveBlockScanner::default();
        unlocker.complete(
            doc,
            job.run(),
            Instant::now(),
            &mut [&mut headings, &mut interactive],
        )?;
        if unlocker.state() != WidgetState::Unlocked {
            return Err(CliError::WrongPassword);
        }
        info!(
            headings = headings.entries.len(),
            interactive = interactive.found.len(),
            "page unlocked"
        );
        unlocked += 1;
    }

    let mut attempted_blocks = false;
    loop {
        let mut progressed = false;
        for block in locked_blocks(doc) {
            let Some(element) = doc.element(block) else {
                continue;
            };
            attempted_blocks = true;
            let mut widget = DecryptWidget::from_element(element, params, error_revert);
            let job = widget.submit(password)?;
            widget.complete(job.run(), Instant::now());
            if let Some(html) = widget.content() {
                reveal_block(doc, block, html)?;
                unlocked += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    if unlocked == 0 && attempted_blocks {
        return Err(CliError::WrongPassword);
    }
    Ok(unlocked)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use quill_crypt::{Compiler, EncryptionStage};
    use quill_markup::Pipeline;

    const PARAMS: KdfParams = KdfParams { iterations: 1000 };
    const REVERT: Duration = Duration::from_millis(10);

    fn compile(source: &str) -> Document {
        let compiler = Compiler::new(Pipeline::default(), EncryptionStage::new(PARAMS));
        let page = compiler.compile(source).unwrap();
        Document::parse(&page.html).unwrap()
    }

    #[test]
    fn test_unlock_page() {
        let mut doc = compile("---\npassword: pw\n---\nHidden\n");
        assert_eq!(unlock(&mut doc, "pw", PARAMS, REVERT).unwrap(), 1);
        assert_eq!(doc.serialize(), "<p>Hidden</p>");
    }

    #[test]
    fn test_unlock_page_wrong_password() {
        let mut doc = compile("---\npassword: pw\n---\nHidden\n");
        let result = unlock(&mut doc, "nope", PARAMS, REVERT);
        assert!(matches!(result, Err(CliError::WrongPassword)));
    }

    #[test]
    fn test_unlock_nested_blocks() {
        let source = ":::encrypted{password=\"pw\"}\nOuter\n\n:::encrypted{password=\"pw\"}\nInner\n:::\n:::\n";
        let mut doc = compile(source);
        assert_eq!(unlock(&mut doc, "pw", PARAMS, REVERT).unwrap(), 2);
        let html = doc.serialize();
        assert!(html.contains("<p>Outer</p>"));
        assert!(html.contains("<p>Inner</p>"));
        assert!(locked_blocks(&doc).is_empty());
    }

    #[test]
    fn test_blocks_with_other_password_stay_locked() {
        let source = ":::encrypted{password=\"a\"}\nOne\n:::\n\n:::encrypted{password=\"b\"}\nTwo\n:::\n";
        let mut doc = compile(source);
        assert_eq!(unlock(&mut doc, "a", PARAMS, REVERT).unwrap(), 1);
        assert_eq!(locked_blocks(&doc).len(), 1);
        assert!(doc.serialize().contains("<p>One</p>"));
    }

    #[test]
    fn test_unlock_plain_page_is_noop() {
        let mut doc = compile("Just text\n");
        assert_eq!(unlock(&mut doc, "pw", PARAMS, REVERT).unwrap(), 0);
        assert_eq!(doc.serialize(), "<p>Just text</p>");
    }
}
