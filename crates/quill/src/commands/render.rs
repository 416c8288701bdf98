//! `quill render` command implementation.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::Args;
use quill_config::{CliSettings, Config};
use quill_crypt::{CompiledPage, Compiler, EncryptionStage, KdfParams};
use quill_markup::{MarkupOptions, Pipeline, escape_html};
use rayon::prelude::*;
use tracing::debug;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Markdown files to render (default: every `.md` file in the source directory).
    files: Vec<PathBuf>,

    /// Path to configuration file (default: auto-discover quill.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// PBKDF2 iteration count (overrides config).
    #[arg(long, env = "QUILL_ITERATIONS")]
    iterations: Option<u32>,

    /// Leave encrypted blocks without a password unencrypted instead of failing.
    #[arg(long)]
    lenient_passwords: bool,
}

/// What happened to one rendered file.
struct RenderReport {
    target: PathBuf,
    warnings: Vec<String>,
    encrypted_blocks: usize,
    document_encrypted: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or any file fails to render.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            output_dir: self.output_dir,
            iterations: self.iterations,
            strict_passwords: self.lenient_passwords.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            output.info(&format!("Using {}", path.display()));
        }

        let files = if self.files.is_empty() {
            collect_sources(&config.build_resolved.source_dir)?
        } else {
            self.files
        };
        if files.is_empty() {
            output.warning("No markdown files found");
            return Ok(());
        }

        let out_dir = &config.build_resolved.output_dir;
        std::fs::create_dir_all(out_dir)?;
        output.highlight(&format!(
            "Rendering {} file(s) to {}",
            files.len(),
            out_dir.display()
        ));

        let compiler = compiler_from_config(&config);
        let results: Vec<(&PathBuf, Result<RenderReport, CliError>)> = files
            .par_iter()
            .map(|path| (path, render_file(&compiler, path, out_dir)))
            .collect();

        let mut failed = 0;
        for (path, result) in results {
            match result {
                Ok(report) => {
                    for warning in &report.warnings {
                        output.warning(&format!("{}: {warning}", path.display()));
                    }
                    let mut line = format!("{} -> {}", path.display(), report.target.display());
                    if report.document_encrypted {
                        line.push_str(" (encrypted)");
                    } else if report.encrypted_blocks > 0 {
                        write!(line, " ({} encrypted block(s))", report.encrypted_blocks).unwrap();
                    }
                    output.success(&line);
                }
                Err(err) => {
                    failed += 1;
                    output.error(&format!("{}: {err}", path.display()));
                }
            }
        }

        if failed > 0 {
            return Err(CliError::Failed(failed, files.len()));
        }
        Ok(())
    }
}

/// Build a compiler from loaded configuration.
pub(crate) fn compiler_from_config(config: &Config) -> Compiler {
    let options = MarkupOptions {
        containers: config.markup.containers,
        hexo_tags: config.markup.hexo_tags,
        inline_syntax: config.markup.inline_syntax,
        attributes: config.markup.attributes,
        max_container_depth: config.markup.max_container_depth,
        ..MarkupOptions::default()
    };
    let stage = EncryptionStage::new(KdfParams {
        iterations: config.encryption.iterations,
    })
    .with_strict_passwords(config.encryption.strict_passwords);
    Compiler::new(Pipeline::new(options), stage)
}

/// Markdown files below `dir`, sorted. Hidden entries are skipped.
fn collect_sources(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|source| CliError::Read {
            path: current.clone(),
            source,
        })?;
        for entry in entries {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'));
            if hidden {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
    }
    files.sort();
    debug!(count = files.len(), dir = %dir.display(), "collected sources");
    Ok(files)
}

fn render_file(compiler: &Compiler, path: &Path, out_dir: &Path) -> Result<RenderReport, CliError> {
    let source = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let page = compiler.compile(&source)?;

    let stem = path.file_stem().unwrap_or(path.as_os_str());
    let target = out_dir.join(stem).with_extension("html");
    std::fs::write(&target, page_document(&page))?;

    Ok(RenderReport {
        target,
        warnings: page.warnings,
        encrypted_blocks: page.encrypted_blocks,
        document_encrypted: page.document_encrypted,
    })
}

/// Wrap compiled content in a standalone HTML document.
fn page_document(page: &CompiledPage) -> String {
    let mut out = String::with_capacity(page.html.len() + 256);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n");
    if let Some(title) = &page.title {
        writeln!(out, "<title>{}</title>", escape_html(title)).unwrap();
    }
    if let Some(description) = &page.description {
        writeln!(
            out,
            r#"<meta name="description" content="{}" />"#,
            escape_html(description)
        )
        .unwrap();
    }
    out.push_str("</head>\n<body>\n<article>");
    out.push_str(&page.html);
    out.push_str("</article>\n</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fast_config(dir: &Path) -> Config {
        std::fs::write(
            dir.join("quill.toml"),
            "[encryption]\niterations = 1000\n\n[markup]\nhexo_tags = false\n",
        )
        .unwrap();
        Config::load(Some(&dir.join("quill.toml")), None).unwrap()
    }

    #[test]
    fn test_compiler_from_config() {
        let dir = TempDir::new().unwrap();
        let config = fast_config(dir.path());
        let compiler = compiler_from_config(&config);
        assert_eq!(compiler.stage().params().iterations, 1000);
        assert!(!compiler.pipeline().options().hexo_tags);
        assert!(compiler.pipeline().options().containers);
    }

    #[test]
    fn test_render_file_writes_document() {
        let dir = TempDir::new().unwrap();
        let config = fast_config(dir.path());
        let post = dir.path().join("hello.md");
        std::fs::write(&post, "---\ntitle: A & B\n---\n==hi==\n").unwrap();

        let report = render_file(&compiler_from_config(&config), &post, dir.path()).unwrap();
        assert_eq!(report.target, dir.path().join("hello.html"));
        assert!(!report.document_encrypted);

        let written = std::fs::read_to_string(&report.target).unwrap();
        assert!(written.contains("<title>A &amp; B</title>"));
        assert!(written.contains("<article><p><mark>hi</mark></p></article>"));
    }

    #[test]
    fn test_render_file_missing_password_fails() {
        let dir = TempDir::new().unwrap();
        let config = fast_config(dir.path());
        let post = dir.path().join("bad.md");
        std::fs::write(&post, ":::encrypted\nsecret\n:::\n").unwrap();

        let result = render_file(&compiler_from_config(&config), &post, dir.path());
        assert!(matches!(result, Err(CliError::Compile(_))));
        assert!(!dir.path().join("bad.html").exists());
    }

    #[test]
    fn test_collect_sources_skips_hidden_and_other_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::create_dir_all(root.join(".drafts")).unwrap();
        std::fs::write(root.join("b.md"), "").unwrap();
        std::fs::write(root.join("nested/a.md"), "").unwrap();
        std::fs::write(root.join(".drafts/c.md"), "").unwrap();
        std::fs::write(root.join("notes.txt"), "").unwrap();

        let files = collect_sources(root).unwrap();
        assert_eq!(files, vec![root.join("b.md"), root.join("nested/a.md")]);
    }
}
