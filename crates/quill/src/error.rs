//! CLI error types.

use std::path::PathBuf;

use quill_config::ConfigError;
use quill_crypt::{CompileError, UnlockError, WidgetError};
use quill_markup::TreeError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("{0}")]
    Tree(#[from] TreeError),

    #[error("{0}")]
    Widget(#[from] WidgetError),

    #[error("{0}")]
    Unlock(#[from] UnlockError),

    #[error("wrong password or damaged content")]
    WrongPassword,

    #[error("{0} of {1} files failed")]
    Failed(usize, usize),
}
