//! Error types for content encryption and unlocking.

use quill_markup::{PipelineError, TreeError};

/// Key derivation or cipher setup failed.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// PBKDF2 rejected its parameters.
    #[error("key derivation failed")]
    Kdf,

    /// AES-256-GCM rejected the key or failed to seal.
    #[error("encryption failed")]
    Cipher,
}

/// Decryption failed.
///
/// Deliberately carries no detail: a wrong password and a damaged payload
/// look the same.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("decryption failed")]
pub struct DecryptError;

/// An encrypted element's payload attributes are missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("missing {0} attribute")]
    Missing(&'static str),

    #[error("invalid base64 in {attr}")]
    Base64 {
        attr: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{attr} must be {expected} bytes, got {actual}")]
    Length {
        attr: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// The encryption stage could not produce safe output.
#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    /// An encrypted block has no password and strict mode is on.
    #[error("encrypted block {index} has no password")]
    MissingPassword { index: usize },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Content that must be encrypted was never parsed into a tree.
    #[error("page content needs encryption but could not be parsed")]
    Unparsed,
}

/// Rendering or encrypting a page failed.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("render failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("encryption failed: {0}")]
    Encrypt(#[from] EncryptError),
}

/// The widget refused a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    /// An attempt is in flight or an error is still on screen.
    #[error("an unlock attempt is already in progress")]
    Busy,

    #[error("content is already unlocked")]
    AlreadyUnlocked,

    /// The element carries no usable payload.
    #[error("no encrypted payload to unlock")]
    NoPayload,

    #[error("password is empty")]
    EmptyPassword,

    #[error("widget is unmounted")]
    Unmounted,
}

/// Revealing decrypted content in a page failed.
#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    #[error("decrypted content could not be parsed: {0}")]
    Tree(#[from] TreeError),

    /// The placeholder is no longer attached to the page.
    #[error("encrypted placeholder is detached")]
    Detached,
}
