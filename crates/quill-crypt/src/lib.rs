//! Password-protected content for quill.
//!
//! Build time: [`EncryptionStage`] replaces `.encrypted-block` subtrees, or a
//! whole page with a front matter password, by AES-256-GCM ciphertext keyed
//! with PBKDF2-HMAC-SHA256. [`Compiler`] runs it after the markup pipeline.
//!
//! Read time: [`DecryptWidget`] is the unlock state machine for one encrypted
//! element, and [`PageUnlocker`] splices a decrypted page back into its tree
//! and notifies [`PageObserver`]s.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//!
//! use quill_crypt::{Compiler, EncryptionStage, KdfParams, PageUnlocker, WidgetState};
//! use quill_markup::{Document, Pipeline};
//!
//! let params = KdfParams { iterations: 1000 };
//! let compiler = Compiler::new(Pipeline::default(), EncryptionStage::new(params));
//! let page = compiler.compile("---\npassword: pw\n---\nHello\n").unwrap();
//! assert!(!page.html.contains("Hello"));
//!
//! let mut doc = Document::parse(&page.html).unwrap();
//! let mut unlocker = PageUnlocker::locate(&doc, params, Duration::from_secs(2)).unwrap();
//! let job = unlocker.submit("pw").unwrap();
//! unlocker.complete(&mut doc, job.run(), Instant::now(), &mut []).unwrap();
//! assert_eq!(unlocker.state(), WidgetState::Unlocked);
//! assert_eq!(doc.serialize(), "<p>Hello</p>");
//! ```

mod cipher;
mod compile;
mod error;
mod page;
mod payload;
mod stage;
mod widget;

pub use cipher::{DEFAULT_ITERATIONS, KEY_LEN, KdfParams, decrypt, encrypt};
pub use compile::{CompiledPage, Compiler};
pub use error::{
    CompileError, CryptoError, DecryptError, EncryptError, PayloadError, UnlockError, WidgetError,
};
pub use page::{
    HeadingIndex, InteractiveBlockScanner, InteractiveKind, PageEvent, PageObserver, PageUnlocker,
    locked_blocks, reveal_block,
};
pub use payload::{
    CIPHER_ATTR, EncryptedPayload, IV_ATTR, IV_LEN, SALT_ATTR, SALT_LEN, SEARCH_IGNORE_ATTR,
};
pub use stage::{BLOCK_CLASS, EncryptionStage, EncryptionSummary, POST_CLASS};
pub use widget::{
    DEFAULT_ERROR_REVERT, DecryptJob, DecryptOutcome, DecryptTicket, DecryptWidget, WidgetState,
};
