//! Password unlock state machine for encrypted content.
//!
//! ```text
//! Locked --submit--> Decrypting --ok--> Unlocked
//!                        |
//!                        +--fail--> Error --revert delay--> Locked
//! ```
//!
//! The widget never runs the key derivation itself. [`DecryptWidget::submit`]
//! hands back a [`DecryptJob`] that the caller runs wherever it likes (a
//! worker thread, a rayon task) and feeds the [`DecryptOutcome`] back through
//! [`DecryptWidget::complete`]. Outcomes for an older attempt, or arriving
//! after [`DecryptWidget::unmount`], are discarded.

use std::fmt;
use std::time::{Duration, Instant};

use quill_markup::Element;
use tracing::debug;

use crate::cipher::{KdfParams, decrypt};
use crate::error::{DecryptError, WidgetError};
use crate::payload::EncryptedPayload;

/// Default time an error stays visible before the widget locks again.
pub const DEFAULT_ERROR_REVERT: Duration = Duration::from_secs(2);

/// Observable widget state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetState {
    Locked,
    Decrypting,
    Unlocked,
    Error,
}

/// Identifies one unlock attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DecryptTicket(u64);

/// A pending decryption. Owns the password until it runs.
pub struct DecryptJob {
    ticket: DecryptTicket,
    payload: EncryptedPayload,
    password: String,
    params: KdfParams,
}

impl DecryptJob {
    #[must_use]
    pub fn ticket(&self) -> DecryptTicket {
        self.ticket
    }

    /// Derive the key and decrypt. Consumes the job, dropping the password.
    #[must_use]
    pub fn run(self) -> DecryptOutcome {
        let result = decrypt(&self.payload, &self.password, self.params)
            .and_then(|bytes| String::from_utf8(bytes).map_err(|_| DecryptError));
        DecryptOutcome {
            ticket: self.ticket,
            result,
        }
    }
}

impl fmt::Debug for DecryptJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptJob")
            .field("ticket", &self.ticket)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Result of a [`DecryptJob`].
#[derive(Debug)]
pub struct DecryptOutcome {
    pub ticket: DecryptTicket,
    /// Decrypted HTML.
    pub result: Result<String, DecryptError>,
}

#[derive(Debug)]
enum Phase {
    Locked,
    Decrypting(DecryptTicket),
    Unlocked(String),
    Error { since: Instant },
}

/// Unlock widget for one encrypted element.
#[derive(Debug)]
pub struct DecryptWidget {
    payload: Option<EncryptedPayload>,
    params: KdfParams,
    error_revert: Duration,
    phase: Phase,
    generation: u64,
    mounted: bool,
}

impl DecryptWidget {
    /// Create a locked widget. A `None` payload refuses every submission.
    #[must_use]
    pub fn new(payload: Option<EncryptedPayload>, params: KdfParams, error_revert: Duration) -> Self {
        Self {
            payload,
            params,
            error_revert,
            phase: Phase::Locked,
            generation: 0,
            mounted: true,
        }
    }

    /// Create a widget from an element's `data-cipher`/`data-iv`/`data-salt`.
    #[must_use]
    pub fn from_element(element: &Element, params: KdfParams, error_revert: Duration) -> Self {
        let payload = match EncryptedPayload::from_element(element) {
            Ok(payload) => Some(payload),
            Err(err) => {
                debug!("unusable encrypted payload: {err}");
                None
            }
        };
        Self::new(payload, params, error_revert)
    }

    #[must_use]
    pub fn state(&self) -> WidgetState {
        match self.phase {
            Phase::Locked => WidgetState::Locked,
            Phase::Decrypting(_) => WidgetState::Decrypting,
            Phase::Unlocked(_) => WidgetState::Unlocked,
            Phase::Error { .. } => WidgetState::Error,
        }
    }

    /// Decrypted HTML, once unlocked.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match &self.phase {
            Phase::Unlocked(html) => Some(html),
            _ => None,
        }
    }

    /// Input is accepted only while locked.
    #[must_use]
    pub fn accepts_input(&self) -> bool {
        self.mounted && self.payload.is_some() && matches!(self.phase, Phase::Locked)
    }

    /// Whether `ticket` is the attempt currently in flight.
    #[must_use]
    pub fn is_pending(&self, ticket: DecryptTicket) -> bool {
        self.mounted && matches!(self.phase, Phase::Decrypting(current) if current == ticket)
    }

    /// Start an unlock attempt.
    pub fn submit(&mut self, password: &str) -> Result<DecryptJob, WidgetError> {
        if !self.mounted {
            return Err(WidgetError::Unmounted);
        }
        match self.phase {
            Phase::Decrypting(_) | Phase::Error { .. } => return Err(WidgetError::Busy),
            Phase::Unlocked(_) => return Err(WidgetError::AlreadyUnlocked),
            Phase::Locked => {}
        }
        if password.is_empty() {
            return Err(WidgetError::EmptyPassword);
        }
        let payload = self.payload.clone().ok_or(WidgetError::NoPayload)?;

        self.generation += 1;
        let ticket = DecryptTicket(self.generation);
        self.phase = Phase::Decrypting(ticket);
        debug!(?ticket, "unlock attempt started");
        Ok(DecryptJob {
            ticket,
            payload,
            password: password.to_owned(),
            params: self.params,
        })
    }

    /// Apply a finished attempt. Returns `false` if the outcome was stale.
    pub fn complete(&mut self, outcome: DecryptOutcome, now: Instant) -> bool {
        if !self.is_pending(outcome.ticket) {
            debug!(ticket = ?outcome.ticket, "ignoring stale decrypt outcome");
            return false;
        }
        self.phase = match outcome.result {
            Ok(html) => Phase::Unlocked(html),
            Err(DecryptError) => Phase::Error { since: now },
        };
        true
    }

    /// Advance timers. Returns `true` if the widget reverted to locked.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Phase::Error { since } = self.phase
            && now.saturating_duration_since(since) >= self.error_revert
        {
            self.phase = Phase::Locked;
            return true;
        }
        false
    }

    /// Detach the widget. Any attempt still in flight becomes stale.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.generation += 1;
    }
}
