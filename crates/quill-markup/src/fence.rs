//! Code fence tracking for the line scanner.
//!
//! Directive syntax inside fenced code is never interpreted, so the scanner
//! asks this tracker about every line before matching openers and closers.

/// An open fence: the marker character and the opening run length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
}

/// Tracks code fence state during line-by-line processing.
///
/// A fence opens on three or more backticks or tildes and closes on a run of
/// the same character that is at least as long, followed only by whitespace.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    open: Option<Fence>,
}

impl FenceTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether the last line seen left us inside a fenced block.
    pub(crate) fn in_fence(&self) -> bool {
        self.open.is_some()
    }

    /// Feed one line. Returns `true` if the line opened or closed a fence.
    pub(crate) fn update(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self.open {
            Some(fence) => {
                if closes(trimmed, fence) {
                    self.open = None;
                    return true;
                }
                false
            }
            None => {
                self.open = opening(trimmed);
                self.open.is_some()
            }
        }
    }
}

/// Count the leading run of `marker` characters.
fn run_len(trimmed: &str, marker: char) -> usize {
    trimmed.chars().take_while(|&c| c == marker).count()
}

fn opening(trimmed: &str) -> Option<Fence> {
    let marker = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = run_len(trimmed, marker);
    (len >= 3).then_some(Fence { marker, len })
}

fn closes(trimmed: &str, fence: Fence) -> bool {
    let len = run_len(trimmed, fence.marker);
    // Marker chars are ASCII, so `len` is also the byte offset.
    len >= fence.len && trimmed[len..].chars().all(char::is_whitespace)
}
