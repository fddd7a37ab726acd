//! Copy-to-clipboard affordances.
//!
//! Every copyable block owns its own [`CopyAffordance`]. Triggering one
//! copies the exact block text, flips a one-shot `copied` flag and schedules
//! the flag's reset. While the flag is set the affordance is disabled.
//! Affordances never share state, so copying one block leaves the others
//! untouched.

use base64::Engine as _;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Default reset delay for code blocks.
pub const CODE_RESET: Duration = Duration::from_millis(2000);
/// Default reset delay for whole-document copies.
pub const DOCUMENT_RESET: Duration = Duration::from_millis(2500);

/// A system clipboard the affordance can write to.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> io::Result<()>;
}

// ── Affordance ───────────────────────────────────────────────────────────

pub struct CopyAffordance {
    text: String,
    reset_after: Duration,
    copied: Arc<AtomicBool>,
}

impl fmt::Debug for CopyAffordance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyAffordance")
            .field("text", &format_args!("<{} chars>", self.text.len()))
            .field("reset_after", &self.reset_after)
            .field("copied", &self.is_copied())
            .finish()
    }
}

impl CopyAffordance {
    pub fn new(text: impl Into<String>, reset_after: Duration) -> Self {
        Self {
            text: text.into(),
            reset_after,
            copied: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_copied(&self) -> bool {
        self.copied.load(Ordering::Acquire)
    }

    /// Disabled while copied, and always for empty text.
    pub fn is_enabled(&self) -> bool {
        !self.text.is_empty() && !self.is_copied()
    }

    /// Copy the text and enter the "copied" state.
    ///
    /// Returns `false` without touching the clipboard when the text is empty
    /// or the affordance is still in its "copied" state. A failed clipboard
    /// write is logged and leaves the state unchanged.
    pub fn trigger(&self, clipboard: &dyn Clipboard) -> bool {
        if self.text.is_empty() {
            return false;
        }
        if self
            .copied
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Copy ignored: still in copied state");
            return false;
        }

        if let Err(e) = clipboard.write_text(&self.text) {
            warn!("Clipboard write failed: {e}");
            self.copied.store(false, Ordering::Release);
            return false;
        }

        self.schedule_reset();
        true
    }

    fn schedule_reset(&self) {
        let flag = Arc::clone(&self.copied);
        let delay = self.reset_after;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    flag.store(false, Ordering::Release);
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    flag.store(false, Ordering::Release);
                });
            }
        }
    }
}

// ── Clipboards ───────────────────────────────────────────────────────────

/// Terminal clipboard via the OSC 52 escape sequence.
///
/// Most modern terminals (and tmux with `set-clipboard on`) forward the
/// base64 payload to the system clipboard, including over SSH.
pub struct Osc52Clipboard<W: Write + Send> {
    out: Mutex<W>,
}

impl Osc52Clipboard<io::Stderr> {
    /// Write the escape sequence to stderr so piped stdout stays clean.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build the OSC 52 "set clipboard" sequence for `text`.
pub fn osc52_sequence(text: &str) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{payload}\x07")
}

impl<W: Write + Send> Clipboard for Osc52Clipboard<W> {
    fn write_text(&self, text: &str) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        out.write_all(osc52_sequence(text).as_bytes())?;
        out.flush()
    }
}

/// In-process clipboard that keeps every write.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    writes: Mutex<Vec<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<String> {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> io::Result<()> {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }
}
