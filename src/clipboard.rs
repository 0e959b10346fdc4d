//! System clipboard access behind a trait seam.
//!
//! The watcher only needs "give me the current text, if any"; platform
//! details and the empty-clipboard quirks of each backend stay behind
//! [`ClipboardSource`]. Tests substitute a scripted source.

use arboard::Clipboard;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard read failed: {0}")]
    Read(String),
}

/// Reads the system clipboard.
///
/// `Ok(None)` means the clipboard holds no text (empty, or an image or
/// other non-text format). Errors are reserved for the backend itself
/// failing.
pub trait ClipboardSource: Send {
    fn read_text(&mut self) -> Result<Option<String>, ClipboardError>;
}

/// arboard-backed source. The `Clipboard` handle is kept open for the
/// daemon's lifetime; reconnecting per poll is costly on X11.
pub struct SystemClipboard {
    inner: Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl ClipboardSource for SystemClipboard {
    fn read_text(&mut self) -> Result<Option<String>, ClipboardError> {
        match self.inner.get_text() {
            Ok(text) => Ok(Some(text)),
            // arboard reports an empty or non-text clipboard as an
            // error variant, not as empty text.
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }
}
