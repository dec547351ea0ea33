use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Destination for text copied out of the terminal.
///
/// The engine writes the active selection here on copy, and the session routes
/// OSC 52 clipboard requests here as well.
pub trait ClipboardSink {
    /// Replaces the clipboard contents with `text`.
    fn store(&mut self, text: &str) -> Result<()>;
}

/// The system clipboard, backed by arboard.
///
/// The connection to the display server is opened on first use, so creating
/// one is free and works in headless environments.
///
/// ```no_run
/// use gpui_embedded_terminal::clipboard::{ClipboardSink, SystemClipboard};
///
/// let mut clipboard = SystemClipboard::new();
/// clipboard.store("Selected terminal text").unwrap();
/// ```
#[derive(Default)]
pub struct SystemClipboard {
    clipboard: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection(&mut self) -> Result<&mut arboard::Clipboard> {
        if self.clipboard.is_none() {
            let clipboard = arboard::Clipboard::new().context("failed to open system clipboard")?;
            self.clipboard = Some(clipboard);
        }
        self.clipboard
            .as_mut()
            .context("system clipboard is unavailable")
    }
}

impl ClipboardSink for SystemClipboard {
    fn store(&mut self, text: &str) -> Result<()> {
        self.connection()?
            .set_text(text)
            .context("failed to write to system clipboard")
    }
}

/// An in-process clipboard. Clones share the same history.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    entries: Arc<Mutex<Vec<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently stored text.
    pub fn last(&self) -> Option<String> {
        self.entries.lock().last().cloned()
    }

    /// Everything stored so far, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn store(&mut self, text: &str) -> Result<()> {
        self.entries.lock().push(text.to_string());
        Ok(())
    }
}
