//! Engine-side events.
//!
//! alacritty's [`Term`](alacritty_terminal::term::Term) reports side effects
//! (bell, title changes, OSC 52 clipboard writes) through its
//! [`EventListener`] trait. [`EngineEventProxy`] forwards the ones the session
//! cares about into a channel owned by the [`TerminalEngine`](crate::engine::TerminalEngine),
//! which hands them out through `drain_events`.
//!
//! ```text
//! Term → EngineEventProxy → mpsc channel → TerminalEngine::drain_events → TerminalSession
//! ```

use alacritty_terminal::event::{Event, EventListener};
use std::sync::mpsc::Sender;

/// Events emitted by the engine while it parses output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// BEL was received.
    Bell,

    /// The title was set (OSC 0/2). An empty string means the title was reset.
    Title(String),

    /// The program asked to place text on the clipboard (OSC 52).
    ClipboardStore(String),

    /// The engine was told the program on the other end exited.
    Exit,
}

/// Forwards alacritty events into the engine's event channel.
pub struct EngineEventProxy {
    tx: Sender<EngineEvent>,
}

impl EngineEventProxy {
    /// Creates a proxy sending into `tx`.
    pub fn new(tx: Sender<EngineEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: EngineEvent) {
        // The receiver lives in the engine; once it is gone nobody is listening.
        let _ = self.tx.send(event);
    }
}

impl EventListener for EngineEventProxy {
    fn send_event(&self, event: Event) {
        match event {
            Event::Bell => self.send(EngineEvent::Bell),
            Event::Title(title) => self.send(EngineEvent::Title(title)),
            Event::ResetTitle => self.send(EngineEvent::Title(String::new())),
            Event::ClipboardStore(_, data) => self.send(EngineEvent::ClipboardStore(data)),
            Event::Exit | Event::ChildExit(_) => self.send(EngineEvent::Exit),
            // Wakeups, PTY write-backs and colour/size queries have no consumer here.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alacritty_terminal::term::ClipboardType;
    use std::sync::mpsc::channel;

    #[test]
    fn test_bell_is_forwarded() {
        let (tx, rx) = channel();
        let proxy = EngineEventProxy::new(tx);

        proxy.send_event(Event::Bell);

        assert_eq!(rx.recv().unwrap(), EngineEvent::Bell);
    }

    #[test]
    fn test_reset_title_becomes_empty_title() {
        let (tx, rx) = channel();
        let proxy = EngineEventProxy::new(tx);

        proxy.send_event(Event::Title("build".into()));
        proxy.send_event(Event::ResetTitle);

        assert_eq!(rx.recv().unwrap(), EngineEvent::Title("build".into()));
        assert_eq!(rx.recv().unwrap(), EngineEvent::Title(String::new()));
    }

    #[test]
    fn test_clipboard_store_keeps_payload() {
        let (tx, rx) = channel();
        let proxy = EngineEventProxy::new(tx);

        proxy.send_event(Event::ClipboardStore(
            ClipboardType::Clipboard,
            "copied".to_string(),
        ));

        assert_eq!(
            rx.recv().unwrap(),
            EngineEvent::ClipboardStore("copied".into())
        );
    }

    #[test]
    fn test_wakeup_is_dropped() {
        let (tx, rx) = channel();
        let proxy = EngineEventProxy::new(tx);

        proxy.send_event(Event::Wakeup);
        proxy.send_event(Event::MouseCursorDirty);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = channel();
        let proxy = EngineEventProxy::new(tx);
        drop(rx);

        proxy.send_event(Event::Bell);
    }
}
