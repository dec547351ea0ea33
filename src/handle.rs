//! The terminal control surface.
//!
//! A [`TerminalHandle`] is what a parent component keeps to drive the
//! terminal. It is a weak reference to the session: it stays valid across
//! re-renders, can be cloned freely, and silently does nothing once the
//! session has not been mounted yet or has been torn down.

use crate::engine::TerminalEngine;
use crate::fit::CellMetrics;
use crate::session::{SessionCore, SessionState};
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};

/// Stable, non-failing access to a terminal session.
///
/// ```
/// # use gpui::{Edges, px};
/// # use gpui_embedded_terminal::{HostContainer, ResizeBus, SessionOptions, TerminalSession};
/// let host = HostContainer::new(Edges::all(px(0.0)), px(0.0));
/// let session = TerminalSession::new(SessionOptions::default(), &host, &ResizeBus::new());
/// let handle = session.handle();
///
/// // Before mount every call is a no-op.
/// handle.writeln("ignored");
///
/// session.mount();
/// handle.writeln("$ ls");
/// handle.clear();
/// ```
#[derive(Clone)]
pub struct TerminalHandle {
    core: Weak<Mutex<SessionCore>>,
}

impl TerminalHandle {
    pub(crate) fn new(core: Weak<Mutex<SessionCore>>) -> Self {
        Self { core }
    }

    fn with_core(&self, operation: &str, f: impl FnOnce(&mut SessionCore)) {
        let Some(core) = self.core.upgrade() else {
            tracing::trace!(operation, "terminal handle used after teardown");
            return;
        };
        match Self::lock(&core) {
            Some(mut core) => f(&mut *core),
            None => tracing::warn!(operation, "terminal session is busy, call dropped"),
        }
    }

    // Reentrant calls (from inside an engine callback) must not deadlock.
    fn lock(core: &Arc<Mutex<SessionCore>>) -> Option<MutexGuard<'_, SessionCore>> {
        core.try_lock()
    }

    /// Erases the screen and the scrollback.
    pub fn clear(&self) {
        self.with_core("clear", SessionCore::clear);
    }

    /// Writes `data` without a line break, then refits.
    pub fn write(&self, data: &str) {
        self.with_core("write", |core| core.write(data));
    }

    /// Writes `data` followed by a line break, then refits.
    pub fn writeln(&self, data: &str) {
        self.with_core("writeln", |core| core.writeln(data));
    }

    /// Whether the session is mounted and live.
    pub fn is_live(&self) -> bool {
        self.core
            .upgrade()
            .and_then(|core| Self::lock(&core).map(|core| core.state() == SessionState::Active))
            .unwrap_or(false)
    }

    /// Whether both handles control the same session.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.core.ptr_eq(&other.core)
    }

    pub(crate) fn layout(&self, metrics: CellMetrics, geometry_changed: bool) {
        self.with_core("layout", |core| {
            core.set_cell_metrics(metrics);
            core.layout(geometry_changed);
        });
    }

    pub(crate) fn with_engine<R>(&self, f: impl FnOnce(&TerminalEngine) -> R) -> Option<R> {
        let core = self.core.upgrade()?;
        let core = Self::lock(&core)?;
        core.engine().map(f)
    }
}

impl std::fmt::Debug for TerminalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalHandle")
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::fit::{CellMetrics, GridSize};
    use crate::host::HostContainer;
    use crate::resize::ResizeBus;
    use crate::session::{SessionOptions, TerminalSession};
    use gpui::{Edges, px};

    fn session() -> (TerminalSession, std::sync::Arc<HostContainer>) {
        let host = HostContainer::new(Edges::all(px(0.0)), px(0.0));
        host.set_size(px(400.0), px(200.0));
        let options = SessionOptions {
            cell_metrics: CellMetrics::new(px(10.0), px(20.0)),
            ..SessionOptions::default()
        };
        (TerminalSession::new(options, &host, &ResizeBus::new()), host)
    }

    #[test]
    fn test_calls_before_mount_are_noops() {
        let (session, _host) = session();
        let handle = session.handle();

        handle.write("a");
        handle.writeln("b");
        handle.clear();

        assert!(!handle.is_live());
        assert_eq!(session.with_engine(|engine| engine.text()), None);
    }

    #[test]
    fn test_handle_is_stable() {
        let (session, _host) = session();
        let first = session.handle();
        let second = session.handle();

        assert!(first.ptr_eq(&second));
        assert!(first.ptr_eq(&first.clone()));
    }

    #[test]
    fn test_write_and_clear() {
        let (session, _host) = session();
        session.mount();
        let handle = session.handle();

        handle.write("$ ");
        handle.writeln("ls");
        handle.write("done");
        assert_eq!(
            session.with_engine(|engine| engine.text()).as_deref(),
            Some("$ ls\ndone")
        );

        handle.clear();
        assert_eq!(
            session.with_engine(|engine| engine.text()).as_deref(),
            Some("")
        );
    }

    #[test]
    fn test_late_calls_after_teardown() {
        let (session, _host) = session();
        session.mount();
        let handle = session.handle();
        handle.writeln("kept");

        session.unmount();
        handle.writeln("late");
        handle.clear();
        assert!(!handle.is_live());

        drop(session);
        handle.writeln("later");
        assert!(!handle.is_live());
    }

    #[test]
    fn test_reentrant_call_is_dropped() {
        let (session, _host) = session();
        session.mount();
        let handle = session.handle();

        session.with_engine_mut(|_| handle.writeln("nested"));

        assert_eq!(
            session.with_engine(|engine| engine.text()).as_deref(),
            Some("")
        );
    }

    #[test]
    fn test_layout_through_handle() {
        let (session, _host) = session();
        let handle = session.handle();

        handle.layout(CellMetrics::new(px(20.0), px(20.0)), true);

        assert!(handle.is_live());
        assert_eq!(session.grid_size(), Some(GridSize::new(20, 10)));
        assert_eq!(handle.with_engine(|engine| engine.grid_size()), Some(GridSize::new(20, 10)));
    }
}
