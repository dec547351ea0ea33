//! Terminal session lifecycle.
//!
//! A [`TerminalSession`] binds one [`TerminalEngine`] and one [`FitAddon`] to
//! one [`HostContainer`] for one mount lifetime. Its state is an explicit
//! three-state machine:
//!
//! ```text
//!  Uninitialized ──mount()──▶ Active { engine, fitter } ──unmount()──▶ Disposed
//!        │                                                              ▲
//!        └────────────────────────unmount()─────────────────────────────┘
//! ```
//!
//! - `mount()` only constructs from `Uninitialized`; calling it again is a no-op.
//! - `unmount()` only disposes from `Active`: the fitter first, then the
//!   engine, in one step. From `Uninitialized` nothing is disposed.
//! - `Disposed` is final. A component that mounts again gets a new session.
//!
//! Fitting is best effort everywhere: a failed fit (for example a zero-sized
//! container during a transient layout) is logged at trace level, reported as
//! a [`SessionEvent::Fit`] and otherwise dropped.
//!
//! Ancestors drive the session through [`TerminalHandle`], which holds only a
//! weak reference and never fails.

use crate::clipboard::{ClipboardSink, SystemClipboard};
use crate::engine::{EngineOptions, KeyDisposition, KeyInput, TerminalEngine};
use crate::event::EngineEvent;
use crate::fit::{CellMetrics, FitAddon, FitError, GridSize};
use crate::handle::TerminalHandle;
use crate::host::HostContainer;
use crate::resize::{DispatchPhase, ResizeBus, ResizeSubscription};
use crate::theme::Theme;
use gpui::{Keystroke, px};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Everything the session needs to construct its engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub convert_eol: bool,
    pub scrollback: usize,
    pub theme: Theme,
    pub cell_metrics: CellMetrics,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let engine = EngineOptions::default();
        Self {
            convert_eol: engine.convert_eol,
            scrollback: engine.scrollback,
            theme: engine.theme,
            cell_metrics: CellMetrics::estimate(px(14.0), 1.0),
        }
    }
}

/// Public view of the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Disposed,
}

/// Most notifications queued for a consumer that has not caught up yet.
/// Further events are dropped until it drains the queue.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Notifications from the session, delivered over a flume channel.
///
/// Nothing is queued until a consumer calls [`TerminalSession::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The engine was constructed and mounted.
    Mounted,
    /// A fit pass ran.
    Fit(Result<GridSize, FitError>),
    /// A fit pass changed the grid size.
    Resized(GridSize),
    /// Buffer contents changed.
    Redraw,
    /// A new theme reached the engine.
    ThemeChanged(Theme),
    /// The selection was copied in response to a key.
    Copied,
    /// Forwarded from the engine.
    Engine(EngineEvent),
    FitterDisposed,
    EngineDisposed,
}

enum Lifecycle {
    Uninitialized,
    Active {
        engine: Box<TerminalEngine>,
        fitter: FitAddon,
    },
    Disposed,
}

pub(crate) struct SessionCore {
    lifecycle: Lifecycle,
    container: Weak<HostContainer>,
    options: SessionOptions,
    clipboard: Option<Box<dyn ClipboardSink>>,
    resize_subscription: Option<ResizeSubscription>,
    events: Option<flume::Sender<SessionEvent>>,
    events_taken: bool,
}

/// Returns `true` for the platform copy shortcut (Cmd+C on macOS, Ctrl+C elsewhere).
pub fn is_copy_keystroke(keystroke: &Keystroke) -> bool {
    let modifiers = &keystroke.modifiers;
    let primary = if cfg!(target_os = "macos") {
        modifiers.platform
    } else {
        modifiers.control
    };
    primary && !modifiers.alt && keystroke.key.eq_ignore_ascii_case("c")
}

fn copy_on_selection(input: &KeyInput<'_>) -> KeyDisposition {
    if input.has_selection && is_copy_keystroke(input.keystroke) {
        KeyDisposition::CopySelection
    } else {
        KeyDisposition::Forward
    }
}

impl SessionCore {
    fn emit(&mut self, event: SessionEvent) {
        let Some(events) = &self.events else {
            return;
        };
        match events.try_send(event) {
            Ok(()) => {}
            Err(flume::TrySendError::Full(event)) => {
                tracing::trace!(?event, "session event queue full, event dropped");
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                tracing::trace!("session event consumer gone");
                self.events = None;
            }
        }
    }

    fn take_events(&mut self) -> Option<flume::Receiver<SessionEvent>> {
        if self.events_taken {
            return None;
        }
        let (tx, rx) = flume::bounded(EVENT_QUEUE_CAPACITY);
        self.events = Some(tx);
        self.events_taken = true;
        Some(rx)
    }

    pub(crate) fn state(&self) -> SessionState {
        match self.lifecycle {
            Lifecycle::Uninitialized => SessionState::Uninitialized,
            Lifecycle::Active { .. } => SessionState::Active,
            Lifecycle::Disposed => SessionState::Disposed,
        }
    }

    /// Constructs, wires and mounts the engine. Only acts when uninitialized.
    pub(crate) fn mount(&mut self) -> bool {
        if !matches!(self.lifecycle, Lifecycle::Uninitialized) {
            return false;
        }
        let Some(container) = self.container.upgrade() else {
            tracing::debug!("host container gone before mount");
            return false;
        };

        let clipboard: Box<dyn ClipboardSink> = match self.clipboard.take() {
            Some(clipboard) => clipboard,
            None => Box::new(SystemClipboard::new()),
        };
        let mut engine = Box::new(TerminalEngine::construct(
            EngineOptions {
                convert_eol: self.options.convert_eol,
                scrollback: self.options.scrollback,
                theme: self.options.theme,
            },
            clipboard,
        ));
        engine.set_cell_metrics(self.options.cell_metrics);
        engine.observe_key_input(Box::new(copy_on_selection));

        let mut fitter = FitAddon::new();
        fitter.attach(&engine);
        engine.mount(&container);

        self.lifecycle = Lifecycle::Active { engine, fitter };
        tracing::debug!("terminal session mounted");
        self.emit(SessionEvent::Mounted);
        self.fit();
        true
    }

    /// Mounts on the first layout pass; afterwards refits when the geometry moved.
    pub(crate) fn layout(&mut self, geometry_changed: bool) {
        match self.lifecycle {
            Lifecycle::Uninitialized => {
                self.mount();
            }
            Lifecycle::Active { .. } if geometry_changed => self.fit(),
            _ => {}
        }
    }

    /// Best-effort fit pass. Does nothing unless active; never fails.
    pub(crate) fn fit(&mut self) {
        let Lifecycle::Active { engine, fitter } = &mut self.lifecycle else {
            return;
        };

        let before = engine.grid_size();
        let result = fitter.fit(engine);
        match &result {
            Ok(size) => tracing::trace!(cols = size.cols, rows = size.rows, "fit pass"),
            Err(err) => tracing::trace!(error = %err, "fit pass skipped"),
        }
        let resized = matches!(result, Ok(size) if size != before);

        self.emit(SessionEvent::Fit(result.clone()));
        if let (true, Ok(size)) = (resized, result) {
            self.emit(SessionEvent::Resized(size));
        }
    }

    fn engine_mut(&mut self) -> Option<&mut TerminalEngine> {
        match &mut self.lifecycle {
            Lifecycle::Active { engine, .. } => Some(&mut **engine),
            _ => None,
        }
    }

    pub(crate) fn engine(&self) -> Option<&TerminalEngine> {
        match &self.lifecycle {
            Lifecycle::Active { engine, .. } => Some(&**engine),
            _ => None,
        }
    }

    pub(crate) fn write(&mut self, data: &str) {
        let Some(engine) = self.engine_mut() else {
            return;
        };
        engine.write(data);
        self.after_output();
    }

    pub(crate) fn writeln(&mut self, data: &str) {
        let Some(engine) = self.engine_mut() else {
            return;
        };
        engine.writeln(data);
        self.after_output();
    }

    pub(crate) fn clear(&mut self) {
        let Some(engine) = self.engine_mut() else {
            return;
        };
        engine.clear();
        self.emit(SessionEvent::Redraw);
    }

    fn after_output(&mut self) {
        self.fit();
        self.pump_engine_events();
        self.emit(SessionEvent::Redraw);
    }

    fn pump_engine_events(&mut self) {
        let Some(engine) = self.engine_mut() else {
            return;
        };
        let events = engine.drain_events();
        for event in &events {
            if let EngineEvent::ClipboardStore(text) = event {
                engine.store_clipboard(text);
            }
        }
        for event in events {
            self.emit(SessionEvent::Engine(event));
        }
    }

    pub(crate) fn set_theme(&mut self, theme: Theme) -> bool {
        if self.options.theme == theme {
            return false;
        }
        self.options.theme = theme;
        let applied = self
            .engine_mut()
            .is_some_and(|engine| engine.set_theme(theme));
        if applied {
            self.emit(SessionEvent::ThemeChanged(theme));
        }
        true
    }

    pub(crate) fn set_cell_metrics(&mut self, metrics: CellMetrics) {
        if self.options.cell_metrics == metrics {
            return;
        }
        self.options.cell_metrics = metrics;
        if let Some(engine) = self.engine_mut() {
            engine.set_cell_metrics(metrics);
            self.fit();
        }
    }

    pub(crate) fn handle_key(&mut self, keystroke: &Keystroke) -> KeyDisposition {
        let Some(engine) = self.engine_mut() else {
            return KeyDisposition::Forward;
        };
        let disposition = engine.handle_key(keystroke);
        if disposition == KeyDisposition::CopySelection {
            self.emit(SessionEvent::Copied);
        }
        disposition
    }

    pub(crate) fn with_engine_mut<R>(
        &mut self,
        f: impl FnOnce(&mut TerminalEngine) -> R,
    ) -> Option<R> {
        let result = self.engine_mut().map(f);
        if result.is_some() {
            self.emit(SessionEvent::Redraw);
        }
        result
    }

    /// Releases everything the session owns. Runs its disposal branch at most once.
    pub(crate) fn teardown(&mut self) -> bool {
        self.resize_subscription = None;

        match std::mem::replace(&mut self.lifecycle, Lifecycle::Disposed) {
            Lifecycle::Active {
                mut engine,
                mut fitter,
            } => {
                fitter.dispose();
                self.emit(SessionEvent::FitterDisposed);
                engine.dispose();
                self.emit(SessionEvent::EngineDisposed);
                tracing::info!("terminal session torn down");
                true
            }
            Lifecycle::Uninitialized => {
                tracing::debug!("terminal session released before mount");
                false
            }
            Lifecycle::Disposed => false,
        }
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Owner of one engine/fitter pair for one mount lifetime.
///
/// Dropping the session tears it down.
pub struct TerminalSession {
    core: Arc<Mutex<SessionCore>>,
}

impl TerminalSession {
    /// Creates an uninitialized session for `container` and registers a
    /// capture-phase resize listener on `resize`.
    pub fn new(options: SessionOptions, container: &Arc<HostContainer>, resize: &ResizeBus) -> Self {
        let core = Arc::new(Mutex::new(SessionCore {
            lifecycle: Lifecycle::Uninitialized,
            container: Arc::downgrade(container),
            options,
            clipboard: None,
            resize_subscription: None,
            events: None,
            events_taken: false,
        }));

        let weak = Arc::downgrade(&core);
        let subscription = resize.subscribe(DispatchPhase::Capture, move || {
            let Some(core) = weak.upgrade() else {
                return;
            };
            // The dispatch may come from inside a session call on this thread.
            match core.try_lock() {
                Some(mut core) => core.fit(),
                None => tracing::trace!("session busy, resize fit skipped"),
            };
        });
        core.lock().resize_subscription = Some(subscription);

        Self { core }
    }

    /// Sets where copied text goes. Only takes effect before mount.
    pub fn with_clipboard(self, clipboard: impl ClipboardSink + 'static) -> Self {
        {
            let mut core = self.core.lock();
            if matches!(core.lifecycle, Lifecycle::Uninitialized) {
                core.clipboard = Some(Box::new(clipboard));
            }
        }
        self
    }

    pub fn state(&self) -> SessionState {
        self.core.lock().state()
    }

    /// Constructs and mounts the engine. Returns `false` if nothing was done.
    pub fn mount(&self) -> bool {
        self.core.lock().mount()
    }

    /// Layout pass: mounts the first time, refits when the geometry changed.
    pub fn layout(&self, geometry_changed: bool) {
        self.core.lock().layout(geometry_changed);
    }

    /// Runs a best-effort fit pass.
    pub fn fit(&self) {
        self.core.lock().fit();
    }

    /// Disposes the fitter and the engine and drops the resize listener.
    /// Returns `false` if there was nothing to dispose.
    pub fn unmount(&self) -> bool {
        self.core.lock().teardown()
    }

    /// Stores `theme` and applies it to a live engine. Returns `true` if it differed.
    pub fn set_theme(&self, theme: Theme) -> bool {
        self.core.lock().set_theme(theme)
    }

    pub fn set_cell_metrics(&self, metrics: CellMetrics) {
        self.core.lock().set_cell_metrics(metrics);
    }

    /// Runs the engine's key observers.
    pub fn handle_key(&self, keystroke: &Keystroke) -> KeyDisposition {
        self.core.lock().handle_key(keystroke)
    }

    /// The control surface. Every call returns a handle to the same session.
    pub fn handle(&self) -> TerminalHandle {
        TerminalHandle::new(Arc::downgrade(&self.core))
    }

    /// Receiver for session notifications. Only the first call gets one.
    ///
    /// The queue holds at most [`EVENT_QUEUE_CAPACITY`] events; once the
    /// receiver is dropped the session stops queueing.
    pub fn take_events(&self) -> Option<flume::Receiver<SessionEvent>> {
        self.core.lock().take_events()
    }

    pub fn grid_size(&self) -> Option<GridSize> {
        self.core.lock().engine().map(TerminalEngine::grid_size)
    }

    pub fn theme(&self) -> Theme {
        self.core.lock().options.theme
    }

    /// Read access to the live engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&TerminalEngine) -> R) -> Option<R> {
        self.core.lock().engine().map(f)
    }

    /// Write access to the live engine. Schedules a redraw when it ran.
    pub fn with_engine_mut<R>(&self, f: impl FnOnce(&mut TerminalEngine) -> R) -> Option<R> {
        self.core.lock().with_engine_mut(f)
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.core.lock().teardown();
    }
}
