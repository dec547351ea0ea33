//! Terminal view component for GPUI.
//!
//! [`TerminalView`] is the element a host application embeds. It owns the
//! [`TerminalSession`], the [`HostContainer`] describing its own box, and the
//! renderer, and hands out a [`TerminalHandle`] for imperative control.
//!
//! # Lifecycle
//!
//! 1. [`TerminalView::new`] creates an uninitialized session and subscribes it
//!    to the window's [`ResizeBus`].
//! 2. The first paint records the container bounds, measures the font and runs
//!    the session's layout pass, which mounts the engine and fits it.
//! 3. Later layout passes refit when the bounds or cell size changed; window
//!    resizes refit through the bus.
//! 4. Dropping the view tears the session down: fitter first, then engine.
//!
//! Session notifications arrive over a [flume](https://docs.rs/flume) channel
//! and are turned into `cx.notify()` by an async task, so the view only
//! repaints when something changed.
//!
//! # Example
//!
//! ```ignore
//! use gpui_embedded_terminal::{ResizeBus, TerminalConfig, TerminalView};
//!
//! let bus = ResizeBus::new();
//! let terminal = cx.new(|cx| TerminalView::new(TerminalConfig::default(), &bus, cx));
//! let handle = terminal.read(cx).handle();
//!
//! handle.writeln("Starting provider...");
//! ```

use crate::clipboard::ClipboardSink;
use crate::config::TerminalConfig;
use crate::engine::{KeyDisposition, TerminalEngine};
use crate::event::EngineEvent;
use crate::handle::TerminalHandle;
use crate::host::HostContainer;
use crate::render::TerminalRenderer;
use crate::resize::ResizeBus;
use crate::session::{SessionEvent, TerminalSession};
use crate::theme::{DesignTokens, Theme};
use alacritty_terminal::index::Side;
use gpui::*;
use std::sync::Arc;

/// An embeddable terminal bound to one session.
pub struct TerminalView {
    session: TerminalSession,
    handle: TerminalHandle,
    host: Arc<HostContainer>,
    renderer: TerminalRenderer,
    focus_handle: FocusHandle,
    config: TerminalConfig,
    scrollbar_thumb: Hsla,
    selecting: bool,
    scroll_remainder: f32,
    _event_task: Option<Task<()>>,
}

impl TerminalView {
    /// Creates the view and its (not yet mounted) session.
    ///
    /// Copies go to the system clipboard unless
    /// [`with_clipboard`](Self::with_clipboard) says otherwise.
    pub fn new(config: TerminalConfig, resize: &ResizeBus, cx: &mut Context<Self>) -> Self {
        let host = HostContainer::new(config.padding, config.scrollbar_width);
        let session = TerminalSession::new(config.session_options(), &host, resize);
        let handle = session.handle();
        let renderer = TerminalRenderer::new(
            config.font_family.clone(),
            config.font_size,
            config.line_height_multiplier,
        );

        let event_task = session.take_events().map(|events| {
            cx.spawn(async move |this: WeakEntity<Self>, cx: &mut AsyncApp| {
                while let Ok(event) = events.recv_async().await {
                    let repaint = match &event {
                        SessionEvent::Mounted
                        | SessionEvent::Resized(_)
                        | SessionEvent::Redraw
                        | SessionEvent::ThemeChanged(_)
                        | SessionEvent::Copied => true,
                        SessionEvent::Engine(EngineEvent::Title(title)) => {
                            tracing::trace!(%title, "terminal title changed");
                            false
                        }
                        _ => false,
                    };
                    if !repaint {
                        continue;
                    }
                    let result = this.update(cx, |_view: &mut Self, cx: &mut Context<Self>| {
                        cx.notify();
                    });
                    if result.is_err() {
                        // View was dropped
                        break;
                    }
                }
            })
        });

        Self {
            session,
            handle,
            host,
            renderer,
            focus_handle: cx.focus_handle(),
            scrollbar_thumb: config.tokens.scrollbar_thumb(),
            config,
            selecting: false,
            scroll_remainder: 0.0,
            _event_task: event_task,
        }
    }

    /// Routes copies to `clipboard`. Only effective before the first paint.
    pub fn with_clipboard(mut self, clipboard: impl ClipboardSink + 'static) -> Self {
        self.session = self.session.with_clipboard(clipboard);
        self
    }

    /// The stable control surface for this terminal.
    pub fn handle(&self) -> TerminalHandle {
        self.handle.clone()
    }

    pub fn session(&self) -> &TerminalSession {
        &self.session
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn focus_handle(&self) -> &FocusHandle {
        &self.focus_handle
    }

    pub fn theme(&self) -> Theme {
        self.session.theme()
    }

    /// Applies new design tokens. Repaints only when the derived colours changed.
    pub fn set_design_tokens(&mut self, tokens: DesignTokens, cx: &mut Context<Self>) {
        let theme_changed = self.session.set_theme(Theme::from_tokens(&tokens));
        let thumb = tokens.scrollbar_thumb();
        let thumb_changed = thumb != self.scrollbar_thumb;

        self.scrollbar_thumb = thumb;
        self.config.tokens = tokens;
        if theme_changed || thumb_changed {
            cx.notify();
        }
    }

    /// Applies font, padding, scrollbar and colour settings.
    ///
    /// Scrollback depth and line ending handling are fixed when the engine is
    /// constructed and are not changed here.
    pub fn update_config(&mut self, config: TerminalConfig, cx: &mut Context<Self>) {
        self.renderer = TerminalRenderer::new(
            config.font_family.clone(),
            config.font_size,
            config.line_height_multiplier,
        );
        self.host.set_padding(config.padding);
        self.host.set_scrollbar_width(config.scrollbar_width);
        self.session.set_theme(config.theme());
        self.scrollbar_thumb = config.tokens.scrollbar_thumb();
        self.config = config;

        // Padding changes do not move the bounds, so refit explicitly.
        self.session.fit();
        cx.notify();
    }

    fn on_key_down(&mut self, event: &KeyDownEvent, _window: &mut Window, cx: &mut Context<Self>) {
        match self.session.handle_key(&event.keystroke) {
            KeyDisposition::Forward => {}
            KeyDisposition::Consume | KeyDisposition::CopySelection => {
                cx.stop_propagation();
                cx.notify();
            }
        }
    }

    /// Maps a window position to a viewport (row, column, side).
    fn grid_position(&self, position: Point<Pixels>) -> Option<(usize, usize, Side)> {
        let cell = self.session.with_engine(TerminalEngine::cell_metrics)?;
        let bounds = self.host.bounds();
        let padding = self.host.padding();

        let x: f32 = (position.x - bounds.origin.x - padding.left).into();
        let y: f32 = (position.y - bounds.origin.y - padding.top).into();
        let cell_width: f32 = cell.width.into();
        let cell_height: f32 = cell.height.into();
        if cell_width <= 0.0 || cell_height <= 0.0 {
            return None;
        }

        let col = x.max(0.0) / cell_width;
        let row = y.max(0.0) / cell_height;
        let side = if col.fract() < 0.5 { Side::Left } else { Side::Right };
        Some((row as usize, col as usize, side))
    }

    fn on_mouse_down(&mut self, event: &MouseDownEvent, window: &mut Window, cx: &mut Context<Self>) {
        window.focus(&self.focus_handle);

        if let Some((row, col, side)) = self.grid_position(event.position) {
            self.session.with_engine_mut(|engine| {
                let point = engine.viewport_point(row, col);
                engine.begin_selection(point, side);
            });
            self.selecting = true;
        }
        cx.notify();
    }

    fn on_mouse_move(&mut self, event: &MouseMoveEvent, _window: &mut Window, cx: &mut Context<Self>) {
        if !self.selecting || event.pressed_button != Some(MouseButton::Left) {
            return;
        }
        if let Some((row, col, side)) = self.grid_position(event.position) {
            self.session.with_engine_mut(|engine| {
                let point = engine.viewport_point(row, col);
                engine.extend_selection(point, side);
            });
            cx.notify();
        }
    }

    fn on_mouse_up(&mut self, _event: &MouseUpEvent, _window: &mut Window, _cx: &mut Context<Self>) {
        self.selecting = false;
    }

    fn on_scroll(&mut self, event: &ScrollWheelEvent, _window: &mut Window, cx: &mut Context<Self>) {
        let Some(cell) = self.session.with_engine(TerminalEngine::cell_metrics) else {
            return;
        };
        let delta = event.delta.pixel_delta(cell.height);
        self.scroll_remainder += delta.y / cell.height;

        let lines = self.scroll_remainder.trunc();
        if lines != 0.0 {
            self.scroll_remainder -= lines;
            self.session
                .with_engine_mut(|engine| engine.scroll_display(lines as i32));
            cx.notify();
        }
    }
}

impl Focusable for TerminalView {
    fn focus_handle(&self, _cx: &App) -> FocusHandle {
        self.focus_handle.clone()
    }
}

impl Render for TerminalView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = self.session.theme();
        let mut renderer = self.renderer.clone();
        let host = self.host.clone();
        let layout_handle = self.handle.clone();
        let paint_handle = self.handle.clone();
        let padding = self.config.padding;
        let scrollbar_width = self.config.scrollbar_width;
        let scrollbar_thumb = self.scrollbar_thumb;

        div()
            .size_full()
            .bg(theme.background)
            .rounded_md()
            .overflow_hidden()
            .track_focus(&self.focus_handle)
            .key_context("Terminal")
            .on_key_down(cx.listener(Self::on_key_down))
            .on_mouse_down(MouseButton::Left, cx.listener(Self::on_mouse_down))
            .on_mouse_up(MouseButton::Left, cx.listener(Self::on_mouse_up))
            .on_mouse_move(cx.listener(Self::on_mouse_move))
            .on_scroll_wheel(cx.listener(Self::on_scroll))
            .child(
                canvas(
                    move |bounds, window, _cx| {
                        let metrics = renderer.measure_cell(window);
                        let changed = host.set_bounds(bounds);
                        layout_handle.layout(metrics, changed);
                        renderer
                    },
                    move |bounds, renderer, window, cx| {
                        paint_handle.with_engine(|engine| {
                            renderer.paint(
                                bounds,
                                padding,
                                scrollbar_width,
                                scrollbar_thumb,
                                engine,
                                window,
                                cx,
                            )
                        });
                    },
                )
                .size_full(),
            )
    }
}

// GPUI window code is exercised through the demo binary; session behaviour is
// covered by the session, handle and integration tests.
