//! The terminal engine.
//!
//! [`TerminalEngine`] wraps alacritty's [`Term`] and its VTE parser behind the
//! small surface the session needs: construct, mount, write, clear, selection
//! and copy, key observation, theme, resize and dispose. The `Term` sits in an
//! `Arc<parking_lot::Mutex<>>` so the renderer can read the grid while the
//! parser state stays outside the lock.
//!
//! ```text
//! write(text) → line ending normalisation → VTE Parser → Term handlers → Grid
//! ```
//!
//! Once [`dispose`](TerminalEngine::dispose) has run every operation is a
//! silent no-op.
//!
//! # Example
//!
//! ```
//! use gpui_embedded_terminal::clipboard::MemoryClipboard;
//! use gpui_embedded_terminal::engine::{EngineOptions, TerminalEngine};
//!
//! let mut engine = TerminalEngine::construct(
//!     EngineOptions::default(),
//!     Box::new(MemoryClipboard::new()),
//! );
//! engine.writeln("$ ls");
//! assert!(engine.text().starts_with("$ ls"));
//! ```

use crate::clipboard::ClipboardSink;
use crate::event::{EngineEvent, EngineEventProxy};
use crate::fit::{CellMetrics, GridSize};
use crate::host::HostContainer;
use crate::theme::Theme;
use alacritty_terminal::grid::{Dimensions, Scroll};
use alacritty_terminal::index::{Column, Line, Point, Side};
use alacritty_terminal::selection::{Selection, SelectionType};
use alacritty_terminal::term::cell::Flags;
use alacritty_terminal::term::{Config, Term, TermMode};
use alacritty_terminal::vte::ansi::Processor;
use gpui::{Keystroke, px};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Weak};

/// Default scrollback depth, in lines.
pub const DEFAULT_SCROLLBACK: usize = 25_000;

/// Erase display, erase saved lines, cursor home.
const CLEAR_SEQUENCE: &[u8] = b"\x1b[2J\x1b[3J\x1b[H";

impl Dimensions for GridSize {
    fn total_lines(&self) -> usize {
        self.rows
    }

    fn screen_lines(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.cols
    }
}

/// Options the engine is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Treat a bare `\n` as `\r\n`.
    pub convert_eol: bool,

    /// Lines of history kept above the screen.
    pub scrollback: usize,

    /// Initial theme.
    pub theme: Theme,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            convert_eol: true,
            scrollback: DEFAULT_SCROLLBACK,
            theme: Theme::default(),
        }
    }
}

/// What should happen to a key after the observers have seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Nobody claimed the key.
    Forward,
    /// An observer handled the key; it must not reach anything else.
    Consume,
    /// Copy the active selection instead of forwarding the key.
    CopySelection,
}

/// A key event as seen by key observers.
#[derive(Debug, Clone, Copy)]
pub struct KeyInput<'a> {
    pub keystroke: &'a Keystroke,
    /// Whether the engine had a non-empty selection when the key arrived.
    pub has_selection: bool,
}

/// Callback run for every key the engine receives, in registration order.
/// The first observer returning something other than
/// [`KeyDisposition::Forward`] decides the outcome.
pub type KeyObserver = Box<dyn FnMut(&KeyInput<'_>) -> KeyDisposition>;

/// Terminal screen buffer, scrollback, cursor and selection.
pub struct TerminalEngine {
    term: Arc<Mutex<Term<EngineEventProxy>>>,
    parser: Processor,
    event_rx: Receiver<EngineEvent>,
    convert_eol: bool,
    scrollback: usize,
    theme: Theme,
    size: GridSize,
    cell_metrics: CellMetrics,
    host: Option<Weak<HostContainer>>,
    key_observers: Vec<KeyObserver>,
    clipboard: Box<dyn ClipboardSink>,
    disposed: bool,
}

impl TerminalEngine {
    /// Creates an engine with an 80×24 grid. The real size arrives with the first fit.
    pub fn construct(options: EngineOptions, clipboard: Box<dyn ClipboardSink>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let size = GridSize::default();

        let config = Config {
            scrolling_history: options.scrollback,
            ..Config::default()
        };
        let term = Term::new(config, &size, EngineEventProxy::new(event_tx));

        tracing::debug!(
            scrollback = options.scrollback,
            convert_eol = options.convert_eol,
            "terminal engine constructed"
        );

        Self {
            term: Arc::new(Mutex::new(term)),
            parser: Processor::new(),
            event_rx,
            convert_eol: options.convert_eol,
            scrollback: options.scrollback,
            theme: options.theme,
            size,
            cell_metrics: CellMetrics::estimate(px(14.0), 1.0),
            host: None,
            key_observers: Vec::new(),
            clipboard,
            disposed: false,
        }
    }

    /// Mounts the engine into `host`. Only a weak reference is kept.
    pub fn mount(&mut self, host: &Arc<HostContainer>) {
        if self.disposed {
            return;
        }
        self.host = Some(Arc::downgrade(host));
    }

    pub fn is_mounted(&self) -> bool {
        self.host.is_some()
    }

    /// The host container, if mounted and still alive.
    pub fn host(&self) -> Option<Arc<HostContainer>> {
        self.host.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases the engine. Returns `false` if it was already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.key_observers.clear();
        self.host = None;
        self.term.lock().selection = None;
        tracing::debug!("terminal engine disposed");
        true
    }

    /// Feeds `data` to the parser without adding a line break.
    pub fn write(&mut self, data: &str) {
        if self.disposed || data.is_empty() {
            return;
        }
        let data = if self.convert_eol {
            normalize_line_endings(data)
        } else {
            Cow::Borrowed(data)
        };
        self.advance(data.as_bytes());
    }

    /// Feeds `data` followed by `\r\n`.
    pub fn writeln(&mut self, data: &str) {
        let mut line = String::with_capacity(data.len() + 2);
        line.push_str(data);
        line.push_str("\r\n");
        self.write(&line);
    }

    /// Erases the screen and the scrollback and homes the cursor.
    pub fn clear(&mut self) {
        if self.disposed {
            return;
        }
        self.advance(CLEAR_SEQUENCE);
        self.term.lock().selection = None;
    }

    fn advance(&mut self, bytes: &[u8]) {
        // New output always lands in view.
        if self.display_offset() > 0 {
            self.scroll_to_bottom();
        }
        let mut term = self.term.lock();
        self.parser.advance(&mut *term, bytes);
    }

    /// Registers a key observer.
    pub fn observe_key_input(&mut self, observer: KeyObserver) {
        if self.disposed {
            return;
        }
        self.key_observers.push(observer);
    }

    /// Runs the key observers for `keystroke`.
    pub fn handle_key(&mut self, keystroke: &Keystroke) -> KeyDisposition {
        if self.disposed {
            return KeyDisposition::Forward;
        }

        let input = KeyInput {
            keystroke,
            has_selection: self.has_selection(),
        };
        let disposition = self
            .key_observers
            .iter_mut()
            .map(|observer| observer(&input))
            .find(|disposition| *disposition != KeyDisposition::Forward)
            .unwrap_or(KeyDisposition::Forward);

        if disposition == KeyDisposition::CopySelection {
            self.trigger_system_copy();
        }
        disposition
    }

    pub fn has_selection(&self) -> bool {
        self.term
            .lock()
            .selection
            .as_ref()
            .is_some_and(|selection| !selection.is_empty())
    }

    /// Starts a selection at `point`.
    pub fn begin_selection(&mut self, point: Point, side: Side) {
        if self.disposed {
            return;
        }
        self.term.lock().selection = Some(Selection::new(SelectionType::Simple, point, side));
    }

    /// Moves the end of the current selection to `point`.
    pub fn extend_selection(&mut self, point: Point, side: Side) {
        if let Some(selection) = self.term.lock().selection.as_mut() {
            selection.update(point, side);
        }
    }

    /// Selects from `start` to `end`, both inclusive.
    pub fn select(&mut self, start: Point, end: Point) {
        self.begin_selection(start, Side::Left);
        self.extend_selection(end, Side::Right);
    }

    /// Selects the whole buffer, scrollback included.
    pub fn select_all(&mut self) {
        let (start, end) = {
            let term = self.term.lock();
            let grid = term.grid();
            (
                Point::new(grid.topmost_line(), Column(0)),
                Point::new(grid.bottommost_line(), grid.last_column()),
            )
        };
        self.select(start, end);
    }

    pub fn clear_selection(&mut self) {
        self.term.lock().selection = None;
    }

    /// Text of the active selection, if any.
    pub fn selection_text(&self) -> Option<String> {
        self.term
            .lock()
            .selection_to_string()
            .filter(|text| !text.is_empty())
    }

    /// Copies the active selection to the clipboard.
    ///
    /// Returns `true` if something was copied. Clipboard failures are logged.
    pub fn trigger_system_copy(&mut self) -> bool {
        match self.selection_text() {
            Some(text) => self.store_clipboard(&text),
            None => false,
        }
    }

    /// Writes `text` to the clipboard sink.
    pub fn store_clipboard(&mut self, text: &str) -> bool {
        if self.disposed {
            return false;
        }
        match self.clipboard.store(text) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "copy to clipboard failed");
                false
            }
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Replaces the theme. Returns `true` if it changed.
    pub fn set_theme(&mut self, theme: Theme) -> bool {
        if self.disposed || self.theme == theme {
            return false;
        }
        self.theme = theme;
        true
    }

    pub fn cell_metrics(&self) -> CellMetrics {
        self.cell_metrics
    }

    pub fn set_cell_metrics(&mut self, metrics: CellMetrics) {
        self.cell_metrics = metrics;
    }

    pub fn grid_size(&self) -> GridSize {
        self.size
    }

    pub fn scrollback(&self) -> usize {
        self.scrollback
    }

    /// Resizes the grid. No-op when the size is unchanged.
    pub fn resize(&mut self, size: GridSize) {
        if self.disposed || size == self.size {
            return;
        }
        self.size = size;
        self.term.lock().resize(size);
    }

    /// Scrolls the viewport through history; positive values scroll up.
    pub fn scroll_display(&mut self, lines: i32) {
        if self.disposed || lines == 0 {
            return;
        }
        self.term.lock().scroll_display(Scroll::Delta(lines));
    }

    /// Snaps the viewport back to the live screen.
    pub fn scroll_to_bottom(&mut self) {
        self.term.lock().scroll_display(Scroll::Bottom);
    }

    /// Lines the viewport is scrolled up into history.
    pub fn display_offset(&self) -> usize {
        self.term.lock().grid().display_offset()
    }

    /// Maps a viewport row/column to a buffer point, clamped to the grid.
    pub fn viewport_point(&self, row: usize, col: usize) -> Point {
        let term = self.term.lock();
        let grid = term.grid();
        let row = row.min(grid.screen_lines().saturating_sub(1));
        let col = col.min(grid.columns().saturating_sub(1));
        Point::new(
            Line(row as i32 - grid.display_offset() as i32),
            Column(col),
        )
    }

    /// Cursor position as (row, column) on the live screen.
    pub fn cursor(&self) -> (usize, usize) {
        let point = self.term.lock().grid().cursor.point;
        (point.line.0.max(0) as usize, point.column.0)
    }

    pub fn mode(&self) -> TermMode {
        *self.term.lock().mode()
    }

    /// Buffer contents, scrollback included, with trailing blanks removed.
    pub fn text(&self) -> String {
        let term = self.term.lock();
        let grid = term.grid();
        collect_lines(&term, grid.topmost_line().0, grid.bottommost_line().0)
    }

    /// Contents of the live screen only.
    pub fn visible_text(&self) -> String {
        let term = self.term.lock();
        let bottom = term.grid().bottommost_line().0;
        collect_lines(&term, 0, bottom)
    }

    /// Takes the events the engine produced since the last call.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Runs `f` with read access to the underlying `Term`.
    pub fn with_term<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Term<EngineEventProxy>) -> R,
    {
        let term = self.term.lock();
        f(&term)
    }
}

fn collect_lines(term: &Term<EngineEventProxy>, top: i32, bottom: i32) -> String {
    let grid = term.grid();
    let last_column = grid.last_column();
    let mut text = String::new();

    for line in top..=bottom {
        let row = &grid[Line(line)];
        let mut line_text: String = (0..grid.columns())
            .map(|col| &row[Column(col)])
            .filter(|cell| !cell.flags.contains(Flags::WIDE_CHAR_SPACER))
            .map(|cell| if cell.c == '\0' { ' ' } else { cell.c })
            .collect();

        if row[last_column].flags.contains(Flags::WRAPLINE) {
            text.push_str(&line_text);
        } else {
            line_text.truncate(line_text.trim_end().len());
            text.push_str(&line_text);
            text.push('\n');
        }
    }

    text.truncate(text.trim_end_matches('\n').len());
    text
}

/// Turns every `\n` not preceded by `\r` into `\r\n`.
pub fn normalize_line_endings(data: &str) -> Cow<'_, str> {
    if !data.contains('\n') {
        return Cow::Borrowed(data);
    }

    let mut out = String::with_capacity(data.len() + data.len() / 8);
    let mut previous = None;
    for ch in data.chars() {
        if ch == '\n' && previous != Some('\r') {
            out.push('\r');
        }
        out.push(ch);
        previous = Some(ch);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use gpui::Edges;

    fn engine() -> TerminalEngine {
        TerminalEngine::construct(EngineOptions::default(), Box::new(MemoryClipboard::new()))
    }

    fn engine_with_clipboard() -> (TerminalEngine, MemoryClipboard) {
        let clipboard = MemoryClipboard::new();
        let engine =
            TerminalEngine::construct(EngineOptions::default(), Box::new(clipboard.clone()));
        (engine, clipboard)
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\nb"), "a\r\nb");
        assert_eq!(normalize_line_endings("a\r\nb"), "a\r\nb");
        assert!(matches!(normalize_line_endings("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_write_without_line_break() {
        let mut engine = engine();
        engine.write("hello");

        assert_eq!(engine.text(), "hello");
        assert_eq!(engine.cursor(), (0, 5));
    }

    #[test]
    fn test_writeln_breaks_line() {
        let mut engine = engine();
        engine.writeln("$ ls");

        assert_eq!(engine.text(), "$ ls");
        assert_eq!(engine.cursor(), (1, 0));
    }

    #[test]
    fn test_convert_eol_returns_to_column_zero() {
        let mut engine = engine();
        engine.write("one\ntwo");

        assert_eq!(engine.text(), "one\ntwo");
    }

    #[test]
    fn test_raw_line_feed_without_conversion() {
        let options = EngineOptions {
            convert_eol: false,
            ..EngineOptions::default()
        };
        let mut engine = TerminalEngine::construct(options, Box::new(MemoryClipboard::new()));
        engine.write("one\ntwo");

        assert_eq!(engine.text(), "one\n   two");
    }

    #[test]
    fn test_clear_erases_screen_and_history() {
        let mut engine = engine();
        for i in 0..60 {
            engine.writeln(&format!("line {i}"));
        }
        assert!(engine.text().contains("line 0"));

        engine.clear();

        assert_eq!(engine.text(), "");
        assert_eq!(engine.cursor(), (0, 0));
    }

    #[test]
    fn test_scrollback_keeps_history() {
        let mut engine = engine();
        for i in 0..30 {
            engine.writeln(&format!("line {i}"));
        }

        assert!(engine.text().starts_with("line 0\n"));
        assert!(!engine.visible_text().contains("line 0\n"));
    }

    #[test]
    fn test_output_snaps_viewport_to_bottom() {
        let mut engine = engine();
        for i in 0..60 {
            engine.writeln(&format!("line {i}"));
        }

        engine.scroll_display(5);
        assert_eq!(engine.display_offset(), 5);

        engine.write("tail");
        assert_eq!(engine.display_offset(), 0);
        assert!(engine.text().ends_with("line 59\ntail"));
    }

    #[test]
    fn test_selection_and_copy() {
        let (mut engine, clipboard) = engine_with_clipboard();
        engine.write("hello world");
        assert!(!engine.has_selection());

        engine.select(
            Point::new(Line(0), Column(0)),
            Point::new(Line(0), Column(4)),
        );

        assert!(engine.has_selection());
        assert_eq!(engine.selection_text().as_deref(), Some("hello"));
        assert!(engine.trigger_system_copy());
        assert_eq!(clipboard.last().as_deref(), Some("hello"));
    }

    #[test]
    fn test_copy_without_selection_does_nothing() {
        let (mut engine, clipboard) = engine_with_clipboard();
        engine.write("hello");

        assert!(!engine.trigger_system_copy());
        assert!(clipboard.entries().is_empty());
    }

    #[test]
    fn test_select_all() {
        let mut engine = engine();
        engine.writeln("first");
        engine.write("second");
        engine.select_all();

        let text = engine.selection_text().unwrap();
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }

    #[test]
    fn test_key_observer_decides() {
        let (mut engine, clipboard) = engine_with_clipboard();
        engine.write("copy me");
        engine.observe_key_input(Box::new(|input| {
            if input.has_selection {
                KeyDisposition::CopySelection
            } else {
                KeyDisposition::Forward
            }
        }));
        let keystroke = Keystroke::parse("ctrl-c").unwrap();

        assert_eq!(engine.handle_key(&keystroke), KeyDisposition::Forward);

        engine.select(
            Point::new(Line(0), Column(0)),
            Point::new(Line(0), Column(6)),
        );
        assert_eq!(engine.handle_key(&keystroke), KeyDisposition::CopySelection);
        assert_eq!(clipboard.last().as_deref(), Some("copy me"));
    }

    #[test]
    fn test_first_claiming_observer_wins() {
        let mut engine = engine();
        engine.observe_key_input(Box::new(|_| KeyDisposition::Forward));
        engine.observe_key_input(Box::new(|_| KeyDisposition::Consume));
        engine.observe_key_input(Box::new(|_| KeyDisposition::CopySelection));

        let keystroke = Keystroke::parse("a").unwrap();
        assert_eq!(engine.handle_key(&keystroke), KeyDisposition::Consume);
    }

    #[test]
    fn test_resize() {
        let mut engine = engine();
        engine.resize(GridSize::new(120, 30));

        assert_eq!(engine.grid_size(), GridSize::new(120, 30));
        engine.with_term(|term| {
            assert_eq!(term.grid().columns(), 120);
            assert_eq!(term.grid().screen_lines(), 30);
        });
    }

    #[test]
    fn test_theme_read_write() {
        let mut engine = engine();
        let theme = Theme::default().with_background(1, 2, 3);

        assert!(engine.set_theme(theme));
        assert!(!engine.set_theme(theme));
        assert_eq!(engine.theme(), theme);
    }

    #[test]
    fn test_mount_keeps_weak_host() {
        let mut engine = engine();
        let host = HostContainer::new(Edges::all(px(0.0)), px(0.0));
        engine.mount(&host);

        assert!(engine.host().is_some());
        drop(host);
        assert!(engine.is_mounted());
        assert!(engine.host().is_none());
    }

    #[test]
    fn test_disposed_engine_ignores_everything() {
        let (mut engine, clipboard) = engine_with_clipboard();
        engine.write("before");

        assert!(engine.dispose());
        assert!(!engine.dispose());

        engine.write("after");
        engine.writeln("after");
        engine.clear();
        engine.resize(GridSize::new(10, 5));
        assert!(!engine.store_clipboard("late"));

        assert_eq!(engine.text(), "before");
        assert_eq!(engine.grid_size(), GridSize::default());
        assert!(!engine.is_mounted());
        assert!(clipboard.entries().is_empty());
    }

    #[test]
    fn test_osc52_store_is_reported() {
        let mut engine = engine();
        // OSC 52 with base64("hi")
        engine.write("\x1b]52;c;aGk=\x07");

        assert_eq!(
            engine.drain_events(),
            vec![EngineEvent::ClipboardStore("hi".into())]
        );
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_bell_is_reported() {
        let mut engine = engine();
        engine.write("\x07");

        assert_eq!(engine.drain_events(), vec![EngineEvent::Bell]);
    }
}
