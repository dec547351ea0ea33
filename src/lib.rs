//! # gpui-embedded-terminal
//!
//! An embeddable terminal output panel for [GPUI](https://gpui.rs) applications.
//!
//! The panel shows text written to it by the host application (provider logs,
//! build output, command echoes) in a terminal emulator powered by
//! [alacritty_terminal](https://docs.rs/alacritty_terminal). It sizes itself to
//! its container, follows the host's design tokens, and exposes a small,
//! stable control surface for writing and clearing.
//!
//! ## Features
//!
//! - **Full Terminal Emulation**: VTE-compliant parsing, 16/256/true colour,
//!   25 000 lines of scrollback by default
//! - **Auto Fit**: the grid is recomputed from the container size, padding,
//!   scrollbar gutter and measured cell size on layout and on window resize
//! - **Stable Handle**: [`TerminalHandle`] survives re-renders and never fails;
//!   calls before mount or after teardown are silent no-ops
//! - **Explicit Lifecycle**: one engine per mount, constructed once, disposed
//!   once (fitter first, then engine)
//! - **Design Tokens**: background, foreground, selection and scrollbar colours
//!   come from [`DesignTokens`]; token changes reach a live terminal
//! - **Copy on Selection**: Ctrl+C (Cmd+C on macOS) copies an active selection
//!   instead of being forwarded
//!
//! ## Quick Start
//!
//! ```ignore
//! use gpui::{App, AppContext};
//! use gpui_embedded_terminal::{ResizeBus, TerminalConfig, TerminalView};
//!
//! fn open(window: &mut gpui::Window, cx: &mut App) {
//!     // One bus per window, fed from the window's bounds observer.
//!     let bus = ResizeBus::new();
//!
//!     let terminal = cx.new(|cx| TerminalView::new(TerminalConfig::default(), &bus, cx));
//!     let handle = terminal.read(cx).handle();
//!
//!     handle.writeln("$ provider start");
//!     handle.write("waiting for provider... ");
//!     handle.writeln("ok");
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Your GPUI Application                      │
//! │        keeps a TerminalHandle, feeds the window's ResizeBus     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  TerminalView (GPUI Entity, implements Render)                  │
//! │  ├─ HostContainer (bounds, padding, scrollbar gutter)           │
//! │  ├─ TerminalRenderer (font metrics, grid painting)              │
//! │  └─ flume task turning SessionEvents into cx.notify()           │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  TerminalSession: Uninitialized → Active → Disposed             │
//! │  ├─ TerminalEngine (Term + VTE parser, selection, clipboard)    │
//! │  └─ FitAddon (container size → cols × rows)                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Headless Use
//!
//! Everything below the view works without a window, which is how the tests
//! drive it:
//!
//! ```
//! use gpui::{Edges, px};
//! use gpui_embedded_terminal::{
//!     CellMetrics, GridSize, HostContainer, ResizeBus, SessionOptions, TerminalSession,
//! };
//!
//! let host = HostContainer::new(Edges::all(px(0.0)), px(0.0));
//! host.set_size(px(800.0), px(400.0));
//!
//! let options = SessionOptions {
//!     cell_metrics: CellMetrics::new(px(10.0), px(20.0)),
//!     ..SessionOptions::default()
//! };
//! let session = TerminalSession::new(options, &host, &ResizeBus::new());
//! session.mount();
//! session.handle().writeln("$ ls");
//!
//! assert_eq!(session.grid_size(), Some(GridSize::new(80, 20)));
//! ```

pub mod clipboard;
pub mod config;
pub mod engine;
pub mod event;
pub mod fit;
pub mod handle;
pub mod host;
pub mod render;
pub mod resize;
pub mod session;
pub mod theme;
pub mod view;

pub use clipboard::{ClipboardSink, MemoryClipboard, SystemClipboard};
pub use config::{ConfigError, TerminalConfig};
pub use engine::{EngineOptions, KeyDisposition, TerminalEngine};
pub use event::EngineEvent;
pub use fit::{CellMetrics, FitAddon, FitError, GridSize};
pub use handle::TerminalHandle;
pub use host::HostContainer;
pub use render::TerminalRenderer;
pub use resize::{ResizeBus, ResizeSubscription};
pub use session::{
    EVENT_QUEUE_CAPACITY, SessionEvent, SessionOptions, SessionState, TerminalSession,
};
pub use theme::{DesignTokens, Theme};
pub use view::TerminalView;
