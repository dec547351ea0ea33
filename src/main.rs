//! Provider console demo using gpui-embedded-terminal.
//!
//! Opens a window with an embedded terminal panel and feeds it simulated
//! provider start-up output through the terminal handle.
//!
//! Shortcuts:
//! - `Ctrl+L` clears the panel
//! - `Ctrl+T` switches between the dark and light token sets
//! - `Ctrl++` / `Ctrl+-` change the font size
//!
//! Set `EMBEDDED_TERMINAL_CONFIG` to a TOML settings file to override the
//! defaults, and `RUST_LOG` to control logging.

use anyhow::{Context as _, Result};
use gpui::{
    AppContext, AsyncApp, Context, Entity, InteractiveElement, IntoElement, KeyDownEvent,
    ParentElement, Render, Styled, Subscription, Task, WeakEntity, Window, div, px,
};
use gpui_embedded_terminal::{
    DesignTokens, ResizeBus, TerminalConfig, TerminalHandle, TerminalView,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "EMBEDDED_TERMINAL_CONFIG";

const PROVIDER_LOG: &[&str] = &[
    "$ provider start --port 8080",
    "\x1b[2mloading model weights...\x1b[0m",
    "\x1b[32m✓\x1b[0m weights loaded (4 shards)",
    "\x1b[33m!\x1b[0m GPU memory at 82%",
    "listening on \x1b[1mhttp://127.0.0.1:8080\x1b[0m",
    "\x1b[32m✓\x1b[0m provider ready",
];

/// Window root: owns the resize bus and drives the terminal through its handle.
struct ProviderConsole {
    terminal: Entity<TerminalView>,
    handle: TerminalHandle,
    light: bool,
    _resize: ResizeBus,
    _bounds_subscription: Subscription,
    _feed: Task<()>,
}

impl ProviderConsole {
    fn new(config: TerminalConfig, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let resize = ResizeBus::new();
        let terminal = cx.new(|cx| TerminalView::new(config, &resize, cx));
        let handle = terminal.read(cx).handle();

        let dispatcher = resize.clone();
        let bounds_subscription = cx.observe_window_bounds(window, move |_, _, _| {
            dispatcher.dispatch();
        });

        let feed_handle = handle.clone();
        let feed = cx.spawn(async move |_this: WeakEntity<Self>, cx: &mut AsyncApp| {
            for line in PROVIDER_LOG {
                cx.background_executor()
                    .timer(Duration::from_millis(400))
                    .await;
                feed_handle.writeln(line);
            }
        });

        terminal.read(cx).focus_handle().focus(window);

        Self {
            terminal,
            handle,
            light: false,
            _resize: resize,
            _bounds_subscription: bounds_subscription,
            _feed: feed,
        }
    }

    fn tokens(light: bool) -> DesignTokens {
        let mut tokens = DesignTokens::default();
        if light {
            // Inverted gray scale for a light panel.
            tokens.set("gray.900", "#F7FAFC").expect("light palette colour");
            tokens.set("gray.100", "#1A202C").expect("light palette colour");
            tokens.set("gray.600", "#CBD5E0").expect("light palette colour");
            tokens.set("gray.500", "#A0AEC0").expect("light palette colour");
        }
        tokens
    }

    fn on_key_down(&mut self, event: &KeyDownEvent, _window: &mut Window, cx: &mut Context<Self>) {
        let keystroke = &event.keystroke;
        if !keystroke.modifiers.control {
            return;
        }

        match keystroke.key.as_str() {
            "l" => self.handle.clear(),
            "t" => {
                self.light = !self.light;
                let tokens = Self::tokens(self.light);
                self.terminal
                    .update(cx, |terminal, cx| terminal.set_design_tokens(tokens, cx));
            }
            "+" | "=" => self.terminal.update(cx, |terminal, cx| {
                let mut config = terminal.config().clone();
                config.font_size += px(1.0);
                terminal.update_config(config, cx);
            }),
            "-" => self.terminal.update(cx, |terminal, cx| {
                let mut config = terminal.config().clone();
                // Don't go below 6px font size
                if config.font_size > px(6.0) {
                    config.font_size -= px(1.0);
                    terminal.update_config(config, cx);
                }
            }),
            _ => return,
        }
        cx.stop_propagation();
    }
}

impl Render for ProviderConsole {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        div()
            .size_full()
            .p_4()
            .on_key_down(cx.listener(Self::on_key_down))
            .child(self.terminal.clone())
    }
}

fn load_config() -> Result<TerminalConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            TerminalConfig::load(&path)
                .with_context(|| format!("failed to load terminal settings from {}", path.display()))
        }
        None => Ok(TerminalConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    info!(font = %config.font_family, "provider console starting");

    let app = gpui::Application::new();
    app.run(move |cx| {
        cx.spawn(async move |cx| {
            cx.open_window(
                gpui::WindowOptions {
                    titlebar: Some(gpui::TitlebarOptions {
                        title: Some("Provider console".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                |window, cx| cx.new(|cx| ProviderConsole::new(config, window, cx)),
            )?;

            Ok::<_, anyhow::Error>(())
        })
        .detach();
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_tokens_invert_the_panel() {
        let dark = ProviderConsole::tokens(false);
        let light = ProviderConsole::tokens(true);

        assert_eq!(dark, DesignTokens::default());
        assert_eq!(light.get("gray.900"), DesignTokens::parse_hex("#F7FAFC"));
        assert_eq!(light.get("gray.100"), DesignTokens::parse_hex("#1A202C"));

        let dark_theme = gpui_embedded_terminal::Theme::from_tokens(&dark);
        let light_theme = gpui_embedded_terminal::Theme::from_tokens(&light);
        assert!(light_theme.background.l > dark_theme.background.l);
    }
}
