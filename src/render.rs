//! Terminal rendering.
//!
//! [`TerminalRenderer`] paints an engine's visible grid with GPUI's text and
//! quad primitives:
//!
//! ```text
//! Grid rows → layout_row → BackgroundRect / BatchedTextRun → paint
//!                                                              ├─ container background
//!                                                              ├─ non-default cell backgrounds
//!                                                              ├─ selection highlight
//!                                                              ├─ text runs
//!                                                              ├─ cursor
//!                                                              └─ scrollbar thumb
//! ```
//!
//! Adjacent cells with identical styling are batched into one shaped run, and
//! adjacent backgrounds of the same colour into one quad. Cell size is measured
//! from the `│` glyph, which spans the full cell in terminal fonts.

use crate::engine::TerminalEngine;
use crate::event::EngineEventProxy;
use crate::fit::CellMetrics;
use crate::theme::Theme;
use alacritty_terminal::grid::Dimensions;
use alacritty_terminal::index::{Column, Line, Point as GridPoint};
use alacritty_terminal::term::cell::{Cell, Flags};
use alacritty_terminal::term::color::Colors;
use alacritty_terminal::term::{Term, TermMode};
use gpui::{
    App, Bounds, Edges, Font, FontFeatures, FontStyle, FontWeight, Hsla, Pixels, Point, Size,
    TextRun, UnderlineStyle, Window, px, quad, transparent_black,
};

/// Shortest scrollbar thumb, in pixels.
const MIN_THUMB_HEIGHT: f32 = 16.0;

/// Cursor block opacity, so the glyph underneath stays readable.
const CURSOR_ALPHA: f32 = 0.7;

/// Adjacent cells on one row sharing the same style.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedTextRun {
    pub text: String,
    pub start_col: usize,
    pub row: usize,
    pub fg_color: Hsla,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl BatchedTextRun {
    fn matches(&self, fg_color: Hsla, bold: bool, italic: bool, underline: bool) -> bool {
        self.fg_color == fg_color
            && self.bold == bold
            && self.italic == italic
            && self.underline == underline
    }
}

/// A solid background span on one row; `end_col` is exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundRect {
    pub start_col: usize,
    pub end_col: usize,
    pub row: usize,
    pub color: Hsla,
}

/// Position and size of the scrollbar thumb relative to the track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollbarThumb {
    pub top: f32,
    pub height: f32,
}

impl ScrollbarThumb {
    /// Computes the thumb for a `track_height` track, or `None` without history.
    ///
    /// A `display_offset` of zero puts the thumb at the bottom.
    pub fn compute(
        track_height: f32,
        screen_lines: usize,
        history_size: usize,
        display_offset: usize,
    ) -> Option<Self> {
        if history_size == 0 || track_height <= 0.0 {
            return None;
        }
        let total = (screen_lines + history_size) as f32;
        let height = (track_height * screen_lines as f32 / total)
            .max(MIN_THUMB_HEIGHT)
            .min(track_height);
        let travel = track_height - height;
        let from_bottom = travel * display_offset.min(history_size) as f32 / history_size as f32;
        Some(Self {
            top: travel - from_bottom,
            height,
        })
    }
}

/// Paints an engine's grid. Holds the font settings and the measured cell size.
#[derive(Debug, Clone)]
pub struct TerminalRenderer {
    pub font_family: String,
    pub font_size: Pixels,
    pub line_height_multiplier: f32,
    pub cell: CellMetrics,
}

impl TerminalRenderer {
    /// Creates a renderer with estimated cell metrics.
    ///
    /// # Examples
    ///
    /// ```
    /// use gpui::px;
    /// use gpui_embedded_terminal::render::TerminalRenderer;
    ///
    /// let renderer = TerminalRenderer::new("Fira Code".to_string(), px(14.0), 1.0);
    /// assert_eq!(renderer.font_size, px(14.0));
    /// ```
    pub fn new(font_family: String, font_size: Pixels, line_height_multiplier: f32) -> Self {
        Self {
            font_family,
            font_size,
            line_height_multiplier,
            cell: CellMetrics::estimate(font_size, line_height_multiplier),
        }
    }

    fn font(&self, bold: bool, italic: bool) -> Font {
        Font {
            family: self.font_family.clone().into(),
            features: FontFeatures::default(),
            fallbacks: None,
            weight: if bold {
                FontWeight::BOLD
            } else {
                FontWeight::NORMAL
            },
            style: if italic {
                FontStyle::Italic
            } else {
                FontStyle::Normal
            },
        }
    }

    /// Measures the cell from the shaped `│` glyph and returns the result.
    pub fn measure_cell(&mut self, window: &mut Window) -> CellMetrics {
        let text_run = TextRun {
            len: "│".len(),
            font: self.font(false, false),
            color: gpui::black(),
            background_color: None,
            underline: None,
            strikethrough: None,
        };
        let shaped = window
            .text_system()
            .shape_line("│".into(), self.font_size, &[text_run], None);

        if shaped.width > px(0.0) {
            self.cell.width = shaped.width;
        }
        let line_height = (shaped.ascent + shaped.descent).ceil();
        if line_height > px(0.0) {
            self.cell.height = line_height * self.line_height_multiplier;
        }
        self.cell
    }

    /// Batches one row of cells into background spans and text runs.
    ///
    /// Backgrounds equal to the theme background are left out; the container
    /// fill already covers them.
    pub fn layout_row(
        &self,
        row: usize,
        cells: impl Iterator<Item = (usize, Cell)>,
        theme: &Theme,
        colors: &Colors,
    ) -> (Vec<BackgroundRect>, Vec<BatchedTextRun>) {
        let mut backgrounds: Vec<BackgroundRect> = Vec::new();
        let mut runs: Vec<BatchedTextRun> = Vec::new();
        let mut current: Option<BatchedTextRun> = None;

        for (col, cell) in cells {
            if cell.flags.contains(Flags::WIDE_CHAR_SPACER) {
                runs.extend(current.take());
                continue;
            }

            let mut fg_color = theme.resolve(cell.fg, colors);
            let mut bg_color = theme.resolve(cell.bg, colors);
            if cell.flags.contains(Flags::INVERSE) {
                std::mem::swap(&mut fg_color, &mut bg_color);
            }
            let bold = cell.flags.contains(Flags::BOLD);
            let italic = cell.flags.contains(Flags::ITALIC);
            let underline = cell.flags.contains(Flags::UNDERLINE);
            let ch = if cell.c == '\0' || cell.flags.contains(Flags::HIDDEN) {
                ' '
            } else {
                cell.c
            };

            if bg_color != theme.background {
                match backgrounds.last_mut() {
                    Some(rect) if rect.color == bg_color && rect.end_col == col => {
                        rect.end_col = col + 1;
                    }
                    _ => backgrounds.push(BackgroundRect {
                        start_col: col,
                        end_col: col + 1,
                        row,
                        color: bg_color,
                    }),
                }
            }

            match current.as_mut() {
                Some(run) if run.matches(fg_color, bold, italic, underline) => run.text.push(ch),
                _ => {
                    runs.extend(current.take());
                    current = Some(BatchedTextRun {
                        text: ch.to_string(),
                        start_col: col,
                        row,
                        fg_color,
                        bold,
                        italic,
                        underline,
                    });
                }
            }
        }
        runs.extend(current);

        // Blank runs paint nothing.
        runs.retain(|run| !run.text.trim().is_empty());
        (backgrounds, runs)
    }

    fn cell_bounds(&self, origin: Point<Pixels>, row: usize, col: usize, cols: usize) -> Bounds<Pixels> {
        Bounds {
            origin: Point {
                x: origin.x + self.cell.width * col as f32,
                y: origin.y + self.cell.height * row as f32,
            },
            size: Size {
                width: self.cell.width * cols as f32,
                height: self.cell.height,
            },
        }
    }

    /// Paints the engine's visible grid into `bounds`.
    #[allow(clippy::too_many_arguments)]
    pub fn paint(
        &self,
        bounds: Bounds<Pixels>,
        padding: Edges<Pixels>,
        scrollbar_width: Pixels,
        scrollbar_thumb: Hsla,
        engine: &TerminalEngine,
        window: &mut Window,
        cx: &mut App,
    ) {
        let theme = engine.theme();
        window.paint_quad(quad(
            bounds,
            px(0.0),
            theme.background,
            Edges::<Pixels>::default(),
            transparent_black(),
            Default::default(),
        ));

        let origin = Point {
            x: bounds.origin.x + padding.left,
            y: bounds.origin.y + padding.top,
        };
        engine.with_term(|term| {
            self.paint_grid(origin, term, &theme, window, cx);
            self.paint_scrollbar(bounds, padding, scrollbar_width, scrollbar_thumb, term, window);
        });
    }

    fn paint_grid(
        &self,
        origin: Point<Pixels>,
        term: &Term<EngineEventProxy>,
        theme: &Theme,
        window: &mut Window,
        cx: &mut App,
    ) {
        let grid = term.grid();
        let colors = term.colors();
        let display_offset = grid.display_offset() as i32;
        let selection = term.selection.as_ref().and_then(|selection| selection.to_range(term));
        let base_height = self.cell.height / self.line_height_multiplier;
        let vertical_offset = (self.cell.height - base_height) / 2.0;

        for row in 0..grid.screen_lines() {
            let line = Line(row as i32 - display_offset);
            let cells = (0..grid.columns()).map(|col| (col, grid[line][Column(col)].clone()));
            let (backgrounds, runs) = self.layout_row(row, cells, theme, colors);

            for rect in backgrounds {
                window.paint_quad(quad(
                    self.cell_bounds(origin, row, rect.start_col, rect.end_col - rect.start_col),
                    px(0.0),
                    rect.color,
                    Edges::<Pixels>::default(),
                    transparent_black(),
                    Default::default(),
                ));
            }

            if let Some(range) = &selection {
                let selected: Vec<usize> = (0..grid.columns())
                    .filter(|col| range.contains(GridPoint::new(line, Column(*col))))
                    .collect();
                if let (Some(first), Some(last)) = (selected.first(), selected.last()) {
                    window.paint_quad(quad(
                        self.cell_bounds(origin, row, *first, last - first + 1),
                        px(0.0),
                        theme.selection,
                        Edges::<Pixels>::default(),
                        transparent_black(),
                        Default::default(),
                    ));
                }
            }

            for run in runs {
                let text_run = TextRun {
                    len: run.text.len(),
                    font: self.font(run.bold, run.italic),
                    color: run.fg_color,
                    background_color: None,
                    underline: run.underline.then(|| UnderlineStyle {
                        thickness: px(1.0),
                        color: Some(run.fg_color),
                        wavy: false,
                    }),
                    strikethrough: None,
                };
                let shaped = window.text_system().shape_line(
                    run.text.into(),
                    self.font_size,
                    &[text_run],
                    Some(self.cell.width),
                );
                let position = Point {
                    x: origin.x + self.cell.width * run.start_col as f32,
                    y: origin.y + self.cell.height * row as f32 + vertical_offset,
                };
                if let Err(err) = shaped.paint(position, self.cell.height, window, cx) {
                    tracing::trace!(error = %err, row, "failed to paint text run");
                }
            }
        }

        let cursor = grid.cursor.point;
        let cursor_row = cursor.line.0 + display_offset;
        if term.mode().contains(TermMode::SHOW_CURSOR)
            && (0..grid.screen_lines() as i32).contains(&cursor_row)
        {
            let mut color = theme.cursor;
            color.a = CURSOR_ALPHA;
            window.paint_quad(quad(
                self.cell_bounds(origin, cursor_row as usize, cursor.column.0, 1),
                px(0.0),
                color,
                Edges::<Pixels>::default(),
                transparent_black(),
                Default::default(),
            ));
        }
    }

    fn paint_scrollbar(
        &self,
        bounds: Bounds<Pixels>,
        padding: Edges<Pixels>,
        scrollbar_width: Pixels,
        color: Hsla,
        term: &Term<EngineEventProxy>,
        window: &mut Window,
    ) {
        let grid = term.grid();
        let track_height = bounds.size.height - padding.top - padding.bottom;
        let Some(thumb) = ScrollbarThumb::compute(
            track_height.into(),
            grid.screen_lines(),
            grid.history_size(),
            grid.display_offset(),
        ) else {
            return;
        };

        let thumb_bounds = Bounds {
            origin: Point {
                x: bounds.origin.x + bounds.size.width - padding.right - scrollbar_width,
                y: bounds.origin.y + padding.top + px(thumb.top),
            },
            size: Size {
                width: scrollbar_width,
                height: px(thumb.height),
            },
        };
        window.paint_quad(quad(
            thumb_bounds,
            scrollbar_width / 2.0,
            color,
            Edges::<Pixels>::default(),
            transparent_black(),
            Default::default(),
        ));
    }
}
