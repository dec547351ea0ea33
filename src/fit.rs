//! Fitting the terminal grid to its host container.
//!
//! [`FitAddon`] maps the host's pixel size and the engine's cell metrics to a
//! row/column count and resizes the engine when that count changes. The
//! arithmetic follows the common fit add-on rules:
//!
//! ```text
//! width  = host width  - padding (left + right) - scrollbar gutter
//! height = host height - padding (top + bottom)
//! cols   = max(2, floor(width  / cell width))
//! rows   = max(1, floor(height / cell height))
//! ```
//!
//! The gutter is only reserved when the engine keeps scrollback. A container
//! with no usable area is reported as [`FitError::ZeroArea`]; callers treat
//! fitting as best effort and drop the error.

use crate::engine::TerminalEngine;
use gpui::{Pixels, px};
use thiserror::Error;

/// Smallest column count a fit will produce.
pub const MIN_COLS: usize = 2;
/// Smallest row count a fit will produce.
pub const MIN_ROWS: usize = 1;

/// Grid size in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub cols: usize,
    pub rows: usize,
}

impl GridSize {
    pub const fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

/// Size of a single cell in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub width: Pixels,
    pub height: Pixels,
}

impl CellMetrics {
    pub fn new(width: Pixels, height: Pixels) -> Self {
        Self { width, height }
    }

    /// Approximate metrics for a monospace font before it has been measured.
    pub fn estimate(font_size: Pixels, line_height_multiplier: f32) -> Self {
        Self {
            width: font_size * 0.6,
            height: font_size * 1.4 * line_height_multiplier,
        }
    }

    fn is_empty(&self) -> bool {
        self.width <= px(0.0) || self.height <= px(0.0)
    }
}

/// Why a fit pass did not produce a size.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("fit add-on is not attached to an engine")]
    NotAttached,

    #[error("fit add-on has been disposed")]
    Disposed,

    #[error("engine is not mounted into a host container")]
    NotMounted,

    #[error("host container is gone")]
    HostDetached,

    #[error("host container has no usable area ({width}x{height})")]
    ZeroArea { width: f32, height: f32 },

    #[error("cell metrics are not available")]
    NoCellMetrics,
}

/// Computes the grid that fits into `width` × `height` pixels.
pub fn grid_for_area(width: f32, height: f32, cell: CellMetrics) -> Result<GridSize, FitError> {
    if cell.is_empty() {
        return Err(FitError::NoCellMetrics);
    }
    if width <= 0.0 || height <= 0.0 {
        return Err(FitError::ZeroArea { width, height });
    }

    let cell_width: f32 = cell.width.into();
    let cell_height: f32 = cell.height.into();
    let cols = ((width / cell_width).floor() as usize).max(MIN_COLS);
    let rows = ((height / cell_height).floor() as usize).max(MIN_ROWS);
    Ok(GridSize::new(cols, rows))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddonState {
    Detached,
    Attached,
    Disposed,
}

/// Resizes an engine to fill its host container.
#[derive(Debug)]
pub struct FitAddon {
    state: AddonState,
}

impl Default for FitAddon {
    fn default() -> Self {
        Self::new()
    }
}

impl FitAddon {
    pub fn new() -> Self {
        Self {
            state: AddonState::Detached,
        }
    }

    /// Attaches the add-on. Attaching a disposed add-on does nothing.
    pub fn attach(&mut self, engine: &TerminalEngine) {
        if self.state == AddonState::Detached {
            tracing::trace!(grid = ?engine.grid_size(), "fit add-on attached");
            self.state = AddonState::Attached;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state == AddonState::Attached
    }

    pub fn is_disposed(&self) -> bool {
        self.state == AddonState::Disposed
    }

    /// Computes the grid size the engine should have, without applying it.
    pub fn propose_dimensions(&self, engine: &TerminalEngine) -> Result<GridSize, FitError> {
        match self.state {
            AddonState::Detached => return Err(FitError::NotAttached),
            AddonState::Disposed => return Err(FitError::Disposed),
            AddonState::Attached => {}
        }
        if !engine.is_mounted() {
            return Err(FitError::NotMounted);
        }
        let host = engine.host().ok_or(FitError::HostDetached)?;

        let (width, height) = host.content_size(engine.scrollback() > 0);
        grid_for_area(width, height, engine.cell_metrics())
    }

    /// Resizes the engine to the proposed size if it differs from the current one.
    ///
    /// Calling this again with unchanged geometry leaves the engine untouched.
    pub fn fit(&mut self, engine: &mut TerminalEngine) -> Result<GridSize, FitError> {
        let proposed = self.propose_dimensions(engine)?;
        if proposed != engine.grid_size() {
            engine.resize(proposed);
        }
        Ok(proposed)
    }

    /// Detaches the add-on for good. Returns `false` if it was already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.state == AddonState::Disposed {
            return false;
        }
        self.state = AddonState::Disposed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::engine::EngineOptions;
    use crate::host::HostContainer;
    use gpui::Edges;

    fn cell() -> CellMetrics {
        CellMetrics::new(px(10.0), px(20.0))
    }

    fn engine() -> TerminalEngine {
        let mut engine =
            TerminalEngine::construct(EngineOptions::default(), Box::new(MemoryClipboard::new()));
        engine.set_cell_metrics(cell());
        engine
    }

    #[test]
    fn test_grid_for_area_floors() {
        assert_eq!(grid_for_area(805.0, 419.0, cell()), Ok(GridSize::new(80, 20)));
    }

    #[test]
    fn test_grid_for_area_minimums() {
        assert_eq!(
            grid_for_area(1.0, 1.0, cell()),
            Ok(GridSize::new(MIN_COLS, MIN_ROWS))
        );
    }

    #[test]
    fn test_grid_for_zero_area_fails() {
        assert!(matches!(
            grid_for_area(0.0, 300.0, cell()),
            Err(FitError::ZeroArea { .. })
        ));
        assert!(matches!(
            grid_for_area(300.0, 0.0, cell()),
            Err(FitError::ZeroArea { .. })
        ));
    }

    #[test]
    fn test_grid_without_metrics_fails() {
        let empty = CellMetrics::new(px(0.0), px(20.0));
        assert_eq!(grid_for_area(100.0, 100.0, empty), Err(FitError::NoCellMetrics));
    }

    #[test]
    fn test_detached_addon_refuses() {
        let mut addon = FitAddon::new();
        let mut engine = engine();
        assert_eq!(addon.fit(&mut engine), Err(FitError::NotAttached));
    }

    #[test]
    fn test_unmounted_engine_refuses() {
        let mut addon = FitAddon::new();
        let mut engine = engine();
        addon.attach(&engine);
        assert_eq!(addon.fit(&mut engine), Err(FitError::NotMounted));
    }

    #[test]
    fn test_fit_resizes_engine() {
        let host = HostContainer::new(Edges::all(px(0.0)), px(0.0));
        host.set_size(px(400.0), px(200.0));

        let mut engine = engine();
        engine.mount(&host);
        let mut addon = FitAddon::new();
        addon.attach(&engine);

        assert_eq!(addon.fit(&mut engine), Ok(GridSize::new(40, 10)));
        assert_eq!(engine.grid_size(), GridSize::new(40, 10));
    }

    #[test]
    fn test_fit_is_idempotent() {
        let host = HostContainer::new(Edges::all(px(0.0)), px(0.0));
        host.set_size(px(400.0), px(200.0));

        let mut engine = engine();
        engine.mount(&host);
        let mut addon = FitAddon::new();
        addon.attach(&engine);

        let first = addon.fit(&mut engine);
        let second = addon.fit(&mut engine);
        assert_eq!(first, second);
        assert_eq!(engine.grid_size(), GridSize::new(40, 10));
    }

    #[test]
    fn test_fit_reserves_scrollbar_gutter() {
        let host = HostContainer::new(Edges::all(px(16.0)), px(6.0));
        host.set_size(px(438.0), px(232.0));

        let mut engine = engine();
        engine.mount(&host);
        let mut addon = FitAddon::new();
        addon.attach(&engine);

        // 438 - 32 - 6 = 400 wide, 232 - 32 = 200 high
        assert_eq!(addon.fit(&mut engine), Ok(GridSize::new(40, 10)));
    }

    #[test]
    fn test_zero_area_host_leaves_size() {
        let host = HostContainer::new(Edges::all(px(0.0)), px(0.0));

        let mut engine = engine();
        let before = engine.grid_size();
        engine.mount(&host);
        let mut addon = FitAddon::new();
        addon.attach(&engine);

        assert!(matches!(addon.fit(&mut engine), Err(FitError::ZeroArea { .. })));
        assert_eq!(engine.grid_size(), before);
    }

    #[test]
    fn test_dropped_host_is_detached() {
        let host = HostContainer::new(Edges::all(px(0.0)), px(0.0));
        let mut engine = engine();
        engine.mount(&host);
        drop(host);

        let mut addon = FitAddon::new();
        addon.attach(&engine);
        assert_eq!(addon.fit(&mut engine), Err(FitError::HostDetached));
    }

    #[test]
    fn test_dispose_once() {
        let mut addon = FitAddon::new();
        let engine = engine();
        addon.attach(&engine);

        assert!(addon.dispose());
        assert!(!addon.dispose());
        addon.attach(&engine);
        assert!(addon.is_disposed());
    }
}
