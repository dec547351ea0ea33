//! Host container geometry.
//!
//! The [`HostContainer`] is the box the terminal is mounted into. The view owns
//! it (it belongs to the rendering tree) and updates its bounds on every layout
//! pass; the session and the engine only keep a [`Weak`](std::sync::Weak)
//! reference, so a dropped container shows up as "host detached" rather than
//! keeping geometry alive.

use gpui::{Bounds, Edges, Pixels, Point, Size, px};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct Geometry {
    bounds: Bounds<Pixels>,
    padding: Edges<Pixels>,
    scrollbar_width: Pixels,
}

/// Geometry of the element hosting a terminal.
#[derive(Debug)]
pub struct HostContainer {
    geometry: Mutex<Geometry>,
}

impl HostContainer {
    /// Creates a zero-sized container with the given padding and scrollbar gutter.
    pub fn new(padding: Edges<Pixels>, scrollbar_width: Pixels) -> Arc<Self> {
        Arc::new(Self {
            geometry: Mutex::new(Geometry {
                bounds: Bounds {
                    origin: Point {
                        x: px(0.0),
                        y: px(0.0),
                    },
                    size: Size {
                        width: px(0.0),
                        height: px(0.0),
                    },
                },
                padding,
                scrollbar_width,
            }),
        })
    }

    /// Records the laid-out bounds. Returns `true` when the size changed.
    pub fn set_bounds(&self, bounds: Bounds<Pixels>) -> bool {
        let mut geometry = self.geometry.lock();
        let changed = geometry.bounds.size != bounds.size;
        geometry.bounds = bounds;
        changed
    }

    /// Convenience for callers that only know the size.
    pub fn set_size(&self, width: Pixels, height: Pixels) -> bool {
        let origin = self.bounds().origin;
        self.set_bounds(Bounds {
            origin,
            size: Size { width, height },
        })
    }

    pub fn set_padding(&self, padding: Edges<Pixels>) {
        self.geometry.lock().padding = padding;
    }

    pub fn set_scrollbar_width(&self, width: Pixels) {
        self.geometry.lock().scrollbar_width = width;
    }

    pub fn bounds(&self) -> Bounds<Pixels> {
        self.geometry.lock().bounds
    }

    pub fn padding(&self) -> Edges<Pixels> {
        self.geometry.lock().padding
    }

    pub fn scrollbar_width(&self) -> Pixels {
        self.geometry.lock().scrollbar_width
    }

    /// Width and height in pixels left for cells, never negative.
    ///
    /// The scrollbar gutter is only subtracted when `reserve_scrollbar` is set.
    pub fn content_size(&self, reserve_scrollbar: bool) -> (f32, f32) {
        let geometry = *self.geometry.lock();
        let padding = geometry.padding;
        let gutter: f32 = if reserve_scrollbar {
            geometry.scrollbar_width.into()
        } else {
            0.0
        };

        let width: f32 = (geometry.bounds.size.width - padding.left - padding.right).into();
        let height: f32 = (geometry.bounds.size.height - padding.top - padding.bottom).into();
        ((width - gutter).max(0.0), height.max(0.0))
    }
}
