use std::time::Duration;

use termgate_protocol::GridSize;

use crate::debounce::Debouncer;

/// Size of one glyph cell in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub width: f64,
    pub height: f64,
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self {
            width: 9.0,
            height: 17.0,
        }
    }
}

impl CellMetrics {
    /// Grid that fits in `container`, or `None` for a hidden container
    pub fn fit(&self, container: ContainerSize) -> Option<GridSize> {
        if !container.is_visible() || self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let cols = (container.width / self.width).floor().max(1.0);
        let rows = (container.height / self.height).floor().max(1.0);
        GridSize::from_signed(cols as i64, rows as i64)
    }
}

/// Pixel size of the element hosting a render surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Turns container size changes into at most one grid change per debounce
/// window, skipping grids the session already has.
#[derive(Debug)]
pub struct ResizeCoordinator {
    debouncer: Debouncer,
    metrics: CellMetrics,
    latest: Option<ContainerSize>,
    last_applied: Option<GridSize>,
    observing: bool,
}

impl ResizeCoordinator {
    pub fn new(window: Duration, metrics: CellMetrics) -> Self {
        Self {
            debouncer: Debouncer::new(window),
            metrics,
            latest: None,
            last_applied: None,
            observing: false,
        }
    }

    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Stop observing; drops any pending recomputation
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.debouncer.cancel();
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Record a new container size and (re)start the window. `on_due` runs
    /// once the window elapses without further changes.
    pub fn container_resized<F>(&mut self, size: ContainerSize, on_due: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.observing {
            return false;
        }
        self.latest = Some(size);
        self.debouncer.trigger(on_due);
        true
    }

    /// Grid to send now that the window has elapsed, if it changed
    pub fn take_due(&mut self) -> Option<GridSize> {
        let grid = self.metrics.fit(self.latest?)?;
        if self.last_applied == Some(grid) {
            return None;
        }
        Some(grid)
    }

    pub fn applied(&mut self, grid: GridSize) {
        self.last_applied = Some(grid);
    }

    pub fn last_applied(&self) -> Option<GridSize> {
        self.last_applied
    }

    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Forget the applied grid; the next session starts from scratch
    pub fn reset(&mut self) {
        self.debouncer.cancel();
        self.last_applied = None;
    }
}
