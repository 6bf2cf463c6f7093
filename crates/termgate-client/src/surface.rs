use termgate_protocol::GridSize;
use vt100::Parser;

/// Lines of history kept by the headless surface
pub const DEFAULT_SCROLLBACK_LINES: usize = 1000;

/// Where a tab renders the bytes its session produces
pub trait RenderSurface: Send {
    /// Feed raw terminal output
    fn write(&mut self, bytes: &[u8]);

    /// Current glyph grid
    fn grid(&self) -> GridSize;

    /// Adopt a new glyph grid
    fn fit(&mut self, grid: GridSize);

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;

    /// Visible text, for inspection
    fn contents(&self) -> String;

    /// Release the surface; further writes are dropped
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Creates one surface per tab
pub trait SurfaceFactory: Send + Sync {
    fn create(&self, grid: GridSize) -> Box<dyn RenderSurface>;
}

/// Headless surface backed by a vt100 screen
pub struct Vt100Surface {
    parser: Parser,
    visible: bool,
    disposed: bool,
}

impl Vt100Surface {
    pub fn new(grid: GridSize, scrollback_lines: usize) -> Self {
        Self {
            parser: Parser::new(grid.rows(), grid.cols(), scrollback_lines),
            visible: false,
            disposed: false,
        }
    }

    /// Cursor position as (row, col)
    pub fn cursor_position(&self) -> (u16, u16) {
        self.parser.screen().cursor_position()
    }

    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }
}

impl RenderSurface for Vt100Surface {
    fn write(&mut self, bytes: &[u8]) {
        if !self.disposed {
            self.parser.process(bytes);
        }
    }

    fn grid(&self) -> GridSize {
        let (rows, cols) = self.parser.screen().size();
        GridSize::new(cols, rows).unwrap_or_default()
    }

    fn fit(&mut self, grid: GridSize) {
        self.parser.set_size(grid.rows(), grid.cols());
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn contents(&self) -> String {
        self.parser.screen().contents()
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.visible = false;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[derive(Debug, Clone)]
pub struct Vt100Factory {
    scrollback_lines: usize,
}

impl Default for Vt100Factory {
    fn default() -> Self {
        Self {
            scrollback_lines: DEFAULT_SCROLLBACK_LINES,
        }
    }
}

impl SurfaceFactory for Vt100Factory {
    fn create(&self, grid: GridSize) -> Box<dyn RenderSurface> {
        Box::new(Vt100Surface::new(grid, self.scrollback_lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_output_and_follows_fit() {
        let mut surface = Vt100Surface::new(GridSize::default(), 100);
        surface.write(b"hello\r\nworld");
        assert!(surface.contents().starts_with("hello\nworld"));
        assert_eq!(surface.cursor_position(), (1, 5));

        surface.fit(GridSize::new(120, 40).unwrap());
        assert_eq!(surface.grid(), GridSize::new(120, 40).unwrap());
        assert!(surface.contents().starts_with("hello"));
    }

    #[test]
    fn test_disposed_surface_ignores_output() {
        let mut surface = Vt100Surface::new(GridSize::default(), 100);
        surface.set_visible(true);
        surface.dispose();
        surface.write(b"late bytes");
        assert!(surface.is_disposed());
        assert!(!surface.is_visible());
        assert_eq!(surface.contents(), "");
    }
}
