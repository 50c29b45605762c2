//! Cell-grid rendering: styles, frame buffers, clipped drawing primitives,
//! and the back/front diff presenter.
//!
//! The editor draws into a back [`FrameBuffer`]; the frontend diffs it
//! against its front buffer on present and emits only what changed. All
//! drawing primitives clip to the buffer, so writing out of range is always
//! a no-op rather than an error.

pub mod color;
pub mod draw;
pub mod present;
pub mod theme;

pub use draw::{
    Icons, draw_horizontal_line, draw_icon, draw_rectangle_fill, draw_rectangle_line,
    draw_text_line, draw_vertical_line,
};
pub use present::{ColorMode, Presenter};
pub use theme::Theme;

/// Cell attribute bits, mirrored into the terminal's SGR attributes.
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attrib: u8 {
        const BOLD      = 0x01;
        const UNDERLINE = 0x02;
        const ITALIC    = 0x04;
        const REVERSE   = 0x08;
    }
}

/// A style is a partial override: unset colors inherit from whatever the
/// style is applied over, attributes accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Option<u32>,
    pub bg: Option<u32>,
    pub attrib: Attrib,
}

impl Style {
    pub fn new(fg: Option<u32>, bg: Option<u32>) -> Self {
        Self {
            fg,
            bg,
            attrib: Attrib::empty(),
        }
    }

    pub fn fg(fg: u32) -> Self {
        Self::new(Some(fg), None)
    }

    pub fn with_attrib(mut self, attrib: Attrib) -> Self {
        self.attrib |= attrib;
        self
    }

    /// Layer `other` over `self`: other's colors win where set, attributes
    /// are or-ed together.
    pub fn apply(&self, other: &Style) -> Style {
        Style {
            fg: other.fg.or(self.fg),
            bg: other.bg.or(self.bg),
            attrib: self.attrib | other.attrib,
        }
    }
}

/// One grid cell: a codepoint plus resolved colors and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: u32,
    pub fg: u32,
    pub bg: u32,
    pub attrib: u8,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ' as u32,
            fg: 0xFFFFFF,
            bg: 0x000000,
            attrib: 0,
        }
    }
}

impl Cell {
    pub fn styled(ch: u32, style: &Style) -> Self {
        Self {
            ch,
            fg: style.fg.unwrap_or(0xFFFFFF),
            bg: style.bg.unwrap_or(0x000000),
            attrib: style.attrib.bits(),
        }
    }
}

/// Drawing position in cell units. Signed so callers can anchor content
/// partially off-screen and rely on clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Area {
    pub width: usize,
    pub height: usize,
}

impl Area {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// The 2-D cell grid. An overlay is just another frame buffer composed on
/// top of the main one before present.
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    cells: Vec<Cell>,
    width: usize,
    height: usize,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![Cell::default(); width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.cells = vec![Cell::default(); width * height];
        }
    }

    pub fn fill(&mut self, style: &Style) {
        let cell = Cell::styled(' ' as u32, style);
        self.cells.fill(cell);
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(&self.cells[y * self.width + x])
    }

    /// Out-of-range writes are silently dropped.
    pub fn set_cell(&mut self, x: i32, y: i32, cell: Cell) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return;
        }
        self.cells[y * self.width + x] = cell;
    }

    /// Apply a style on top of an existing cell without touching its glyph.
    pub fn style_cell(&mut self, x: i32, y: i32, style: &Style) {
        let Some(cell) = self.cell(x, y).copied() else {
            return;
        };
        let merged = Cell {
            ch: cell.ch,
            fg: style.fg.unwrap_or(cell.fg),
            bg: style.bg.unwrap_or(cell.bg),
            attrib: cell.attrib | style.attrib.bits(),
        };
        self.set_cell(x, y, merged);
    }

    /// Copy `overlay` onto `self` with its top-left corner at `at`.
    pub fn compose(&mut self, overlay: &FrameBuffer, at: Position) {
        for y in 0..overlay.height {
            for x in 0..overlay.width {
                let cell = overlay.cells[y * overlay.width + x];
                self.set_cell(at.x + x as i32, at.y + y as i32, cell);
            }
        }
    }
}
