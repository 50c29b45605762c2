//! Back/front frame-buffer diff and ANSI emission.
//!
//! `present` walks the back buffer, emits escape sequences only for cells
//! that differ from the front buffer, then adopts the back buffer as the new
//! front. The style emitter remembers the last foreground/background pair
//! and opens a new SGR run (reset first, so stale attributes never leak)
//! only when the pair changes. Cursor moves are emitted only when the next
//! dirty cell is not contiguous with the previous one.

use std::io::Write;

use crate::color::rgb_to_xterm;
use crate::{Attrib, Cell, FrameBuffer};

/// How 24-bit colors are written to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// 8 basic colors via SGR 30-37/40-47.
    Normal,
    /// Full xterm-256 palette.
    Xterm256,
    /// The 6x6x6 cube only (no grayscale ramp).
    Cube216,
    /// The 24-step grayscale ramp only.
    Grayscale,
    #[default]
    TrueColor,
}

pub struct Presenter {
    front: FrameBuffer,
    mode: ColorMode,
    cursor: Option<(usize, usize)>,
}

impl Presenter {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            front: FrameBuffer::new(0, 0),
            mode,
            cursor: None,
        }
    }

    /// Where the terminal cursor should rest after a present; `None` hides
    /// it.
    pub fn set_cursor(&mut self, cursor: Option<(usize, usize)>) {
        self.cursor = cursor;
    }

    /// Force a full repaint on the next present.
    pub fn invalidate(&mut self) {
        self.front = FrameBuffer::new(0, 0);
    }

    /// Diff `back` against the front buffer and write the delta to `out`.
    pub fn present(&mut self, back: &FrameBuffer, out: &mut impl Write) -> std::io::Result<()> {
        let full = self.front.width() != back.width() || self.front.height() != back.height();
        if full {
            self.front.resize(back.width(), back.height());
            write!(out, "\x1b[2J")?;
        }

        let mut last_style: Option<(u32, u32, u8)> = None;
        let mut next_emit: Option<(usize, usize)> = None;
        let mut utf8 = [0u8; 4];

        for y in 0..back.height() {
            for x in 0..back.width() {
                let cell = *back.cell(x as i32, y as i32).expect("in range");
                let stale = full
                    || self
                        .front
                        .cell(x as i32, y as i32)
                        .is_none_or(|front| *front != cell);
                if !stale {
                    continue;
                }

                if next_emit != Some((x, y)) {
                    write!(out, "\x1b[{};{}H", y + 1, x + 1)?;
                }
                next_emit = Some((x + 1, y));

                let key = (cell.fg, cell.bg, cell.attrib);
                if last_style != Some(key) {
                    self.emit_style(&cell, out)?;
                    last_style = Some(key);
                }

                let ch = char::from_u32(cell.ch).unwrap_or(' ');
                let n = pat_text::codepoint::encode(ch as u32, &mut utf8);
                out.write_all(&utf8[..n])?;

                self.front.set_cell(x as i32, y as i32, cell);
            }
        }

        match self.cursor {
            Some((x, y)) => write!(out, "\x1b[{};{}H\x1b[?25h", y + 1, x + 1)?,
            None => write!(out, "\x1b[?25l")?,
        }
        out.flush()
    }

    fn emit_style(&self, cell: &Cell, out: &mut impl Write) -> std::io::Result<()> {
        // Reset clears any attributes left over from the previous run.
        write!(out, "\x1b[0m")?;
        let attrib = Attrib::from_bits_truncate(cell.attrib);
        if attrib.contains(Attrib::BOLD) {
            write!(out, "\x1b[1m")?;
        }
        if attrib.contains(Attrib::ITALIC) {
            write!(out, "\x1b[3m")?;
        }
        if attrib.contains(Attrib::UNDERLINE) {
            write!(out, "\x1b[4m")?;
        }
        if attrib.contains(Attrib::REVERSE) {
            write!(out, "\x1b[7m")?;
        }
        self.emit_color(cell.fg, true, out)?;
        self.emit_color(cell.bg, false, out)
    }

    fn emit_color(&self, rgb: u32, foreground: bool, out: &mut impl Write) -> std::io::Result<()> {
        match self.mode {
            ColorMode::TrueColor => {
                let (r, g, b) = ((rgb >> 16) & 0xFF, (rgb >> 8) & 0xFF, rgb & 0xFF);
                let base = if foreground { 38 } else { 48 };
                write!(out, "\x1b[{base};2;{r};{g};{b}m")
            }
            ColorMode::Xterm256 => {
                let index = rgb_to_xterm(rgb);
                let base = if foreground { 38 } else { 48 };
                write!(out, "\x1b[{base};5;{index}m")
            }
            ColorMode::Cube216 => {
                let index = cube_index(rgb);
                let base = if foreground { 38 } else { 48 };
                write!(out, "\x1b[{base};5;{index}m")
            }
            ColorMode::Grayscale => {
                let avg = (((rgb >> 16) & 0xFF) + ((rgb >> 8) & 0xFF) + (rgb & 0xFF)) / 3;
                let index = 232 + ((avg.saturating_sub(8)) / 10).min(23);
                let base = if foreground { 38 } else { 48 };
                write!(out, "\x1b[{base};5;{index}m")
            }
            ColorMode::Normal => {
                let index = basic_index(rgb);
                let base = if foreground { 30 } else { 40 };
                write!(out, "\x1b[{}m", base + index)
            }
        }
    }
}

fn cube_index(rgb: u32) -> u8 {
    let channel = |v: u32| -> u32 {
        match v & 0xFF {
            0..=0x2F => 0,
            0x30..=0x72 => 1,
            0x73..=0x9A => 2,
            0x9B..=0xC2 => 3,
            0xC3..=0xEA => 4,
            _ => 5,
        }
    };
    (16 + 36 * channel(rgb >> 16) + 6 * channel(rgb >> 8) + channel(rgb)) as u8
}

fn basic_index(rgb: u32) -> u32 {
    let bit = |v: u32| u32::from((v & 0xFF) >= 0x80);
    bit(rgb) << 2 | bit(rgb >> 8) << 1 | bit(rgb >> 16)
}
