//! Clipped drawing primitives over a [`FrameBuffer`].

use crate::{Area, Cell, FrameBuffer, Position, Style};

/// Codepoints for box drawing and UI markers.
#[derive(Debug, Clone, Copy)]
pub struct Icons {
    // Corners.
    pub tl: u32, // ┌
    pub tr: u32, // ┐
    pub bl: u32, // └
    pub br: u32, // ┘
    // Runs.
    pub hl: u32, // ─
    pub vl: u32, // │

    pub scrollbar: u32,      // ▐
    pub trim_indicator: u32, // …
    pub whitespace_tab: u32, // →
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            tl: 0x250C,
            tr: 0x2510,
            bl: 0x2514,
            br: 0x2518,
            hl: 0x2500,
            vl: 0x2502,
            scrollbar: 0x2590,
            trim_indicator: 0x2026,
            whitespace_tab: 0x2192,
        }
    }
}

pub fn draw_rectangle_fill(buff: &mut FrameBuffer, pos: Position, area: Area, style: &Style) {
    let cell = Cell::styled(' ' as u32, style);
    for y in 0..area.height as i32 {
        for x in 0..area.width as i32 {
            buff.set_cell(pos.x + x, pos.y + y, cell);
        }
    }
}

/// Border only: corners plus horizontal and vertical runs. `fill` clears the
/// interior too.
pub fn draw_rectangle_line(
    buff: &mut FrameBuffer,
    pos: Position,
    area: Area,
    style: &Style,
    icons: &Icons,
    fill: bool,
) {
    if area.width < 2 || area.height < 2 {
        return;
    }
    if fill {
        draw_rectangle_fill(buff, pos, area, style);
    }

    let right = pos.x + area.width as i32 - 1;
    let bottom = pos.y + area.height as i32 - 1;

    draw_horizontal_line(buff, Position::new(pos.x + 1, pos.y), area.width - 2, style, icons);
    draw_horizontal_line(buff, Position::new(pos.x + 1, bottom), area.width - 2, style, icons);
    draw_vertical_line(buff, Position::new(pos.x, pos.y + 1), area.height - 2, style, icons);
    draw_vertical_line(buff, Position::new(right, pos.y + 1), area.height - 2, style, icons);

    draw_icon(buff, icons.tl, pos, style);
    draw_icon(buff, icons.tr, Position::new(right, pos.y), style);
    draw_icon(buff, icons.bl, Position::new(pos.x, bottom), style);
    draw_icon(buff, icons.br, Position::new(right, bottom), style);
}

pub fn draw_horizontal_line(
    buff: &mut FrameBuffer,
    pos: Position,
    length: usize,
    style: &Style,
    icons: &Icons,
) {
    let cell = Cell::styled(icons.hl, style);
    for x in 0..length as i32 {
        buff.set_cell(pos.x + x, pos.y, cell);
    }
}

pub fn draw_vertical_line(
    buff: &mut FrameBuffer,
    pos: Position,
    length: usize,
    style: &Style,
    icons: &Icons,
) {
    let cell = Cell::styled(icons.vl, style);
    for y in 0..length as i32 {
        buff.set_cell(pos.x, pos.y + y, cell);
    }
}

pub fn draw_icon(buff: &mut FrameBuffer, codepoint: u32, pos: Position, style: &Style) {
    buff.set_cell(pos.x, pos.y, Cell::styled(codepoint, style));
}

/// Lay a UTF-8 string out on a single row. Tabs and newlines render as one
/// space each. When the text exceeds `width`, `width - 1` cells are written
/// followed by the trim indicator; with `tail` set, the *end* of the string
/// is shown instead, with the indicator leading. `fill_area` pads the
/// remainder of the row in the style.
#[allow(clippy::too_many_arguments)]
pub fn draw_text_line(
    buff: &mut FrameBuffer,
    text: &str,
    pos: Position,
    width: usize,
    style: &Style,
    icons: &Icons,
    fill_area: bool,
    tail: bool,
) {
    if width == 0 {
        return;
    }

    let glyphs: Vec<u32> = text
        .chars()
        .map(|c| match c {
            '\t' | '\n' => ' ' as u32,
            other => other as u32,
        })
        .collect();

    let mut x = pos.x;
    if glyphs.len() <= width {
        for &ch in &glyphs {
            buff.set_cell(x, pos.y, Cell::styled(ch, style));
            x += 1;
        }
    } else if tail {
        draw_icon(buff, icons.trim_indicator, pos, style);
        x += 1;
        for &ch in &glyphs[glyphs.len() - (width - 1)..] {
            buff.set_cell(x, pos.y, Cell::styled(ch, style));
            x += 1;
        }
    } else {
        for &ch in &glyphs[..width - 1] {
            buff.set_cell(x, pos.y, Cell::styled(ch, style));
            x += 1;
        }
        draw_icon(buff, icons.trim_indicator, Position::new(x, pos.y), style);
        x += 1;
    }

    if fill_area {
        let end = pos.x + width as i32;
        while x < end {
            buff.set_cell(x, pos.y, Cell::styled(' ' as u32, style));
            x += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_chars(fb: &FrameBuffer, y: i32, width: usize) -> String {
        (0..width as i32)
            .map(|x| char::from_u32(fb.cell(x, y).unwrap().ch).unwrap())
            .collect()
    }

    #[test]
    fn short_text_fits() {
        let mut fb = FrameBuffer::new(10, 1);
        draw_text_line(
            &mut fb,
            "hi",
            Position::new(0, 0),
            10,
            &Style::default(),
            &Icons::default(),
            false,
            false,
        );
        assert_eq!(&row_chars(&fb, 0, 3), "hi ");
    }

    #[test]
    fn long_text_gets_trim_indicator() {
        let mut fb = FrameBuffer::new(5, 1);
        draw_text_line(
            &mut fb,
            "overflowing",
            Position::new(0, 0),
            5,
            &Style::default(),
            &Icons::default(),
            false,
            false,
        );
        assert_eq!(&row_chars(&fb, 0, 5), "over…");
    }

    #[test]
    fn tail_shows_end_of_string() {
        let mut fb = FrameBuffer::new(5, 1);
        draw_text_line(
            &mut fb,
            "overflowing",
            Position::new(0, 0),
            5,
            &Style::default(),
            &Icons::default(),
            false,
            true,
        );
        assert_eq!(&row_chars(&fb, 0, 5), "…wing");
    }

    #[test]
    fn tabs_and_newlines_become_spaces() {
        let mut fb = FrameBuffer::new(6, 1);
        draw_text_line(
            &mut fb,
            "a\tb\n",
            Position::new(0, 0),
            6,
            &Style::default(),
            &Icons::default(),
            false,
            false,
        );
        assert_eq!(&row_chars(&fb, 0, 4), "a b ");
    }

    #[test]
    fn fill_pads_to_width() {
        let mut fb = FrameBuffer::new(6, 1);
        let style = Style::new(None, Some(0x112233));
        draw_text_line(
            &mut fb,
            "ab",
            Position::new(0, 0),
            5,
            &style,
            &Icons::default(),
            true,
            false,
        );
        for x in 0..5 {
            assert_eq!(fb.cell(x, 0).unwrap().bg, 0x112233);
        }
        assert_eq!(fb.cell(5, 0).unwrap().bg, 0x000000);
    }

    #[test]
    fn primitives_clip_to_buffer() {
        let mut fb = FrameBuffer::new(4, 4);
        // All of these spill over an edge; none may panic or write.
        draw_rectangle_fill(
            &mut fb,
            Position::new(-2, -2),
            Area::new(3, 3),
            &Style::new(None, Some(0xFF00FF)),
        );
        draw_rectangle_line(
            &mut fb,
            Position::new(2, 2),
            Area::new(10, 10),
            &Style::default(),
            &Icons::default(),
            false,
        );
        draw_text_line(
            &mut fb,
            "spill",
            Position::new(2, 3),
            5,
            &Style::default(),
            &Icons::default(),
            false,
            false,
        );
        assert_eq!(fb.cell(0, 0).unwrap().bg, 0xFF00FF); // clipped fill hit
        assert!(fb.cell(4, 0).is_none());
    }
}
