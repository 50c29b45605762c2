//! Color space conversion between 24-bit RGB and the xterm-256 palette.
//!
//! The cube channels snap to the classic increments {0x00, 0x5f, 0x87,
//! 0xaf, 0xd7, 0xff}; near-gray values prefer the grayscale ramp when it is
//! strictly closer.

const CUBE_LEVELS: [u8; 6] = [0x00, 0x5F, 0x87, 0xAF, 0xD7, 0xFF];

/// The standard 16 ANSI colors in their common RGB rendering.
const BASE16: [u32; 16] = [
    0x000000, 0x800000, 0x008000, 0x808000, 0x000080, 0x800080, 0x008080, 0xC0C0C0,
    0x808080, 0xFF0000, 0x00FF00, 0xFFFF00, 0x0000FF, 0xFF00FF, 0x00FFFF, 0xFFFFFF,
];

fn closest_cube_level(byte: u8) -> (u8, u8) {
    let mut best_index = 0u8;
    let mut best_dist = u8::MAX;
    for (i, &level) in CUBE_LEVELS.iter().enumerate() {
        let dist = byte.abs_diff(level);
        if dist < best_dist {
            best_dist = dist;
            best_index = i as u8;
        }
    }
    (best_index, best_dist)
}

/// Map an RGB color onto the xterm-256 palette by snapping each channel to
/// the nearest cube level, falling back to the grayscale ramp when that is
/// a better fit.
pub fn rgb_to_xterm(rgb: u32) -> u8 {
    let r = ((rgb >> 16) & 0xFF) as u8;
    let g = ((rgb >> 8) & 0xFF) as u8;
    let b = (rgb & 0xFF) as u8;

    let (ri, _) = closest_cube_level(r);
    let (gi, _) = closest_cube_level(g);
    let (bi, _) = closest_cube_level(b);
    let cube = 16 + 36 * ri as u32 + 6 * gi as u32 + bi as u32;
    let cube_rgb = xterm_to_rgb(cube as u8);

    // Grayscale ramp: indices 232..=255 cover 0x08..0xEE in steps of 10.
    let gray_avg = (r as u32 + g as u32 + b as u32) / 3;
    let gray_step = ((gray_avg.saturating_sub(8)) / 10).min(23);
    let gray_index = 232 + gray_step as u8;
    let gray_rgb = xterm_to_rgb(gray_index);

    if color_distance(rgb, gray_rgb) < color_distance(rgb, cube_rgb) {
        gray_index
    } else {
        cube as u8
    }
}

/// The RGB value an xterm-256 index renders as.
pub fn xterm_to_rgb(index: u8) -> u32 {
    match index {
        0..=15 => BASE16[index as usize],
        16..=231 => {
            let i = index as u32 - 16;
            let r = CUBE_LEVELS[(i / 36) as usize] as u32;
            let g = CUBE_LEVELS[((i / 6) % 6) as usize] as u32;
            let b = CUBE_LEVELS[(i % 6) as usize] as u32;
            (r << 16) | (g << 8) | b
        }
        232..=255 => {
            let level = 8 + 10 * (index as u32 - 232);
            (level << 16) | (level << 8) | level
        }
    }
}

fn color_distance(a: u32, b: u32) -> u32 {
    let dr = ((a >> 16) & 0xFF).abs_diff((b >> 16) & 0xFF);
    let dg = ((a >> 8) & 0xFF).abs_diff((b >> 8) & 0xFF);
    let db = (a & 0xFF).abs_diff(b & 0xFF);
    dr * dr + dg * dg + db * db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_colors_round_trip() {
        // Exact cube colors map onto themselves.
        for index in [16u8, 21, 46, 196, 201, 231] {
            let rgb = xterm_to_rgb(index);
            assert_eq!(rgb_to_xterm(rgb), index, "index {index}");
        }
    }

    #[test]
    fn grayscale_prefers_ramp() {
        // 0x121212 sits on the gray ramp (232 + 1).
        assert_eq!(rgb_to_xterm(0x121212), 233);
    }

    #[test]
    fn primaries_snap_sensibly() {
        assert_eq!(rgb_to_xterm(0xFF0000), 196);
        assert_eq!(rgb_to_xterm(0x00FF00), 46);
        assert_eq!(rgb_to_xterm(0x0000FF), 21);
    }

    #[test]
    fn extremes() {
        assert_eq!(xterm_to_rgb(16), 0x000000);
        assert_eq!(xterm_to_rgb(231), 0xFFFFFF);
        assert_eq!(xterm_to_rgb(232), 0x080808);
        assert_eq!(xterm_to_rgb(255), 0xEEEEEE);
    }
}
