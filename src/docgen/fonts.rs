//! Text width measurement for word wrapping.
//!
//! Widths come from the Helvetica AFM metrics (thousandths of the font
//! size per glyph). Characters outside the ASCII range fall back to the
//! average lowercase width, which keeps the wrap conservative for
//! accented French text.

const PT_TO_MM: f32 = 0.352_778;

/// Glyph widths for ASCII 0x20..=0x7E, in 1/1000 of the font size.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333,
    278, 278, 556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278,
    584, 584, 584, 556, 1015, 667, 667, 722, 722, 667, 611, 778, 722, 278,
    500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944,
    667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556,
    278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500,
    278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const DEFAULT_WIDTH: u16 = 556;

fn glyph_width(ch: char) -> u16 {
    let code = ch as u32;
    if (0x20..=0x7E).contains(&code) {
        HELVETICA_WIDTHS[(code - 0x20) as usize]
    } else {
        DEFAULT_WIDTH
    }
}

/// Rendered width of `text` in millimeters at `font_size` points.
pub fn text_width_mm(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(|ch| glyph_width(ch) as u32).sum();
    units as f32 / 1000.0 * font_size * PT_TO_MM
}
