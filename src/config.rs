//! Compile-time configuration: tags, colors, bar metrics, layout defaults.

/// Virtual desktop names. The tag bitmask is one bit per entry.
pub const TAGS: [&str; 9] = ["1", "2", "3", "4", "5", "6", "7", "8", "9"];

/// Mask covering every valid tag bit.
pub const TAG_MASK: u32 = (1 << TAGS.len()) - 1;

/// Default master-area fraction, 0 < MFACT < 1.
pub const MFACT: f32 = 0.55;

/// Default number of clients in the master area.
pub const NMASTER: usize = 1;

/// Border width in pixels around managed clients.
pub const BORDER_WIDTH: i32 = 1;

pub const SHOW_BAR: bool = true;
pub const TOP_BAR: bool = true;

pub const BAR_HEIGHT: u16 = 20;

/// Core font for bar text, with "fixed" as fallback.
pub const FONT: &[u8] = b"10x20";

/// Cell metrics for the bar font. image_text8 gives no extents up front,
/// so text measurement uses a fixed advance like the frame decorations do.
pub const CHAR_WIDTH: i32 = 10;
pub const FONT_BASELINE: i16 = 15;
pub const TEXT_PADDING: i32 = 5;

/// One fg/bg/border triple per semantic bar element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorScheme {
    pub fg: u32,
    pub bg: u32,
    pub border: u32,
}

pub const SCHEME_NORMAL: ColorScheme = ColorScheme {
    fg: 0xbbbbbb,
    bg: 0x222222,
    border: 0x444444,
};

pub const SCHEME_SELECTED: ColorScheme = ColorScheme {
    fg: 0xeeeeee,
    bg: 0x005577,
    border: 0x005577,
};

pub const SCHEME_URGENT: ColorScheme = ColorScheme {
    fg: 0x222222,
    bg: 0xff5555,
    border: 0xff5555,
};
