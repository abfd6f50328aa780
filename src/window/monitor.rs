use x11rb::protocol::xproto::Window;

use crate::config;
use crate::window::layout::LayoutKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Area of the overlap with another rectangle, 0 when disjoint.
    pub fn intersection_area(&self, other: &Rect) -> i32 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        w.max(0) * h.max(0)
    }
}

/// One display output: its own tag view, layout parameters, bar, and the two
/// client ordering sequences.
#[derive(Debug)]
pub struct Monitor {
    pub num: usize,
    pub layout_symbol: String,
    pub mfact: f32,
    pub nmaster: usize,

    /// Full output rectangle.
    pub screen: Rect,
    /// Output rectangle minus the bar.
    pub window_area: Rect,

    /// Selects which of the two saved tag views is active; view() flips it.
    pub seltags: usize,
    pub tagset: [u32; 2],

    pub show_bar: bool,
    pub top_bar: bool,
    pub bar_y: i32,
    pub bar_window: Window,

    pub layout: LayoutKind,

    /// Focused client, if any. Must be a member of `tiling`/`stack`.
    pub sel: Option<Window>,
    /// Tiling order: drives master/stack slot assignment, newest first.
    pub tiling: Vec<Window>,
    /// Focus/stack order: drives focus fallback and raise order.
    pub stack: Vec<Window>,
}

impl Monitor {
    pub fn new(num: usize, screen: Rect) -> Self {
        let mut mon = Self {
            num,
            layout_symbol: LayoutKind::Tile.symbol(0),
            mfact: config::MFACT,
            nmaster: config::NMASTER,
            screen,
            window_area: screen,
            seltags: 0,
            tagset: [1, 1],
            show_bar: config::SHOW_BAR,
            top_bar: config::TOP_BAR,
            bar_y: 0,
            bar_window: x11rb::NONE,
            layout: LayoutKind::Tile,
            sel: None,
            tiling: Vec::new(),
            stack: Vec::new(),
        };
        mon.update_bar_area();
        mon
    }

    pub fn active_tagset(&self) -> u32 {
        self.tagset[self.seltags]
    }

    /// Recompute the usable window area and bar position from the screen
    /// rectangle and bar visibility.
    pub fn update_bar_area(&mut self) {
        self.window_area = self.screen;
        if self.show_bar {
            self.window_area.height -= config::BAR_HEIGHT as i32;
            if self.top_bar {
                self.bar_y = self.window_area.y;
                self.window_area.y += config::BAR_HEIGHT as i32;
            } else {
                self.bar_y = self.window_area.y + self.window_area.height;
            }
        } else {
            self.bar_y = -(config::BAR_HEIGHT as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_reserves_top_strip() {
        let mon = Monitor::new(0, Rect { x: 0, y: 0, width: 1920, height: 1080 });
        assert_eq!(mon.bar_y, 0);
        assert_eq!(mon.window_area.y, config::BAR_HEIGHT as i32);
        assert_eq!(mon.window_area.height, 1080 - config::BAR_HEIGHT as i32);
    }

    #[test]
    fn test_hidden_bar_frees_full_screen() {
        let mut mon = Monitor::new(0, Rect { x: 0, y: 0, width: 1920, height: 1080 });
        mon.show_bar = false;
        mon.update_bar_area();
        assert_eq!(mon.window_area, mon.screen);
        assert!(mon.bar_y < 0);
    }

    #[test]
    fn test_intersection_area() {
        let a = Rect { x: 0, y: 0, width: 100, height: 100 };
        let b = Rect { x: 50, y: 50, width: 100, height: 100 };
        let c = Rect { x: 200, y: 0, width: 10, height: 10 };
        assert_eq!(a.intersection_area(&b), 2500);
        assert_eq!(a.intersection_area(&c), 0);
    }
}
