use x11rb::protocol::xproto::Window;

/// One managed top-level window.
///
/// A client is owned by exactly one monitor (`monitor` indexes the state's
/// monitor vector) and appears in both of that monitor's ordering sequences.
#[derive(Debug, Clone)]
pub struct Client {
    pub window: Window,
    pub name: String,

    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,

    pub old_x: i32,
    pub old_y: i32,
    pub old_width: i32,
    pub old_height: i32,

    pub base_width: i32,
    pub base_height: i32,
    pub inc_width: i32,
    pub inc_height: i32,
    pub max_width: i32,
    pub max_height: i32,
    pub min_width: i32,
    pub min_height: i32,
    pub min_aspect: f32,
    pub max_aspect: f32,

    pub border_width: i32,
    pub old_border_width: i32,

    pub tags: u32,

    pub is_floating: bool,
    pub is_fixed: bool,
    pub is_urgent: bool,
    pub never_focus: bool,
    pub is_fullscreen: bool,
    /// Floating flag saved across a fullscreen round-trip.
    pub old_state: bool,

    pub monitor: usize,
}

impl Client {
    pub fn new(window: Window, x: i32, y: i32, width: i32, height: i32, border_width: i32, monitor: usize) -> Self {
        Self {
            window,
            name: String::from("broken"),
            x,
            y,
            width,
            height,
            old_x: x,
            old_y: y,
            old_width: width,
            old_height: height,
            base_width: 0,
            base_height: 0,
            inc_width: 0,
            inc_height: 0,
            max_width: 0,
            max_height: 0,
            min_width: 0,
            min_height: 0,
            min_aspect: 0.0,
            max_aspect: 0.0,
            border_width,
            old_border_width: border_width,
            tags: 0,
            is_floating: false,
            is_fixed: false,
            is_urgent: false,
            never_focus: false,
            is_fullscreen: false,
            old_state: false,
            monitor,
        }
    }

    /// Width including both borders.
    pub fn total_width(&self) -> i32 {
        self.width + 2 * self.border_width
    }

    pub fn total_height(&self) -> i32 {
        self.height + 2 * self.border_width
    }

    pub fn is_visible_on(&self, tagset: u32) -> bool {
        self.tags & tagset != 0
    }

    pub fn save_geometry(&mut self) {
        self.old_x = self.x;
        self.old_y = self.y;
        self.old_width = self.width;
        self.old_height = self.height;
    }

    /// Clamp a requested content size against WM_NORMAL_HINTS: aspect ratio,
    /// size increments, base size and min/max bounds, in ICCCM order.
    pub fn constrain_size(&self, width: i32, height: i32) -> (i32, i32) {
        let mut w = width.max(1);
        let mut h = height.max(1);

        let base_is_min = self.base_width == self.min_width && self.base_height == self.min_height;
        if !base_is_min {
            // Aspect hints exclude the base size.
            w -= self.base_width;
            h -= self.base_height;
        }
        if self.min_aspect > 0.0 && self.max_aspect > 0.0 {
            if self.max_aspect < w as f32 / h as f32 {
                w = (h as f32 * self.max_aspect + 0.5) as i32;
            } else if self.min_aspect < h as f32 / w as f32 {
                h = (w as f32 * self.min_aspect + 0.5) as i32;
            }
        }
        if base_is_min {
            w -= self.base_width;
            h -= self.base_height;
        }
        if self.inc_width > 0 {
            w -= w % self.inc_width;
        }
        if self.inc_height > 0 {
            h -= h % self.inc_height;
        }
        w = (w + self.base_width).max(self.min_width);
        h = (h + self.base_height).max(self.min_height);
        if self.max_width > 0 {
            w = w.min(self.max_width);
        }
        if self.max_height > 0 {
            h = h.min(self.max_height);
        }
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new(1, 0, 0, 640, 480, 1, 0)
    }

    #[test]
    fn test_constrain_min_size() {
        let mut c = client();
        c.min_width = 100;
        c.min_height = 80;
        assert_eq!(c.constrain_size(10, 10), (100, 80));
    }

    #[test]
    fn test_constrain_max_size() {
        let mut c = client();
        c.max_width = 300;
        c.max_height = 200;
        assert_eq!(c.constrain_size(640, 480), (300, 200));
    }

    #[test]
    fn test_constrain_increment_snap() {
        let mut c = client();
        c.inc_width = 7;
        c.inc_height = 13;
        let (w, h) = c.constrain_size(100, 100);
        assert_eq!(w % 7, 0);
        assert_eq!(h % 13, 0);
        assert!(w <= 100 && h <= 100);
    }

    #[test]
    fn test_constrain_aspect_ratio() {
        let mut c = client();
        c.min_aspect = 1.0;
        c.max_aspect = 1.0;
        let (w, h) = c.constrain_size(200, 100);
        assert_eq!(w, h);
    }

    #[test]
    fn test_constrain_never_below_one() {
        let c = client();
        let (w, h) = c.constrain_size(-5, 0);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn test_fixed_size_detection_fields() {
        let mut c = client();
        c.min_width = 200;
        c.max_width = 200;
        c.min_height = 100;
        c.max_height = 100;
        assert_eq!(c.constrain_size(640, 480), (200, 100));
    }
}
