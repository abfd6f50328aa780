//! Layout arithmetic, kept free of any connection state so the geometry
//! algorithms are deterministic and unit-testable.

use crate::window::monitor::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Tile,
    Monocle,
    Floating,
}

impl LayoutKind {
    /// Bar symbol for this layout. Monocle reflects how many clients are
    /// currently visible on the monitor.
    pub fn symbol(self, visible: usize) -> String {
        match self {
            LayoutKind::Tile => "[]=".to_string(),
            LayoutKind::Floating => "><>".to_string(),
            LayoutKind::Monocle => {
                if visible > 0 {
                    format!("[{}]", visible)
                } else {
                    "[M]".to_string()
                }
            }
        }
    }
}

/// Content geometry assigned to one tiled client (border excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geom {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Master/stack tiling over `borders.len()` clients in tiling order.
///
/// The first `nmaster` clients fill a master column of width
/// `area.width * mfact` (full width when nothing overflows into the stack);
/// the rest split the remaining column. Each slot gets
/// `remaining_height / remaining_slots`, so integer remainders accumulate
/// onto the last client of each column and the outer heights sum exactly to
/// the usable height. Content sizes never drop below 1px, even when the
/// borders alone exceed a slot.
pub fn tile(area: Rect, mfact: f32, nmaster: usize, borders: &[i32]) -> Vec<Geom> {
    let n = borders.len();
    if n == 0 {
        return Vec::new();
    }

    let master_width = if n > nmaster {
        if nmaster > 0 {
            (area.width as f32 * mfact).round() as i32
        } else {
            0
        }
    } else {
        area.width
    };

    let mut geoms = Vec::with_capacity(n);
    let mut master_y = 0;
    let mut stack_y = 0;
    for (i, &bw) in borders.iter().enumerate() {
        if i < nmaster {
            let slots = nmaster.min(n) - i;
            let h = (area.height - master_y) / slots as i32;
            geoms.push(Geom {
                x: area.x,
                y: area.y + master_y,
                width: (master_width - 2 * bw).max(1),
                height: (h - 2 * bw).max(1),
            });
            master_y += h;
        } else {
            let h = (area.height - stack_y) / (n - i) as i32;
            geoms.push(Geom {
                x: area.x + master_width,
                y: area.y + stack_y,
                width: (area.width - master_width - 2 * bw).max(1),
                height: (h - 2 * bw).max(1),
            });
            stack_y += h;
        }
    }
    geoms
}

/// Every client gets the full window area; only the top of the focus stack
/// is effectively seen.
pub fn monocle(area: Rect, borders: &[i32]) -> Vec<Geom> {
    borders
        .iter()
        .map(|&bw| Geom {
            x: area.x,
            y: area.y,
            width: (area.width - 2 * bw).max(1),
            height: (area.height - 2 * bw).max(1),
        })
        .collect()
}

/// Clamp a floating client's position so the whole window (border included)
/// stays inside the monitor area, never at negative coordinates.
pub fn clamp_to_area(area: Rect, x: i32, y: i32, width: i32, height: i32, bw: i32) -> (i32, i32) {
    let total_w = width + 2 * bw;
    let total_h = height + 2 * bw;
    let x = x
        .min(area.x + area.width - total_w)
        .max(area.x)
        .max(0);
    let y = y
        .min(area.y + area.height - total_h)
        .max(area.y)
        .max(0);
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: Rect = Rect { x: 0, y: 0, width: 1000, height: 500 };

    #[test]
    fn test_tile_master_and_stack() {
        // 3 clients, 1 master at mfact 0.5: master spans the full height,
        // stack splits the right column evenly.
        let geoms = tile(AREA, 0.5, 1, &[0, 0, 0]);
        assert_eq!(geoms[0], Geom { x: 0, y: 0, width: 500, height: 500 });
        assert_eq!(geoms[1], Geom { x: 500, y: 0, width: 500, height: 250 });
        assert_eq!(geoms[2], Geom { x: 500, y: 250, width: 500, height: 250 });
    }

    #[test]
    fn test_tile_all_masters_full_width() {
        let geoms = tile(AREA, 0.5, 3, &[0, 0]);
        assert_eq!(geoms[0], Geom { x: 0, y: 0, width: 1000, height: 250 });
        assert_eq!(geoms[1], Geom { x: 0, y: 250, width: 1000, height: 250 });
    }

    #[test]
    fn test_tile_is_deterministic() {
        let borders = [1, 1, 1, 1, 1];
        let first = tile(AREA, 0.55, 2, &borders);
        let second = tile(AREA, 0.55, 2, &borders);
        assert_eq!(first, second);
    }

    #[test]
    fn test_tile_rounding_remainder_goes_to_last() {
        // 100px / 3 stack clients: 33 + 33 + 34.
        let area = Rect { x: 0, y: 0, width: 200, height: 100 };
        let geoms = tile(area, 0.5, 0, &[0, 0, 0]);
        assert_eq!(geoms[0].height, 33);
        assert_eq!(geoms[1].height, 33);
        assert_eq!(geoms[2].height, 34);
    }

    #[test]
    fn test_tile_stack_heights_sum_to_area() {
        for n in 1..8 {
            let borders = vec![1; n + 1];
            let geoms = tile(AREA, 0.55, 1, &borders);
            let stack_sum: i32 = geoms[1..].iter().map(|g| g.height + 2).sum();
            assert_eq!(stack_sum, AREA.height, "n = {}", n);
            assert_eq!(geoms[0].height + 2, AREA.height);
        }
    }

    #[test]
    fn test_tile_border_subtracted_from_content() {
        let geoms = tile(AREA, 0.5, 1, &[2, 2]);
        assert_eq!(geoms[0].width, 500 - 4);
        assert_eq!(geoms[0].height, 500 - 4);
    }

    #[test]
    fn test_tile_overcrowded_stack_stays_positive() {
        // Far more stack clients than pixel rows: every slot height rounds
        // down to 1px or less, but content sizes must stay at least 1.
        let borders = vec![1; 301];
        let geoms = tile(AREA, 0.55, 1, &borders);
        for (i, g) in geoms.iter().enumerate() {
            assert!(g.width >= 1, "client {} got width {}", i, g.width);
            assert!(g.height >= 1, "client {} got height {}", i, g.height);
        }
    }

    #[test]
    fn test_monocle_tiny_area_stays_positive() {
        let area = Rect { x: 0, y: 0, width: 3, height: 3 };
        for g in monocle(area, &[2, 2]) {
            assert!(g.width >= 1 && g.height >= 1);
        }
    }

    #[test]
    fn test_monocle_fills_window_area() {
        let geoms = monocle(AREA, &[0, 0, 0]);
        for g in geoms {
            assert_eq!(g, Geom { x: 0, y: 0, width: 1000, height: 500 });
        }
    }

    #[test]
    fn test_monocle_symbol_counts_visible() {
        assert_eq!(LayoutKind::Monocle.symbol(3), "[3]");
        assert_eq!(LayoutKind::Monocle.symbol(0), "[M]");
        assert_eq!(LayoutKind::Tile.symbol(3), "[]=");
        assert_eq!(LayoutKind::Floating.symbol(1), "><>");
    }

    #[test]
    fn test_clamp_keeps_window_inside_area() {
        // Off the right/bottom edge gets pulled back in.
        let (x, y) = clamp_to_area(AREA, 990, 495, 100, 50, 1);
        assert_eq!((x, y), (1000 - 102, 500 - 52));
        // Off the left/top edge clamps to the area origin, never negative.
        let (x, y) = clamp_to_area(AREA, -40, -10, 100, 50, 1);
        assert_eq!((x, y), (0, 0));
    }

    #[test]
    fn test_clamp_respects_area_origin() {
        let area = Rect { x: 1920, y: 0, width: 1280, height: 1024 };
        let (x, y) = clamp_to_area(area, 5, 5, 100, 50, 0);
        assert_eq!((x, y), (1920, 5));
    }
}
