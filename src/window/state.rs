//! The window-manager state machine: monitors, clients, and the ordering
//! invariants connecting them.
//!
//! Every client belongs to exactly one monitor and appears exactly once in
//! both of that monitor's sequences (tiling order and focus/stack order).
//! All mutations run on the single event thread; each operation leaves the
//! graph fully consistent before the next handler observes it.

use std::collections::HashMap;

use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::config;
use crate::window::client::Client;
use crate::window::layout::{self, Geom, LayoutKind};
use crate::window::monitor::{Monitor, Rect};

pub struct WmState {
    pub monitors: Vec<Monitor>,
    pub clients: HashMap<Window, Client>,
    /// Index of the selected monitor.
    pub selmon: usize,
    /// Status text shown on the selected monitor's bar.
    pub status: String,
    pub running: bool,
}

impl WmState {
    pub fn new(monitors: Vec<Monitor>) -> Self {
        Self {
            monitors,
            clients: HashMap::new(),
            selmon: 0,
            status: String::from("tilewm-0.1"),
            running: true,
        }
    }

    /// Linear search across all monitors' tiling sequences, the lookup every
    /// event handler uses to decide whether a window is managed.
    pub fn window_to_client(&self, window: Window) -> Option<&Client> {
        for mon in &self.monitors {
            for &w in &mon.tiling {
                if w == window {
                    return self.clients.get(&w);
                }
            }
        }
        None
    }

    /// Insert at the head of the owning monitor's tiling order.
    pub fn attach(&mut self, window: Window) {
        let Some(mon) = self.clients.get(&window).map(|c| c.monitor) else {
            return;
        };
        let m = &mut self.monitors[mon];
        debug_assert!(!m.tiling.contains(&window), "double attach of {window}");
        m.tiling.insert(0, window);
    }

    /// Insert at the head of the owning monitor's focus/stack order.
    pub fn attach_stack(&mut self, window: Window) {
        let Some(mon) = self.clients.get(&window).map(|c| c.monitor) else {
            return;
        };
        let m = &mut self.monitors[mon];
        debug_assert!(!m.stack.contains(&window), "double stack attach of {window}");
        m.stack.insert(0, window);
    }

    /// Splice out of the tiling order.
    pub fn detach(&mut self, window: Window) {
        let Some(mon) = self.clients.get(&window).map(|c| c.monitor) else {
            return;
        };
        let m = &mut self.monitors[mon];
        if let Some(pos) = m.tiling.iter().position(|&w| w == window) {
            m.tiling.remove(pos);
        }
    }

    /// Splice out of the focus/stack order. If the removed client was the
    /// monitor's focused client, focus falls back to the first stack entry
    /// matching the active tag mask, or to none.
    pub fn detach_stack(&mut self, window: Window) {
        let Some(mon) = self.clients.get(&window).map(|c| c.monitor) else {
            return;
        };
        let tagset = self.monitors[mon].active_tagset();
        let m = &mut self.monitors[mon];
        if let Some(pos) = m.stack.iter().position(|&w| w == window) {
            m.stack.remove(pos);
        }
        if m.sel == Some(window) {
            let clients = &self.clients;
            m.sel = m
                .stack
                .iter()
                .copied()
                .find(|w| clients.get(w).map_or(false, |c| c.is_visible_on(tagset)));
        }
    }

    /// Move a client to another monitor: detach from both source sequences,
    /// reassign ownership and tags, attach to both destination sequences.
    /// Returns (source, destination) so the caller can re-arrange both, or
    /// None when nothing moved.
    pub fn send_to_monitor(&mut self, window: Window, dest: usize) -> Option<(usize, usize)> {
        let src = self.clients.get(&window)?.monitor;
        if src == dest || dest >= self.monitors.len() {
            return None;
        }
        self.detach(window);
        self.detach_stack(window);
        let dest_tags = self.monitors[dest].active_tagset();
        if let Some(c) = self.clients.get_mut(&window) {
            c.monitor = dest;
            c.tags = dest_tags;
        }
        self.attach(window);
        self.attach_stack(window);
        debug!("sent window {} from monitor {} to {}", window, src, dest);
        Some((src, dest))
    }

    /// Visible, non-floating, non-fullscreen clients in tiling order; the
    /// subsequence the layout engine assigns slots to.
    pub fn visible_tiled(&self, mon: usize) -> Vec<Window> {
        let tagset = self.monitors[mon].active_tagset();
        self.monitors[mon]
            .tiling
            .iter()
            .copied()
            .filter(|w| {
                self.clients.get(w).map_or(false, |c| {
                    c.is_visible_on(tagset) && !c.is_floating && !c.is_fullscreen
                })
            })
            .collect()
    }

    /// Count of all visible clients on a monitor, floating included.
    pub fn visible_count(&self, mon: usize) -> usize {
        let tagset = self.monitors[mon].active_tagset();
        self.monitors[mon]
            .tiling
            .iter()
            .filter(|w| self.clients.get(w).map_or(false, |c| c.is_visible_on(tagset)))
            .count()
    }

    /// First client in focus/stack order matching the active tag mask.
    pub fn focus_candidate(&self, mon: usize) -> Option<Window> {
        let tagset = self.monitors[mon].active_tagset();
        self.monitors[mon]
            .stack
            .iter()
            .copied()
            .find(|w| self.clients.get(w).map_or(false, |c| c.is_visible_on(tagset)))
    }

    /// Run the monitor's layout over its visible tiled clients. Updates the
    /// layout symbol and returns the (window, geometry) assignments to apply.
    pub fn arrange_monitor(&mut self, mon: usize) -> Vec<(Window, Geom)> {
        let kind = self.monitors[mon].layout;
        let tiled = self.visible_tiled(mon);
        let visible = self.visible_count(mon);
        let area = self.monitors[mon].window_area;
        let borders: Vec<i32> = tiled
            .iter()
            .filter_map(|w| self.clients.get(w).map(|c| c.border_width))
            .collect();

        let geoms = match kind {
            LayoutKind::Tile => {
                let (mfact, nmaster) = (self.monitors[mon].mfact, self.monitors[mon].nmaster);
                layout::tile(area, mfact, nmaster, &borders)
            }
            LayoutKind::Monocle => layout::monocle(area, &borders),
            LayoutKind::Floating => Vec::new(),
        };
        self.monitors[mon].layout_symbol = kind.symbol(visible);
        tiled.into_iter().zip(geoms).collect()
    }

    /// Switch the monitor's view to `tags`. A zero mask flips back to the
    /// previously selected view. Returns false when the view is unchanged.
    pub fn view(&mut self, mon: usize, tags: u32) -> bool {
        let tags = tags & config::TAG_MASK;
        let m = &mut self.monitors[mon];
        if tags == m.active_tagset() {
            return false;
        }
        m.seltags ^= 1;
        if tags != 0 {
            m.tagset[m.seltags] = tags;
        }
        let candidate = self.focus_candidate(mon);
        self.monitors[mon].sel = candidate;
        true
    }

    /// Promote the focused client to the head of the tiling order so it
    /// becomes the master. No-op in floating layout, for floating clients,
    /// and when the client already holds the master slot.
    pub fn zoom(&mut self, mon: usize) -> bool {
        if self.monitors[mon].layout == LayoutKind::Floating {
            return false;
        }
        let Some(sel) = self.monitors[mon].sel else {
            return false;
        };
        if self.clients.get(&sel).map_or(true, |c| c.is_floating) {
            return false;
        }
        if self.visible_tiled(mon).first() == Some(&sel) {
            return false;
        }
        self.detach(sel);
        self.attach(sel);
        true
    }

    /// Monitor whose screen rectangle overlaps the given rectangle the most;
    /// falls back to the selected monitor.
    pub fn rect_to_monitor(&self, rect: Rect) -> usize {
        let mut best = self.selmon;
        let mut best_area = 0;
        for (i, m) in self.monitors.iter().enumerate() {
            let a = m.screen.intersection_area(&rect);
            if a > best_area {
                best_area = a;
                best = i;
            }
        }
        best
    }

    pub fn quit(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(nmons: usize) -> WmState {
        let monitors = (0..nmons)
            .map(|i| {
                Monitor::new(
                    i,
                    Rect { x: 1920 * i as i32, y: 0, width: 1920, height: 1080 },
                )
            })
            .collect();
        WmState::new(monitors)
    }

    fn add_client(state: &mut WmState, mon: usize, window: Window, tags: u32) {
        let mut c = Client::new(window, 0, 0, 640, 480, 1, mon);
        c.tags = tags;
        state.clients.insert(window, c);
        state.attach(window);
        state.attach_stack(window);
        state.monitors[mon].sel = Some(window);
    }

    fn assert_membership_symmetry(state: &WmState) {
        for m in &state.monitors {
            for &w in &m.tiling {
                assert!(m.stack.contains(&w), "window {} only in tiling order", w);
            }
            for &w in &m.stack {
                assert!(m.tiling.contains(&w), "window {} only in stack order", w);
            }
            assert_eq!(
                m.tiling.len(),
                m.stack.len(),
                "sequence lengths diverge on monitor {}",
                m.num
            );
        }
    }

    #[test]
    fn test_attach_is_newest_first() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1);
        add_client(&mut state, 0, 11, 1);
        add_client(&mut state, 0, 12, 1);
        assert_eq!(state.monitors[0].tiling, vec![12, 11, 10]);
        assert_eq!(state.monitors[0].stack, vec![12, 11, 10]);
    }

    #[test]
    fn test_membership_symmetry_across_operations() {
        let mut state = test_state(2);
        for w in 1..=6 {
            add_client(&mut state, (w % 2) as usize, w, 1);
        }
        assert_membership_symmetry(&state);

        state.detach(3);
        state.detach_stack(3);
        state.clients.remove(&3);
        assert_membership_symmetry(&state);

        state.send_to_monitor(4, 1);
        state.send_to_monitor(5, 0);
        assert_membership_symmetry(&state);

        state.zoom(0);
        state.zoom(1);
        assert_membership_symmetry(&state);
    }

    #[test]
    fn test_window_to_client_miss_is_none() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1);
        assert!(state.window_to_client(10).is_some());
        assert!(state.window_to_client(999).is_none());
    }

    #[test]
    fn test_detach_stack_focus_falls_back_to_matching_client() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1 << 1); // not on the active view
        add_client(&mut state, 0, 11, 1);
        add_client(&mut state, 0, 12, 1);
        assert_eq!(state.monitors[0].sel, Some(12));

        state.detach(12);
        state.detach_stack(12);
        // 11 matches the view mask; 10 does not.
        assert_eq!(state.monitors[0].sel, Some(11));

        state.detach(11);
        state.detach_stack(11);
        assert_eq!(state.monitors[0].sel, None);
    }

    #[test]
    fn test_detach_stack_keeps_focus_of_unrelated_client() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1);
        add_client(&mut state, 0, 11, 1);
        state.detach_stack(10);
        assert_eq!(state.monitors[0].sel, Some(11));
    }

    #[test]
    fn test_send_to_monitor_moves_both_sequences() {
        let mut state = test_state(2);
        add_client(&mut state, 0, 10, 1);
        add_client(&mut state, 1, 20, 1);

        let moved = state.send_to_monitor(10, 1);
        assert_eq!(moved, Some((0, 1)));
        assert!(!state.monitors[0].tiling.contains(&10));
        assert!(!state.monitors[0].stack.contains(&10));
        assert!(state.monitors[1].tiling.contains(&10));
        assert!(state.monitors[1].stack.contains(&10));
        assert_eq!(state.clients[&10].monitor, 1);
        assert_eq!(state.clients[&10].tags, state.monitors[1].active_tagset());

        // Both monitors recompute their layout symbols on arrange.
        state.monitors[0].layout = LayoutKind::Monocle;
        state.monitors[1].layout = LayoutKind::Monocle;
        state.arrange_monitor(0);
        state.arrange_monitor(1);
        assert_eq!(state.monitors[0].layout_symbol, "[M]");
        assert_eq!(state.monitors[1].layout_symbol, "[2]");
    }

    #[test]
    fn test_send_to_same_monitor_is_noop() {
        let mut state = test_state(2);
        add_client(&mut state, 0, 10, 1);
        assert_eq!(state.send_to_monitor(10, 0), None);
        assert_eq!(state.monitors[0].tiling, vec![10]);
    }

    #[test]
    fn test_zoom_promotes_focused_client() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1);
        add_client(&mut state, 0, 11, 1);
        state.monitors[0].sel = Some(10);
        assert!(state.zoom(0));
        assert_eq!(state.monitors[0].tiling, vec![10, 11]);
    }

    #[test]
    fn test_zoom_on_master_is_noop() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1);
        add_client(&mut state, 0, 11, 1);
        // 11 was attached last, so it already holds the master slot.
        let before = state.monitors[0].tiling.clone();
        assert!(!state.zoom(0));
        assert_eq!(state.monitors[0].tiling, before);
    }

    #[test]
    fn test_zoom_ignores_floating_layout_and_clients() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1);
        add_client(&mut state, 0, 11, 1);
        state.monitors[0].sel = Some(10);

        state.monitors[0].layout = LayoutKind::Floating;
        assert!(!state.zoom(0));

        state.monitors[0].layout = LayoutKind::Tile;
        state.clients.get_mut(&10).unwrap().is_floating = true;
        assert!(!state.zoom(0));
    }

    #[test]
    fn test_view_flips_tagset_and_refocuses() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1);
        add_client(&mut state, 0, 11, 1 << 2);

        assert!(state.view(0, 1 << 2));
        assert_eq!(state.monitors[0].active_tagset(), 1 << 2);
        assert_eq!(state.monitors[0].sel, Some(11));

        // Re-selecting the same view is a no-op.
        assert!(!state.view(0, 1 << 2));

        // A zero mask flips back to the previous view.
        assert!(state.view(0, 0));
        assert_eq!(state.monitors[0].active_tagset(), 1);
        assert_eq!(state.monitors[0].sel, Some(10));
    }

    #[test]
    fn test_arrange_monitor_matches_worked_example() {
        let mut state = test_state(1);
        // Usable rectangle (0,0,1000,500), nmaster 1, mfact 0.5.
        state.monitors[0].screen = Rect { x: 0, y: 0, width: 1000, height: 520 };
        state.monitors[0].update_bar_area();
        assert_eq!(
            state.monitors[0].window_area,
            Rect { x: 0, y: 20, width: 1000, height: 500 }
        );
        state.monitors[0].mfact = 0.5;
        state.monitors[0].nmaster = 1;
        for w in [10, 11, 12] {
            add_client(&mut state, 0, w, 1);
            state.clients.get_mut(&w).unwrap().border_width = 0;
        }
        // Oldest client first in the master slot.
        state.monitors[0].tiling = vec![10, 11, 12];

        let placements = state.arrange_monitor(0);
        let geom = |w: Window| placements.iter().find(|(pw, _)| *pw == w).unwrap().1;
        assert_eq!(geom(10), Geom { x: 0, y: 20, width: 500, height: 500 });
        assert_eq!(geom(11), Geom { x: 500, y: 20, width: 500, height: 250 });
        assert_eq!(geom(12), Geom { x: 500, y: 270, width: 500, height: 250 });
        assert_eq!(state.monitors[0].layout_symbol, "[]=");

        // Idempotent: a second pass yields identical geometries.
        assert_eq!(state.arrange_monitor(0), placements);
    }

    #[test]
    fn test_arrange_skips_floating_and_fullscreen() {
        let mut state = test_state(1);
        add_client(&mut state, 0, 10, 1);
        add_client(&mut state, 0, 11, 1);
        add_client(&mut state, 0, 12, 1);
        state.clients.get_mut(&11).unwrap().is_floating = true;
        state.clients.get_mut(&12).unwrap().is_fullscreen = true;

        let placements = state.arrange_monitor(0);
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].0, 10);
    }

    #[test]
    fn test_rect_to_monitor_picks_largest_overlap() {
        let state = test_state(2);
        let on_second = Rect { x: 2000, y: 100, width: 400, height: 300 };
        assert_eq!(state.rect_to_monitor(on_second), 1);
        let straddling = Rect { x: 1800, y: 0, width: 1000, height: 500 };
        assert_eq!(state.rect_to_monitor(straddling), 1);
    }
}
