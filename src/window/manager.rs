//! Event dispatch and the X-facing side of every state mutation.

use anyhow::Result;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::properties::{WmHints, WmSizeHints};
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::{
    AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigWindow, ConfigureNotifyEvent,
    ConfigureRequestEvent, ConfigureWindowAux, ConnectionExt, CreateWindowAux, EventMask,
    GetGeometryReply, InputFocus, MapState, Mapping, NotifyDetail, NotifyMode, PropMode, Property,
    StackMode, Window, WindowClass, CONFIGURE_NOTIFY_EVENT,
};
use x11rb::protocol::Event;
use x11rb::wrapper::ConnectionExt as _;

use crate::config;
use crate::core::context::Context;
use crate::ewmh;
use crate::window::client::Client;
use crate::window::draw;
use crate::window::error::{log_and_ignore, StartupError};
use crate::window::layout::{self, LayoutKind};
use crate::window::monitor::{Monitor, Rect};
use crate::window::state::WmState;
use crate::window::{ICONIC_STATE, NORMAL_STATE, WITHDRAWN_STATE};

/// Acquire the WM_Sn manager selection and the substructure-redirect mask on
/// the root window. Exactly one client may hold either; failure means another
/// window manager owns the session.
pub fn check_other_wm(ctx: &Context, replace: bool) -> Result<()> {
    let name = format!("WM_S{}", ctx.screen_num);
    let selection = ctx.conn.intern_atom(false, name.as_bytes())?.reply()?.atom;

    let owner = ctx.conn.get_selection_owner(selection)?.reply()?.owner;
    if owner != x11rb::NONE {
        if !replace {
            return Err(StartupError::OtherWmRunning.into());
        }
        info!("replacing running window manager (selection owner {})", owner);
    }

    let selection_win = ctx.conn.generate_id()?;
    ctx.conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        selection_win,
        ctx.root_window,
        -1, -1, 1, 1, 0,
        WindowClass::INPUT_ONLY,
        x11rb::COPY_FROM_PARENT,
        &CreateWindowAux::new(),
    )?;
    ctx.conn.set_selection_owner(selection_win, selection, x11rb::CURRENT_TIME)?;
    if ctx.conn.get_selection_owner(selection)?.reply()?.owner != selection_win {
        return Err(StartupError::SelectionRefused(ctx.screen_num).into());
    }

    // The decisive test: only one client may select SubstructureRedirect.
    let redirect =
        ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_REDIRECT);
    if ctx
        .conn
        .change_window_attributes(ctx.root_window, &redirect)?
        .check()
        .is_err()
    {
        return Err(StartupError::OtherWmRunning.into());
    }

    info!("acquired manager selection {}", name);
    Ok(())
}

fn detect_monitors(ctx: &Context) -> Vec<Rect> {
    let mut rects = Vec::new();
    if let Ok(cookie) = ctx.conn.randr_get_monitors(ctx.root_window, true) {
        if let Ok(reply) = cookie.reply() {
            for info in reply.monitors {
                if info.width > 0 && info.height > 0 {
                    rects.push(Rect {
                        x: info.x as i32,
                        y: info.y as i32,
                        width: info.width as i32,
                        height: info.height as i32,
                    });
                }
            }
        }
    }
    if rects.is_empty() {
        rects.push(Rect {
            x: 0,
            y: 0,
            width: ctx.screen_width as i32,
            height: ctx.screen_height as i32,
        });
    }
    rects
}

pub struct WindowManager {
    pub ctx: Context,
    pub state: WmState,
    check_window: Window,
}

impl WindowManager {
    pub fn new(ctx: Context) -> Result<Self> {
        let mut monitors: Vec<Monitor> = detect_monitors(&ctx)
            .into_iter()
            .enumerate()
            .map(|(i, r)| Monitor::new(i, r))
            .collect();
        for mon in &mut monitors {
            mon.bar_window = draw::create_bar_window(&ctx, mon)?;
        }
        info!("managing {} monitor(s)", monitors.len());

        let check_window = ewmh::setup::setup_hints(&ctx)?;

        let event_mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::STRUCTURE_NOTIFY
            | EventMask::PROPERTY_CHANGE
            | EventMask::ENTER_WINDOW;
        ctx.conn.change_window_attributes(
            ctx.root_window,
            &ChangeWindowAttributesAux::new().event_mask(event_mask),
        )?;

        let mut wm = Self {
            ctx,
            state: WmState::new(monitors),
            check_window,
        };
        wm.update_status();
        wm.focus(None)?;
        draw::draw_bars(&wm.ctx, &wm.state)?;
        Ok(wm)
    }

    /// Adopt every pre-existing top-level window as if it had just mapped.
    /// Transients go in a second pass so their parents exist first.
    pub fn scan(&mut self) -> Result<()> {
        let tree = self.ctx.conn.query_tree(self.ctx.root_window)?.reply()?;
        info!("scanning {} pre-existing windows", tree.children.len());

        let mut transients = Vec::new();
        let mut adoptable = Vec::new();
        for &win in &tree.children {
            let Ok(attrs) = self.ctx.conn.get_window_attributes(win)?.reply() else {
                continue;
            };
            if attrs.override_redirect {
                continue;
            }
            let Ok(geom) = self.ctx.conn.get_geometry(win)?.reply() else {
                continue;
            };
            let wants_adoption = attrs.map_state == MapState::VIEWABLE
                || self.get_wm_state(win) == Some(ICONIC_STATE);
            if !wants_adoption {
                continue;
            }
            if self.get_transient_for(win).is_some() {
                transients.push((win, geom));
            } else {
                adoptable.push((win, geom));
            }
        }
        for (win, geom) in adoptable.into_iter().chain(transients) {
            self.manage(win, &geom)?;
        }
        Ok(())
    }

    /// Blocking dispatch loop; one event is fully handled, side effects
    /// included, before the next is fetched.
    pub fn run(&mut self) -> Result<()> {
        info!("entering event loop");
        while self.state.running {
            self.ctx.conn.flush()?;
            let event = self.ctx.conn.wait_for_event()?;
            self.handle_event(event)?;
        }
        Ok(())
    }

    pub fn quit(&mut self) {
        self.state.quit();
    }

    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::MapRequest(ev) => {
                let Ok(attrs) = self.ctx.conn.get_window_attributes(ev.window)?.reply() else {
                    return Ok(());
                };
                if attrs.override_redirect || self.state.clients.contains_key(&ev.window) {
                    return Ok(());
                }
                let Ok(geom) = self.ctx.conn.get_geometry(ev.window)?.reply() else {
                    return Ok(());
                };
                self.manage(ev.window, &geom)?;
            }
            Event::ConfigureRequest(ev) => {
                if self.state.window_to_client(ev.window).is_some() {
                    self.configure_managed(&ev)?;
                } else {
                    // Unmanaged windows configure themselves freely.
                    let mut aux = ConfigureWindowAux::new();
                    if ev.value_mask.contains(ConfigWindow::X) {
                        aux = aux.x(ev.x as i32);
                    }
                    if ev.value_mask.contains(ConfigWindow::Y) {
                        aux = aux.y(ev.y as i32);
                    }
                    if ev.value_mask.contains(ConfigWindow::WIDTH) {
                        aux = aux.width(ev.width as u32);
                    }
                    if ev.value_mask.contains(ConfigWindow::HEIGHT) {
                        aux = aux.height(ev.height as u32);
                    }
                    if ev.value_mask.contains(ConfigWindow::BORDER_WIDTH) {
                        aux = aux.border_width(ev.border_width as u32);
                    }
                    if ev.value_mask.contains(ConfigWindow::SIBLING) {
                        aux = aux.sibling(ev.sibling);
                    }
                    if ev.value_mask.contains(ConfigWindow::STACK_MODE) {
                        aux = aux.stack_mode(ev.stack_mode);
                    }
                    log_and_ignore(
                        self.ctx.conn.configure_window(ev.window, &aux),
                        "configure unmanaged window",
                    );
                }
            }
            Event::ConfigureNotify(ev) => {
                if ev.window == self.ctx.root_window {
                    self.root_geometry_changed(ev.width, ev.height)?;
                }
            }
            Event::UnmapNotify(ev) => {
                if self.state.clients.contains_key(&ev.window) {
                    if ev.response_type & 0x80 != 0 {
                        // Synthetic unmap: the client withdraws itself.
                        self.set_client_state(ev.window, WITHDRAWN_STATE);
                    } else {
                        self.unmanage(ev.window, false)?;
                    }
                }
            }
            Event::DestroyNotify(ev) => {
                self.unmanage(ev.window, true)?;
            }
            Event::EnterNotify(ev) => {
                if (ev.mode != NotifyMode::NORMAL || ev.detail == NotifyDetail::INFERIOR)
                    && ev.event != self.ctx.root_window
                {
                    return Ok(());
                }
                let target = self
                    .state
                    .window_to_client(ev.event)
                    .map(|c| (c.window, c.monitor));
                let mon = match target {
                    Some((_, m)) => m,
                    None => self.state.rect_to_monitor(Rect {
                        x: ev.root_x as i32,
                        y: ev.root_y as i32,
                        width: 1,
                        height: 1,
                    }),
                };
                if mon != self.state.selmon {
                    let prev = self.state.monitors[self.state.selmon].sel;
                    if let Some(p) = prev {
                        self.unfocus(p, true)?;
                    }
                    self.state.selmon = mon;
                } else if target.is_none()
                    || target.map(|(w, _)| w) == self.state.monitors[mon].sel
                {
                    return Ok(());
                }
                self.focus(target.map(|(w, _)| w))?;
            }
            Event::Expose(ev) => {
                if ev.count == 0 {
                    if let Some(mon) = self
                        .state
                        .monitors
                        .iter()
                        .position(|m| m.bar_window == ev.window)
                    {
                        draw::draw_bar(&self.ctx, &self.state, mon)?;
                    }
                }
            }
            Event::FocusIn(ev) => {
                // Corrective: the server may have moved input focus elsewhere.
                if let Some(sel) = self.state.monitors[self.state.selmon].sel {
                    if ev.event != sel {
                        self.set_focus(sel)?;
                    }
                }
            }
            Event::MappingNotify(ev) => {
                if ev.request == Mapping::KEYBOARD {
                    if let Ok(cookie) = self
                        .ctx
                        .conn
                        .get_keyboard_mapping(ev.first_keycode, ev.count)
                    {
                        log_and_ignore(cookie.reply(), "refresh keyboard mapping");
                    }
                }
            }
            Event::PropertyNotify(ev) => {
                self.property_changed(ev.window, ev.atom, ev.state == Property::DELETE)?;
            }
            Event::ClientMessage(ev) => {
                if ev.type_ == self.ctx.atoms._NET_WM_STATE {
                    let data = ev.data.as_data32();
                    if data[1] == self.ctx.atoms._NET_WM_STATE_FULLSCREEN
                        || data[2] == self.ctx.atoms._NET_WM_STATE_FULLSCREEN
                    {
                        let fullscreen = self
                            .state
                            .clients
                            .get(&ev.window)
                            .map_or(false, |c| c.is_fullscreen);
                        // 1 = add, 2 = toggle
                        let add = data[0] == 1 || (data[0] == 2 && !fullscreen);
                        self.set_fullscreen(ev.window, add)?;
                    }
                } else if ev.type_ == self.ctx.atoms._NET_ACTIVE_WINDOW {
                    let is_sel = self.state.monitors[self.state.selmon].sel == Some(ev.window);
                    if self.state.clients.contains_key(&ev.window) && !is_sel {
                        self.set_urgent(ev.window, true);
                        draw::draw_bars(&self.ctx, &self.state)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Client lifecycle

    fn manage(&mut self, window: Window, geom: &GetGeometryReply) -> Result<()> {
        let mut mon = self.state.selmon;
        let mut tags = 0;
        let transient = self.get_transient_for(window).and_then(|t| {
            self.state
                .window_to_client(t)
                .map(|parent| (parent.monitor, parent.tags))
        });
        if let Some((parent_mon, parent_tags)) = transient {
            mon = parent_mon;
            tags = parent_tags;
        }
        if tags == 0 {
            tags = self.state.monitors[mon].active_tagset();
        }

        let mut c = Client::new(
            window,
            geom.x as i32,
            geom.y as i32,
            geom.width as i32,
            geom.height as i32,
            config::BORDER_WIDTH,
            mon,
        );
        c.old_border_width = geom.border_width as i32;
        c.tags = tags;

        // Keep the new window inside its monitor.
        let area = self.state.monitors[mon].window_area;
        c.x = c.x.min(area.x + area.width - c.total_width()).max(area.x);
        c.y = c.y.min(area.y + area.height - c.total_height()).max(area.y);

        self.state.clients.insert(window, c);
        self.update_title(window);
        self.update_size_hints(window);
        self.update_wm_hints(window);

        let is_dialog = self.read_atom_property(window, self.ctx.atoms._NET_WM_WINDOW_TYPE)
            == Some(self.ctx.atoms._NET_WM_WINDOW_TYPE_DIALOG);
        if let Some(c) = self.state.clients.get_mut(&window) {
            if transient.is_some() || is_dialog || c.is_fixed {
                c.is_floating = true;
            }
            c.old_state = c.is_floating;
        }

        self.ctx.conn.configure_window(
            window,
            &ConfigureWindowAux::new().border_width(config::BORDER_WIDTH as u32),
        )?;
        self.ctx.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new()
                .border_pixel(config::SCHEME_NORMAL.border)
                .event_mask(
                    EventMask::ENTER_WINDOW
                        | EventMask::FOCUS_CHANGE
                        | EventMask::PROPERTY_CHANGE
                        | EventMask::STRUCTURE_NOTIFY,
                ),
        )?;
        self.send_configure_notify(window)?;

        self.state.attach(window);
        self.state.attach_stack(window);
        self.ctx.conn.change_property32(
            PropMode::APPEND,
            self.ctx.root_window,
            self.ctx.atoms._NET_CLIENT_LIST,
            AtomEnum::WINDOW,
            &[window],
        )?;
        self.set_client_state(window, NORMAL_STATE);

        if self.read_atom_property(window, self.ctx.atoms._NET_WM_STATE)
            == Some(self.ctx.atoms._NET_WM_STATE_FULLSCREEN)
        {
            self.set_fullscreen(window, true)?;
        }

        if mon == self.state.selmon {
            if let Some(prev) = self.state.monitors[mon].sel {
                self.unfocus(prev, false)?;
            }
        }
        self.ctx.conn.map_window(window)?;
        self.arrange(Some(mon))?;
        self.focus(None)?;

        let name = self
            .state
            .clients
            .get(&window)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        info!("managed window {} ({})", window, name);
        Ok(())
    }

    /// Remove a client unconditionally from both sequences, then reconcile
    /// focus and layout. `destroyed` skips the courtesy X calls for windows
    /// that no longer exist.
    fn unmanage(&mut self, window: Window, destroyed: bool) -> Result<()> {
        let Some((mon, old_bw)) = self
            .state
            .clients
            .get(&window)
            .map(|c| (c.monitor, c.old_border_width))
        else {
            return Ok(());
        };
        self.state.detach(window);
        self.state.detach_stack(window);
        if !destroyed {
            log_and_ignore(
                self.ctx.conn.configure_window(
                    window,
                    &ConfigureWindowAux::new().border_width(old_bw as u32),
                ),
                "restore client border",
            );
            self.set_client_state(window, WITHDRAWN_STATE);
        }
        self.state.clients.remove(&window);
        self.update_client_list()?;
        self.focus(None)?;
        self.arrange(Some(mon))?;
        debug!("unmanaged window {}", window);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Focus

    /// Focus `target`, or the top visible client in the selected monitor's
    /// stack order when `target` is none or no longer visible.
    pub fn focus(&mut self, target: Option<Window>) -> Result<()> {
        let visible = |state: &WmState, w: &Window| {
            state.clients.get(w).map_or(false, |c| {
                c.is_visible_on(state.monitors[c.monitor].active_tagset())
            })
        };
        let mut target = target.filter(|w| visible(&self.state, w));
        if target.is_none() {
            target = self.state.focus_candidate(self.state.selmon);
        }

        let prev = self.state.monitors[self.state.selmon].sel;
        if prev != target {
            if let Some(p) = prev {
                self.unfocus(p, false)?;
            }
        }

        if let Some(w) = target {
            if let Some(mon) = self.state.clients.get(&w).map(|c| c.monitor) {
                if mon != self.state.selmon {
                    self.state.selmon = mon;
                }
            }
            if self.state.clients.get(&w).map_or(false, |c| c.is_urgent) {
                self.set_urgent(w, false);
            }
            // Raise to the head of the focus/stack order.
            self.state.detach_stack(w);
            self.state.attach_stack(w);
            self.ctx.conn.change_window_attributes(
                w,
                &ChangeWindowAttributesAux::new().border_pixel(config::SCHEME_SELECTED.border),
            )?;
            self.set_focus(w)?;
        } else {
            self.ctx.conn.set_input_focus(
                InputFocus::POINTER_ROOT,
                self.ctx.root_window,
                x11rb::CURRENT_TIME,
            )?;
            self.ctx
                .conn
                .delete_property(self.ctx.root_window, self.ctx.atoms._NET_ACTIVE_WINDOW)?;
        }
        self.state.monitors[self.state.selmon].sel = target;
        draw::draw_bars(&self.ctx, &self.state)?;
        Ok(())
    }

    fn unfocus(&mut self, window: Window, set_focus_root: bool) -> Result<()> {
        if !self.state.clients.contains_key(&window) {
            return Ok(());
        }
        log_and_ignore(
            self.ctx.conn.change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().border_pixel(config::SCHEME_NORMAL.border),
            ),
            "reset focus border",
        );
        if set_focus_root {
            self.ctx.conn.set_input_focus(
                InputFocus::POINTER_ROOT,
                self.ctx.root_window,
                x11rb::CURRENT_TIME,
            )?;
            self.ctx
                .conn
                .delete_property(self.ctx.root_window, self.ctx.atoms._NET_ACTIVE_WINDOW)?;
        }
        Ok(())
    }

    /// Hand the input focus to a client, honoring never-focus hints via
    /// WM_TAKE_FOCUS only.
    fn set_focus(&mut self, window: Window) -> Result<()> {
        let never_focus = self
            .state
            .clients
            .get(&window)
            .map_or(false, |c| c.never_focus);
        if !never_focus {
            self.ctx.conn.set_input_focus(
                InputFocus::POINTER_ROOT,
                window,
                x11rb::CURRENT_TIME,
            )?;
            self.ctx.conn.change_property32(
                PropMode::REPLACE,
                self.ctx.root_window,
                self.ctx.atoms._NET_ACTIVE_WINDOW,
                AtomEnum::WINDOW,
                &[window],
            )?;
        }
        self.send_protocol(window, self.ctx.atoms.WM_TAKE_FOCUS)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Geometry

    /// Apply a layout or floating geometry: update bookkeeping, reconfigure
    /// the window, and tell the client about its new geometry.
    fn resize_client(&mut self, window: Window, x: i32, y: i32, width: i32, height: i32) -> Result<()> {
        // Geometry is content-relative; a request can never shrink below 1px.
        let width = width.max(1);
        let height = height.max(1);
        let Some(c) = self.state.clients.get_mut(&window) else {
            return Ok(());
        };
        c.save_geometry();
        c.x = x;
        c.y = y;
        c.width = width;
        c.height = height;
        let bw = c.border_width;
        self.ctx.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(x)
                .y(y)
                .width(width as u32)
                .height(height as u32)
                .border_width(bw as u32),
        )?;
        self.send_configure_notify(window)?;
        Ok(())
    }

    /// Size-hint-respecting resize, used for floating clients.
    fn resize(&mut self, window: Window, x: i32, y: i32, width: i32, height: i32) -> Result<()> {
        let Some((w, h)) = self
            .state
            .clients
            .get(&window)
            .map(|c| c.constrain_size(width, height))
        else {
            return Ok(());
        };
        self.resize_client(window, x, y, w, h)
    }

    /// Reconcile one monitor (or all): place visible clients, hide the rest,
    /// run the layout, restack, repaint the bar.
    pub fn arrange(&mut self, mon: Option<usize>) -> Result<()> {
        match mon {
            Some(m) => self.arrange_one(m),
            None => {
                for m in 0..self.state.monitors.len() {
                    self.arrange_one(m)?;
                }
                Ok(())
            }
        }
    }

    fn arrange_one(&mut self, mon: usize) -> Result<()> {
        self.show_hide(mon)?;
        let placements = self.state.arrange_monitor(mon);
        for (w, g) in placements {
            // Tiled clients bypass size hints so columns stay gapless.
            self.resize_client(w, g.x, g.y, g.width, g.height)?;
        }
        self.restack(mon)
    }

    /// Move visible clients on-screen and park hidden ones off the left edge
    /// (keeps them mapped, per the stacking model).
    fn show_hide(&mut self, mon: usize) -> Result<()> {
        let tagset = self.state.monitors[mon].active_tagset();
        let floating_layout = self.state.monitors[mon].layout == LayoutKind::Floating;
        let area = self.state.monitors[mon].window_area;
        let stack: Vec<Window> = self.state.monitors[mon].stack.clone();
        for w in stack {
            let Some(c) = self.state.clients.get(&w) else {
                continue;
            };
            let (x, y, width, height, bw, total_w) =
                (c.x, c.y, c.width, c.height, c.border_width, c.total_width());
            let (visible, floating, fullscreen) =
                (c.is_visible_on(tagset), c.is_floating, c.is_fullscreen);
            if visible {
                self.ctx
                    .conn
                    .configure_window(w, &ConfigureWindowAux::new().x(x).y(y))?;
                if (floating_layout || floating) && !fullscreen {
                    let (cx, cy) = layout::clamp_to_area(area, x, y, width, height, bw);
                    self.resize(w, cx, cy, width, height)?;
                }
            } else {
                self.ctx
                    .conn
                    .configure_window(w, &ConfigureWindowAux::new().x(-2 * total_w))?;
            }
        }
        Ok(())
    }

    /// Raise the focused floating client, push tiled clients below the bar in
    /// focus/stack order.
    fn restack(&mut self, mon: usize) -> Result<()> {
        draw::draw_bar(&self.ctx, &self.state, mon)?;
        let layout = self.state.monitors[mon].layout;
        let tagset = self.state.monitors[mon].active_tagset();
        if let Some(sel) = self.state.monitors[mon].sel {
            let sel_floating = self
                .state
                .clients
                .get(&sel)
                .map_or(false, |c| c.is_floating);
            if sel_floating || layout == LayoutKind::Floating {
                self.ctx.conn.configure_window(
                    sel,
                    &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
                )?;
            }
        }
        if layout != LayoutKind::Floating {
            let mut sibling = self.state.monitors[mon].bar_window;
            for i in 0..self.state.monitors[mon].stack.len() {
                let w = self.state.monitors[mon].stack[i];
                let tiled = self.state.clients.get(&w).map_or(false, |c| {
                    !c.is_floating && c.is_visible_on(tagset)
                });
                if tiled {
                    self.ctx.conn.configure_window(
                        w,
                        &ConfigureWindowAux::new()
                            .sibling(sibling)
                            .stack_mode(StackMode::BELOW),
                    )?;
                    sibling = w;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // User actions

    /// Switch the selected monitor's view to a tag mask.
    pub fn view(&mut self, tags: u32) -> Result<()> {
        let mon = self.state.selmon;
        if self.state.view(mon, tags) {
            self.focus(None)?;
            self.arrange(Some(mon))?;
        }
        Ok(())
    }

    /// Promote the focused client to master.
    pub fn zoom(&mut self) -> Result<()> {
        let mon = self.state.selmon;
        if self.state.zoom(mon) {
            self.arrange(Some(mon))?;
        }
        Ok(())
    }

    /// Move a client to another monitor and reconcile both.
    pub fn send_to_monitor(&mut self, window: Window, dest: usize) -> Result<()> {
        if let Some((src, dest)) = self.state.send_to_monitor(window, dest) {
            self.focus(None)?;
            self.arrange(Some(src))?;
            self.arrange(Some(dest))?;
        }
        Ok(())
    }

    /// Toggle the selected monitor's bar and reclaim/yield its strip.
    pub fn toggle_bar(&mut self) -> Result<()> {
        let mon = self.state.selmon;
        {
            let m = &mut self.state.monitors[mon];
            m.show_bar = !m.show_bar;
            m.update_bar_area();
        }
        draw::resize_bar_window(&self.ctx, &self.state.monitors[mon])?;
        self.arrange(Some(mon))
    }

    /// Select a layout for the selected monitor.
    pub fn set_layout(&mut self, kind: LayoutKind) -> Result<()> {
        let mon = self.state.selmon;
        if self.state.monitors[mon].layout != kind {
            self.state.monitors[mon].layout = kind;
            self.arrange(Some(mon))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Event helpers

    /// Geometry request from a managed client: validate against size hints
    /// and store. Only floating/fullscreen clients (or a floating layout)
    /// get it applied immediately; tiled clients cannot self-resize and the
    /// next arrange pass overrides them.
    fn configure_managed(&mut self, ev: &ConfigureRequestEvent) -> Result<()> {
        if ev.value_mask.contains(ConfigWindow::BORDER_WIDTH) {
            if let Some(c) = self.state.clients.get_mut(&ev.window) {
                c.border_width = ev.border_width as i32;
            }
        }
        let Some(c) = self.state.clients.get(&ev.window) else {
            return Ok(());
        };
        let mon = c.monitor;
        let floating = c.is_floating
            || c.is_fullscreen
            || self.state.monitors[mon].layout == LayoutKind::Floating;
        let screen = self.state.monitors[mon].screen;

        let mut x = c.x;
        let mut y = c.y;
        let mut width = c.width;
        let mut height = c.height;
        if ev.value_mask.contains(ConfigWindow::X) {
            x = screen.x + ev.x as i32;
        }
        if ev.value_mask.contains(ConfigWindow::Y) {
            y = screen.y + ev.y as i32;
        }
        if ev.value_mask.contains(ConfigWindow::WIDTH) {
            width = ev.width as i32;
        }
        if ev.value_mask.contains(ConfigWindow::HEIGHT) {
            height = ev.height as i32;
        }
        let (width, height) = c.constrain_size(width, height);

        if let Some(c) = self.state.clients.get_mut(&ev.window) {
            c.save_geometry();
            c.x = x;
            c.y = y;
            c.width = width;
            c.height = height;
        }
        if floating {
            let bw = self
                .state
                .clients
                .get(&ev.window)
                .map_or(0, |c| c.border_width);
            self.ctx.conn.configure_window(
                ev.window,
                &ConfigureWindowAux::new()
                    .x(x)
                    .y(y)
                    .width(width as u32)
                    .height(height as u32)
                    .border_width(bw as u32),
            )?;
        }
        self.send_configure_notify(ev.window)?;
        Ok(())
    }

    fn property_changed(&mut self, window: Window, atom: u32, deleted: bool) -> Result<()> {
        if window == self.ctx.root_window {
            if atom == u32::from(AtomEnum::WM_NAME) {
                self.update_status();
                draw::draw_bar(&self.ctx, &self.state, self.state.selmon)?;
            }
            return Ok(());
        }
        if deleted || !self.state.clients.contains_key(&window) {
            return Ok(());
        }

        if atom == u32::from(AtomEnum::WM_TRANSIENT_FOR) {
            let is_floating = self
                .state
                .clients
                .get(&window)
                .map_or(true, |c| c.is_floating);
            if !is_floating {
                let parent_managed = self
                    .get_transient_for(window)
                    .map_or(false, |t| self.state.window_to_client(t).is_some());
                if parent_managed {
                    let mon = self.state.clients.get(&window).map(|c| c.monitor);
                    if let Some(c) = self.state.clients.get_mut(&window) {
                        c.is_floating = true;
                    }
                    if let Some(mon) = mon {
                        self.arrange(Some(mon))?;
                    }
                }
            }
        } else if atom == u32::from(AtomEnum::WM_NORMAL_HINTS) {
            self.update_size_hints(window);
        } else if atom == u32::from(AtomEnum::WM_HINTS) {
            self.update_wm_hints(window);
            draw::draw_bars(&self.ctx, &self.state)?;
        }

        if atom == u32::from(AtomEnum::WM_NAME) || atom == self.ctx.atoms._NET_WM_NAME {
            self.update_title(window);
            if let Some(mon) = self.state.clients.get(&window).map(|c| c.monitor) {
                if self.state.monitors[mon].sel == Some(window) {
                    draw::draw_bar(&self.ctx, &self.state, mon)?;
                }
            }
        }
        Ok(())
    }

    fn root_geometry_changed(&mut self, width: u16, height: u16) -> Result<()> {
        if self.ctx.screen_width == width && self.ctx.screen_height == height {
            return Ok(());
        }
        self.ctx.screen_width = width;
        self.ctx.screen_height = height;
        // Hot-plug reconfiguration is out of scope; with a single monitor we
        // track the root geometry so the layout stays usable.
        if self.state.monitors.len() == 1 {
            self.state.monitors[0].screen = Rect {
                x: 0,
                y: 0,
                width: width as i32,
                height: height as i32,
            };
            self.state.monitors[0].update_bar_area();
            draw::resize_bar_window(&self.ctx, &self.state.monitors[0])?;
            self.focus(None)?;
            self.arrange(None)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fullscreen / urgency / property readers

    pub fn set_fullscreen(&mut self, window: Window, fullscreen: bool) -> Result<()> {
        let Some(current) = self.state.clients.get(&window).map(|c| c.is_fullscreen) else {
            return Ok(());
        };
        if fullscreen && !current {
            self.ctx.conn.change_property32(
                PropMode::REPLACE,
                window,
                self.ctx.atoms._NET_WM_STATE,
                AtomEnum::ATOM,
                &[self.ctx.atoms._NET_WM_STATE_FULLSCREEN],
            )?;
            let Some(c) = self.state.clients.get_mut(&window) else {
                return Ok(());
            };
            c.is_fullscreen = true;
            c.old_state = c.is_floating;
            c.old_border_width = c.border_width;
            c.border_width = 0;
            c.is_floating = true;
            let mon = c.monitor;
            let screen = self.state.monitors[mon].screen;
            self.resize_client(window, screen.x, screen.y, screen.width, screen.height)?;
            self.ctx.conn.configure_window(
                window,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )?;
        } else if !fullscreen && current {
            self.ctx.conn.change_property32(
                PropMode::REPLACE,
                window,
                self.ctx.atoms._NET_WM_STATE,
                AtomEnum::ATOM,
                &[],
            )?;
            let Some(c) = self.state.clients.get_mut(&window) else {
                return Ok(());
            };
            c.is_fullscreen = false;
            c.is_floating = c.old_state;
            c.border_width = c.old_border_width;
            let (x, y, w, h, mon) = (c.old_x, c.old_y, c.old_width, c.old_height, c.monitor);
            self.resize_client(window, x, y, w, h)?;
            self.arrange(Some(mon))?;
        }
        Ok(())
    }

    fn set_urgent(&mut self, window: Window, urgent: bool) {
        if let Some(c) = self.state.clients.get_mut(&window) {
            c.is_urgent = urgent;
        }
        if let Ok(cookie) = WmHints::get(&self.ctx.conn, window) {
            if let Ok(Some(mut hints)) = cookie.reply() {
                hints.urgent = urgent;
                log_and_ignore(hints.set(&self.ctx.conn, window), "update urgency hint");
            }
        }
    }

    fn update_title(&mut self, window: Window) {
        let mut name = String::from("broken");
        let candidates = [
            (self.ctx.atoms._NET_WM_NAME, self.ctx.atoms.UTF8_STRING),
            (u32::from(AtomEnum::WM_NAME), u32::from(AtomEnum::ANY)),
        ];
        for (atom, ty) in candidates {
            if let Ok(cookie) = self.ctx.conn.get_property(false, window, atom, ty, 0, 1024) {
                if let Ok(reply) = cookie.reply() {
                    if !reply.value.is_empty() {
                        if let Ok(s) = String::from_utf8(reply.value) {
                            name = s;
                            break;
                        }
                    }
                }
            }
        }
        if let Some(c) = self.state.clients.get_mut(&window) {
            c.name = name;
        }
    }

    fn update_size_hints(&mut self, window: Window) {
        let hints = WmSizeHints::get_normal_hints(&self.ctx.conn, window)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .flatten()
            .unwrap_or_else(WmSizeHints::new);
        let Some(c) = self.state.clients.get_mut(&window) else {
            return;
        };
        let (base_w, base_h) = hints.base_size.or(hints.min_size).unwrap_or((0, 0));
        let (min_w, min_h) = hints.min_size.or(hints.base_size).unwrap_or((0, 0));
        let (max_w, max_h) = hints.max_size.unwrap_or((0, 0));
        let (inc_w, inc_h) = hints.size_increment.unwrap_or((0, 0));
        c.base_width = base_w;
        c.base_height = base_h;
        c.min_width = min_w;
        c.min_height = min_h;
        c.max_width = max_w;
        c.max_height = max_h;
        c.inc_width = inc_w;
        c.inc_height = inc_h;
        c.min_aspect = 0.0;
        c.max_aspect = 0.0;
        if let Some((min_a, max_a)) = hints.aspect {
            if min_a.numerator > 0 {
                c.min_aspect = min_a.denominator as f32 / min_a.numerator as f32;
            }
            if max_a.denominator > 0 {
                c.max_aspect = max_a.numerator as f32 / max_a.denominator as f32;
            }
        }
        c.is_fixed = max_w > 0 && max_h > 0 && max_w == min_w && max_h == min_h;
    }

    fn update_wm_hints(&mut self, window: Window) {
        let Some(hints) = WmHints::get(&self.ctx.conn, window)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .flatten()
        else {
            return;
        };
        let focused = self.state.monitors[self.state.selmon].sel == Some(window);
        if focused && hints.urgent {
            // The focused client clears its own urgency.
            let mut cleared = hints.clone();
            cleared.urgent = false;
            log_and_ignore(cleared.set(&self.ctx.conn, window), "clear urgency hint");
        }
        if let Some(c) = self.state.clients.get_mut(&window) {
            c.is_urgent = hints.urgent && !focused;
            c.never_focus = !hints.input.unwrap_or(true);
        }
    }

    fn update_status(&mut self) {
        let mut status = String::from("tilewm-0.1");
        if let Ok(cookie) = self.ctx.conn.get_property(
            false,
            self.ctx.root_window,
            AtomEnum::WM_NAME,
            AtomEnum::ANY,
            0,
            1024,
        ) {
            if let Ok(reply) = cookie.reply() {
                if !reply.value.is_empty() {
                    if let Ok(s) = String::from_utf8(reply.value) {
                        status = s;
                    }
                }
            }
        }
        self.state.status = status;
    }

    fn update_client_list(&self) -> Result<()> {
        self.ctx
            .conn
            .delete_property(self.ctx.root_window, self.ctx.atoms._NET_CLIENT_LIST)?;
        for &w in self.state.clients.keys() {
            self.ctx.conn.change_property32(
                PropMode::APPEND,
                self.ctx.root_window,
                self.ctx.atoms._NET_CLIENT_LIST,
                AtomEnum::WINDOW,
                &[w],
            )?;
        }
        Ok(())
    }

    fn set_client_state(&self, window: Window, wm_state: u32) {
        log_and_ignore(
            self.ctx.conn.change_property32(
                PropMode::REPLACE,
                window,
                self.ctx.atoms.WM_STATE,
                self.ctx.atoms.WM_STATE,
                &[wm_state, 0],
            ),
            "set WM_STATE",
        );
    }

    fn get_wm_state(&self, window: Window) -> Option<u32> {
        let reply = self
            .ctx
            .conn
            .get_property(false, window, self.ctx.atoms.WM_STATE, self.ctx.atoms.WM_STATE, 0, 2)
            .ok()?
            .reply()
            .ok()?;
        let value = reply.value32()?.next();
        value
    }

    fn get_transient_for(&self, window: Window) -> Option<Window> {
        let reply = self
            .ctx
            .conn
            .get_property(
                false,
                window,
                AtomEnum::WM_TRANSIENT_FOR,
                AtomEnum::WINDOW,
                0,
                1,
            )
            .ok()?
            .reply()
            .ok()?;
        let value = reply.value32()?.next();
        value.filter(|&w| w != x11rb::NONE)
    }

    /// First atom of a 32-bit ATOM property, if any.
    fn read_atom_property(&self, window: Window, property: u32) -> Option<u32> {
        let reply = self
            .ctx
            .conn
            .get_property(false, window, property, AtomEnum::ATOM, 0, 32)
            .ok()?
            .reply()
            .ok()?;
        let value = reply.value32()?.next();
        value
    }

    fn send_configure_notify(&self, window: Window) -> Result<()> {
        let Some(c) = self.state.clients.get(&window) else {
            return Ok(());
        };
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: x11rb::NONE,
            x: c.x as i16,
            y: c.y as i16,
            width: c.width as u16,
            height: c.height as u16,
            border_width: c.border_width as u16,
            override_redirect: false,
        };
        self.ctx
            .conn
            .send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn send_protocol(&self, window: Window, protocol: u32) -> Result<()> {
        let mut supported = false;
        if let Ok(cookie) =
            self.ctx
                .conn
                .get_property(false, window, self.ctx.atoms.WM_PROTOCOLS, AtomEnum::ATOM, 0, 32)
        {
            if let Ok(reply) = cookie.reply() {
                if let Some(mut protocols) = reply.value32() {
                    supported = protocols.any(|a| a == protocol);
                }
            }
        }
        if supported {
            let data = [protocol, x11rb::CURRENT_TIME, 0, 0, 0];
            let event = ClientMessageEvent::new(32, window, self.ctx.atoms.WM_PROTOCOLS, data);
            self.ctx
                .conn
                .send_event(false, window, EventMask::NO_EVENT, event)?;
        }
        Ok(())
    }

    /// Undo management on shutdown: restore borders, withdraw clients, drop
    /// our windows and root properties.
    pub fn cleanup(&mut self) {
        let windows: Vec<Window> = self.state.clients.keys().copied().collect();
        for w in windows {
            log_and_ignore(
                self.ctx.conn.configure_window(
                    w,
                    &ConfigureWindowAux::new().border_width(
                        self.state
                            .clients
                            .get(&w)
                            .map_or(0, |c| c.old_border_width as u32),
                    ),
                ),
                "restore border on exit",
            );
            self.set_client_state(w, WITHDRAWN_STATE);
        }
        for mon in &self.state.monitors {
            log_and_ignore(
                self.ctx.conn.destroy_window(mon.bar_window),
                "destroy bar window",
            );
        }
        log_and_ignore(
            self.ctx.conn.destroy_window(self.check_window),
            "destroy EWMH check window",
        );
        log_and_ignore(
            self.ctx.conn.set_input_focus(
                InputFocus::POINTER_ROOT,
                self.ctx.root_window,
                x11rb::CURRENT_TIME,
            ),
            "reset input focus",
        );
        log_and_ignore(
            self.ctx
                .conn
                .delete_property(self.ctx.root_window, self.ctx.atoms._NET_ACTIVE_WINDOW),
            "clear active window",
        );
        if let Err(e) = self.ctx.conn.flush() {
            warn!("final flush failed: {}", e);
        }
    }
}
