//! Status bar rendering with core fonts, plus bar window management.

use anyhow::Result;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ChangeGCAux, ConfigureWindowAux, ConnectionExt, CreateGCAux, CreateWindowAux, EventMask,
    Gcontext, Rectangle, Window, WindowClass,
};

use crate::config::{self, ColorScheme};
use crate::core::context::Context;
use crate::window::monitor::Monitor;
use crate::window::state::WmState;

/// Fixed-advance text width, padding included.
pub fn text_width(text: &str) -> i32 {
    text.chars().count() as i32 * config::CHAR_WIDTH + 2 * config::TEXT_PADDING
}

/// Longest prefix that fits in `width` pixels of bar space.
pub fn truncate_to_width(text: &str, width: i32) -> &str {
    let avail = ((width - 2 * config::TEXT_PADDING) / config::CHAR_WIDTH).max(0) as usize;
    match text.char_indices().nth(avail) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Per-tag occupancy and urgency masks for one monitor's bar.
pub fn tag_flags(state: &WmState, mon: usize) -> (u32, u32) {
    let mut occupied = 0;
    let mut urgent = 0;
    for c in state.clients.values().filter(|c| c.monitor == mon) {
        occupied |= c.tags;
        if c.is_urgent {
            urgent |= c.tags;
        }
    }
    (occupied, urgent)
}

pub fn create_bar_window(ctx: &Context, mon: &Monitor) -> Result<Window> {
    let win = ctx.conn.generate_id()?;
    let values = CreateWindowAux::new()
        .override_redirect(1)
        .background_pixel(config::SCHEME_NORMAL.bg)
        .event_mask(EventMask::EXPOSURE);
    ctx.conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        win,
        ctx.root_window,
        mon.screen.x as i16,
        mon.bar_y as i16,
        mon.screen.width as u16,
        config::BAR_HEIGHT,
        0,
        WindowClass::INPUT_OUTPUT,
        x11rb::COPY_FROM_PARENT,
        &values,
    )?;
    ctx.conn.map_window(win)?;
    Ok(win)
}

/// Follow the monitor's width and bar position.
pub fn resize_bar_window(ctx: &Context, mon: &Monitor) -> Result<()> {
    let aux = ConfigureWindowAux::new()
        .x(mon.screen.x)
        .y(mon.bar_y)
        .width(mon.screen.width as u32)
        .height(config::BAR_HEIGHT as u32);
    ctx.conn.configure_window(mon.bar_window, &aux)?;
    Ok(())
}

fn draw_section(
    ctx: &Context,
    bar: Window,
    gc: Gcontext,
    scheme: ColorScheme,
    x: i32,
    width: i32,
    text: &str,
    font_opened: bool,
) -> Result<()> {
    if width <= 0 {
        return Ok(());
    }
    ctx.conn
        .change_gc(gc, &ChangeGCAux::new().foreground(scheme.bg))?;
    ctx.conn.poly_fill_rectangle(
        bar,
        gc,
        &[Rectangle {
            x: x as i16,
            y: 0,
            width: width as u16,
            height: config::BAR_HEIGHT,
        }],
    )?;
    if font_opened && !text.is_empty() {
        ctx.conn.change_gc(
            gc,
            &ChangeGCAux::new().foreground(scheme.fg).background(scheme.bg),
        )?;
        let shown = truncate_to_width(text, width);
        // image_text8 carries at most 255 bytes per request.
        let bytes = &shown.as_bytes()[..shown.len().min(255)];
        ctx.conn.image_text8(
            bar,
            gc,
            (x + config::TEXT_PADDING) as i16,
            config::FONT_BASELINE,
            bytes,
        )?;
    }
    Ok(())
}

/// Repaint one monitor's bar: tag indicators, layout symbol, focused client
/// title, and the status text on the selected monitor.
pub fn draw_bar(ctx: &Context, state: &WmState, mon: usize) -> Result<()> {
    let m = &state.monitors[mon];
    if !m.show_bar {
        return Ok(());
    }
    let bar = m.bar_window;
    let bar_width = m.screen.width;
    let (occupied, urgent) = tag_flags(state, mon);

    let font = ctx.conn.generate_id()?;
    let mut font_opened = true;
    if ctx.conn.open_font(font, config::FONT).is_err() {
        if let Err(e) = ctx.conn.open_font(font, b"fixed") {
            debug!("Failed to open bar font: {}. Continuing without text.", e);
            font_opened = false;
        }
    }
    let gc = ctx.conn.generate_id()?;
    let mut values = CreateGCAux::new()
        .foreground(config::SCHEME_NORMAL.fg)
        .background(config::SCHEME_NORMAL.bg);
    if font_opened {
        values = values.font(font);
    }
    ctx.conn.create_gc(gc, bar, &values)?;

    let mut x = 0;
    for (i, tag) in config::TAGS.iter().enumerate() {
        let bit = 1 << i;
        let w = text_width(tag);
        let scheme = if urgent & bit != 0 {
            config::SCHEME_URGENT
        } else if m.active_tagset() & bit != 0 {
            config::SCHEME_SELECTED
        } else {
            config::SCHEME_NORMAL
        };
        draw_section(ctx, bar, gc, scheme, x, w, tag, font_opened)?;
        if occupied & bit != 0 {
            // Occupancy pip in the tag's top-left corner.
            ctx.conn
                .change_gc(gc, &ChangeGCAux::new().foreground(scheme.fg))?;
            ctx.conn.poly_fill_rectangle(
                bar,
                gc,
                &[Rectangle { x: (x + 1) as i16, y: 1, width: 3, height: 3 }],
            )?;
        }
        x += w;
    }

    let symbol_width = text_width(&m.layout_symbol);
    draw_section(
        ctx,
        bar,
        gc,
        config::SCHEME_NORMAL,
        x,
        symbol_width,
        &m.layout_symbol,
        font_opened,
    )?;
    x += symbol_width;

    let status_width = if mon == state.selmon {
        text_width(&state.status)
    } else {
        0
    };
    let title_width = bar_width - x - status_width;

    let (title, title_scheme) = match m.sel.and_then(|w| state.clients.get(&w)) {
        Some(c) => (c.name.as_str(), config::SCHEME_SELECTED),
        None => ("", config::SCHEME_NORMAL),
    };
    draw_section(ctx, bar, gc, title_scheme, x, title_width, title, font_opened)?;

    if status_width > 0 {
        draw_section(
            ctx,
            bar,
            gc,
            config::SCHEME_NORMAL,
            bar_width - status_width,
            status_width,
            &state.status,
            font_opened,
        )?;
    }

    let _ = ctx.conn.free_gc(gc);
    if font_opened {
        let _ = ctx.conn.close_font(font);
    }
    Ok(())
}

/// Repaint every monitor's bar.
pub fn draw_bars(ctx: &Context, state: &WmState) -> Result<()> {
    for mon in 0..state.monitors.len() {
        draw_bar(ctx, state, mon)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::client::Client;
    use crate::window::monitor::Rect;

    #[test]
    fn test_truncate_to_width() {
        let text = "a long window title";
        let full = text_width(text);
        assert_eq!(truncate_to_width(text, full), text);
        let short = truncate_to_width(text, 5 * config::CHAR_WIDTH + 2 * config::TEXT_PADDING);
        assert_eq!(short, "a lon");
        assert_eq!(truncate_to_width(text, 0), "");
    }

    #[test]
    fn test_tag_flags_reflect_occupancy_and_urgency() {
        let monitors = vec![Monitor::new(0, Rect { x: 0, y: 0, width: 800, height: 600 })];
        let mut state = WmState::new(monitors);
        let mut a = Client::new(1, 0, 0, 100, 100, 1, 0);
        a.tags = 1;
        let mut b = Client::new(2, 0, 0, 100, 100, 1, 0);
        b.tags = 1 << 3;
        b.is_urgent = true;
        state.clients.insert(1, a);
        state.clients.insert(2, b);

        let (occupied, urgent) = tag_flags(&state, 0);
        assert_eq!(occupied, 1 | 1 << 3);
        assert_eq!(urgent, 1 << 3);
        // Clients on another monitor do not show up here.
        assert_eq!(tag_flags(&state, 1), (0, 0));
    }
}
