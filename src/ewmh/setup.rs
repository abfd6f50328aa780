use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, CreateWindowAux, PropMode, Window, WindowClass};
use x11rb::wrapper::ConnectionExt as _;

use crate::core::context::Context;

/// Advertise EWMH support on the root window.
///
/// Creates the _NET_SUPPORTING_WM_CHECK window and publishes the atoms the
/// core actually maintains. Returns the check window so cleanup can destroy it.
pub fn setup_hints(ctx: &Context) -> Result<Window> {
    let check_win = ctx.conn.generate_id()?;
    ctx.conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        check_win,
        ctx.root_window,
        -1, -1, 1, 1, 0,
        WindowClass::INPUT_OUTPUT,
        0,
        &CreateWindowAux::new(),
    )?;

    ctx.conn.change_property32(
        PropMode::REPLACE,
        check_win,
        ctx.atoms._NET_SUPPORTING_WM_CHECK,
        AtomEnum::WINDOW,
        &[check_win],
    )?;

    ctx.conn.change_property8(
        PropMode::REPLACE,
        check_win,
        ctx.atoms._NET_WM_NAME,
        ctx.atoms.UTF8_STRING,
        b"tilewm",
    )?;

    ctx.conn.change_property32(
        PropMode::REPLACE,
        ctx.root_window,
        ctx.atoms._NET_SUPPORTING_WM_CHECK,
        AtomEnum::WINDOW,
        &[check_win],
    )?;

    let supported = [
        ctx.atoms._NET_SUPPORTED,
        ctx.atoms._NET_SUPPORTING_WM_CHECK,
        ctx.atoms._NET_WM_NAME,
        ctx.atoms._NET_WM_STATE,
        ctx.atoms._NET_WM_STATE_FULLSCREEN,
        ctx.atoms._NET_ACTIVE_WINDOW,
        ctx.atoms._NET_WM_WINDOW_TYPE,
        ctx.atoms._NET_WM_WINDOW_TYPE_DIALOG,
        ctx.atoms._NET_CLIENT_LIST,
    ];
    ctx.conn.change_property32(
        PropMode::REPLACE,
        ctx.root_window,
        ctx.atoms._NET_SUPPORTED,
        AtomEnum::ATOM,
        &supported,
    )?;

    // Starts empty; manage/unmanage keep it current.
    ctx.conn.delete_property(ctx.root_window, ctx.atoms._NET_CLIENT_LIST)?;

    Ok(check_win)
}
