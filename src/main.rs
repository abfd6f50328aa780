mod config;
mod core;
mod ewmh;
mod window;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::core::context::Context;
use crate::window::manager::{check_other_wm, WindowManager};

#[derive(Parser, Debug)]
#[command(name = "tilewm", about = "A dynamic tiling window manager", version)]
struct Args {
    /// Take over from a running window manager instead of aborting.
    #[arg(long)]
    replace: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("tilewm starting");

    let ctx = Context::new()?;
    check_other_wm(&ctx, args.replace)?;

    let mut wm = WindowManager::new(ctx)?;
    wm.scan()?;

    let result = wm.run();
    wm.cleanup();
    if let Err(e) = &result {
        error!("event loop terminated: {}", e);
    }
    result
}
