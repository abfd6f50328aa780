pub mod client;
pub mod draw;
pub mod error;
pub mod layout;
pub mod manager;
pub mod monitor;
pub mod state;

// ICCCM WM_STATE values.
pub const WITHDRAWN_STATE: u32 = 0;
pub const NORMAL_STATE: u32 = 1;
pub const ICONIC_STATE: u32 = 3;
