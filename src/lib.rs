//! Live chat stream where every message expires after a fixed visibility
//! window. The core is [`buffer::ExpiringBuffer`]; login, transport and
//! rendering live at the edges and can be swapped out.

pub mod buffer;
pub mod common;
pub mod config;
pub mod network;
pub mod session;
