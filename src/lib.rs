//! wslm - list, install, rename and delete WSL distributions
//!
//! This library holds everything below the front ends: invoking `wsl.exe`,
//! parsing its listings, the lifecycle actions, JSON export and the
//! background worker. The TUI (`wslm`) and the CLI (`wslm-cli`) are thin
//! layers on top.

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod logging;
pub mod parser;
pub mod types;
pub mod worker;
pub mod wsl;
