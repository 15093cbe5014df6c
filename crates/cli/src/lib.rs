//! promptcast command-line client and relay server.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod relay;
pub mod router;
