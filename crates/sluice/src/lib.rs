pub mod cli;
pub mod commands;
pub mod error;

pub use sluice_core::{api, app, config, tools, utils};
