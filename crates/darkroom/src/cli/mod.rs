//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the darkroom binary.

mod commands;
mod photos;
mod worker;

pub use commands::{Cli, Commands};
pub use photos::{fetch, list, print_config, show, upload};
pub use worker::work;
