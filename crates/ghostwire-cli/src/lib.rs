//! Ghostwire CLI - command-line front end for the migration pipeline
//!
//! - `run`: push legacy files through every stage and report the outcome
//! - `score`: score a stored risk evaluation request
//! - `config show|validate`: inspect the effective configuration

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::{Cli, Commands, ConfigAction, OutputFormat};
