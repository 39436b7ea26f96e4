//! `pgjsonl` - move PostgreSQL table data to and from JSONL files
//!
//! This crate provides the `pgjsonl` binary on top of the `pgjsonl-lib`
//! engine: argument parsing, configuration, the live PostgreSQL session,
//! and terminal output.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - YAML profile and connection settings precedence
//! - [`storage`] - PostgreSQL `Session` implementation
//! - [`format`] - Text summaries, JSON output, progress spinner
//! - [`logging`] - `tracing` subscriber setup
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod storage;

pub use cli::run;
pub use error::{AppError, Result};
