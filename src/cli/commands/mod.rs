//! Command implementations.

pub mod completions;
pub mod export;
pub mod import;
