//! Output formatting for `pgjsonl`.
//!
//! Text summaries go to stdout; `--json` prints the serialized report
//! instead. Progress is drawn on stderr.

mod progress;
mod report;

pub use progress::ProgressLogger;
pub use report::{format_export_report, format_import_report, icons, pad_to_width};

use serde::Serialize;

use crate::error::Result;

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns `Json` if serialization fails.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
