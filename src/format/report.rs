//! Plain text summaries of import and export reports.
//!
//! One line per table, names padded to a common display width so the row
//! counts line up even with non-ASCII table names.

use std::fmt::Write as _;

use unicode_width::UnicodeWidthStr;

use pgjsonl_lib::{ExportReport, ImportReport};

/// Result markers.
pub mod icons {
    /// Table succeeded.
    pub const OK: &str = "✓";
    /// Table failed.
    pub const FAILED: &str = "✗";
    /// Run-level warning.
    pub const WARNING: &str = "!";
}

/// Pad `text` with spaces to `width` terminal columns.
#[must_use]
pub fn pad_to_width(text: &str, width: usize) -> String {
    let current = text.width();
    let mut padded = text.to_string();
    padded.push_str(&" ".repeat(width.saturating_sub(current)));
    padded
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(UnicodeWidthStr::width).max().unwrap_or(0)
}

fn plural(count: u64, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

/// Render an import report.
#[must_use]
pub fn format_import_report(report: &ImportReport) -> String {
    let width = name_width(report.tables.iter().map(|t| t.table.as_str()));
    let mut out = String::new();

    for table in &report.tables {
        let name = pad_to_width(&table.table, width);
        if table.success {
            let mut notes = Vec::new();
            if table.created {
                notes.push("created");
            }
            if table.cleared {
                notes.push("cleared");
            }
            let suffix = if notes.is_empty() {
                String::new()
            } else {
                format!(" ({})", notes.join(", "))
            };
            let _ = writeln!(
                out,
                "{} {name}  {}{suffix}",
                icons::OK,
                plural(table.rows_loaded, "row")
            );
        } else {
            let _ = writeln!(
                out,
                "{} {name}  failed after {} attempted: {}",
                icons::FAILED,
                plural(table.rows_attempted, "row"),
                table.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    for warning in &report.warnings {
        let _ = writeln!(out, "{} {warning}", icons::WARNING);
    }

    let failed = report.failed_tables().count();
    let total = report.tables.len();
    let _ = write!(
        out,
        "Imported {} into {} of {}",
        plural(report.total_rows_loaded(), "row"),
        total - failed,
        plural(total as u64, "table")
    );
    if failed > 0 {
        let _ = write!(out, "; {failed} failed");
    }
    out.push('\n');
    out
}

/// Render an export report.
#[must_use]
pub fn format_export_report(report: &ExportReport) -> String {
    let width = name_width(report.tables.iter().map(|t| t.table.as_str()));
    let mut out = String::new();
    let mut rows = 0;

    for table in &report.tables {
        let name = pad_to_width(&table.table, width);
        if table.success {
            rows += table.rows;
            let _ = writeln!(
                out,
                "{} {name}  {} -> {}",
                icons::OK,
                plural(table.rows, "row"),
                table.path.display()
            );
        } else {
            let _ = writeln!(
                out,
                "{} {name}  {}",
                icons::FAILED,
                table.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let exported = report.tables.iter().filter(|t| t.success).count();
    let _ = writeln!(
        out,
        "Exported {} from {}",
        plural(rows, "row"),
        plural(exported as u64, "table")
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgjsonl_lib::TableResult;

    #[test]
    fn test_pad_to_width_counts_display_columns() {
        assert_eq!(pad_to_width("ab", 4), "ab  ");
        assert_eq!(pad_to_width("表", 4), "表  ");
        assert_eq!(pad_to_width("toolong", 3), "toolong");
    }

    #[test]
    fn test_import_summary() {
        let report = ImportReport::new(
            vec![
                TableResult {
                    created: true,
                    ..TableResult::succeeded("users", 2)
                },
                TableResult::failed("orders", 500, "Load error: boom"),
                TableResult::succeeded("t", 1),
            ],
            vec!["foreign-key checks may still be disabled".to_string()],
        );
        insta::assert_snapshot!(format_import_report(&report), @r"
        ✓ users   2 rows (created)
        ✗ orders  failed after 500 rows attempted: Load error: boom
        ✓ t       1 row
        ! foreign-key checks may still be disabled
        Imported 3 rows into 2 of 3 tables; 1 failed
        ");
    }

    #[test]
    fn test_empty_import_summary() {
        let report = ImportReport::new(Vec::new(), Vec::new());
        assert_eq!(
            format_import_report(&report),
            "Imported 0 rows into 0 of 0 tables\n"
        );
    }
}
