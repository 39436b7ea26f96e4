//! Progress reporting hooks for an import run.

use crate::model::{TableResult, TableTarget};

/// Receives progress events from the import engine.
///
/// Every method has a no-op default so implementations only override the
/// events they care about. Methods take `&self`; implementations that keep
/// state use interior mutability.
pub trait ImportLogger {
    /// Targets resolved, before any table is touched.
    fn run_started(&self, _targets: &[TableTarget]) {}

    fn table_started(&self, _target: &TableTarget) {}

    /// Running total of rows inserted for the current table.
    fn rows_loaded(&self, _target: &TableTarget, _total: u64) {}

    fn table_finished(&self, _result: &TableResult) {}

    /// A problem that does not fail a table, e.g. a restore failure.
    fn warning(&self, _message: &str) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl ImportLogger for NullLogger {}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ImportLogger for TracingLogger {
    fn run_started(&self, targets: &[TableTarget]) {
        tracing::info!(tables = targets.len(), "Starting import");
    }

    fn table_started(&self, target: &TableTarget) {
        tracing::info!(
            table = %target.display_name(),
            file = %target.path.display(),
            "Importing table"
        );
    }

    fn rows_loaded(&self, target: &TableTarget, total: u64) {
        tracing::debug!(table = %target.table, rows = total, "Batch loaded");
    }

    fn table_finished(&self, result: &TableResult) {
        if result.success {
            tracing::info!(
                table = %result.table,
                rows = result.rows_loaded,
                "Table imported"
            );
        } else {
            tracing::error!(
                table = %result.table,
                attempted = result.rows_attempted,
                error = result.error.as_deref().unwrap_or("unknown error"),
                "Table import failed"
            );
        }
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}
