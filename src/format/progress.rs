//! Terminal progress for import runs.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use pgjsonl_lib::import::{ImportLogger, TracingLogger};
use pgjsonl_lib::{TableResult, TableTarget};

const TICK: Duration = Duration::from_millis(120);

/// Spinner on stderr showing the current table and its row count.
///
/// Every event is also forwarded to [`TracingLogger`], so `-v` output is
/// the same with or without the spinner.
pub struct ProgressLogger {
    bar: ProgressBar,
    tracing: TracingLogger,
}

impl ProgressLogger {
    /// A visible spinner if `enabled` and stderr is a terminal, otherwise a
    /// hidden one.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled && std::io::stderr().is_terminal() {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{spinner} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            tracing: TracingLogger,
        }
    }

    /// Clear the spinner once the run is over.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ImportLogger for ProgressLogger {
    fn run_started(&self, targets: &[TableTarget]) {
        self.tracing.run_started(targets);
        self.bar.enable_steady_tick(TICK);
    }

    fn table_started(&self, target: &TableTarget) {
        self.tracing.table_started(target);
        self.bar.set_prefix(target.table.clone());
        self.bar.set_message("preparing");
    }

    fn rows_loaded(&self, target: &TableTarget, total: u64) {
        self.tracing.rows_loaded(target, total);
        self.bar.set_message(format!("{total} rows"));
    }

    fn table_finished(&self, result: &TableResult) {
        // Keep tracing output from tearing the spinner line.
        self.bar.suspend(|| self.tracing.table_finished(result));
    }

    fn warning(&self, message: &str) {
        self.bar.suspend(|| self.tracing.warning(message));
    }
}

impl Drop for ProgressLogger {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
