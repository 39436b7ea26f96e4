//! Import engine: JSONL files into PostgreSQL tables.
//!
//! [`ImportEngine::run`] resolves the input into [`TableTarget`]s, suspends
//! foreign-key checks for the whole run if asked to, and then plans and
//! loads each table in its own transaction. A failing table becomes a
//! failed [`TableResult`]; the run carries on with the next one.

pub mod constraints;
pub mod loader;
pub mod logger;
pub mod planner;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::{PgJsonlError, Result};
use crate::model::{
    ImportReport, ImportRequest, InputSource, JSONL_EXTENSION, TableResult, TableTarget,
};
use crate::session::{Session, Transaction};

pub use constraints::ConstraintGuard;
pub use loader::{BatchLoader, LoadProgress};
pub use logger::{ImportLogger, NullLogger, TracingLogger};
pub use planner::{SchemaPlanner, TablePlan};

/// Runs one validated [`ImportRequest`] against a session.
pub struct ImportEngine<'a> {
    request: ImportRequest,
    logger: &'a dyn ImportLogger,
}

impl<'a> ImportEngine<'a> {
    #[must_use]
    pub fn new(request: ImportRequest, logger: &'a dyn ImportLogger) -> Self {
        Self { request, logger }
    }

    #[must_use]
    pub const fn request(&self) -> &ImportRequest {
        &self.request
    }

    /// Import every target table.
    ///
    /// Per-table failures are reported in the returned [`ImportReport`].
    /// A failure to restore foreign-key checks is attached as a warning.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that prevent the run from
    /// starting: `FileNotFound`/`Io` while resolving the input, or
    /// `Constraint` if foreign-key checks cannot be suspended.
    pub fn run(&self, session: &mut dyn Session) -> Result<ImportReport> {
        let options = &self.request.options;
        let targets = resolve_targets(
            &self.request.source,
            self.request.schema(),
            &options.skip_tables,
        )?;
        self.logger.run_started(&targets);

        let mut guard = ConstraintGuard::suspend(session, options.disable_foreign_keys)?;

        let mut results = Vec::with_capacity(targets.len());
        for target in &targets {
            let result = self.import_table(&mut *guard, target);
            self.logger.table_finished(&result);
            results.push(result);
        }

        let mut warnings = Vec::new();
        if let Err(e) = guard.restore() {
            let message = format!("{e}; foreign-key checks may still be disabled for this session");
            self.logger.warning(&message);
            warnings.push(message);
        }

        Ok(ImportReport::new(results, warnings))
    }

    fn import_table(&self, session: &mut dyn Session, target: &TableTarget) -> TableResult {
        self.logger.table_started(target);
        let mut progress = LoadProgress::default();
        match self.load_in_transaction(session, target, &mut progress) {
            Ok(()) => TableResult {
                rows_attempted: progress.attempted,
                created: progress.created,
                cleared: progress.cleared,
                ..TableResult::succeeded(target.table.clone(), progress.loaded)
            },
            Err(e) => {
                tracing::debug!(table = %target.display_name(), kind = e.kind(), "Table rolled back");
                TableResult::failed(target.table.clone(), progress.attempted, e.to_string())
            }
        }
    }

    fn load_in_transaction(
        &self,
        session: &mut dyn Session,
        target: &TableTarget,
        progress: &mut LoadProgress,
    ) -> Result<()> {
        let options = &self.request.options;
        let mut tx = Transaction::begin(session).map_err(|e| {
            PgJsonlError::Session(format!(
                "failed to begin transaction for {}: {e}",
                target.display_name()
            ))
        })?;

        let plan = SchemaPlanner::new(options).plan(&mut *tx, target)?;
        BatchLoader::new(options.batch_size, self.logger).load(&mut *tx, target, &plan, progress)?;

        tx.commit().map_err(|e| {
            PgJsonlError::Load(format!(
                "failed to commit {}: {e}",
                target.display_name()
            ))
        })
    }
}

/// Resolve the input source into ordered targets, dropping skipped tables.
///
/// Directory entries are sorted by file name. Only regular files with a
/// `.jsonl` extension are considered.
///
/// # Errors
///
/// Returns `FileNotFound` if the source path does not exist, `Config` if a
/// single file has no usable name, or `Io` if the directory cannot be read.
pub fn resolve_targets(
    source: &InputSource,
    schema: &str,
    skip_tables: &BTreeSet<String>,
) -> Result<Vec<TableTarget>> {
    let path = source.path();
    if !path.exists() {
        return Err(PgJsonlError::FileNotFound(path.to_path_buf()));
    }

    let mut targets = match source {
        InputSource::File(file) => {
            let target = TableTarget::from_path(file, schema).ok_or_else(|| {
                PgJsonlError::config(format!(
                    "cannot derive a table name from {}",
                    file.display()
                ))
            })?;
            vec![target]
        }
        InputSource::Directory(dir) => list_jsonl_files(dir)?
            .iter()
            .filter_map(|p| TableTarget::from_path(p, schema))
            .collect(),
    };

    targets.retain(|t| {
        let keep = !skip_tables.contains(&t.table);
        if !keep {
            tracing::debug!(table = %t.table, "Skipping table");
        }
        keep
    });
    Ok(targets)
}

fn list_jsonl_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_jsonl = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == JSONL_EXTENSION);
        if is_jsonl && entry.file_type()?.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
