//! Batched insertion of one JSONL file into one table.

use crate::error::{PgJsonlError, Result};
use crate::import::logger::ImportLogger;
use crate::import::planner::{TablePlan, effective_columns};
use crate::jsonl::JsonlReader;
use crate::model::TableTarget;
use crate::session::{Session, Statement};
use crate::value::{DecodedRow, Value};

/// Counters for one table's load.
///
/// Kept outside the loader's return value so the orchestrator can still
/// report `rows_attempted` when the load fails part way through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    /// Rows handed to an INSERT, whether or not it succeeded.
    pub attempted: u64,
    /// Rows the database accepted.
    pub loaded: u64,
    pub created: bool,
    pub cleared: bool,
}

/// Streams a file into its table in fixed-size multi-row inserts.
pub struct BatchLoader<'a> {
    batch_size: usize,
    logger: &'a dyn ImportLogger,
}

impl<'a> BatchLoader<'a> {
    #[must_use]
    pub fn new(batch_size: usize, logger: &'a dyn ImportLogger) -> Self {
        Self {
            batch_size: batch_size.max(2),
            logger,
        }
    }

    /// Apply `plan` to the table, then insert every row of the file.
    ///
    /// The caller owns the transaction; on error nothing here is undone.
    ///
    /// # Errors
    ///
    /// - `Schema` if creating or clearing the table fails
    /// - `Decode` for the first unparsable line
    /// - `Load` if an insert fails or a batch has no insertable column
    pub fn load(
        &self,
        session: &mut dyn Session,
        target: &TableTarget,
        plan: &TablePlan,
        progress: &mut LoadProgress,
    ) -> Result<()> {
        // ====================================================================
        // Prepare
        // ====================================================================

        if let Some(columns) = &plan.create {
            session
                .execute(&Statement::CreateTable {
                    schema: target.schema.clone(),
                    table: target.table.clone(),
                    columns: columns.clone(),
                })
                .map_err(|e| {
                    PgJsonlError::Schema(format!(
                        "failed to create {}: {e}",
                        target.display_name()
                    ))
                })?;
            progress.created = true;
            tracing::info!(table = %target.display_name(), columns = columns.len(), "Created table");
        }

        if plan.clear {
            let removed = session
                .execute(&Statement::ClearTable {
                    schema: target.schema.clone(),
                    table: target.table.clone(),
                })
                .map_err(|e| {
                    PgJsonlError::Schema(format!(
                        "failed to clear {}: {e}",
                        target.display_name()
                    ))
                })?;
            progress.cleared = true;
            tracing::debug!(table = %target.display_name(), removed, "Cleared table");
        }

        // ====================================================================
        // Stream
        // ====================================================================

        let reader = JsonlReader::open(&target.path)?;
        let mut batch: Vec<DecodedRow> = Vec::with_capacity(self.batch_size);
        for row in reader {
            batch.push(row?);
            if batch.len() == self.batch_size {
                self.flush(session, target, plan, &mut batch, progress)?;
            }
        }
        if !batch.is_empty() {
            self.flush(session, target, plan, &mut batch, progress)?;
        }
        Ok(())
    }

    fn flush(
        &self,
        session: &mut dyn Session,
        target: &TableTarget,
        plan: &TablePlan,
        batch: &mut Vec<DecodedRow>,
        progress: &mut LoadProgress,
    ) -> Result<()> {
        let columns = batch_columns(batch, plan);
        if columns.is_empty() {
            return Err(PgJsonlError::Load(format!(
                "{} rows for {} have no columns left to insert",
                batch.len(),
                target.display_name()
            )));
        }

        let rows: Vec<Vec<Value>> = batch
            .drain(..)
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        let count = rows.len() as u64;
        progress.attempted += count;

        let first_row = progress.loaded + 1;
        session
            .execute(&Statement::Insert {
                schema: target.schema.clone(),
                table: target.table.clone(),
                columns,
                rows,
            })
            .map_err(|e| {
                PgJsonlError::Load(format!(
                    "insert into {} failed for rows {first_row}-{}: {e}",
                    target.display_name(),
                    first_row + count - 1
                ))
            })?;

        progress.loaded += count;
        self.logger.rows_loaded(target, progress.loaded);
        Ok(())
    }
}

/// Union of the batch's keys in first-seen order, minus skipped columns.
fn batch_columns(batch: &[DecodedRow], plan: &TablePlan) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in batch {
        for key in effective_columns(row, &plan.skip_columns) {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}
