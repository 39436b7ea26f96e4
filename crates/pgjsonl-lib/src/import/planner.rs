//! Per-table planning: create, clear, and which columns to keep.

use std::collections::BTreeSet;

use crate::error::{PgJsonlError, Result};
use crate::infer::{ColumnSpec, infer_columns};
use crate::jsonl::read_sample;
use crate::model::{ImportOptions, TableTarget};
use crate::session::{Session, table_exists};
use crate::value::DecodedRow;

/// What the loader should do for one table before inserting rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePlan {
    /// Columns to create the table with; `None` leaves the schema alone.
    pub create: Option<Vec<ColumnSpec>>,
    /// Delete existing rows before loading.
    pub clear: bool,
    /// Columns never inserted for this table.
    pub skip_columns: BTreeSet<String>,
}

/// Decides how each table is prepared.
#[derive(Debug, Clone, Copy)]
pub struct SchemaPlanner<'a> {
    options: &'a ImportOptions,
}

impl<'a> SchemaPlanner<'a> {
    #[must_use]
    pub const fn new(options: &'a ImportOptions) -> Self {
        Self { options }
    }

    /// Plan one table.
    ///
    /// Existence is only checked when table creation is enabled; an
    /// existing table is never altered.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if the existence check fails, or the sampling
    /// error (`Decode`, `Io`, `FileNotFound`) if the file cannot be read.
    pub fn plan(&self, session: &mut dyn Session, target: &TableTarget) -> Result<TablePlan> {
        let skip_columns = self
            .options
            .skip_columns
            .for_table(&target.table)
            .cloned()
            .unwrap_or_default();

        let mut plan = TablePlan {
            create: None,
            clear: self.options.clear_before_load,
            skip_columns,
        };

        if !self.options.create_tables {
            return Ok(plan);
        }

        let exists = table_exists(session, &target.schema, &target.table).map_err(|e| {
            PgJsonlError::Schema(format!(
                "failed to check whether {} exists: {e}",
                target.display_name()
            ))
        })?;
        if exists {
            tracing::debug!(table = %target.display_name(), "Table exists; keeping its schema");
            return Ok(plan);
        }

        let sample = read_sample(&target.path, self.options.sample_size)?;
        let columns = infer_columns(&sample, Some(&plan.skip_columns));
        if columns.is_empty() {
            tracing::warn!(
                table = %target.display_name(),
                "No columns observed in sample; table not created"
            );
            // Nothing to clear in a table that does not exist.
            plan.clear = false;
        } else {
            tracing::debug!(
                table = %target.display_name(),
                columns = columns.len(),
                sampled = sample.len(),
                "Planned table creation"
            );
            plan.create = Some(columns);
            // Freshly created tables are already empty.
            plan.clear = false;
        }
        Ok(plan)
    }
}

/// Keys of `row` that survive the exclusion set, in row order.
pub fn effective_columns<'r>(
    row: &'r DecodedRow,
    skip: &'r BTreeSet<String>,
) -> impl Iterator<Item = &'r str> {
    row.keys().filter(move |k| !skip.contains(*k))
}
