//! Export path: each table of a schema to one JSONL (or JSON) file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PgJsonlError, Result};
use crate::jsonl::{write_json_array, write_jsonl};
use crate::model::{ExportFormat, ExportOptions, ExportReport, ExportTableResult};
use crate::session::{Query, Session};

/// Writes tables of one schema into an output directory.
pub struct Exporter<'a> {
    schema: &'a str,
    options: &'a ExportOptions,
}

impl<'a> Exporter<'a> {
    #[must_use]
    pub const fn new(schema: &'a str, options: &'a ExportOptions) -> Self {
        Self { schema, options }
    }

    /// Export every selected table into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the output directory cannot be created, or
    /// `Session` if the table list cannot be read. Failures of individual
    /// tables are recorded in the report.
    pub fn run(&self, session: &mut dyn Session, output_dir: &Path) -> Result<ExportReport> {
        fs::create_dir_all(output_dir)?;

        let tables = self.select_tables(session)?;
        tracing::info!(schema = self.schema, tables = tables.len(), "Starting export");

        let mut results = Vec::with_capacity(tables.len());
        for table in tables {
            let path = export_path(output_dir, &table, self.options.format);
            let result = match self.export_table(session, &table, &path) {
                Ok(rows) => {
                    tracing::info!(table = %table, rows, path = %path.display(), "Table exported");
                    ExportTableResult {
                        table,
                        path,
                        rows,
                        success: true,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!(table = %table, error = %e, "Table export failed");
                    ExportTableResult {
                        table,
                        path,
                        rows: 0,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }
        Ok(ExportReport::new(results))
    }

    fn select_tables(&self, session: &mut dyn Session) -> Result<Vec<String>> {
        let mut tables = if self.options.tables.is_empty() {
            session
                .query(&Query::ListTables {
                    schema: self.schema.to_string(),
                })
                .map_err(|e| {
                    PgJsonlError::Session(format!(
                        "failed to list tables in schema {}: {e}",
                        self.schema
                    ))
                })?
                .into_iter()
                .filter_map(|row| row.into_iter().next().flatten())
                .collect()
        } else {
            self.options.tables.clone()
        };
        tables.retain(|t| !self.options.skip_tables.contains(t));
        Ok(tables)
    }

    fn export_table(&self, session: &mut dyn Session, table: &str, path: &Path) -> Result<u64> {
        check_file_stem(table)?;
        let rows = session
            .query(&Query::SelectJson {
                schema: self.schema.to_string(),
                table: table.to_string(),
            })
            .map_err(|e| PgJsonlError::Session(format!("failed to read {table}: {e}")))?;

        let skip = self.options.skip_columns.for_table(table);
        let mut objects = Vec::with_capacity(rows.len());
        for cell in rows.into_iter().filter_map(|row| row.into_iter().next().flatten()) {
            let mut value: serde_json::Value = serde_json::from_str(&cell)?;
            if let (Some(skip), Some(map)) = (skip, value.as_object_mut()) {
                map.retain(|k, _| !skip.contains(k));
            }
            objects.push(value);
        }

        let written = match self.options.format {
            ExportFormat::Jsonl => write_jsonl(path, objects)?,
            ExportFormat::Json => write_json_array(path, objects)?,
        };
        Ok(written as u64)
    }
}

/// Output path for `table` under `output_dir` in `format`.
#[must_use]
pub fn export_path(output_dir: &Path, table: &str, format: ExportFormat) -> PathBuf {
    output_dir.join(format!("{table}.{}", format.extension()))
}

/// Table names become file names; one that would leave the output
/// directory is refused.
fn check_file_stem(table: &str) -> Result<()> {
    let escapes = table.is_empty()
        || table == "."
        || table == ".."
        || table.contains(['/', '\\', '\0']);
    if escapes {
        return Err(PgJsonlError::config(format!(
            "table name {table:?} cannot be used as a file name"
        )));
    }
    Ok(())
}
