//! Request, option, and report types shared by import and export.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PgJsonlError, Result};

/// Default number of rows per INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 500;
/// Default number of rows sampled for type inference.
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;
/// Default PostgreSQL schema.
pub const DEFAULT_SCHEMA: &str = "public";

/// File extension of import files.
pub const JSONL_EXTENSION: &str = "jsonl";

// ============================================================================
// Connection
// ============================================================================

/// Parameters needed to open a database session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub schema: String,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("schema", &self.schema)
            .finish()
    }
}

// ============================================================================
// Exclusion filters
// ============================================================================

/// Parse a comma-separated list of table names.
///
/// Whitespace around names is trimmed and empty entries are dropped.
#[must_use]
pub fn parse_table_list(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma-separated list of table names, keeping the given order.
///
/// Later duplicates are dropped.
#[must_use]
pub fn parse_ordered_table_list(input: &str) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for name in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !tables.iter().any(|t| t == name) {
            tables.push(name.to_string());
        }
    }
    tables
}

/// Per-table column exclusions, parsed from `table.column,table2.column2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipColumns(BTreeMap<String, BTreeSet<String>>);

impl SkipColumns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `table.column,...` option format.
    ///
    /// # Errors
    ///
    /// Returns `Config` if an entry has no `.` or an empty table or column.
    pub fn parse(input: &str) -> Result<Self> {
        let mut skip = Self::new();
        for entry in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (table, column) = entry.split_once('.').ok_or_else(|| {
                PgJsonlError::config(format!(
                    "invalid skip-columns entry '{entry}': expected table.column"
                ))
            })?;
            let (table, column) = (table.trim(), column.trim());
            if table.is_empty() || column.is_empty() {
                return Err(PgJsonlError::config(format!(
                    "invalid skip-columns entry '{entry}': table and column must be non-empty"
                )));
            }
            skip.add(table, column);
        }
        Ok(skip)
    }

    pub fn add(&mut self, table: impl Into<String>, column: impl Into<String>) {
        self.0.entry(table.into()).or_default().insert(column.into());
    }

    /// Columns excluded for `table`, if any.
    #[must_use]
    pub fn for_table(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.0.get(table)
    }

    #[must_use]
    pub fn is_skipped(&self, table: &str, column: &str) -> bool {
        self.0.get(table).is_some_and(|cols| cols.contains(column))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Import
// ============================================================================

/// Options controlling an import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ImportOptions {
    pub create_tables: bool,
    pub clear_before_load: bool,
    pub disable_foreign_keys: bool,
    pub skip_tables: BTreeSet<String>,
    pub skip_columns: SkipColumns,
    pub batch_size: usize,
    pub sample_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            create_tables: false,
            clear_before_load: false,
            disable_foreign_keys: false,
            skip_tables: BTreeSet::new(),
            skip_columns: SkipColumns::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl ImportOptions {
    /// Check option values that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the batch size is below 2 or the sample size is 0.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size < 2 {
            return Err(PgJsonlError::config(format!(
                "batch size must be at least 2, got {}",
                self.batch_size
            )));
        }
        if self.sample_size == 0 {
            return Err(PgJsonlError::config("sample size must be at least 1"));
        }
        Ok(())
    }
}

/// Where import files come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// Every `*.jsonl` file in a directory.
    Directory(PathBuf),
    /// One named file.
    File(PathBuf),
}

impl InputSource {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(p) | Self::File(p) => p,
        }
    }
}

/// A validated import request.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub connection: ConnectionParams,
    pub source: InputSource,
    pub options: ImportOptions,
}

impl ImportRequest {
    /// Build a request, validating the options.
    ///
    /// # Errors
    ///
    /// Returns `Config` for invalid options or an empty schema name.
    pub fn new(
        connection: ConnectionParams,
        source: InputSource,
        options: ImportOptions,
    ) -> Result<Self> {
        if connection.schema.trim().is_empty() {
            return Err(PgJsonlError::config("schema name cannot be empty"));
        }
        options.validate()?;
        Ok(Self {
            connection,
            source,
            options,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &str {
        &self.connection.schema
    }
}

/// One import file resolved to its target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableTarget {
    pub schema: String,
    pub table: String,
    pub path: PathBuf,
}

impl TableTarget {
    /// Derive the target from a file name: `{table}.jsonl` → `table`.
    ///
    /// Returns `None` if the path has no usable file stem.
    #[must_use]
    pub fn from_path(path: &Path, schema: &str) -> Option<Self> {
        let table = path.file_stem()?.to_str()?.trim();
        if table.is_empty() {
            return None;
        }
        Some(Self {
            schema: schema.to_string(),
            table: table.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// `schema.table`, unquoted, for messages.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Outcome of importing one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableResult {
    pub table: String,
    pub rows_attempted: u64,
    pub rows_loaded: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub cleared: bool,
}

impl TableResult {
    #[must_use]
    pub fn succeeded(table: impl Into<String>, rows: u64) -> Self {
        Self {
            table: table.into(),
            rows_attempted: rows,
            rows_loaded: rows,
            success: true,
            error: None,
            created: false,
            cleared: false,
        }
    }

    /// A failed table. Nothing it wrote survives, so `rows_loaded` is 0.
    #[must_use]
    pub fn failed(table: impl Into<String>, rows_attempted: u64, error: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows_attempted,
            rows_loaded: 0,
            success: false,
            error: Some(error.into()),
            created: false,
            cleared: false,
        }
    }
}

/// Aggregate result of an import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub success: bool,
    pub tables: Vec<TableResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ImportReport {
    #[must_use]
    pub fn new(tables: Vec<TableResult>, warnings: Vec<String>) -> Self {
        let success = tables.iter().all(|t| t.success);
        Self {
            success,
            tables,
            warnings,
        }
    }

    pub fn failed_tables(&self) -> impl Iterator<Item = &TableResult> {
        self.tables.iter().filter(|t| !t.success)
    }

    #[must_use]
    pub fn total_rows_loaded(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_loaded).sum()
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableResult> {
        self.tables.iter().find(|t| t.table == name)
    }
}

// ============================================================================
// Export
// ============================================================================

/// Output file layout for exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// `{table}.jsonl`, one object per line.
    #[default]
    Jsonl,
    /// `{table}.json`, one bracketed array.
    Json,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jsonl => JSONL_EXTENSION,
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = PgJsonlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "json" => Ok(Self::Json),
            other => Err(PgJsonlError::config(format!(
                "unknown export format '{other}' (expected jsonl or json)"
            ))),
        }
    }
}

/// Options controlling an export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Tables to export; empty means every base table in the schema.
    pub tables: Vec<String>,
    pub format: ExportFormat,
    pub skip_tables: BTreeSet<String>,
    pub skip_columns: SkipColumns,
}

/// Outcome of exporting one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportTableResult {
    pub table: String,
    pub path: PathBuf,
    pub rows: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of an export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub success: bool,
    pub tables: Vec<ExportTableResult>,
}

impl ExportReport {
    #[must_use]
    pub fn new(tables: Vec<ExportTableResult>) -> Self {
        let success = tables.iter().all(|t| t.success);
        Self { success, tables }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skip_columns() {
        let skip = SkipColumns::parse("users.password, users.token,orders.note").unwrap();
        assert!(skip.is_skipped("users", "password"));
        assert!(skip.is_skipped("users", "token"));
        assert!(skip.is_skipped("orders", "note"));
        assert!(!skip.is_skipped("orders", "password"));
        assert_eq!(skip.for_table("users").map(BTreeSet::len), Some(2));
    }

    #[test]
    fn test_parse_skip_columns_rejects_bad_entries() {
        assert!(SkipColumns::parse("users").is_err());
        assert!(SkipColumns::parse(".password").is_err());
        assert!(SkipColumns::parse("users.").is_err());
        assert!(SkipColumns::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_table_list_trims_and_drops_empty() {
        let tables = parse_table_list(" audit_log, ,sessions,");
        assert_eq!(
            tables.into_iter().collect::<Vec<_>>(),
            vec!["audit_log".to_string(), "sessions".to_string()]
        );
    }

    #[test]
    fn test_ordered_table_list_keeps_order_and_drops_repeats() {
        assert_eq!(
            parse_ordered_table_list(" users, orders,,users , audit"),
            vec!["users".to_string(), "orders".to_string(), "audit".to_string()]
        );
        assert!(parse_ordered_table_list(" , ").is_empty());
    }

    #[test]
    fn test_options_validation() {
        assert!(ImportOptions::default().validate().is_ok());
        let tiny = ImportOptions {
            batch_size: 1,
            ..Default::default()
        };
        assert!(matches!(tiny.validate(), Err(PgJsonlError::Config(_))));
        let no_sample = ImportOptions {
            sample_size: 0,
            ..Default::default()
        };
        assert!(no_sample.validate().is_err());
    }

    #[test]
    fn test_table_target_from_file_name() {
        let target = TableTarget::from_path(Path::new("/data/users.jsonl"), "public").unwrap();
        assert_eq!(target.table, "users");
        assert_eq!(target.display_name(), "public.users");
        assert!(TableTarget::from_path(Path::new("/"), "public").is_none());
    }

    #[test]
    fn test_report_success_requires_every_table() {
        let ok = ImportReport::new(vec![TableResult::succeeded("a", 3)], vec![]);
        assert!(ok.success);
        assert_eq!(ok.total_rows_loaded(), 3);

        let mixed = ImportReport::new(
            vec![
                TableResult::succeeded("a", 3),
                TableResult::failed("b", 10, "boom"),
            ],
            vec!["warning".to_string()],
        );
        assert!(!mixed.success);
        assert_eq!(mixed.failed_tables().count(), 1);
        assert_eq!(mixed.table("b").map(|t| t.rows_loaded), Some(0));
    }

    #[test]
    fn test_password_is_redacted_in_debug() {
        let params = ConnectionParams {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug = format!("{params:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("********"));
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("JSONL".parse::<ExportFormat>().unwrap(), ExportFormat::Jsonl);
        assert_eq!("json".parse::<ExportFormat>().unwrap().extension(), "json");
        assert!("csv".parse::<ExportFormat>().is_err());
    }
}
