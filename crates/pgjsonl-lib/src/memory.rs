//! In-memory session backed by `BTreeMap`.
//!
//! Interprets [`Statement`]s and [`Query`]s without a database: typed
//! columns, declared foreign keys enforced while checks are on, and
//! transactions implemented as table snapshots. Failures can be injected
//! at specific points to exercise the engine's error paths.

use std::collections::BTreeMap;

use crate::infer::{ColumnSpec, SqlType};
use crate::session::{Query, Session, SessionError, Statement, TextRows};
use crate::value::{DecodedRow, Value};

type TableKey = (String, String);

/// One table held by a [`MemorySession`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<Value>>,
}

impl MemoryTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Rows as name/value maps, nulls included.
    #[must_use]
    pub fn decoded_rows(&self) -> Vec<DecodedRow> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.name.clone(), v.clone()))
                    .collect()
            })
            .collect()
    }
}

/// A foreign key between two tables of the same schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub parent_table: String,
    pub parent_column: String,
}

/// Points where a [`MemorySession`] can be told to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePoint {
    SuspendForeignKeys,
    RestoreForeignKeys,
    CreateTable(String),
    ClearTable(String),
    Insert(String),
    TableExists(String),
}

/// Session that keeps every table in memory.
#[derive(Debug, Clone)]
pub struct MemorySession {
    tables: BTreeMap<TableKey, MemoryTable>,
    foreign_keys: Vec<ForeignKey>,
    foreign_key_checks: bool,
    snapshot: Option<BTreeMap<TableKey, MemoryTable>>,
    failures: Vec<FailurePoint>,
    statements: Vec<Statement>,
    queries: Vec<Query>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    // ========================================================================
    // Setup
    // ========================================================================

    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            foreign_keys: Vec::new(),
            foreign_key_checks: true,
            snapshot: None,
            failures: Vec::new(),
            statements: Vec::new(),
            queries: Vec::new(),
        }
    }

    /// Create a table directly, bypassing the statement log.
    pub fn create_table(&mut self, schema: &str, table: &str, columns: Vec<ColumnSpec>) {
        self.tables.insert(
            (schema.to_string(), table.to_string()),
            MemoryTable {
                columns,
                rows: Vec::new(),
            },
        );
    }

    /// Declare `schema.table(column)` as referencing `parent_table(parent_column)`.
    pub fn add_foreign_key(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
        parent_table: &str,
        parent_column: &str,
    ) {
        self.foreign_keys.push(ForeignKey {
            schema: schema.to_string(),
            table: table.to_string(),
            column: column.to_string(),
            parent_table: parent_table.to_string(),
            parent_column: parent_column.to_string(),
        });
    }

    /// Make the next matching operation fail. Each failure fires once.
    pub fn fail_at(&mut self, point: FailurePoint) {
        self.failures.push(point);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    #[must_use]
    pub fn table(&self, schema: &str, table: &str) -> Option<&MemoryTable> {
        self.tables.get(&(schema.to_string(), table.to_string()))
    }

    #[must_use]
    pub fn row_count(&self, schema: &str, table: &str) -> Option<usize> {
        self.table(schema, table).map(|t| t.rows.len())
    }

    #[must_use]
    pub const fn foreign_key_checks_enabled(&self) -> bool {
        self.foreign_key_checks
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Every statement executed, in order, including failed ones.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Every query run, in order.
    #[must_use]
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Whether any statement or query named `table`.
    #[must_use]
    pub fn touched(&self, table: &str) -> bool {
        let in_statements = self.statements.iter().any(|s| match s {
            Statement::CreateTable { table: t, .. }
            | Statement::ClearTable { table: t, .. }
            | Statement::Insert { table: t, .. } => t == table,
            _ => false,
        });
        let in_queries = self.queries.iter().any(|q| match q {
            Query::TableExists { table: t, .. } | Query::SelectJson { table: t, .. } => {
                t == table
            }
            Query::ListTables { .. } => false,
        });
        in_statements || in_queries
    }

    // ========================================================================
    // Interpretation
    // ========================================================================

    fn take_failure(&mut self, point: &FailurePoint) -> Result<(), SessionError> {
        if let Some(idx) = self.failures.iter().position(|p| p == point) {
            self.failures.remove(idx);
            return Err(SessionError::new(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn table_mut(&mut self, schema: &str, table: &str) -> Result<&mut MemoryTable, SessionError> {
        self.tables
            .get_mut(&(schema.to_string(), table.to_string()))
            .ok_or_else(|| missing_relation(schema, table))
    }

    fn set_foreign_key_checks(&mut self, enabled: bool) -> Result<u64, SessionError> {
        let point = if enabled {
            FailurePoint::RestoreForeignKeys
        } else {
            FailurePoint::SuspendForeignKeys
        };
        self.take_failure(&point)?;
        self.foreign_key_checks = enabled;
        Ok(0)
    }

    fn create(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[ColumnSpec],
    ) -> Result<u64, SessionError> {
        self.take_failure(&FailurePoint::CreateTable(table.to_string()))?;
        let key = (schema.to_string(), table.to_string());
        if self.tables.contains_key(&key) {
            return Err(SessionError::new(format!(
                "relation \"{schema}.{table}\" already exists"
            )));
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(SessionError::new(format!(
                    "column \"{}\" specified more than once",
                    col.name
                )));
            }
        }
        self.tables.insert(
            key,
            MemoryTable {
                columns: columns.to_vec(),
                rows: Vec::new(),
            },
        );
        Ok(0)
    }

    fn clear(&mut self, schema: &str, table: &str) -> Result<u64, SessionError> {
        self.take_failure(&FailurePoint::ClearTable(table.to_string()))?;
        if self.foreign_key_checks {
            let children: Vec<ForeignKey> = self
                .foreign_keys
                .iter()
                .filter(|fk| fk.schema == schema && fk.parent_table == table)
                .cloned()
                .collect();
            for fk in children {
                let referenced = self
                    .table(schema, &fk.table)
                    .and_then(|child| {
                        let idx = child.column_index(&fk.column)?;
                        Some(child.rows.iter().any(|r| !r[idx].is_null()))
                    })
                    .unwrap_or(false);
                if referenced {
                    return Err(SessionError::new(format!(
                        "update or delete on table \"{table}\" violates foreign key constraint from \"{}\"",
                        fk.table
                    )));
                }
            }
        }
        let target = self.table_mut(schema, table)?;
        let removed = target.rows.len() as u64;
        target.rows.clear();
        Ok(removed)
    }

    fn insert(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64, SessionError> {
        self.take_failure(&FailurePoint::Insert(table.to_string()))?;
        let target = self
            .table(schema, table)
            .ok_or_else(|| missing_relation(schema, table))?;

        let mut indexes = Vec::with_capacity(columns.len());
        for name in columns {
            let idx = target.column_index(name).ok_or_else(|| {
                SessionError::new(format!(
                    "column \"{name}\" of relation \"{table}\" does not exist"
                ))
            })?;
            indexes.push(idx);
        }

        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != columns.len() {
                return Err(SessionError::new(format!(
                    "INSERT has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            let mut full = vec![Value::Null; target.columns.len()];
            for (&idx, value) in indexes.iter().zip(row) {
                let spec = &target.columns[idx];
                full[idx] = coerce(spec.sql_type, value).ok_or_else(|| {
                    SessionError::new(format!(
                        "invalid input for column \"{}\" of type {}: {} value",
                        spec.name,
                        spec.sql_type,
                        value.type_name()
                    ))
                })?;
            }
            prepared.push(full);
        }

        if self.foreign_key_checks {
            self.check_references(schema, table, &prepared)?;
        }

        let count = prepared.len() as u64;
        self.table_mut(schema, table)?.rows.extend(prepared);
        Ok(count)
    }

    fn check_references(
        &self,
        schema: &str,
        table: &str,
        rows: &[Vec<Value>],
    ) -> Result<(), SessionError> {
        let Some(target) = self.table(schema, table) else {
            return Ok(());
        };
        for fk in self
            .foreign_keys
            .iter()
            .filter(|fk| fk.schema == schema && fk.table == table)
        {
            let Some(idx) = target.column_index(&fk.column) else {
                continue;
            };
            let parent = self.table(schema, &fk.parent_table);
            let parent_idx = parent.and_then(|p| p.column_index(&fk.parent_column));
            for row in rows {
                let value = &row[idx];
                if value.is_null() {
                    continue;
                }
                let found = match (parent, parent_idx) {
                    (Some(p), Some(pi)) => p.rows.iter().any(|r| &r[pi] == value),
                    _ => false,
                };
                if !found {
                    return Err(SessionError::new(format!(
                        "insert or update on table \"{table}\" violates foreign key constraint: \
                         key ({})=({}) is not present in table \"{}\"",
                        fk.column,
                        value.to_json(),
                        fk.parent_table
                    )));
                }
            }
        }
        Ok(())
    }
}

fn missing_relation(schema: &str, table: &str) -> SessionError {
    SessionError::new(format!("relation \"{schema}.{table}\" does not exist"))
}

/// Convert a value the way PostgreSQL's assignment casts would, or `None`
/// if the column type rejects it.
fn coerce(sql_type: SqlType, value: &Value) -> Option<Value> {
    if !sql_type.accepts(value) {
        return None;
    }
    let converted = match (sql_type, value) {
        (_, Value::Null) => Value::Null,
        (SqlType::Text, Value::Bool(b)) => Value::String(b.to_string()),
        (SqlType::Text, Value::Integer(n)) => Value::String(n.to_string()),
        (SqlType::Text, Value::Float(f)) => Value::String(f.to_string()),
        (SqlType::Text, Value::Object(_) | Value::Array(_)) => {
            Value::String(value.to_json().to_string())
        }
        (SqlType::DoublePrecision, Value::Integer(n)) => Value::Float(*n as f64),
        (SqlType::Jsonb, Value::String(s)) => {
            Value::from(serde_json::from_str::<serde_json::Value>(s).ok()?)
        }
        _ => value.clone(),
    };
    Some(converted)
}

impl Session for MemorySession {
    fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError> {
        self.statements.push(statement.clone());
        match statement {
            Statement::Begin => {
                if self.snapshot.is_some() {
                    return Err(SessionError::new("there is already a transaction in progress"));
                }
                self.snapshot = Some(self.tables.clone());
                Ok(0)
            }
            Statement::Commit => {
                self.snapshot = None;
                Ok(0)
            }
            Statement::Rollback => {
                if let Some(snapshot) = self.snapshot.take() {
                    self.tables = snapshot;
                }
                Ok(0)
            }
            Statement::SetForeignKeyChecks(enabled) => self.set_foreign_key_checks(*enabled),
            Statement::CreateTable {
                schema,
                table,
                columns,
            } => self.create(schema, table, columns),
            Statement::ClearTable { schema, table } => self.clear(schema, table),
            Statement::Insert {
                schema,
                table,
                columns,
                rows,
            } => self.insert(schema, table, columns, rows),
        }
    }

    fn query(&mut self, query: &Query) -> Result<TextRows, SessionError> {
        self.queries.push(query.clone());
        match query {
            Query::TableExists { schema, table } => {
                self.take_failure(&FailurePoint::TableExists(table.clone()))?;
                let exists = self.table(schema, table).is_some();
                Ok(vec![vec![Some(if exists { "t" } else { "f" }.to_string())]])
            }
            Query::ListTables { schema } => Ok(self
                .tables
                .keys()
                .filter(|(s, _)| s == schema)
                .map(|(_, t)| vec![Some(t.clone())])
                .collect()),
            Query::SelectJson { schema, table } => {
                let target = self
                    .table(schema, table)
                    .ok_or_else(|| missing_relation(schema, table))?;
                Ok(target
                    .decoded_rows()
                    .iter()
                    .map(|row| vec![Some(row.to_json().to_string())])
                    .collect())
            }
        }
    }
}
