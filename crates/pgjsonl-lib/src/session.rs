//! Database session capability.
//!
//! The engine never builds SQL strings inline. It describes what it wants
//! as a [`Statement`] or [`Query`], and a [`Session`] runs it. The
//! PostgreSQL session renders each one with [`Statement::to_sql`] /
//! [`Query::to_sql`]; the in-memory session interprets them directly.

use std::fmt::Write as _;
use std::ops::{Deref, DerefMut};

use thiserror::Error;

use crate::infer::ColumnSpec;
use crate::value::Value;

/// Error reported by a session for a single statement or query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SessionError {
    pub message: String,
}

impl SessionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rows returned by a query, one text cell per column.
pub type TextRows = Vec<Vec<Option<String>>>;

/// A statement that changes session or table state.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Begin,
    Commit,
    Rollback,
    /// Turn foreign-key enforcement for this session on (`true`) or off.
    SetForeignKeyChecks(bool),
    CreateTable {
        schema: String,
        table: String,
        columns: Vec<ColumnSpec>,
    },
    /// Delete every row; the table itself is kept.
    ClearTable { schema: String, table: String },
    /// Multi-row insert. Every row has one value per column.
    Insert {
        schema: String,
        table: String,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

impl Statement {
    /// Short name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::SetForeignKeyChecks(_) => "set_foreign_key_checks",
            Self::CreateTable { .. } => "create_table",
            Self::ClearTable { .. } => "clear_table",
            Self::Insert { .. } => "insert",
        }
    }

    /// Render as PostgreSQL SQL.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Begin => "BEGIN".to_string(),
            Self::Commit => "COMMIT".to_string(),
            Self::Rollback => "ROLLBACK".to_string(),
            Self::SetForeignKeyChecks(true) => "SET session_replication_role = DEFAULT".to_string(),
            Self::SetForeignKeyChecks(false) => "SET session_replication_role = replica".to_string(),
            Self::CreateTable {
                schema,
                table,
                columns,
            } => {
                let cols: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} {}", quote_ident(&c.name), c.sql_type.as_sql()))
                    .collect();
                format!(
                    "CREATE TABLE {} ({})",
                    qualified_name(schema, table),
                    cols.join(", ")
                )
            }
            Self::ClearTable { schema, table } => {
                format!("DELETE FROM {}", qualified_name(schema, table))
            }
            Self::Insert {
                schema,
                table,
                columns,
                rows,
            } => {
                let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
                let mut sql = format!(
                    "INSERT INTO {} ({}) VALUES ",
                    qualified_name(schema, table),
                    cols.join(", ")
                );
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('(');
                    for (j, value) in row.iter().enumerate() {
                        if j > 0 {
                            sql.push_str(", ");
                        }
                        push_literal(&mut sql, value);
                    }
                    sql.push(')');
                }
                sql
            }
        }
    }
}

/// A read-only query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// One row, one cell: `t` or `f`.
    TableExists { schema: String, table: String },
    /// One row per base table, ordered by name.
    ListTables { schema: String },
    /// One row per table row, holding the row as JSON text.
    SelectJson { schema: String, table: String },
}

impl Query {
    /// Render as PostgreSQL SQL.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::TableExists { schema, table } => format!(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = {} AND table_name = {})",
                quote_literal(schema),
                quote_literal(table)
            ),
            Self::ListTables { schema } => format!(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = {} AND table_type = 'BASE TABLE' ORDER BY table_name",
                quote_literal(schema)
            ),
            Self::SelectJson { schema, table } => format!(
                "SELECT row_to_json(r)::text FROM {} AS r",
                qualified_name(schema, table)
            ),
        }
    }
}

/// An open database session.
///
/// Sessions are used from one thread at a time and are never shared.
pub trait Session {
    /// Run a statement and return the number of rows it affected.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` if the database rejects the statement.
    fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError>;

    /// Run a query and return its rows as text.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` if the database rejects the query.
    fn query(&mut self, query: &Query) -> Result<TextRows, SessionError>;
}

/// Check whether `schema.table` exists.
///
/// # Errors
///
/// Returns a `SessionError` if the lookup fails.
pub fn table_exists(
    session: &mut dyn Session,
    schema: &str,
    table: &str,
) -> Result<bool, SessionError> {
    let rows = session.query(&Query::TableExists {
        schema: schema.to_string(),
        table: table.to_string(),
    })?;
    let cell = rows
        .first()
        .and_then(|r| r.first())
        .and_then(Option::as_deref);
    Ok(matches!(cell, Some("t" | "true")))
}

/// A transaction that rolls back unless committed.
pub struct Transaction<'a> {
    session: &'a mut dyn Session,
    open: bool,
}

impl<'a> Transaction<'a> {
    /// Begin a transaction on `session`.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` if `BEGIN` fails.
    pub fn begin(session: &'a mut dyn Session) -> Result<Self, SessionError> {
        session.execute(&Statement::Begin)?;
        Ok(Self {
            session,
            open: true,
        })
    }

    /// Commit the transaction.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` if `COMMIT` fails; the transaction is then
    /// rolled back on drop.
    pub fn commit(mut self) -> Result<(), SessionError> {
        self.session.execute(&Statement::Commit)?;
        self.open = false;
        Ok(())
    }

    /// Roll the transaction back explicitly.
    ///
    /// # Errors
    ///
    /// Returns a `SessionError` if `ROLLBACK` fails.
    pub fn rollback(mut self) -> Result<(), SessionError> {
        self.open = false;
        self.session.execute(&Statement::Rollback).map(|_| ())
    }
}

impl<'a> Deref for Transaction<'a> {
    type Target = dyn Session + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.session
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.session
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.session.execute(&Statement::Rollback) {
                tracing::warn!(error = %e, "Rollback of abandoned transaction failed");
            }
        }
    }
}

// ============================================================================
// SQL rendering
// ============================================================================

/// Quote an identifier, doubling embedded quotes.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`.
#[must_use]
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Quote a string literal, doubling embedded single quotes.
///
/// Assumes `standard_conforming_strings` is on, which the PostgreSQL
/// session sets at connect time.
#[must_use]
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Append the SQL literal for a value.
///
/// Integers and booleans are written bare. Floats and everything else are
/// untyped string literals, so PostgreSQL parses them with the column's
/// input function: `'2.5'` is rejected by an integer column where a bare
/// `2.5` would be rounded by the numeric assignment cast.
fn push_literal(sql: &mut String, value: &Value) {
    match value {
        Value::Null => sql.push_str("NULL"),
        Value::Bool(true) => sql.push_str("TRUE"),
        Value::Bool(false) => sql.push_str("FALSE"),
        Value::Integer(n) => {
            let _ = write!(sql, "{n}");
        }
        // Debug keeps the fraction (`2.0`), so integer columns reject it too.
        Value::Float(f) if f.is_finite() => sql.push_str(&quote_literal(&format!("{f:?}"))),
        Value::Float(_) => sql.push_str("NULL"),
        Value::String(s) => sql.push_str(&quote_literal(s)),
        Value::Object(_) | Value::Array(_) => {
            sql.push_str(&quote_literal(&value.to_json().to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::SqlType;
    use serde_json::json;

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_literal_doubles_single_quotes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_literal(r"C:\path"), r"'C:\path'");
    }

    #[test]
    fn test_create_table_sql() {
        let stmt = Statement::CreateTable {
            schema: "public".to_string(),
            table: "users".to_string(),
            columns: vec![
                ColumnSpec::new("id", SqlType::Integer),
                ColumnSpec::new("name", SqlType::Text),
                ColumnSpec::new("score", SqlType::DoublePrecision),
            ],
        };
        insta::assert_snapshot!(
            stmt.to_sql(),
            @r#"CREATE TABLE "public"."users" ("id" INTEGER, "name" TEXT, "score" DOUBLE PRECISION)"#
        );
    }

    #[test]
    fn test_insert_sql_renders_every_value_kind() {
        let stmt = Statement::Insert {
            schema: "app".to_string(),
            table: "events".to_string(),
            columns: vec!["id".into(), "ok".into(), "ratio".into(), "note".into(), "meta".into()],
            rows: vec![
                vec![
                    Value::Integer(1),
                    Value::Bool(true),
                    Value::Float(0.5),
                    Value::String("it's".into()),
                    Value::from(json!({"k": "v"})),
                ],
                vec![Value::Integer(2), Value::Null, Value::Null, Value::Null, Value::from(json!([1]))],
            ],
        };
        insta::assert_snapshot!(
            stmt.to_sql(),
            @r#"INSERT INTO "app"."events" ("id", "ok", "ratio", "note", "meta") VALUES (1, TRUE, '0.5', 'it''s', '{"k":"v"}'), (2, NULL, NULL, NULL, '[1]')"#
        );
    }

    #[test]
    fn test_float_literals_are_quoted() {
        let stmt = Statement::Insert {
            schema: "public".to_string(),
            table: "m".to_string(),
            columns: vec!["n".into()],
            rows: vec![
                vec![Value::Float(2.5)],
                vec![Value::Float(2.0)],
                vec![Value::Float(f64::NAN)],
            ],
        };
        assert_eq!(
            stmt.to_sql(),
            r#"INSERT INTO "public"."m" ("n") VALUES ('2.5'), ('2.0'), (NULL)"#
        );
    }

    #[test]
    fn test_foreign_key_statements() {
        assert_eq!(
            Statement::SetForeignKeyChecks(false).to_sql(),
            "SET session_replication_role = replica"
        );
        assert_eq!(
            Statement::SetForeignKeyChecks(true).to_sql(),
            "SET session_replication_role = DEFAULT"
        );
    }

    #[test]
    fn test_clear_and_select_sql() {
        let clear = Statement::ClearTable {
            schema: "public".into(),
            table: "orders".into(),
        };
        assert_eq!(clear.to_sql(), "DELETE FROM \"public\".\"orders\"");

        let select = Query::SelectJson {
            schema: "public".into(),
            table: "orders".into(),
        };
        assert_eq!(
            select.to_sql(),
            "SELECT row_to_json(r)::text FROM \"public\".\"orders\" AS r"
        );

        let exists = Query::TableExists {
            schema: "public".into(),
            table: "o'rders".into(),
        };
        assert!(exists.to_sql().contains("table_name = 'o''rders'"));
    }

    struct Recorder {
        statements: Vec<Statement>,
        fail_commit: bool,
    }

    impl Session for Recorder {
        fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError> {
            self.statements.push(statement.clone());
            if self.fail_commit && *statement == Statement::Commit {
                return Err(SessionError::new("commit failed"));
            }
            Ok(0)
        }

        fn query(&mut self, _query: &Query) -> Result<TextRows, SessionError> {
            Ok(vec![vec![Some("t".to_string())]])
        }
    }

    #[test]
    fn test_transaction_rolls_back_when_dropped() {
        let mut rec = Recorder {
            statements: Vec::new(),
            fail_commit: false,
        };
        {
            let _tx = Transaction::begin(&mut rec).unwrap();
        }
        assert_eq!(rec.statements, vec![Statement::Begin, Statement::Rollback]);
    }

    #[test]
    fn test_transaction_commit_does_not_roll_back() {
        let mut rec = Recorder {
            statements: Vec::new(),
            fail_commit: false,
        };
        let tx = Transaction::begin(&mut rec).unwrap();
        tx.commit().unwrap();
        assert_eq!(rec.statements, vec![Statement::Begin, Statement::Commit]);
    }

    #[test]
    fn test_failed_commit_still_rolls_back() {
        let mut rec = Recorder {
            statements: Vec::new(),
            fail_commit: true,
        };
        let tx = Transaction::begin(&mut rec).unwrap();
        assert!(tx.commit().is_err());
        assert_eq!(
            rec.statements,
            vec![Statement::Begin, Statement::Commit, Statement::Rollback]
        );
    }

    #[test]
    fn test_table_exists_reads_boolean_cell() {
        let mut rec = Recorder {
            statements: Vec::new(),
            fail_commit: false,
        };
        assert!(table_exists(&mut rec, "public", "users").unwrap());
    }
}
