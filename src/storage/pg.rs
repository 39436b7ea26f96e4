//! Live PostgreSQL session.
//!
//! Statements arrive already rendered as SQL text with literal values, so
//! everything goes through the simple query protocol.

use postgres::{Client, Config, NoTls, SimpleQueryMessage};

use pgjsonl_lib::session::{Query, Session, SessionError, Statement, TextRows};
use pgjsonl_lib::ConnectionParams;

use crate::error::{AppError, Result};

/// `application_name` reported to the server.
pub const APPLICATION_NAME: &str = "pgjsonl";

/// Longest SQL prefix written to trace logs.
const SQL_LOG_LIMIT: usize = 200;

/// A `Session` over one blocking PostgreSQL connection.
pub struct PgSession {
    client: Client,
}

impl PgSession {
    /// Connect using the resolved connection parameters.
    ///
    /// # Errors
    ///
    /// Returns `Connect` if the server cannot be reached or rejects the
    /// credentials.
    pub fn connect(params: &ConnectionParams) -> Result<Self> {
        let mut config = Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .dbname(&params.database)
            .user(&params.user)
            .application_name(APPLICATION_NAME);
        if let Some(password) = &params.password {
            config.password(password);
        }
        Self::open(&config, describe_target(params))
    }

    /// Connect using a libpq-style URL or key/value string.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the string cannot be parsed, or `Connect` if the
    /// connection fails.
    pub fn connect_url(url: &str) -> Result<Self> {
        let mut config: Config = url
            .parse()
            .map_err(|e| AppError::config(format!("invalid connection string: {e}")))?;
        config.application_name(APPLICATION_NAME);
        Self::open(&config, "connection string".to_string())
    }

    fn open(config: &Config, target: String) -> Result<Self> {
        tracing::debug!(%target, "Connecting");
        let mut client = config
            .connect(NoTls)
            .map_err(|source| AppError::Connect { target, source })?;
        // Literal rendering doubles quotes and leaves backslashes alone.
        client.batch_execute("SET standard_conforming_strings = on")?;
        Ok(Self { client })
    }
}

impl Session for PgSession {
    fn execute(&mut self, statement: &Statement) -> std::result::Result<u64, SessionError> {
        let sql = statement.to_sql();
        tracing::trace!(kind = statement.kind(), sql = %log_prefix(&sql), "Executing");
        let messages = self.client.simple_query(&sql).map_err(to_session_error)?;
        Ok(messages
            .iter()
            .map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum())
    }

    fn query(&mut self, query: &Query) -> std::result::Result<TextRows, SessionError> {
        let sql = query.to_sql();
        tracing::trace!(sql = %log_prefix(&sql), "Querying");
        let messages = self.client.simple_query(&sql).map_err(to_session_error)?;
        Ok(messages
            .iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::Row(row) => {
                    Some((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect())
                }
                _ => None,
            })
            .collect())
    }
}

/// `user@host:port/database`, for messages. Never includes the password.
#[must_use]
pub fn describe_target(params: &ConnectionParams) -> String {
    format!(
        "{}@{}:{}/{}",
        params.user, params.host, params.port, params.database
    )
}

/// Server error text without the driver's `db error:` wrapping.
#[allow(clippy::needless_pass_by_value)]
fn to_session_error(err: postgres::Error) -> SessionError {
    match err.as_db_error() {
        Some(db) => {
            let mut message = db.message().to_string();
            if let Some(detail) = db.detail() {
                message.push_str(" (");
                message.push_str(detail);
                message.push(')');
            }
            SessionError::new(message)
        }
        None => SessionError::new(err.to_string()),
    }
}

fn log_prefix(sql: &str) -> &str {
    match sql.char_indices().nth(SQL_LOG_LIMIT) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}
