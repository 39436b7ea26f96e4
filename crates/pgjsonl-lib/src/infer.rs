//! Column type inference from sampled rows.
//!
//! Inference is best-effort: only the sampled rows are inspected, so a
//! column that changes shape later in the file fails at insert time and is
//! reported by the loader.
//!
//! Resolution order per column, over non-null values only:
//! boolean, integer (BIGINT once any value leaves the `i32` range),
//! double precision, timestamp, jsonb (objects/arrays only), then text.
//! A column that is null in every sampled row is text.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::{DecodedRow, Value};

/// PostgreSQL column types produced by inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Boolean,
    Integer,
    BigInt,
    DoublePrecision,
    Timestamp,
    TimestampTz,
    Jsonb,
    Text,
}

impl SqlType {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::DoublePrecision => "DOUBLE PRECISION",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampTz => "TIMESTAMPTZ",
            Self::Jsonb => "JSONB",
            Self::Text => "TEXT",
        }
    }

    /// Whether a decoded value can be stored in a column of this type
    /// without a lossy conversion.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (Self::Text, _) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Integer, Value::Integer(n)) => i32::try_from(*n).is_ok(),
            (Self::BigInt, Value::Integer(_)) => true,
            (Self::DoublePrecision, Value::Integer(_) | Value::Float(_)) => true,
            (Self::Timestamp | Self::TimestampTz, Value::String(s)) => {
                classify_timestamp(s).is_some()
            }
            (Self::Jsonb, Value::String(s)) => serde_json::from_str::<serde_json::Value>(s).is_ok(),
            (Self::Jsonb, Value::Object(_) | Value::Array(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SqlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(Self::Boolean),
            "integer" | "int" | "int4" => Ok(Self::Integer),
            "bigint" | "int8" => Ok(Self::BigInt),
            "double precision" | "float8" | "double" => Ok(Self::DoublePrecision),
            "timestamp" | "timestamp without time zone" => Ok(Self::Timestamp),
            "timestamptz" | "timestamp with time zone" => Ok(Self::TimestampTz),
            "jsonb" | "json" => Ok(Self::Jsonb),
            "text" | "varchar" | "character varying" => Ok(Self::Text),
            other => Err(format!("unsupported column type: {other}")),
        }
    }
}

/// A column to emit in `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// Kind of timestamp a string looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    Naive,
    WithOffset,
}

// Date, `T` or space, hours:minutes, optional seconds and fraction,
// optional `Z` or numeric offset.
static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d{1,9})?)?(?P<offset>Z|z|[+-]\d{2}(?::?\d{2})?)?$",
    )
    .unwrap_or_else(|e| unreachable!("timestamp pattern is valid: {e}"))
});

/// Recognize an ISO-8601 style timestamp string.
///
/// The shape is checked first and the calendar values are then validated
/// with chrono, so `2024-13-45 99:00` is rejected.
#[must_use]
pub fn classify_timestamp(s: &str) -> Option<TimestampKind> {
    let caps = TIMESTAMP_RE.captures(s)?;
    let has_offset = caps.name("offset").is_some();
    let normalized = s.replacen(' ', "T", 1);

    if has_offset {
        let normalized = if normalized.ends_with(['Z', 'z']) {
            format!("{}+00:00", &normalized[..normalized.len() - 1])
        } else {
            normalized
        };
        let ok = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M%#z"]
            .iter()
            .any(|fmt| DateTime::parse_from_str(&normalized, fmt).is_ok());
        ok.then_some(TimestampKind::WithOffset)
    } else {
        let ok = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).is_ok());
        ok.then_some(TimestampKind::Naive)
    }
}

/// Running summary of the values seen for one column.
#[derive(Debug, Clone)]
struct Observation {
    non_null: usize,
    all_bool: bool,
    all_integer: bool,
    all_numeric: bool,
    all_timestamp: bool,
    any_offset: bool,
    all_container: bool,
    wide_integer: bool,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            non_null: 0,
            all_bool: true,
            all_integer: true,
            all_numeric: true,
            all_timestamp: true,
            any_offset: false,
            all_container: true,
            wide_integer: false,
        }
    }
}

impl Observation {
    fn observe(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        self.non_null += 1;

        self.all_bool &= matches!(value, Value::Bool(_));
        self.all_integer &= matches!(value, Value::Integer(_));
        self.all_numeric &= matches!(value, Value::Integer(_) | Value::Float(_));
        self.all_container &= matches!(value, Value::Object(_) | Value::Array(_));

        if let Value::Integer(n) = value {
            if i32::try_from(*n).is_err() {
                self.wide_integer = true;
            }
        }

        if self.all_timestamp {
            match value {
                Value::String(s) => match classify_timestamp(s) {
                    Some(TimestampKind::WithOffset) => self.any_offset = true,
                    Some(TimestampKind::Naive) => {}
                    None => self.all_timestamp = false,
                },
                _ => self.all_timestamp = false,
            }
        }
    }

    const fn resolve(&self) -> SqlType {
        if self.non_null == 0 {
            SqlType::Text
        } else if self.all_bool {
            SqlType::Boolean
        } else if self.all_integer {
            if self.wide_integer {
                SqlType::BigInt
            } else {
                SqlType::Integer
            }
        } else if self.all_numeric {
            SqlType::DoublePrecision
        } else if self.all_timestamp {
            if self.any_offset {
                SqlType::TimestampTz
            } else {
                SqlType::Timestamp
            }
        } else if self.all_container {
            SqlType::Jsonb
        } else {
            SqlType::Text
        }
    }
}

/// Infer one column type from the values observed for it.
pub fn infer_type<'a, I>(values: I) -> SqlType
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut obs = Observation::default();
    for value in values {
        obs.observe(value);
    }
    obs.resolve()
}

/// Infer column specs for a table from sampled rows.
///
/// Columns are the union of keys across the sample, in first-seen order,
/// minus `skip`. A row missing a key contributes nothing to that column.
#[must_use]
pub fn infer_columns(rows: &[DecodedRow], skip: Option<&BTreeSet<String>>) -> Vec<ColumnSpec> {
    let mut order: Vec<(String, Observation)> = Vec::new();

    for row in rows {
        for (name, value) in row.iter() {
            if skip.is_some_and(|s| s.contains(name)) {
                continue;
            }
            let idx = if let Some(idx) = order.iter().position(|(n, _)| n == name) {
                idx
            } else {
                order.push((name.to_string(), Observation::default()));
                order.len() - 1
            };
            order[idx].1.observe(value);
        }
    }

    order
        .into_iter()
        .map(|(name, obs)| {
            let sql_type = obs.resolve();
            tracing::trace!(column = %name, %sql_type, samples = obs.non_null, "Inferred column type");
            ColumnSpec::new(name, sql_type)
        })
        .collect()
}
