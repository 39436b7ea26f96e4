//! PostgreSQL storage layer for `pgjsonl`.
//!
//! The engine talks to the database only through the `Session` trait from
//! `pgjsonl-lib`; this module provides the live implementation.

mod pg;

pub use pg::{APPLICATION_NAME, PgSession, describe_target};
