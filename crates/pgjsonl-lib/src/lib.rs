//! `pgjsonl-lib` - move table data between PostgreSQL and JSONL files.
//!
//! The library holds the import engine, the export loop, and the
//! [`Session`] seam they run against. It has no database driver of its
//! own: the `pgjsonl` binary supplies a PostgreSQL session, and
//! [`MemorySession`] runs the same engine entirely in memory.
//!
//! # Quick Start
//!
//! ```no_run
//! use pgjsonl_lib::{
//!     ConnectionParams, ImportEngine, ImportOptions, ImportRequest, InputSource,
//!     MemorySession, TracingLogger,
//! };
//!
//! let options = ImportOptions {
//!     create_tables: true,
//!     disable_foreign_keys: true,
//!     ..Default::default()
//! };
//! let request = ImportRequest::new(
//!     ConnectionParams::default(),
//!     InputSource::Directory("dump/".into()),
//!     options,
//! )
//! .unwrap();
//!
//! let mut session = MemorySession::new();
//! let report = ImportEngine::new(request, &TracingLogger).run(&mut session).unwrap();
//! assert!(report.success);
//! ```

pub mod error;
pub mod export;
pub mod import;
pub mod infer;
pub mod jsonl;
pub mod memory;
pub mod model;
pub mod session;
pub mod value;

pub use error::{PgJsonlError, Result};
pub use export::Exporter;
pub use import::{ImportEngine, ImportLogger, NullLogger, TracingLogger};
pub use infer::{ColumnSpec, SqlType};
pub use memory::MemorySession;
pub use model::{
    ConnectionParams, ExportFormat, ExportOptions, ExportReport, ImportOptions, ImportReport,
    ImportRequest, InputSource, SkipColumns, TableResult, TableTarget,
};
pub use session::{Query, Session, SessionError, Statement};
pub use value::{DecodedRow, Value};
