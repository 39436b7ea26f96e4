//! Import command implementation.

use pgjsonl_lib::import::ImportEngine;
use pgjsonl_lib::model::{ImportOptions, InputSource, SkipColumns, parse_table_list};
use pgjsonl_lib::{ImportRequest, PgJsonlError};

use crate::cli::{ImportArgs, RunContext};
use crate::config;
use crate::error::{AppError, Result};
use crate::format::{ProgressLogger, format_import_report, print_json};
use crate::storage::{PgSession, describe_target};

/// Execute the import command.
///
/// Returns whether every table imported successfully.
///
/// # Errors
///
/// Returns an error if the options are invalid, the input path does not
/// exist, the connection fails, or foreign-key checks cannot be suspended.
pub fn execute(args: &ImportArgs, ctx: &RunContext) -> Result<bool> {
    let request = build_request(args, ctx)?;

    // Fail on a bad path before opening a connection.
    let input = request.source.path();
    if !input.exists() {
        return Err(PgJsonlError::FileNotFound(input.to_path_buf()).into());
    }

    let mut session = PgSession::connect(&request.connection)?;
    tracing::info!(
        target_db = %describe_target(&request.connection),
        schema = request.schema(),
        input = %input.display(),
        "Connected"
    );

    let logger = ProgressLogger::new(!ctx.quiet && !ctx.json);
    let report = ImportEngine::new(request, &logger).run(&mut session);
    logger.finish();
    let report = report?;

    if ctx.json {
        print_json(&report)?;
    } else if ctx.show_summary(report.success) {
        print!("{}", format_import_report(&report));
    }
    Ok(report.success)
}

/// Turn parsed arguments into a validated request.
///
/// # Errors
///
/// Returns `Config` for malformed skip lists or sizes.
pub fn build_request(args: &ImportArgs, ctx: &RunContext) -> Result<ImportRequest> {
    let source = match (&args.input_dir, &args.file) {
        (Some(dir), None) => InputSource::Directory(dir.clone()),
        (None, Some(file)) => InputSource::File(file.clone()),
        _ => {
            return Err(AppError::config(
                "exactly one of --input-dir or --file is required",
            ));
        }
    };

    let (batch_size, sample_size) =
        config::resolve_sizes(args.batch_size, args.sample_size, &ctx.profile);
    let options = ImportOptions {
        create_tables: args.create_tables,
        clear_before_load: args.clear,
        disable_foreign_keys: args.disable_foreign_keys,
        skip_tables: args
            .skip_tables
            .as_deref()
            .map(parse_table_list)
            .unwrap_or_default(),
        skip_columns: args
            .skip_columns
            .as_deref()
            .map(SkipColumns::parse)
            .transpose()?
            .unwrap_or_default(),
        batch_size,
        sample_size,
    };

    let connection = ctx.connection(&args.connection)?;
    Ok(ImportRequest::new(connection, source, options)?)
}
