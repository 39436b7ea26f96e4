//! Export command implementation.

use pgjsonl_lib::Exporter;
use pgjsonl_lib::model::{
    ExportOptions, SkipColumns, parse_ordered_table_list, parse_table_list,
};

use crate::cli::{ExportArgs, RunContext};
use crate::error::Result;
use crate::format::{format_export_report, print_json};
use crate::storage::{PgSession, describe_target};

/// Execute the export command.
///
/// Returns whether every table exported successfully.
///
/// # Errors
///
/// Returns an error if the options are invalid, the connection fails, the
/// output directory cannot be created, or the table list cannot be read.
pub fn execute(args: &ExportArgs, ctx: &RunContext) -> Result<bool> {
    let options = build_options(args)?;
    let connection = ctx.connection(&args.connection)?;

    let mut session = PgSession::connect(&connection)?;
    tracing::info!(target_db = %describe_target(&connection), "Connected");

    let output_dir = dunce::simplified(&args.output_dir);
    let report = Exporter::new(&connection.schema, &options).run(&mut session, output_dir)?;

    if ctx.json {
        print_json(&report)?;
    } else if ctx.show_summary(report.success) {
        print!("{}", format_export_report(&report));
    }
    Ok(report.success)
}

/// Translate export flags into options.
///
/// # Errors
///
/// Returns `Config` if `--skip-columns` is malformed.
pub fn build_options(args: &ExportArgs) -> Result<ExportOptions> {
    Ok(ExportOptions {
        tables: args
            .tables
            .as_deref()
            .map(parse_ordered_table_list)
            .unwrap_or_default(),
        format: args.format.into(),
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
    })
}
