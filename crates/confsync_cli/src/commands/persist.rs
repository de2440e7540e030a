//! Persist command implementation.

use super::{print_report, Context};
use crate::error::CliError;

/// Runs the persist command.
pub async fn run(ctx: &Context, dry_run: bool) -> Result<(), CliError> {
    let mut engine = ctx.open_engine()?;
    let report = engine.persist(dry_run).await?;
    print_report(&report, dry_run);
    if report.executed {
        println!("Persist done.");
    }
    Ok(())
}
