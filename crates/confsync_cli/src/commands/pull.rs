//! Pull command implementation.

use super::{print_report, Context};
use crate::error::CliError;
use confsync_sync_engine::PullOptions;

/// Runs the pull command.
pub async fn run(ctx: &Context, force: bool, dry_run: bool) -> Result<(), CliError> {
    let mut engine = ctx.open_engine()?;
    let report = engine.pull(PullOptions { force, dry_run }).await?;
    print_report(&report, dry_run);
    if report.executed {
        println!("Pull done.");
    }
    Ok(())
}
