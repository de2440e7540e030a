//! Push command implementation.

use super::{print_report, Context};
use crate::error::CliError;
use confsync_sync_engine::PushOptions;

/// Runs the push command.
///
/// Remote objects missing locally are deleted only with `force`.
pub async fn run(ctx: &Context, force: bool, dry_run: bool, encrypt: bool) -> Result<(), CliError> {
    let mut engine = ctx.open_engine()?;
    let report = engine
        .push(PushOptions {
            force,
            dry_run,
            encrypt,
        })
        .await?;
    print_report(&report, dry_run);
    if report.executed {
        println!("Push done.");
    }
    Ok(())
}
