//! Diff command implementation.

use super::Context;
use crate::error::CliError;

/// Runs the diff command.
pub async fn run(ctx: &Context, details: bool) -> Result<(), CliError> {
    let mut engine = ctx.open_engine()?;
    for line in engine.diff(details).await? {
        println!("{line}");
    }
    Ok(())
}
