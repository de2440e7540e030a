//! CLI errors and exit codes.

use confsync_core::CoreError;
use confsync_sync_engine::SyncError;
use thiserror::Error;

/// Exit code of a generic failure.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code when another process holds the project lock.
pub const EXIT_LOCKED: u8 = 3;
/// Exit code when the project directory cannot be loaded.
pub const EXIT_INVALID_LOCAL_STATE: u8 = 4;

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine failure.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Project directory failure outside the engine.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A remote command was run without a token.
    #[error("missing storage API token, set --storage-api-token or CONFSYNC_STORAGE_API_TOKEN")]
    MissingToken,

    /// The HTTP client could not be built.
    #[error("cannot create HTTP client: {0}")]
    HttpClient(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Core(CoreError::ProjectLocked)
            | CliError::Sync(SyncError::Core(CoreError::ProjectLocked)) => EXIT_LOCKED,
            CliError::Sync(SyncError::InvalidLocalState(_)) => EXIT_INVALID_LOCAL_STATE,
            _ => EXIT_FAILURE,
        }
    }
}
