//! CLI command implementations.

pub mod diff;
pub mod encrypt;
pub mod fix_paths;
pub mod persist;
pub mod pull;
pub mod push;

use crate::error::CliError;
use crate::http_client::ReqwestClient;
use confsync_core::ProjectDir;
use confsync_sync_engine::{EngineConfig, HttpStorageApi, OperationReport, SyncEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Settings shared by all commands.
pub struct Context {
    /// Explicit project directory.
    pub project_dir: Option<PathBuf>,
    /// Storage API host override.
    pub api_host: Option<String>,
    /// Storage API token.
    pub api_token: Option<String>,
    /// Cancelled on Ctrl-C.
    pub cancel: CancellationToken,
}

impl Context {
    fn project_root(&self) -> Result<PathBuf, CliError> {
        match &self.project_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let cwd = std::env::current_dir().map_err(confsync_core::CoreError::from)?;
                Ok(ProjectDir::discover(&cwd)?)
            }
        }
    }

    /// Opens the engine on the project, bound to the HTTP storage API.
    pub fn open_engine(&self) -> Result<SyncEngine, CliError> {
        let root = self.project_root()?;
        let manifest = ProjectDir::open(&root)?.load_manifest()?;

        let token = self
            .api_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(CliError::MissingToken)?;
        let host = self
            .api_host
            .clone()
            .unwrap_or_else(|| manifest.project.api_host.clone());
        let config = EngineConfig::new(host, token).with_change_description(format!(
            "confsync v{}",
            env!("CARGO_PKG_VERSION")
        ));

        let client = ReqwestClient::new().map_err(|e| CliError::HttpClient(e.to_string()))?;
        let api = Arc::new(HttpStorageApi::new(&config, manifest.project.id, client));
        Ok(SyncEngine::open(&root, config, api)?.with_cancel(self.cancel.clone()))
    }
}

/// Prints the plan lines of a report.
pub fn print_report(report: &OperationReport, dry_run: bool) {
    for line in &report.plan {
        println!("{line}");
    }
    if dry_run {
        println!("Dry run, nothing changed.");
    }
}
