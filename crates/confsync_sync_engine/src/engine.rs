//! The engine facade used by the CLI.

use crate::api::StorageApi;
use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::executor::{validate_diff_plan, Executor};
use crate::plan::{DiffPlan, EncryptPlan, PersistPlan, Plan, RenamePlan};
use crate::remote::load_remote_state;
use confsync_core::local::load_local_state;
use confsync_core::model::Component;
use confsync_core::{ComponentsMap, CoreError, Differ, ProjectDir, State};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationReport {
    /// Plan lines, header first.
    pub plan: Vec<String>,
    /// False for a dry run or an empty plan.
    pub executed: bool,
}

/// Options of the pull operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullOptions {
    /// Overwrite the project directory even if it cannot be loaded.
    pub force: bool,
    /// Print the plan only.
    pub dry_run: bool,
}

/// Options of the push operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// Delete remote objects missing locally.
    pub force: bool,
    /// Print the plan only.
    pub dry_run: bool,
    /// Encrypt plaintext secrets first.
    pub encrypt: bool,
}

/// Which sides to load.
#[derive(Debug, Clone, Copy, Default)]
struct LoadOptions {
    local: bool,
    remote: bool,
    ignore_invalid: bool,
}

/// Sync engine bound to one project directory.
///
/// The project lock is held for the lifetime of the engine.
pub struct SyncEngine {
    project: ProjectDir,
    state: State,
    api: Arc<dyn StorageApi>,
    config: EngineConfig,
    cancel: CancellationToken,
    loaded: bool,
}

impl SyncEngine {
    /// Opens the project at `root`, taking its lock and reading the manifest.
    pub fn open(root: &Path, config: EngineConfig, api: Arc<dyn StorageApi>) -> SyncResult<Self> {
        let project = ProjectDir::open(root)?;
        let manifest = project.load_manifest()?;
        let state = State::new(manifest, ComponentsMap::default())?;
        Ok(Self {
            project,
            state,
            api,
            config,
            cancel: CancellationToken::new(),
            loaded: false,
        })
    }

    /// Uses `cancel` to stop work that has not started yet.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The object graph.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// The project directory.
    pub fn project(&self) -> &ProjectDir {
        &self.project
    }

    fn executor(&self) -> Executor {
        Executor::new(
            self.project.root(),
            Arc::clone(&self.api),
            self.config.clone(),
            self.cancel.clone(),
        )
    }

    async fn load(&mut self, options: LoadOptions) -> SyncResult<()> {
        if self.loaded {
            return Err(SyncError::Core(CoreError::invalid_operation(
                "the engine runs one operation per instance",
            )));
        }
        self.loaded = true;

        // Directory matching needs the component types.
        for c in self.api.list_components().await? {
            let mut component = Component::new(c.id.as_str(), c.component_type);
            component.name = c.name;
            self.state.components_mut().insert(component);
        }

        if options.local {
            let result = load_local_state(
                &mut self.state,
                self.project.root(),
                self.cancel.clone(),
                self.config.max_local_workers,
            )
            .await;
            if let Err(e) = result {
                if options.ignore_invalid {
                    warn!(error = %e, "ignoring invalid objects");
                } else {
                    return Err(SyncError::InvalidLocalState(e));
                }
            }
        }

        if options.remote {
            load_remote_state(&mut self.state, self.api.as_ref()).await?;
        }
        Ok(())
    }

    fn save_manifest(&self) -> SyncResult<()> {
        self.project.save_manifest(self.state.manifest())?;
        Ok(())
    }

    /// Overwrites the project directory with the remote state.
    pub async fn pull(&mut self, options: PullOptions) -> SyncResult<OperationReport> {
        self.load(LoadOptions {
            local: true,
            remote: true,
            ignore_invalid: options.force,
        })
        .await?;
        let plan = DiffPlan::pull(&Differ::new(&self.state).invoke()?);
        self.run_diff_plan(plan, options.dry_run).await
    }

    /// Overwrites the remote state with the project directory.
    pub async fn push(&mut self, options: PushOptions) -> SyncResult<OperationReport> {
        self.load(LoadOptions {
            local: true,
            remote: true,
            ignore_invalid: false,
        })
        .await?;
        let mut report = OperationReport::default();
        if options.encrypt {
            // A rejected push encrypts nothing.
            let plan = DiffPlan::push(&Differ::new(&self.state).invoke()?, &self.state)
                .allow_remote_delete(options.force);
            validate_diff_plan(&plan)?;
            let encrypt = EncryptPlan::build(&self.state);
            report.plan.extend(encrypt.report(&self.state));
            if !options.dry_run && !encrypt.is_empty() {
                let result = self
                    .executor()
                    .execute_encrypt_plan(&encrypt, &mut self.state)
                    .await;
                self.save_manifest()?;
                result?;
            }
        }
        let plan = DiffPlan::push(&Differ::new(&self.state).invoke()?, &self.state)
            .allow_remote_delete(options.force);
        validate_diff_plan(&plan)?;
        let diff_report = self.run_diff_plan(plan, options.dry_run).await?;
        report.plan.extend(diff_report.plan);
        report.executed = diff_report.executed;
        Ok(report)
    }

    async fn run_diff_plan(&mut self, plan: DiffPlan, dry_run: bool) -> SyncResult<OperationReport> {
        let lines = plan.report(&self.state);
        if dry_run || plan.is_empty() {
            return Ok(OperationReport {
                plan: lines,
                executed: false,
            });
        }
        let result = self
            .executor()
            .execute_diff_plan(&plan, &mut self.state)
            .await;
        self.save_manifest()?;
        result?;
        info!(operation = plan.name(), "done");
        Ok(OperationReport {
            plan: lines,
            executed: true,
        })
    }

    /// Adds new directories to the manifest and drops records of deleted
    /// ones.
    pub async fn persist(&mut self, dry_run: bool) -> SyncResult<OperationReport> {
        self.load(LoadOptions {
            local: true,
            remote: false,
            ignore_invalid: false,
        })
        .await?;
        let plan = PersistPlan::build(&self.state, self.project.root())?;
        let lines = plan.report(&self.state);
        if dry_run || plan.is_empty() {
            return Ok(OperationReport {
                plan: lines,
                executed: false,
            });
        }
        let result = self
            .executor()
            .execute_persist_plan(&plan, &mut self.state)
            .await;
        self.save_manifest()?;
        result?;
        Ok(OperationReport {
            plan: lines,
            executed: true,
        })
    }

    /// Moves objects to the paths produced by the naming templates.
    pub async fn fix_paths(&mut self, dry_run: bool) -> SyncResult<OperationReport> {
        self.load(LoadOptions {
            local: true,
            remote: false,
            ignore_invalid: false,
        })
        .await?;
        let plan = RenamePlan::build(&self.state)?;
        let lines = plan.report(&self.state);
        if dry_run || plan.is_empty() {
            return Ok(OperationReport {
                plan: lines,
                executed: false,
            });
        }
        let result = self
            .executor()
            .execute_rename_plan(plan, &mut self.state)
            .await;
        self.save_manifest()?;
        result?;
        Ok(OperationReport {
            plan: lines,
            executed: true,
        })
    }

    /// Encrypts plaintext secrets in the project directory.
    pub async fn encrypt(&mut self, dry_run: bool) -> SyncResult<OperationReport> {
        self.load(LoadOptions {
            local: true,
            remote: false,
            ignore_invalid: false,
        })
        .await?;
        let plan = EncryptPlan::build(&self.state);
        let lines = plan.report(&self.state);
        if dry_run || plan.is_empty() {
            return Ok(OperationReport {
                plan: lines,
                executed: false,
            });
        }
        let result = self
            .executor()
            .execute_encrypt_plan(&plan, &mut self.state)
            .await;
        self.save_manifest()?;
        result?;
        Ok(OperationReport {
            plan: lines,
            executed: true,
        })
    }

    /// Diff report lines; `details` adds changed paths per field.
    pub async fn diff(&mut self, details: bool) -> SyncResult<Vec<String>> {
        self.load(LoadOptions {
            local: true,
            remote: true,
            ignore_invalid: false,
        })
        .await?;
        let results = Differ::new(&self.state).invoke()?;
        if results.is_equal() {
            return Ok(vec!["No difference.".to_string()]);
        }
        let mut lines = vec![
            "* changed | + only in the project directory | - only remotely".to_string(),
        ];
        lines.extend(results.format(&self.state, details));
        Ok(lines)
    }
}
