//! Plan execution.
//!
//! Every phase runs as far as it safely can; failures of all phases are
//! collected into one aggregate prefixed with the operation name. Only a
//! failed plan validation stops execution before anything runs.

use crate::api::StorageApi;
use crate::config::EngineConfig;
use crate::error::{push_error, SyncError, SyncResult};
use crate::plan::{
    ActionType, DiffPlan, EncryptPlan, PersistAction, PersistPlan, Plan, PlanKind, RenamePlan,
    RowParent,
};
use crate::remote::{run_requests, RemoteUnitOfWork, Request, TicketProvider};
use confsync_core::local::{
    delete_empty_directories, load_object, mapper_context, LoadOutcome, LocalUnitOfWork, Workers,
};
use confsync_core::model::content::set_path;
use confsync_core::model::{ConfigKey, ConfigRowKey, Key, PathInProject, Record};
use confsync_core::naming::PathsGenerator;
use confsync_core::{Content, CoreError, MultiError, State};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn operation_errors(plan: &dyn Plan) -> MultiError {
    MultiError::with_prefix(format!("cannot perform the {} operation", plan.name()))
}

/// Validates `plan`, reporting failures under the operation prefix.
pub fn validate_diff_plan(plan: &DiffPlan) -> SyncResult<()> {
    plan.validate().map_err(|e| {
        let mut errors = operation_errors(plan);
        push_error(&mut errors, e);
        errors.into()
    })
}

/// Runs plans against a project directory and the API.
pub struct Executor {
    root: PathBuf,
    api: Arc<dyn StorageApi>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl Executor {
    /// Creates an executor for the project at `root`.
    pub fn new(
        root: &Path,
        api: Arc<dyn StorageApi>,
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            api,
            config,
            cancel,
        }
    }

    fn local_uow(&self) -> LocalUnitOfWork {
        LocalUnitOfWork::new(&self.root, self.cancel.clone(), self.config.max_local_workers)
    }

    fn remote_uow(&self) -> RemoteUnitOfWork {
        RemoteUnitOfWork::new(
            Arc::clone(&self.api),
            self.config.change_description.clone(),
            self.config.max_remote_requests,
            self.cancel.clone(),
        )
    }

    fn delete_empty_dirs(&self, state: &State, errors: &mut MultiError) {
        let roots: Vec<String> = state
            .manifest()
            .records()
            .filter(|r| matches!(r.key, Key::Branch(_)))
            .map(Record::path)
            .collect();
        match delete_empty_directories(&self.root, &roots) {
            Ok(count) => debug!(count, "empty directories removed"),
            Err(e) => errors.push(e),
        }
    }

    /// Executes a pull or push plan.
    ///
    /// Validation runs first; remote work goes before local work, then
    /// invalid objects (pull only) and empty directories are removed.
    /// A pull plan holds local actions only and a push plan remote ones
    /// only, so the two units of work never both run for one plan and
    /// their order does not change the outcome.
    pub async fn execute_diff_plan(&self, plan: &DiffPlan, state: &mut State) -> SyncResult<()> {
        validate_diff_plan(plan)?;
        let mut errors = operation_errors(plan);

        let mut new_paths = BTreeMap::new();
        let mut generator = PathsGenerator::new(state, false);
        let mut needs_paths = false;
        for action in plan.actions() {
            let key = &action.result.key;
            if action.action == ActionType::SaveLocal && state.path_of(key).is_err() {
                generator.add(key.clone());
                needs_paths = true;
            }
        }
        if needs_paths {
            match generator.invoke() {
                Ok(generated) => {
                    for g in generated {
                        new_paths.insert(g.key, g.new);
                    }
                }
                Err(e) => {
                    errors.push(e);
                    return Err(errors.into());
                }
            }
        }

        let mut local = self.local_uow();
        let mut remote = self.remote_uow();
        for action in plan.actions() {
            let result = &action.result;
            let key = &result.key;
            match action.action {
                ActionType::SaveLocal => {
                    let Some(object) = &result.remote else {
                        continue;
                    };
                    let paths = state
                        .record(key)
                        .map(|r| r.paths.clone())
                        .filter(|p| !p.is_empty())
                        .or_else(|| new_paths.get(key).cloned());
                    match paths {
                        Some(paths) => local.save_object(state, object, paths),
                        None => errors.push(CoreError::not_found(format!("path of {}", key.desc()))),
                    }
                }
                ActionType::DeleteLocal => local.delete_object(state, key),
                ActionType::SaveRemote => {
                    if let Some(object) = &result.local {
                        remote.save_object(state, object, &result.changed_fields);
                    }
                }
                ActionType::DeleteRemote => {
                    if plan.remote_delete_allowed() {
                        remote.delete_object(key);
                    } else {
                        warn!(key = %key, "remote object not deleted, use --force to delete it");
                    }
                }
            }
        }

        if !remote.is_empty() {
            if let Err(e) = remote.invoke(state).await {
                push_error(&mut errors, e);
            }
        }
        if !local.is_empty() {
            if let Err(e) = local.invoke(state).await {
                errors.push(e);
            }
        }

        if plan.kind() == PlanKind::Pull {
            let mut cleanup = self.local_uow();
            cleanup.delete_invalid_objects(state);
            if let Err(e) = cleanup.invoke(state).await {
                errors.push(e);
            }
        }
        self.delete_empty_dirs(state, &mut errors);

        info!(operation = plan.name(), actions = plan.actions().len(), "plan executed");
        errors.into_result().map_err(SyncError::from)
    }

    /// Executes a persist plan.
    ///
    /// Ids for all new objects are reserved first. The resolved tickets are
    /// then applied in plan order: a config gets its id, a row gets its id
    /// and the id of its parent config, which may be new as well. Each
    /// identified object is registered in the manifest and loaded.
    pub async fn execute_persist_plan(
        &self,
        plan: &PersistPlan,
        state: &mut State,
    ) -> SyncResult<()> {
        let mut errors = operation_errors(plan);
        let actions = plan.actions();

        let mut provider = TicketProvider::new(Arc::clone(&self.api), self.config.max_ticket_requests);
        for (index, action) in actions.iter().enumerate() {
            if !matches!(action, PersistAction::DeleteRecord { .. }) {
                provider.request(index);
            }
        }
        let mut ids = BTreeMap::new();
        for ticket in provider.resolve(&self.cancel).await {
            match ticket.id {
                Ok(id) => {
                    ids.insert(ticket.tag, id);
                }
                Err(e) => errors.push_message(format!(
                    "cannot get a new id for \"{}\": {e}",
                    actions[ticket.tag].path()
                )),
            }
        }

        let mut configs = Vec::new();
        let mut rows = Vec::new();
        let mut new_config_keys: BTreeMap<String, ConfigKey> = BTreeMap::new();
        for (index, action) in actions.iter().enumerate() {
            match action {
                PersistAction::NewConfig {
                    paths,
                    parent,
                    component_id,
                } => {
                    let Some(id) = ids.get(&index) else {
                        continue;
                    };
                    let key = ConfigKey::new(parent.branch_id().clone(), component_id.clone(), id.as_str());
                    new_config_keys.insert(paths.path(), key.clone());
                    configs.push(new_record(Key::Config(key), paths));
                }
                PersistAction::NewRow { paths, parent, .. } => {
                    let config_key = match parent {
                        RowParent::Existing(key) => Some(key.clone()),
                        RowParent::New(path) => new_config_keys.get(path).cloned(),
                    };
                    let Some(config_key) = config_key else {
                        errors.push_message(format!(
                            "cannot persist \"{}\": parent config was not persisted",
                            paths.path()
                        ));
                        continue;
                    };
                    let Some(id) = ids.get(&index) else {
                        continue;
                    };
                    let key = ConfigRowKey::new(
                        config_key.branch_id.clone(),
                        config_key.component_id.clone(),
                        config_key.id.clone(),
                        id.as_str(),
                    );
                    rows.push(new_record(Key::ConfigRow(key), paths));
                }
                PersistAction::DeleteRecord { key, path } => {
                    state.remove_record(key);
                    state.set_local(key, None);
                    info!(key = %key, path = %path, "record removed");
                }
            }
        }

        for records in [configs, rows] {
            self.load_new_records(records, state, &mut errors).await;
        }
        errors.into_result().map_err(SyncError::from)
    }

    async fn load_new_records(
        &self,
        records: Vec<Record>,
        state: &mut State,
        errors: &mut MultiError,
    ) {
        let mut workers = Workers::new(self.cancel.clone(), self.config.max_local_workers);
        let mut queued = Vec::new();
        for record in records {
            if let Err(e) = state.set_record(record.clone()) {
                errors.push(e);
                continue;
            }
            let ctx = mapper_context(state, &record.key);
            let root = self.root.clone();
            queued.push(record.key.clone());
            workers.add_worker(move || load_object(&root, &record, &ctx));
        }
        for (key, result) in queued.into_iter().zip(workers.start_and_wait().await) {
            match result {
                Ok(LoadOutcome::Loaded {
                    object,
                    related_paths,
                }) => {
                    if let Some(r) = state.record_mut(&key) {
                        r.related_paths = related_paths;
                        r.state.persisted = true;
                    }
                    info!(key = %key, "persisted");
                    state.set_local(&key, Some(object));
                }
                Ok(LoadOutcome::NotFound) => {
                    state.remove_record(&key);
                    errors.push(CoreError::not_found(key.desc()));
                }
                Err(e) => {
                    state.remove_record(&key);
                    errors.push(e);
                }
            }
        }
    }

    /// Executes a rename plan as one copy-then-delete batch.
    pub async fn execute_rename_plan(&self, plan: RenamePlan, state: &mut State) -> SyncResult<()> {
        if plan.is_empty() {
            return Ok(());
        }
        let mut errors = operation_errors(&plan);
        let (pairs, updates) = plan.into_parts();
        let mut local = self.local_uow();
        local.rename(pairs, updates);
        if let Err(e) = local.invoke(state).await {
            errors.push(e);
        }
        self.delete_empty_dirs(state, &mut errors);
        errors.into_result().map_err(SyncError::from)
    }

    /// Executes an encrypt plan: one API call per object, then a local save
    /// of every object whose values were all encrypted.
    pub async fn execute_encrypt_plan(
        &self,
        plan: &EncryptPlan,
        state: &mut State,
    ) -> SyncResult<()> {
        let mut errors = operation_errors(plan);
        let requests: Vec<Request<Content>> = plan
            .actions()
            .iter()
            .map(|action| {
                let api = Arc::clone(&self.api);
                let component_id = action.component_id.clone();
                let values: Content = action
                    .values
                    .iter()
                    .map(|(path, value)| (path.to_string(), Value::String(value.clone())))
                    .collect();
                Box::pin(async move { api.encrypt_values(&component_id, values).await })
                    as Request<Content>
            })
            .collect();
        let results = run_requests(requests, self.config.max_remote_requests, &self.cancel).await;

        let mut local = self.local_uow();
        for (action, result) in plan.actions().iter().zip(results) {
            let encrypted = match result {
                Ok(encrypted) => encrypted,
                Err(e) => {
                    errors.push_message(format!("cannot encrypt values of \"{}\": {e}", action.path));
                    continue;
                }
            };
            let (Some(mut object), Some(record)) =
                (state.local(&action.key).cloned(), state.record(&action.key))
            else {
                continue;
            };
            let paths = record.paths.clone();
            let mut complete = true;
            if let Some(content) = object.content_mut() {
                for (path, _) in &action.values {
                    match encrypted.get(&path.to_string()) {
                        Some(value) => {
                            set_path(content, path, value.clone());
                        }
                        None => {
                            complete = false;
                            errors.push_message(format!(
                                "value \"{path}\" of \"{}\" was not encrypted",
                                action.path
                            ));
                        }
                    }
                }
            }
            if complete {
                local.save_object(state, &object, paths);
            }
        }
        if let Err(e) = local.invoke(state).await {
            errors.push(e);
        }
        errors.into_result().map_err(SyncError::from)
    }
}

fn new_record(key: Key, paths: &PathInProject) -> Record {
    let mut record = Record::new(key);
    record.paths = paths.clone();
    record
}
