//! Remote unit of work.
//!
//! Saves run level by level (branches, configs, rows) so a parent exists
//! before its children; deletes run in the reverse order. Requests of one
//! level run concurrently up to the configured cap, except branch
//! requests which run one at a time. Every response is applied to the
//! remote side of the [`State`] by the calling task.

use super::mapper::{branch_to_api, config_to_api, row_to_api};
use super::requests::{run_requests, Request};
use crate::api::StorageApi;
use crate::error::{SyncError, SyncResult};
use confsync_core::diff::ChangedFields;
use confsync_core::model::{ConfigKey, Key};
use confsync_core::{MultiError, Object, State};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fields sent when every field of an object is written.
pub const ALL_FIELDS: [&str; 4] = ["name", "description", "isDisabled", "configuration"];

#[derive(Debug, Clone)]
struct SaveChange {
    object: Object,
    changed: Vec<String>,
    exists: bool,
}

/// Queue of remote operations.
pub struct RemoteUnitOfWork {
    api: Arc<dyn StorageApi>,
    change_description: String,
    max_requests: usize,
    cancel: CancellationToken,
    saves: Vec<SaveChange>,
    deletes: Vec<Key>,
    errors: MultiError,
}

impl RemoteUnitOfWork {
    /// Creates an empty unit of work.
    pub fn new(
        api: Arc<dyn StorageApi>,
        change_description: impl Into<String>,
        max_requests: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            change_description: change_description.into(),
            max_requests,
            cancel,
            saves: Vec::new(),
            deletes: Vec::new(),
            errors: MultiError::new(),
        }
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.saves.len() + self.deletes.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues a create or update of `object`.
    ///
    /// An object already present remotely is updated with the `changed`
    /// fields only. A branch that exists only locally is rejected.
    pub fn save_object(&mut self, state: &State, object: &Object, changed: &ChangedFields) {
        let key = object.key();
        let exists = state.remote(&key).is_some();
        if let Err(e) = object.validate() {
            self.errors.push(e);
            return;
        }
        if !key.is_complete() {
            self.errors.push_message(format!(
                "{} has no id, persist it first",
                object.desc()
            ));
            return;
        }
        if matches!(object, Object::Branch(_)) && !exists {
            self.errors.push_message(format!(
                "branch \"{}\" exists only locally, a branch cannot be created remotely",
                object.name()
            ));
            return;
        }
        let changed = if exists && !changed.is_empty() {
            changed.names().map(str::to_string).collect()
        } else {
            ALL_FIELDS.iter().map(|f| f.to_string()).collect()
        };
        self.saves.push(SaveChange {
            object: object.clone(),
            changed,
            exists,
        });
    }

    /// Queues a delete of the remote object of `key`.
    pub fn delete_object(&mut self, key: &Key) {
        self.deletes.push(key.clone());
    }

    /// Sends all queued requests and applies the results to `state`.
    pub async fn invoke(self, state: &mut State) -> SyncResult<()> {
        let RemoteUnitOfWork {
            api,
            change_description,
            max_requests,
            cancel,
            saves,
            deletes,
            mut errors,
        } = self;
        let description = Arc::new(change_description);

        for level in 1..=3 {
            let batch: Vec<SaveChange> = saves
                .iter()
                .filter(|s| s.object.key().level() == level)
                .cloned()
                .collect();
            if batch.is_empty() {
                continue;
            }
            let requests: Vec<Request<()>> = batch
                .iter()
                .map(|change| {
                    Box::pin(save_request(
                        Arc::clone(&api),
                        change.clone(),
                        Arc::clone(&description),
                    )) as Request<()>
                })
                .collect();
            let limit = if level == 1 { 1 } else { max_requests };
            for (change, result) in batch.into_iter().zip(run_requests(requests, limit, &cancel).await) {
                match result {
                    Ok(()) => {
                        info!(key = %change.object.key(), "saved remotely");
                        let key = change.object.key();
                        state.set_remote(&key, Some(change.object));
                    }
                    Err(e) => errors.push_message(format!(
                        "cannot save {}: {e}",
                        change.object.desc()
                    )),
                }
            }
        }

        let deleted_configs: BTreeSet<ConfigKey> = deletes
            .iter()
            .filter_map(|k| match k {
                Key::Config(c) => Some(c.clone()),
                _ => None,
            })
            .collect();
        for level in (1..=3).rev() {
            let mut batch = Vec::new();
            for key in deletes.iter().filter(|k| k.level() == level) {
                if let Key::ConfigRow(row) = key {
                    if deleted_configs.contains(&row.config_key()) {
                        // Removed together with the config.
                        continue;
                    }
                }
                batch.push(key.clone());
            }
            if batch.is_empty() {
                continue;
            }
            let requests: Vec<Request<()>> = batch
                .iter()
                .map(|key| Box::pin(delete_request(Arc::clone(&api), key.clone())) as Request<()>)
                .collect();
            let limit = if level == 1 { 1 } else { max_requests };
            for (key, result) in batch.into_iter().zip(run_requests(requests, limit, &cancel).await) {
                match result {
                    Ok(()) => {
                        info!(key = %key, "deleted remotely");
                        for child in descendants(state, &key) {
                            state.set_remote(&child, None);
                        }
                        state.set_remote(&key, None);
                    }
                    Err(e) => errors.push_message(format!("cannot delete {}: {e}", key.desc())),
                }
            }
        }

        errors.into_result().map_err(SyncError::from)
    }
}

fn descendants(state: &State, key: &Key) -> Vec<Key> {
    let mut out = Vec::new();
    for child in state.children_of(key) {
        out.extend(descendants(state, &child));
        out.push(child);
    }
    out
}

async fn save_request(
    api: Arc<dyn StorageApi>,
    change: SaveChange,
    description: Arc<String>,
) -> SyncResult<()> {
    let SaveChange {
        object,
        changed,
        exists,
    } = change;
    let all: Vec<String> = ALL_FIELDS.iter().map(|f| f.to_string()).collect();
    match &object {
        Object::Branch(b) => {
            api.update_branch(&branch_to_api(b), &description).await?;
        }
        Object::Config(c) => {
            let payload = config_to_api(c);
            let (branch_id, component_id) = (&c.key.branch_id, &c.key.component_id);
            if exists {
                api.update_config(branch_id, component_id, &payload, &changed, &description)
                    .await?;
            } else {
                match api
                    .create_config(branch_id, component_id, &payload, &description)
                    .await
                {
                    Ok(_) => {}
                    Err(e) if e.is_already_exists() => {
                        debug!(key = %Key::from(c.key.clone()), "config already exists, updating");
                        api.update_config(branch_id, component_id, &payload, &all, &description)
                            .await?;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Object::ConfigRow(r) => {
            let payload = row_to_api(r);
            let config = r.key.config_key();
            if exists {
                api.update_config_row(&config, &payload, &changed, &description)
                    .await?;
            } else {
                match api.create_config_row(&config, &payload, &description).await {
                    Ok(_) => {}
                    Err(e) if e.is_already_exists() => {
                        debug!(key = %Key::from(r.key.clone()), "row already exists, updating");
                        api.update_config_row(&config, &payload, &all, &description)
                            .await?;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
    Ok(())
}

async fn delete_request(api: Arc<dyn StorageApi>, key: Key) -> SyncResult<()> {
    let result = match &key {
        Key::Branch(b) => api.delete_branch(&b.id).await,
        Key::Config(c) => api.delete_config(c).await,
        Key::ConfigRow(r) => api.delete_config_row(r).await,
    };
    match result {
        Err(e) if e.is_not_found() => {
            debug!(key = %key, "already deleted");
            Ok(())
        }
        other => other,
    }
}
