//! In-memory [`StorageApi`] for tests.

use crate::api::{
    ApiBranch, ApiComponent, ApiComponentConfigs, ApiConfig, ApiConfigRow, StorageApi,
};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use confsync_core::model::{BranchId, ComponentId, ConfigKey, ConfigRowKey};
use confsync_core::Content;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// First id handed out by the ticket endpoint.
pub const FIRST_TICKET: u64 = 1001;

#[derive(Debug, Default)]
struct MockData {
    components: BTreeMap<String, ApiComponent>,
    branches: BTreeMap<String, ApiBranch>,
    configs: BTreeMap<(String, String, String), ApiConfig>,
    next_ticket: u64,
    calls: Vec<String>,
    failing: BTreeSet<String>,
}

/// Mock storage API for testing.
///
/// Holds branches, configs and rows in memory, records every call as
/// `"<method> <target>"` and fails calls whose method name was passed to
/// [`MockStorageApi::fail_on`].
#[derive(Debug)]
pub struct MockStorageApi {
    data: Mutex<MockData>,
}

impl Default for MockStorageApi {
    fn default() -> Self {
        Self::new()
    }
}

fn config_index(branch: &str, component: &str, id: &str) -> (String, String, String) {
    (branch.to_string(), component.to_string(), id.to_string())
}

impl MockStorageApi {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self {
            data: Mutex::new(MockData {
                next_ticket: FIRST_TICKET,
                ..MockData::default()
            }),
        }
    }

    /// Adds a component.
    pub fn add_component(&self, id: &str, component_type: &str) {
        self.data.lock().components.insert(
            id.to_string(),
            ApiComponent {
                id: id.to_string(),
                component_type: component_type.to_string(),
                name: id.to_string(),
            },
        );
    }

    /// Adds a branch.
    pub fn add_branch(&self, id: &str, name: &str, is_default: bool) {
        self.data.lock().branches.insert(
            id.to_string(),
            ApiBranch {
                id: id.to_string(),
                name: name.to_string(),
                description: String::new(),
                is_default,
            },
        );
    }

    /// Adds a config with its rows.
    pub fn add_config(&self, branch_id: &str, component_id: &str, config: ApiConfig) {
        self.data
            .lock()
            .configs
            .insert(config_index(branch_id, component_id, &config.id), config);
    }

    /// Returns a stored config.
    pub fn config(&self, branch_id: &str, component_id: &str, id: &str) -> Option<ApiConfig> {
        self.data
            .lock()
            .configs
            .get(&config_index(branch_id, component_id, id))
            .cloned()
    }

    /// Returns a stored branch.
    pub fn branch(&self, id: &str) -> Option<ApiBranch> {
        self.data.lock().branches.get(id).cloned()
    }

    /// Makes every call of `method` fail with a server error.
    pub fn fail_on(&self, method: &str) {
        self.data.lock().failing.insert(method.to_string());
    }

    /// Recorded calls.
    pub fn calls(&self) -> Vec<String> {
        self.data.lock().calls.clone()
    }

    /// Recorded calls of one method.
    pub fn calls_of(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .collect()
    }

    fn record(&self, method: &str, target: impl std::fmt::Display) -> SyncResult<()> {
        let mut data = self.data.lock();
        data.calls.push(format!("{method} {target}"));
        if data.failing.contains(method) {
            return Err(SyncError::api(500, format!("{method} failed")));
        }
        Ok(())
    }
}

fn merge_config(target: &mut ApiConfig, source: &ApiConfig, changed: &[String]) {
    for field in changed {
        match field.as_str() {
            "name" => target.name = source.name.clone(),
            "description" => target.description = source.description.clone(),
            "isDisabled" => target.is_disabled = source.is_disabled,
            _ => target.configuration = source.configuration.clone(),
        }
    }
}

fn merge_row(target: &mut ApiConfigRow, source: &ApiConfigRow, changed: &[String]) {
    for field in changed {
        match field.as_str() {
            "name" => target.name = source.name.clone(),
            "description" => target.description = source.description.clone(),
            "isDisabled" => target.is_disabled = source.is_disabled,
            _ => target.configuration = source.configuration.clone(),
        }
    }
}

#[async_trait]
impl StorageApi for MockStorageApi {
    async fn list_components(&self) -> SyncResult<Vec<ApiComponent>> {
        self.record("list_components", "")?;
        Ok(self.data.lock().components.values().cloned().collect())
    }

    async fn list_branches(&self) -> SyncResult<Vec<ApiBranch>> {
        self.record("list_branches", "")?;
        Ok(self.data.lock().branches.values().cloned().collect())
    }

    async fn list_configs(&self, branch_id: &BranchId) -> SyncResult<Vec<ApiComponentConfigs>> {
        self.record("list_configs", branch_id)?;
        let data = self.data.lock();
        let mut grouped: BTreeMap<String, Vec<ApiConfig>> = BTreeMap::new();
        for ((branch, component, _), config) in &data.configs {
            if branch == branch_id.as_str() {
                grouped
                    .entry(component.clone())
                    .or_default()
                    .push(config.clone());
            }
        }
        Ok(grouped
            .into_iter()
            .map(|(id, configurations)| {
                let component_type = data
                    .components
                    .get(&id)
                    .map(|c| c.component_type.clone())
                    .unwrap_or_default();
                ApiComponentConfigs {
                    name: id.clone(),
                    id,
                    component_type,
                    configurations,
                }
            })
            .collect())
    }

    async fn update_branch(
        &self,
        branch: &ApiBranch,
        _change_description: &str,
    ) -> SyncResult<ApiBranch> {
        self.record("update_branch", &branch.id)?;
        let mut data = self.data.lock();
        let stored = data
            .branches
            .get_mut(&branch.id)
            .ok_or_else(|| SyncError::api(404, format!("branch {} not found", branch.id)))?;
        stored.description = branch.description.clone();
        if !stored.is_default {
            stored.name = branch.name.clone();
        }
        Ok(stored.clone())
    }

    async fn delete_branch(&self, branch_id: &BranchId) -> SyncResult<()> {
        self.record("delete_branch", branch_id)?;
        let mut data = self.data.lock();
        if data.branches.remove(branch_id.as_str()).is_none() {
            return Err(SyncError::api(404, format!("branch {branch_id} not found")));
        }
        data.configs.retain(|(b, _, _), _| b != branch_id.as_str());
        Ok(())
    }

    async fn create_config(
        &self,
        branch_id: &BranchId,
        component_id: &ComponentId,
        config: &ApiConfig,
        _change_description: &str,
    ) -> SyncResult<ApiConfig> {
        self.record("create_config", format!("{component_id}/{}", config.id))?;
        let mut data = self.data.lock();
        let index = config_index(branch_id.as_str(), component_id.as_str(), &config.id);
        if data.configs.contains_key(&index) {
            return Err(SyncError::api(400, "Configuration already exists."));
        }
        let mut stored = config.clone();
        stored.rows.clear();
        data.configs.insert(index, stored.clone());
        Ok(stored)
    }

    async fn update_config(
        &self,
        branch_id: &BranchId,
        component_id: &ComponentId,
        config: &ApiConfig,
        changed: &[String],
        _change_description: &str,
    ) -> SyncResult<ApiConfig> {
        self.record("update_config", format!("{component_id}/{}", config.id))?;
        let mut data = self.data.lock();
        let index = config_index(branch_id.as_str(), component_id.as_str(), &config.id);
        let stored = data
            .configs
            .get_mut(&index)
            .ok_or_else(|| SyncError::api(404, format!("config {} not found", config.id)))?;
        merge_config(stored, config, changed);
        Ok(stored.clone())
    }

    async fn delete_config(&self, key: &ConfigKey) -> SyncResult<()> {
        self.record("delete_config", format!("{}/{}", key.component_id, key.id))?;
        let index = config_index(key.branch_id.as_str(), key.component_id.as_str(), key.id.as_str());
        match self.data.lock().configs.remove(&index) {
            Some(_) => Ok(()),
            None => Err(SyncError::api(404, format!("config {} not found", key.id))),
        }
    }

    async fn create_config_row(
        &self,
        config: &ConfigKey,
        row: &ApiConfigRow,
        _change_description: &str,
    ) -> SyncResult<ApiConfigRow> {
        self.record("create_config_row", format!("{}/{}", config.id, row.id))?;
        let mut data = self.data.lock();
        let index = config_index(
            config.branch_id.as_str(),
            config.component_id.as_str(),
            config.id.as_str(),
        );
        let stored = data
            .configs
            .get_mut(&index)
            .ok_or_else(|| SyncError::api(404, format!("config {} not found", config.id)))?;
        if stored.rows.iter().any(|r| r.id == row.id) {
            return Err(SyncError::api(400, "Row already exists."));
        }
        stored.rows.push(row.clone());
        Ok(row.clone())
    }

    async fn update_config_row(
        &self,
        config: &ConfigKey,
        row: &ApiConfigRow,
        changed: &[String],
        _change_description: &str,
    ) -> SyncResult<ApiConfigRow> {
        self.record("update_config_row", format!("{}/{}", config.id, row.id))?;
        let mut data = self.data.lock();
        let index = config_index(
            config.branch_id.as_str(),
            config.component_id.as_str(),
            config.id.as_str(),
        );
        let stored = data
            .configs
            .get_mut(&index)
            .and_then(|c| c.rows.iter_mut().find(|r| r.id == row.id))
            .ok_or_else(|| SyncError::api(404, format!("row {} not found", row.id)))?;
        merge_row(stored, row, changed);
        Ok(stored.clone())
    }

    async fn delete_config_row(&self, key: &ConfigRowKey) -> SyncResult<()> {
        self.record("delete_config_row", format!("{}/{}", key.config_id, key.id))?;
        let mut data = self.data.lock();
        let index = config_index(
            key.branch_id.as_str(),
            key.component_id.as_str(),
            key.config_id.as_str(),
        );
        let config = data
            .configs
            .get_mut(&index)
            .ok_or_else(|| SyncError::api(404, format!("config {} not found", key.config_id)))?;
        let before = config.rows.len();
        config.rows.retain(|r| r.id != key.id.as_str());
        if config.rows.len() == before {
            return Err(SyncError::api(404, format!("row {} not found", key.id)));
        }
        Ok(())
    }

    async fn generate_new_id(&self) -> SyncResult<String> {
        self.record("generate_new_id", "")?;
        let mut data = self.data.lock();
        let id = data.next_ticket;
        data.next_ticket += 1;
        Ok(id.to_string())
    }

    async fn encrypt_values(
        &self,
        component_id: &ComponentId,
        values: Content,
    ) -> SyncResult<Content> {
        self.record("encrypt_values", component_id)?;
        Ok(values
            .into_iter()
            .map(|(k, v)| {
                let plain = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, Value::String(format!("KBC::ProjectSecure::{plain}")))
            })
            .collect())
    }
}
