//! The storage API seam.
//!
//! [`StorageApi`] is the only way the engine talks to the remote side.
//! Wire types mirror the JSON of the storage API; mapping to the object
//! model lives in [`crate::remote`].

use crate::error::SyncResult;
use async_trait::async_trait;
use confsync_core::model::{BranchId, ComponentId, ConfigKey, ConfigRowKey};
use confsync_core::Content;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A branch as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBranch {
    /// Branch id.
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    /// Branch name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// The default branch.
    #[serde(default)]
    pub is_default: bool,
}

/// A config row as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfigRow {
    /// Row id.
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    /// Row name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Disabled flag.
    #[serde(default)]
    pub is_disabled: bool,
    /// Row content.
    #[serde(default)]
    pub configuration: Content,
}

/// A config with its rows as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Config id.
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    /// Config name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Disabled flag.
    #[serde(default)]
    pub is_disabled: bool,
    /// Config content.
    #[serde(default)]
    pub configuration: Content,
    /// Rows.
    #[serde(default)]
    pub rows: Vec<ApiConfigRow>,
}

/// Configs of one component in one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiComponentConfigs {
    /// Component id.
    pub id: String,
    /// Component type.
    #[serde(rename = "type", default)]
    pub component_type: String,
    /// Component name.
    #[serde(default)]
    pub name: String,
    /// Configs of the component.
    #[serde(default)]
    pub configurations: Vec<ApiConfig>,
}

/// Component metadata as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiComponent {
    /// Component id.
    pub id: String,
    /// Component type.
    #[serde(rename = "type", default)]
    pub component_type: String,
    /// Component name.
    #[serde(default)]
    pub name: String,
}

/// Response of the ticket endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketResponse {
    /// Newly reserved id.
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
}

/// Ids are numbers for some endpoints and strings for others.
fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Remote storage operations used by the engine.
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Lists all components of the project.
    async fn list_components(&self) -> SyncResult<Vec<ApiComponent>>;

    /// Lists all branches.
    async fn list_branches(&self) -> SyncResult<Vec<ApiBranch>>;

    /// Lists configs with rows of one branch, grouped by component.
    async fn list_configs(&self, branch_id: &BranchId) -> SyncResult<Vec<ApiComponentConfigs>>;

    /// Updates branch name and description.
    async fn update_branch(&self, branch: &ApiBranch, change_description: &str)
        -> SyncResult<ApiBranch>;

    /// Deletes a branch.
    async fn delete_branch(&self, branch_id: &BranchId) -> SyncResult<()>;

    /// Creates a config with a known id. Rows are not created.
    async fn create_config(
        &self,
        branch_id: &BranchId,
        component_id: &ComponentId,
        config: &ApiConfig,
        change_description: &str,
    ) -> SyncResult<ApiConfig>;

    /// Updates the listed fields of a config.
    async fn update_config(
        &self,
        branch_id: &BranchId,
        component_id: &ComponentId,
        config: &ApiConfig,
        changed: &[String],
        change_description: &str,
    ) -> SyncResult<ApiConfig>;

    /// Deletes a config with its rows.
    async fn delete_config(&self, key: &ConfigKey) -> SyncResult<()>;

    /// Creates a row with a known id.
    async fn create_config_row(
        &self,
        config: &ConfigKey,
        row: &ApiConfigRow,
        change_description: &str,
    ) -> SyncResult<ApiConfigRow>;

    /// Updates the listed fields of a row.
    async fn update_config_row(
        &self,
        config: &ConfigKey,
        row: &ApiConfigRow,
        changed: &[String],
        change_description: &str,
    ) -> SyncResult<ApiConfigRow>;

    /// Deletes a row.
    async fn delete_config_row(&self, key: &ConfigRowKey) -> SyncResult<()>;

    /// Reserves a new unique id.
    async fn generate_new_id(&self) -> SyncResult<String>;

    /// Encrypts values for a component. Keys are returned unchanged.
    async fn encrypt_values(
        &self,
        component_id: &ComponentId,
        values: Content,
    ) -> SyncResult<Content>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_become_strings() {
        let branch: ApiBranch =
            serde_json::from_value(json!({"id": 123, "name": "Main", "isDefault": true})).unwrap();
        assert_eq!(branch.id, "123");
        assert!(branch.is_default);
        assert_eq!(branch.description, "");

        let ticket: TicketResponse = serde_json::from_value(json!({"id": "1001"})).unwrap();
        assert_eq!(ticket.id, "1001");
    }

    #[test]
    fn component_configs_decode() {
        let value = json!([{
            "id": "ex-generic-v2",
            "type": "extractor",
            "configurations": [{
                "id": "456",
                "name": "Api",
                "configuration": {"parameters": {"a": 1}},
                "rows": [{"id": "789", "name": "Row", "isDisabled": true}]
            }]
        }]);
        let decoded: Vec<ApiComponentConfigs> = serde_json::from_value(value).unwrap();
        assert_eq!(decoded[0].configurations[0].rows[0].id, "789");
        assert!(decoded[0].configurations[0].rows[0].is_disabled);
    }
}
