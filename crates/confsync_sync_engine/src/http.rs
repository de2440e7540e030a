//! HTTP implementation of [`StorageApi`].
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the engine
//! does not depend on a particular library. The CLI plugs in reqwest.

use crate::api::{
    ApiBranch, ApiComponent, ApiComponentConfigs, ApiConfig, ApiConfigRow, StorageApi,
    TicketResponse,
};
use crate::config::{strip_scheme, EngineConfig};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use confsync_core::model::{BranchId, ComponentId, ConfigKey, ConfigRowKey};
use confsync_core::Content;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// Header carrying the storage token.
pub const TOKEN_HEADER: &str = "X-StorageApi-Token";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

/// A prepared request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Vec<u8>>,
}

/// A received response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err`
/// means the request never got a response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Storage API over HTTP with JSON bodies.
pub struct HttpStorageApi<C: HttpClient> {
    base_url: String,
    encryption_url: String,
    token: String,
    project_id: u64,
    client: C,
    last_error: RwLock<Option<String>>,
}

fn with_scheme(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", strip_scheme(host))
    }
}

impl<C: HttpClient> HttpStorageApi<C> {
    /// Creates an API client for the configured hosts.
    pub fn new(config: &EngineConfig, project_id: u64, client: C) -> Self {
        Self {
            base_url: with_scheme(&config.api_host),
            encryption_url: with_scheme(&config.encryption_host()),
            token: config.api_token.clone(),
            project_id,
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the storage base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/v2/storage/{}", self.base_url, path)
    }

    async fn send(&self, method: Method, url: String, body: Option<Value>) -> SyncResult<Vec<u8>> {
        let body = match body {
            Some(v) => Some(serde_json::to_vec(&v).map_err(|e| SyncError::Protocol(e.to_string()))?),
            None => None,
        };
        trace!(?method, url = %url, "request");
        let request = HttpRequest {
            method,
            url,
            headers: vec![
                (TOKEN_HEADER.to_string(), self.token.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
        };
        let response = match self.client.send(request).await {
            Ok(r) => r,
            Err(e) => {
                *self.last_error.write() = Some(e.clone());
                return Err(SyncError::Transport(e));
            }
        };
        if !(200..300).contains(&response.status) {
            let message = error_message(&response.body);
            *self.last_error.write() = Some(message.clone());
            return Err(SyncError::api(response.status, message));
        }
        *self.last_error.write() = None;
        Ok(response.body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> SyncResult<T> {
        let bytes = self.send(method, url, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| SyncError::Protocol(e.to_string()))
    }

    fn config_url(&self, branch_id: &BranchId, component_id: &ComponentId) -> String {
        self.storage_url(&format!(
            "branch/{branch_id}/components/{component_id}/configs"
        ))
    }

    fn row_url(&self, config: &ConfigKey) -> String {
        format!(
            "{}/{}/rows",
            self.config_url(&config.branch_id, &config.component_id),
            config.id
        )
    }
}

/// Error message from an API error body, or the raw body.
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("error")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map).to_string()),
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Body of a create or update request.
///
/// With `changed`, only listed fields are sent; relations and blocks live
/// in the content, so they select `configuration`.
fn object_body(
    fields: Vec<(&str, Value)>,
    changed: Option<&[String]>,
    change_description: &str,
) -> Value {
    let selected = |name: &str| match changed {
        None => true,
        Some(list) => list.iter().any(|c| {
            c == name
                || (name == "configuration" && (c == "relations" || c == "transformation"))
        }),
    };
    let mut body = Map::new();
    for (name, value) in fields {
        if selected(name) {
            body.insert(name.to_string(), value);
        }
    }
    if !change_description.is_empty() {
        body.insert(
            "changeDescription".to_string(),
            Value::String(change_description.to_string()),
        );
    }
    Value::Object(body)
}

fn config_fields(config: &ApiConfig) -> Vec<(&'static str, Value)> {
    vec![
        ("configurationId", Value::String(config.id.clone())),
        ("name", Value::String(config.name.clone())),
        ("description", Value::String(config.description.clone())),
        ("isDisabled", Value::Bool(config.is_disabled)),
        ("configuration", Value::Object(config.configuration.clone())),
    ]
}

fn row_fields(row: &ApiConfigRow) -> Vec<(&'static str, Value)> {
    vec![
        ("rowId", Value::String(row.id.clone())),
        ("name", Value::String(row.name.clone())),
        ("description", Value::String(row.description.clone())),
        ("isDisabled", Value::Bool(row.is_disabled)),
        ("configuration", Value::Object(row.configuration.clone())),
    ]
}

#[async_trait]
impl<C: HttpClient> StorageApi for HttpStorageApi<C> {
    async fn list_components(&self) -> SyncResult<Vec<ApiComponent>> {
        self.send_json(Method::Get, self.storage_url("components"), None)
            .await
    }

    async fn list_branches(&self) -> SyncResult<Vec<ApiBranch>> {
        self.send_json(Method::Get, self.storage_url("dev-branches"), None)
            .await
    }

    async fn list_configs(&self, branch_id: &BranchId) -> SyncResult<Vec<ApiComponentConfigs>> {
        let url = self.storage_url(&format!(
            "branch/{branch_id}/components?include=configuration,rows"
        ));
        self.send_json(Method::Get, url, None).await
    }

    async fn update_branch(
        &self,
        branch: &ApiBranch,
        change_description: &str,
    ) -> SyncResult<ApiBranch> {
        let url = self.storage_url(&format!("dev-branches/{}", branch.id));
        let mut fields = vec![("description", Value::String(branch.description.clone()))];
        if !branch.is_default {
            fields.push(("name", Value::String(branch.name.clone())));
        }
        let body = object_body(fields, None, change_description);
        self.send_json(Method::Put, url, Some(body)).await
    }

    async fn delete_branch(&self, branch_id: &BranchId) -> SyncResult<()> {
        let url = self.storage_url(&format!("dev-branches/{branch_id}"));
        self.send(Method::Delete, url, None).await?;
        Ok(())
    }

    async fn create_config(
        &self,
        branch_id: &BranchId,
        component_id: &ComponentId,
        config: &ApiConfig,
        change_description: &str,
    ) -> SyncResult<ApiConfig> {
        let body = object_body(config_fields(config), None, change_description);
        debug!(component = %component_id, id = %config.id, "creating config");
        self.send_json(Method::Post, self.config_url(branch_id, component_id), Some(body))
            .await
    }

    async fn update_config(
        &self,
        branch_id: &BranchId,
        component_id: &ComponentId,
        config: &ApiConfig,
        changed: &[String],
        change_description: &str,
    ) -> SyncResult<ApiConfig> {
        let url = format!("{}/{}", self.config_url(branch_id, component_id), config.id);
        let body = object_body(config_fields(config), Some(changed), change_description);
        self.send_json(Method::Put, url, Some(body)).await
    }

    async fn delete_config(&self, key: &ConfigKey) -> SyncResult<()> {
        let url = format!(
            "{}/{}",
            self.config_url(&key.branch_id, &key.component_id),
            key.id
        );
        self.send(Method::Delete, url, None).await?;
        Ok(())
    }

    async fn create_config_row(
        &self,
        config: &ConfigKey,
        row: &ApiConfigRow,
        change_description: &str,
    ) -> SyncResult<ApiConfigRow> {
        let body = object_body(row_fields(row), None, change_description);
        self.send_json(Method::Post, self.row_url(config), Some(body))
            .await
    }

    async fn update_config_row(
        &self,
        config: &ConfigKey,
        row: &ApiConfigRow,
        changed: &[String],
        change_description: &str,
    ) -> SyncResult<ApiConfigRow> {
        let url = format!("{}/{}", self.row_url(config), row.id);
        let body = object_body(row_fields(row), Some(changed), change_description);
        self.send_json(Method::Put, url, Some(body)).await
    }

    async fn delete_config_row(&self, key: &ConfigRowKey) -> SyncResult<()> {
        let url = format!("{}/{}", self.row_url(&key.config_key()), key.id);
        self.send(Method::Delete, url, None).await?;
        Ok(())
    }

    async fn generate_new_id(&self) -> SyncResult<String> {
        let ticket: TicketResponse = self
            .send_json(Method::Post, self.storage_url("tickets"), Some(Value::Object(Map::new())))
            .await?;
        Ok(ticket.id)
    }

    async fn encrypt_values(
        &self,
        component_id: &ComponentId,
        values: Content,
    ) -> SyncResult<Content> {
        let url = format!(
            "{}/encrypt?componentId={}&projectId={}",
            self.encryption_url, component_id, self.project_id
        );
        self.send_json(Method::Post, url, Some(Value::Object(values)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct RecordingClient {
        requests: Mutex<Vec<HttpRequest>>,
        response: HttpResponse,
    }

    impl RecordingClient {
        fn new(status: u16, body: Value) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: HttpResponse {
                    status,
                    body: serde_json::to_vec(&body).unwrap(),
                },
            }
        }
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.requests.lock().push(request);
            Ok(self.response.clone())
        }
    }

    fn api(status: u16, body: Value) -> HttpStorageApi<RecordingClient> {
        let config = EngineConfig::new("connection.keboola.com", "secret");
        HttpStorageApi::new(&config, 12, RecordingClient::new(status, body))
    }

    #[tokio::test]
    async fn ticket_request() {
        let api = api(200, json!({"id": "1001"}));
        assert_eq!(api.generate_new_id().await.unwrap(), "1001");
        let requests = api.client.requests.lock();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(
            requests[0].url,
            "https://connection.keboola.com/v2/storage/tickets"
        );
        assert!(requests[0]
            .headers
            .contains(&(TOKEN_HEADER.to_string(), "secret".to_string())));
    }

    #[tokio::test]
    async fn error_status_maps_to_api_error() {
        let api = api(400, json!({"error": "Configuration already exists."}));
        let err = api.list_branches().await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(
            api.last_error().as_deref(),
            Some("Configuration already exists.")
        );
    }

    #[tokio::test]
    async fn update_sends_changed_fields_only() {
        let api = api(200, json!({"id": "2", "name": "New"}));
        let config = ApiConfig {
            id: "2".into(),
            name: "New".into(),
            description: "d".into(),
            is_disabled: false,
            configuration: Content::new(),
            rows: Vec::new(),
        };
        api.update_config(
            &BranchId::new("1"),
            &ComponentId::new("ex"),
            &config,
            &["name".to_string(), "relations".to_string()],
            "sync",
        )
        .await
        .unwrap();
        let requests = api.client.requests.lock();
        let body: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"name": "New", "configuration": {}, "changeDescription": "sync"})
        );
        assert_eq!(
            requests[0].url,
            "https://connection.keboola.com/v2/storage/branch/1/components/ex/configs/2"
        );
    }

    #[tokio::test]
    async fn encrypt_uses_encryption_host() {
        let api = api(200, json!({"#password": "KBC::ProjectSecure::abc"}));
        let mut values = Content::new();
        values.insert("#password".into(), json!("secret"));
        let out = api
            .encrypt_values(&ComponentId::new("ex"), values)
            .await
            .unwrap();
        assert_eq!(out["#password"], json!("KBC::ProjectSecure::abc"));
        let requests = api.client.requests.lock();
        assert_eq!(
            requests[0].url,
            "https://encryption.keboola.com/encrypt?componentId=ex&projectId=12"
        );
    }
}
