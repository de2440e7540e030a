//! Encrypt plan: plaintext secrets in local content.

use super::Plan;
use confsync_core::model::content::walk;
use confsync_core::model::{ComponentId, ContentPath, Key};
use confsync_core::State;
use serde_json::Value;

/// Prefix of keys holding secrets.
pub const SECRET_KEY_PREFIX: &str = "#";
/// Prefix of encrypted values.
pub const ENCRYPTED_PREFIX: &str = "KBC::";

/// Returns true if `value` is already in the encrypted format.
#[must_use]
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Plaintext secrets of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptAction {
    /// Object key.
    pub key: Key,
    /// Component the values are encrypted for.
    pub component_id: ComponentId,
    /// Object path, for messages.
    pub path: String,
    /// Secret locations and their plaintext.
    pub values: Vec<(ContentPath, String)>,
}

/// Plan of the encrypt operation.
#[derive(Debug, Clone, Default)]
pub struct EncryptPlan {
    actions: Vec<EncryptAction>,
}

impl EncryptPlan {
    /// Collects unencrypted secrets of every visible local object.
    #[must_use]
    pub fn build(state: &State) -> Self {
        let mut actions = Vec::new();
        for node in state.objects() {
            if !state.is_visible(&node.key) {
                continue;
            }
            let Some(local) = &node.local else {
                continue;
            };
            let (Some(content), Some(component_id)) = (local.content(), node.key.component_id())
            else {
                continue;
            };
            let mut values = Vec::new();
            walk(content, &mut |path: &ContentPath, value: &Value| {
                let secret = path
                    .last_key()
                    .is_some_and(|k| k.starts_with(SECRET_KEY_PREFIX));
                if let (true, Value::String(s)) = (secret, value) {
                    if !is_encrypted(s) {
                        values.push((path.clone(), s.clone()));
                    }
                }
            });
            if !values.is_empty() {
                actions.push(EncryptAction {
                    key: node.key.clone(),
                    component_id: component_id.clone(),
                    path: state
                        .path_of(&node.key)
                        .unwrap_or_else(|_| node.key.to_string()),
                    values,
                });
            }
        }
        Self { actions }
    }

    /// One action per object with secrets.
    #[must_use]
    pub fn actions(&self) -> &[EncryptAction] {
        &self.actions
    }
}

impl Plan for EncryptPlan {
    fn name(&self) -> &'static str {
        "encrypt"
    }

    fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn describe(&self, _state: &State) -> Vec<String> {
        let mut out = Vec::new();
        for action in &self.actions {
            out.push(format!("{} {}", action.key.kind().abbr, action.path));
            for (path, _) in &action.values {
                out.push(format!("  {path}"));
            }
        }
        out
    }
}
