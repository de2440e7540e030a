//! Mapping between API wire types and the object model.
//!
//! Remote content carries some typed values inline: transformation blocks
//! under `parameters.blocks`, the variables link as `variables_id` and the
//! shared code link as `shared_code_id`. Loading moves them to typed
//! fields and relations; saving puts them back.

use crate::api::{ApiBranch, ApiConfig, ApiConfigRow};
use confsync_core::local::SHARED_CODE_CONTENT_KEY;
use confsync_core::model::{
    Block, BranchKey, Code, Component, ConfigId, ConfigKey, ConfigRowKey, Relation, Transformation,
};
use confsync_core::{Branch, Config, ConfigRow, Content};
use serde_json::{json, Map, Value};

/// Content key of the variables config id.
pub const VARIABLES_ID_KEY: &str = "variables_id";
/// Content key of the shared code config id.
pub const SHARED_CODE_ID_KEY: &str = "shared_code_id";
const PARAMETERS_KEY: &str = "parameters";
const BLOCKS_KEY: &str = "blocks";

/// Converts an API branch.
#[must_use]
pub fn branch_from_api(api: &ApiBranch) -> Branch {
    Branch {
        key: BranchKey::new(api.id.as_str()),
        name: api.name.clone(),
        description: api.description.clone(),
        is_default: api.is_default,
    }
}

/// Converts a branch for an update request.
#[must_use]
pub fn branch_to_api(branch: &Branch) -> ApiBranch {
    ApiBranch {
        id: branch.key.id.to_string(),
        name: branch.name.clone(),
        description: branch.description.clone(),
        is_default: branch.is_default,
    }
}

fn id_value(value: Option<Value>) -> Option<ConfigId> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(ConfigId::new(s)),
        Value::Number(n) => Some(ConfigId::new(n.to_string())),
        _ => None,
    }
}

fn script_from_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .map(|s| s.trim().to_string())
            .collect::<Vec<_>>()
            .join("\n\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    text.trim_end().to_string()
}

fn take_blocks(content: &mut Content) -> Transformation {
    let blocks = content
        .get_mut(PARAMETERS_KEY)
        .and_then(Value::as_object_mut)
        .and_then(|p| p.remove(BLOCKS_KEY));
    let blocks = match blocks {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    Transformation {
        blocks: blocks
            .iter()
            .map(|b| Block {
                name: b["name"].as_str().unwrap_or_default().to_string(),
                codes: b["codes"]
                    .as_array()
                    .map(|codes| {
                        codes
                            .iter()
                            .map(|c| Code {
                                name: c["name"].as_str().unwrap_or_default().to_string(),
                                script: script_from_value(&c["script"]),
                                path: None,
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                path: None,
            })
            .collect(),
    }
}

fn put_blocks(content: &mut Content, transformation: &Transformation) {
    let blocks: Vec<Value> = transformation
        .blocks
        .iter()
        .map(|b| {
            json!({
                "name": b.name,
                "codes": b.codes.iter().map(|c| {
                    let script: Vec<Value> = if c.script.is_empty() {
                        Vec::new()
                    } else {
                        vec![Value::String(c.script.clone())]
                    };
                    json!({"name": c.name, "script": script})
                }).collect::<Vec<_>>(),
            })
        })
        .collect();
    let parameters = content
        .entry(PARAMETERS_KEY.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !parameters.is_object() {
        *parameters = Value::Object(Map::new());
    }
    if let Some(p) = parameters.as_object_mut() {
        p.insert(BLOCKS_KEY.to_string(), Value::Array(blocks));
    }
}

/// Converts an API config and its rows.
///
/// `VariablesFor` relations are derived later, once every config of the
/// branch is known.
#[must_use]
pub fn config_from_api(
    branch: &BranchKey,
    component: &Component,
    api: &ApiConfig,
) -> (Config, Vec<ConfigRow>) {
    let key = ConfigKey::new(branch.id.as_str(), component.id.as_str(), api.id.as_str());
    let mut config = Config::new(key.clone(), api.name.clone());
    config.description = api.description.clone();
    config.is_disabled = api.is_disabled;
    config.content = api.configuration.clone();

    if let Some(id) = id_value(config.content.remove(VARIABLES_ID_KEY)) {
        config.relations.add(Relation::VariablesFrom { config_id: id });
    }
    if let Some(id) = id_value(config.content.remove(SHARED_CODE_ID_KEY)) {
        config.relations.add(Relation::UsesSharedCode { config_id: id });
    }
    if component.is_transformation() {
        config.transformation = Some(take_blocks(&mut config.content));
    }

    let rows = api
        .rows
        .iter()
        .map(|r| {
            let mut row = ConfigRow::new(
                ConfigRowKey::new(
                    branch.id.as_str(),
                    component.id.as_str(),
                    api.id.as_str(),
                    r.id.as_str(),
                ),
                r.name.clone(),
            );
            row.description = r.description.clone();
            row.is_disabled = r.is_disabled;
            row.content = r.configuration.clone();
            if component.is_shared_code() {
                if let Some(v) = row.content.get_mut(SHARED_CODE_CONTENT_KEY) {
                    *v = Value::String(script_from_value(v));
                }
            }
            row
        })
        .collect();
    (config, rows)
}

/// Converts a config for a create or update request. Rows are not included.
#[must_use]
pub fn config_to_api(config: &Config) -> ApiConfig {
    let mut content = config.content.clone();
    for relation in config.relations.only_stored_remotely().iter() {
        match relation {
            Relation::VariablesFrom { config_id } => {
                content.insert(
                    VARIABLES_ID_KEY.to_string(),
                    Value::String(config_id.to_string()),
                );
            }
            Relation::UsesSharedCode { config_id } => {
                content.insert(
                    SHARED_CODE_ID_KEY.to_string(),
                    Value::String(config_id.to_string()),
                );
            }
            Relation::VariablesFor { .. } => {}
        }
    }
    if let Some(t) = &config.transformation {
        put_blocks(&mut content, t);
    }
    ApiConfig {
        id: config.key.id.to_string(),
        name: config.name.clone(),
        description: config.description.clone(),
        is_disabled: config.is_disabled,
        configuration: content,
        rows: Vec::new(),
    }
}

/// Converts a row for a create or update request.
#[must_use]
pub fn row_to_api(row: &ConfigRow) -> ApiConfigRow {
    ApiConfigRow {
        id: row.key.id.to_string(),
        name: row.name.clone(),
        description: row.description.clone(),
        is_disabled: row.is_disabled,
        configuration: row.content.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn api_config(configuration: Value) -> ApiConfig {
        ApiConfig {
            id: "2".into(),
            name: "Cfg".into(),
            description: String::new(),
            is_disabled: false,
            configuration: configuration.as_object().cloned().unwrap_or_default(),
            rows: Vec::new(),
        }
    }

    #[test]
    fn blocks_move_to_transformation() {
        let component = Component::new("keboola.snowflake-transformation", "transformation");
        let api = api_config(json!({
            "parameters": {"blocks": [{"name": "B1", "codes": [{"name": "C1", "script": ["SELECT 1;", "SELECT 2;"]}]}]},
            "storage": {}
        }));
        let (config, _) = config_from_api(&BranchKey::new("1"), &component, &api);
        let t = config.transformation.clone().unwrap();
        assert_eq!(t.blocks[0].codes[0].script, "SELECT 1;\n\nSELECT 2;");
        assert_eq!(Value::Object(config.content.clone()), json!({"parameters": {}, "storage": {}}));

        let back = config_to_api(&config);
        assert_eq!(
            back.configuration["parameters"]["blocks"][0]["codes"][0]["script"],
            json!(["SELECT 1;\n\nSELECT 2;"])
        );
    }

    #[test]
    fn links_become_relations() {
        let component = Component::new("keboola.python-transformation-v2", "transformation");
        let api = api_config(json!({"variables_id": "10", "shared_code_id": 11}));
        let (config, _) = config_from_api(&BranchKey::new("1"), &component, &api);
        let relations: Vec<&Relation> = config.relations.iter().collect();
        assert_eq!(
            relations,
            vec![
                &Relation::VariablesFrom { config_id: ConfigId::new("10") },
                &Relation::UsesSharedCode { config_id: ConfigId::new("11") },
            ]
        );
        assert!(!config.content.contains_key(VARIABLES_ID_KEY));

        let back = config_to_api(&config);
        assert_eq!(back.configuration[VARIABLES_ID_KEY], json!("10"));
        assert_eq!(back.configuration[SHARED_CODE_ID_KEY], json!("11"));
    }

    #[test]
    fn shared_code_script_is_normalized() {
        let component = Component::new("keboola.shared-code", "other");
        let mut api = api_config(json!({"componentId": "keboola.python-transformation-v2"}));
        api.rows.push(ApiConfigRow {
            id: "3".into(),
            name: "Code".into(),
            description: String::new(),
            is_disabled: false,
            configuration: json!({"code_content": ["import os", "print(1)\n"]})
                .as_object()
                .cloned()
                .unwrap(),
        });
        let (_, rows) = config_from_api(&BranchKey::new("1"), &component, &api);
        assert_eq!(rows[0].content["code_content"], json!("import os\n\nprint(1)"));
    }
}
