//! Loading the remote state from the API.

use super::mapper::{branch_from_api, config_from_api};
use crate::api::StorageApi;
use crate::error::SyncResult;
use confsync_core::model::{Component, ConfigKey, Key, Relation};
use confsync_core::{Object, State};
use tracing::{debug, info};

/// Loads components, branches, configs and rows into the remote side of
/// `state`.
///
/// Configs of branches rejected by the allowed-branches filter are not
/// requested.
pub async fn load_remote_state(state: &mut State, api: &dyn StorageApi) -> SyncResult<()> {
    for component in api.list_components().await? {
        let mut c = Component::new(component.id.as_str(), component.component_type);
        c.name = component.name;
        state.components_mut().insert(c);
    }

    let branches = api.list_branches().await?;
    let mut loaded = 0usize;
    for api_branch in &branches {
        let branch = branch_from_api(api_branch);
        let allowed = state.manifest().allowed_branches.is_allowed(&branch);
        let branch_key = branch.key.clone();
        state.set_remote(&Key::Branch(branch_key.clone()), Some(branch.into()));
        if !allowed {
            debug!(branch = %api_branch.name, "branch is not allowed, configs skipped");
            continue;
        }

        for group in api.list_configs(&branch_key.id).await? {
            let known = state.components().get(&group.id.as_str().into()).cloned();
            let component = match known {
                Some(c) => c,
                None => {
                    let c = Component::new(group.id.as_str(), group.component_type.clone());
                    state.components_mut().insert(c.clone());
                    c
                }
            };
            for api_config in &group.configurations {
                let (config, rows) = config_from_api(&branch_key, &component, api_config);
                state.set_remote(&Key::Config(config.key.clone()), Some(config.into()));
                loaded += 1;
                for row in rows {
                    state.set_remote(&Key::ConfigRow(row.key.clone()), Some(row.into()));
                    loaded += 1;
                }
            }
        }
    }
    link_remote_variables(state);
    info!(branches = branches.len(), objects = loaded, "remote state loaded");
    Ok(())
}

/// Adds `VariablesFor` to every remote variables config referenced by a
/// `VariablesFrom` relation.
pub fn link_remote_variables(state: &mut State) {
    let links: Vec<(Key, Relation)> = state
        .objects()
        .filter_map(|node| match node.remote.as_ref()? {
            Object::Config(c) => c.relations.iter().find_map(|r| match r {
                Relation::VariablesFrom { config_id } => Some((
                    Key::Config(ConfigKey::new(
                        c.key.branch_id.clone(),
                        confsync_core::model::component::VARIABLES_COMPONENT_ID,
                        config_id.clone(),
                    )),
                    Relation::VariablesFor {
                        component_id: c.key.component_id.clone(),
                        config_id: c.key.id.clone(),
                    },
                )),
                _ => None,
            }),
            _ => None,
        })
        .collect();
    for (target, relation) in links {
        if let Some(Object::Config(mut c)) = state.remote(&target).cloned() {
            c.relations.add(relation);
            state.set_remote(&target, Some(c.into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use crate::mock::MockStorageApi;
    use confsync_core::{AllowedBranches, BranchKey, ComponentsMap, Manifest, ProjectInfo};
    use serde_json::json;

    fn api_config(id: &str, content: serde_json::Value) -> ApiConfig {
        ApiConfig {
            id: id.into(),
            name: format!("Config {id}"),
            description: String::new(),
            is_disabled: false,
            configuration: content.as_object().cloned().unwrap_or_default(),
            rows: Vec::new(),
        }
    }

    #[tokio::test]
    async fn disallowed_branch_configs_are_not_requested() {
        let api = MockStorageApi::new();
        api.add_component("ex-generic-v2", "extractor");
        api.add_branch("1", "Main", true);
        api.add_branch("2", "Feature", false);
        api.add_config("1", "ex-generic-v2", api_config("10", json!({})));
        api.add_config("2", "ex-generic-v2", api_config("20", json!({})));

        let mut manifest = Manifest::new(ProjectInfo::default());
        manifest.allowed_branches = AllowedBranches::new(["main"]);
        let mut state = State::new(manifest, ComponentsMap::default()).unwrap();
        load_remote_state(&mut state, &api).await.unwrap();

        assert!(state.remote(&Key::Branch(BranchKey::new("2"))).is_some());
        assert!(state
            .remote(&Key::Config(ConfigKey::new("1", "ex-generic-v2", "10")))
            .is_some());
        assert!(state
            .remote(&Key::Config(ConfigKey::new("2", "ex-generic-v2", "20")))
            .is_none());
        assert_eq!(api.calls_of("list_configs"), vec!["list_configs 1".to_string()]);
    }

    #[tokio::test]
    async fn variables_are_linked_both_ways() {
        let api = MockStorageApi::new();
        api.add_component("ex-generic-v2", "extractor");
        api.add_component("keboola.variables", "other");
        api.add_branch("1", "Main", true);
        api.add_config("1", "ex-generic-v2", api_config("10", json!({"variables_id": "30"})));
        api.add_config("1", "keboola.variables", api_config("30", json!({"variables": []})));

        let mut state = State::new(
            Manifest::new(ProjectInfo::default()),
            ComponentsMap::default(),
        )
        .unwrap();
        load_remote_state(&mut state, &api).await.unwrap();

        let vars = state
            .remote(&Key::Config(ConfigKey::new("1", "keboola.variables", "30")))
            .unwrap();
        assert!(vars.relations().unwrap().iter().any(|r| matches!(
            r,
            Relation::VariablesFor { config_id, .. } if config_id.as_str() == "10"
        )));
    }
}
