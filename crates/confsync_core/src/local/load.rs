//! Loading the local state from the project directory.

use super::mapper::{load_object, LoadOutcome};
use super::uow::mapper_context;
use super::workers::Workers;
use crate::error::{CoreResult, MultiError};
use crate::model::{ConfigKey, Key, Object, Record, Relation};
use crate::state::State;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Loads every manifest record into the local side of `state`.
///
/// Records are loaded level by level so rows can see their parent config.
/// A record whose parent was not loaded is skipped and inherits the
/// parent's state bits. A missing directory marks the record not-found;
/// any other failure marks it invalid and is returned in the aggregate
/// error, after all loadable objects are in the state.
pub async fn load_local_state(
    state: &mut State,
    root: &Path,
    cancel: CancellationToken,
    max_workers: usize,
) -> CoreResult<()> {
    let mut errors = MultiError::new();
    for level in 1..=3 {
        let records: Vec<Record> = state
            .manifest()
            .records()
            .filter(|r| r.key.level() == level)
            .cloned()
            .collect();

        let mut workers = Workers::new(cancel.clone(), max_workers);
        let mut queued = Vec::new();
        for record in records {
            if let Some(parent) = record.key.parent_key() {
                if state.local(&parent).is_none() {
                    let parent_state = state.record(&parent).map(|r| r.state).unwrap_or_default();
                    if let Some(r) = state.record_mut(&record.key) {
                        r.state.invalid = parent_state.invalid;
                        r.state.not_found = !parent_state.invalid;
                    }
                    debug!(key = %record.key, "parent not loaded, skipped");
                    continue;
                }
            }
            let ctx = mapper_context(state, &record.key);
            let root = root.to_path_buf();
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
                        r.state.invalid = false;
                        r.state.not_found = false;
                    }
                    state.set_local(&key, Some(object));
                }
                Ok(LoadOutcome::NotFound) => {
                    if let Some(r) = state.record_mut(&key) {
                        r.state.not_found = true;
                    }
                    warn!(key = %key, "directory of a known object not found");
                }
                Err(e) => {
                    if let Some(r) = state.record_mut(&key) {
                        r.state.invalid = true;
                    }
                    errors.push(e);
                }
            }
        }
    }
    link_variables(state);
    errors.into_result()
}

/// Adds `VariablesFrom` to every local config served by a variables config.
pub fn link_variables(state: &mut State) {
    let links: Vec<(Key, Relation)> = state
        .objects()
        .filter_map(|node| match node.local.as_ref()? {
            Object::Config(c) => match c.relations.variables_for()? {
                Relation::VariablesFor {
                    component_id,
                    config_id,
                } => Some((
                    Key::Config(ConfigKey {
                        branch_id: c.key.branch_id.clone(),
                        component_id: component_id.clone(),
                        id: config_id.clone(),
                    }),
                    Relation::VariablesFrom {
                        config_id: c.key.id.clone(),
                    },
                )),
                _ => None,
            },
            _ => None,
        })
        .collect();
    for (owner, relation) in links {
        if let Some(relations) = state.local_mut(&owner).and_then(Object::relations_mut) {
            relations.add(relation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::files::ObjectFile;
    use crate::local::mapper::{object_files, MapperContext};
    use crate::manifest::{Manifest, ProjectInfo};
    use crate::model::{
        Branch, BranchKey, Component, ComponentsMap, Config, ConfigRow, ConfigRowKey,
        PathInProject,
    };
    use crate::naming::NamingTemplate;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, files: Vec<ObjectFile>) -> Vec<String> {
        let mut related = Vec::new();
        for f in files {
            let p = root.join(&f.path);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(&p, f.bytes().unwrap()).unwrap();
            related.push(p.file_name().unwrap().to_string_lossy().into_owned());
        }
        related
    }

    fn add(root: &Path, manifest: &mut Manifest, object: Object, parent: &str, path: &str) {
        let ctx = MapperContext {
            component: Some(Component::new("ex", "extractor")),
            shared_code_target: None,
            naming: NamingTemplate::default(),
        };
        let full = PathInProject::new(parent, path);
        let related = write(root, object_files(&object, &full.path(), &ctx).unwrap());
        let mut record = Record::new(object.key());
        record.paths = full;
        record.related_paths = related;
        record.state.persisted = true;
        manifest.set_record(record);
    }

    #[tokio::test]
    async fn loads_tree_and_marks_missing() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let mut manifest = Manifest::new(ProjectInfo::default());
        add(root, &mut manifest, Branch::new(BranchKey::new("1"), "Main", true).into(), "", "main");
        add(
            root,
            &mut manifest,
            Config::new(ConfigKey::new("1", "ex", "2"), "Cfg").into(),
            "main",
            "extractor/ex/cfg",
        );
        add(
            root,
            &mut manifest,
            ConfigRow::new(ConfigRowKey::new("1", "ex", "2", "3"), "Row").into(),
            "main/extractor/ex/cfg",
            "rows/row",
        );
        add(
            root,
            &mut manifest,
            Config::new(ConfigKey::new("1", "ex", "4"), "Gone").into(),
            "main",
            "extractor/ex/gone",
        );
        add(
            root,
            &mut manifest,
            ConfigRow::new(ConfigRowKey::new("1", "ex", "4", "5"), "Gone Row").into(),
            "main/extractor/ex/gone",
            "rows/gone-row",
        );
        fs::remove_dir_all(root.join("main/extractor/ex/gone")).unwrap();

        let mut state = State::new(manifest, ComponentsMap::new([Component::new("ex", "extractor")]))
            .unwrap();
        load_local_state(&mut state, root, CancellationToken::new(), 4)
            .await
            .unwrap();

        let row = Key::from(ConfigRowKey::new("1", "ex", "2", "3"));
        assert_eq!(state.local(&row).unwrap().name(), "Row");
        let gone = Key::from(ConfigKey::new("1", "ex", "4"));
        assert!(state.local(&gone).is_none());
        assert!(state.record(&gone).unwrap().state.not_found);
        let gone_row = Key::from(ConfigRowKey::new("1", "ex", "4", "5"));
        assert!(state.record(&gone_row).unwrap().state.not_found);
    }

    #[tokio::test]
    async fn invalid_objects_are_reported() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let mut manifest = Manifest::new(ProjectInfo::default());
        add(root, &mut manifest, Branch::new(BranchKey::new("1"), "Main", true).into(), "", "main");
        add(
            root,
            &mut manifest,
            Config::new(ConfigKey::new("1", "ex", "2"), "Cfg").into(),
            "main",
            "extractor/ex/cfg",
        );
        fs::write(root.join("main/extractor/ex/cfg/config.json"), "{not json").unwrap();

        let mut state = State::new(manifest, ComponentsMap::default()).unwrap();
        let err = load_local_state(&mut state, root, CancellationToken::new(), 4)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("config.json"));
        let key = Key::from(ConfigKey::new("1", "ex", "2"));
        assert!(state.record(&key).unwrap().state.invalid);
        assert!(state.local(&Key::from(BranchKey::new("1"))).is_some());
    }

    #[test]
    fn variables_are_linked() {
        let mut state = State::new(
            Manifest::new(ProjectInfo::default()),
            ComponentsMap::default(),
        )
        .unwrap();
        let owner = ConfigKey::new("1", "ex", "2");
        state.set_local(&owner.clone().into(), Some(Config::new(owner.clone(), "o").into()));
        let vars = ConfigKey::new("1", "keboola.variables", "3");
        let mut v = Config::new(vars.clone(), "v");
        v.relations.add(Relation::VariablesFor {
            component_id: "ex".into(),
            config_id: "2".into(),
        });
        state.set_local(&vars.into(), Some(v.into()));
        link_variables(&mut state);
        let relations = state.local(&owner.into()).unwrap().relations().unwrap();
        assert_eq!(
            relations.iter().next(),
            Some(&Relation::VariablesFrom {
                config_id: "3".into()
            })
        );
    }
}
