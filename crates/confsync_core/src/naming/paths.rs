//! Path generation over the object graph.
//!
//! Parent directories are resolved recursively. A config holding a
//! `VariablesFor` relation lives inside the config it serves, so the
//! filesystem parent is not always the key parent; the chain is walked with
//! an explicit visited set and a repeated key is reported as
//! [`CoreError::CyclicPath`].

use crate::error::{CoreError, CoreResult};
use crate::model::{join_path, ConfigKey, Key, Object, PathInProject, Relation};
use crate::naming::NamingRegistry;
use crate::state::State;
use std::collections::{BTreeMap, BTreeSet};

/// Path computed for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPath {
    /// Object key.
    pub key: Key,
    /// Path before generation, if the key had one.
    pub old: Option<PathInProject>,
    /// Generated path.
    pub new: PathInProject,
}

impl GeneratedPath {
    /// Returns true if the full path changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.old.as_ref().map(PathInProject::path) != Some(self.new.path())
    }

    /// Previous location once the parent has already moved: the old object
    /// path under the new parent path.
    #[must_use]
    pub fn old_under_new_parent(&self) -> Option<String> {
        self.old
            .as_ref()
            .map(|old| join_path(&self.new.parent_path, &old.object_path))
    }
}

/// Filesystem parent of an object.
///
/// A variables config is nested under the config it serves; everything
/// else is nested under its key parent.
#[must_use]
pub fn path_parent_key(object: &Object) -> Option<Key> {
    if let Object::Config(config) = object {
        if let Some(Relation::VariablesFor {
            component_id,
            config_id,
        }) = config.relations.variables_for()
        {
            return Some(Key::Config(ConfigKey {
                branch_id: config.key.branch_id.clone(),
                component_id: component_id.clone(),
                id: config_id.clone(),
            }));
        }
    }
    object.key().parent_key()
}

/// Generates paths for a set of keys without mutating the state.
///
/// Outside rename mode, keys that already have a path keep it. In rename
/// mode every added key is regenerated from its local object.
#[derive(Debug)]
pub struct PathsGenerator<'a> {
    state: &'a State,
    rename: bool,
    keys: BTreeSet<Key>,
    registry: NamingRegistry,
    done: BTreeMap<Key, PathInProject>,
}

impl<'a> PathsGenerator<'a> {
    /// Creates a generator.
    #[must_use]
    pub fn new(state: &'a State, rename: bool) -> Self {
        Self {
            state,
            rename,
            keys: BTreeSet::new(),
            registry: state.registry().clone(),
            done: BTreeMap::new(),
        }
    }

    /// Adds a key to generate.
    pub fn add(&mut self, key: Key) {
        self.keys.insert(key);
    }

    /// Generates paths for all added keys, parents first.
    pub fn invoke(mut self) -> CoreResult<Vec<GeneratedPath>> {
        let keys: Vec<Key> = self.keys.iter().cloned().collect();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let mut visited = BTreeSet::new();
            let new = self.resolve(&key, &mut visited)?;
            let old = self
                .state
                .record(&key)
                .map(|r| r.paths.clone())
                .filter(|p| !p.is_empty());
            out.push(GeneratedPath { key, old, new });
        }
        Ok(out)
    }

    fn resolve(&mut self, key: &Key, visited: &mut BTreeSet<Key>) -> CoreResult<PathInProject> {
        if let Some(done) = self.done.get(key) {
            return Ok(done.clone());
        }
        if !visited.insert(key.clone()) {
            return Err(CoreError::CyclicPath { key: key.desc() });
        }

        let existing = self
            .state
            .record(key)
            .map(|r| r.paths.clone())
            .filter(|p| !p.is_empty());
        let regenerate = match &existing {
            None => true,
            Some(_) => self.rename && self.keys.contains(key),
        };

        let paths = if regenerate {
            self.generate(key, visited)?
        } else {
            existing.ok_or_else(|| CoreError::not_found(format!("path of {}", key.desc())))?
        };

        visited.remove(key);
        self.done.insert(key.clone(), paths.clone());
        Ok(paths)
    }

    fn generate(&mut self, key: &Key, visited: &mut BTreeSet<Key>) -> CoreResult<PathInProject> {
        let state = self.state;
        let object = state
            .get(key)
            .and_then(|node| node.local_or_remote())
            .ok_or_else(|| CoreError::not_found(key.desc()))?;

        let parent_path = match path_parent_key(object) {
            Some(parent) => self.resolve(&parent, visited)?.path(),
            None => String::new(),
        };

        let generator = state.path_generator();
        let object_path = match object {
            Object::Branch(b) => generator.branch_path(b),
            Object::Config(c) => generator.config_path(&state.component(&c.key.component_id), c),
            Object::ConfigRow(r) => generator.row_path(&state.component(&r.key.component_id), r),
        };

        let paths = self
            .registry
            .make_unique(key, PathInProject::new(parent_path, object_path));
        self.registry.attach(key, &paths.path())?;
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, ProjectInfo};
    use crate::model::{
        Branch, BranchKey, Component, ComponentsMap, Config, ConfigRow, ConfigRowKey, Record,
    };

    fn state() -> State {
        State::new(
            Manifest::new(ProjectInfo::default()),
            ComponentsMap::new([
                Component::new("ex-generic-v2", "extractor"),
                Component::new("keboola.variables", "other"),
            ]),
        )
        .unwrap()
    }

    fn with_record(state: &mut State, key: &Key, parent: &str, path: &str) {
        let mut r = Record::new(key.clone());
        r.paths = PathInProject::new(parent, path);
        state.set_record(r).unwrap();
    }

    #[test]
    fn new_objects_under_existing_parents() {
        let mut s = state();
        let branch = Key::from(BranchKey::new("1"));
        s.set_local(&branch, Some(Branch::new(BranchKey::new("1"), "Main", true).into()));
        with_record(&mut s, &branch, "", "main");

        let config = Key::from(ConfigKey::new("1", "ex-generic-v2", "2"));
        s.set_remote(
            &config,
            Some(Config::new(ConfigKey::new("1", "ex-generic-v2", "2"), "My Config").into()),
        );
        let row = Key::from(ConfigRowKey::new("1", "ex-generic-v2", "2", "3"));
        s.set_remote(
            &row,
            Some(ConfigRow::new(ConfigRowKey::new("1", "ex-generic-v2", "2", "3"), "R").into()),
        );

        let mut g = PathsGenerator::new(&s, false);
        g.add(config.clone());
        g.add(row.clone());
        let out = g.invoke().unwrap();
        assert_eq!(out[0].new.path(), "main/extractor/ex-generic-v2/my-config");
        assert_eq!(out[1].new.path(), "main/extractor/ex-generic-v2/my-config/rows/r");
        assert!(out[0].old.is_none());
    }

    #[test]
    fn siblings_get_unique_paths() {
        let mut s = state();
        let branch = Key::from(BranchKey::new("1"));
        s.set_local(&branch, Some(Branch::new(BranchKey::new("1"), "Main", true).into()));
        with_record(&mut s, &branch, "", "main");
        let a = ConfigKey::new("1", "ex-generic-v2", "2");
        let b = ConfigKey::new("1", "ex-generic-v2", "3");
        s.set_remote(&a.clone().into(), Some(Config::new(a.clone(), "Same").into()));
        s.set_remote(&b.clone().into(), Some(Config::new(b.clone(), "Same").into()));
        let mut g = PathsGenerator::new(&s, false);
        g.add(a.into());
        g.add(b.into());
        let out = g.invoke().unwrap();
        assert_eq!(out[0].new.object_path, "extractor/ex-generic-v2/same");
        assert_eq!(out[1].new.object_path, "extractor/ex-generic-v2/same-001");
    }

    #[test]
    fn cyclic_variables_relation_is_an_error() {
        let mut s = state();
        let branch = Key::from(BranchKey::new("1"));
        s.set_local(&branch, Some(Branch::new(BranchKey::new("1"), "Main", true).into()));
        with_record(&mut s, &branch, "", "main");

        let a = ConfigKey::new("1", "keboola.variables", "1");
        let b = ConfigKey::new("1", "keboola.variables", "2");
        let mut ca = Config::new(a.clone(), "a");
        ca.relations.add(Relation::VariablesFor {
            component_id: "keboola.variables".into(),
            config_id: "2".into(),
        });
        let mut cb = Config::new(b.clone(), "b");
        cb.relations.add(Relation::VariablesFor {
            component_id: "keboola.variables".into(),
            config_id: "1".into(),
        });
        s.set_local(&a.clone().into(), Some(ca.into()));
        s.set_local(&b.into(), Some(cb.into()));
        let mut g = PathsGenerator::new(&s, true);
        g.add(a.into());
        let err = g.invoke().unwrap_err();
        assert!(matches!(err, CoreError::CyclicPath { .. }));
    }

    #[test]
    fn rename_mode_regenerates() {
        let mut s = state();
        let branch = Key::from(BranchKey::new("1"));
        s.set_local(&branch, Some(Branch::new(BranchKey::new("1"), "Main", true).into()));
        with_record(&mut s, &branch, "", "main");
        let key = ConfigKey::new("1", "ex-generic-v2", "2");
        s.set_local(&key.clone().into(), Some(Config::new(key.clone(), "Renamed").into()));
        with_record(&mut s, &key.clone().into(), "main", "extractor/ex-generic-v2/old");

        let mut g = PathsGenerator::new(&s, false);
        g.add(key.clone().into());
        let out = g.invoke().unwrap();
        assert!(!out[0].is_changed());

        let mut g = PathsGenerator::new(&s, true);
        g.add(key.into());
        let out = g.invoke().unwrap();
        assert!(out[0].is_changed());
        assert_eq!(out[0].new.path(), "main/extractor/ex-generic-v2/renamed");
    }
}
