//! Diff engine: classifies every key of the object graph.

use crate::error::CoreResult;
use crate::model::{content, Key, Object};
use crate::state::State;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Relationship between the local and the remote object of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultState {
    /// Both sides present and structurally identical.
    Equal,
    /// Both sides present, some fields differ.
    NotEqual,
    /// Present only in the project directory.
    OnlyInLocal,
    /// Present only in the remote project.
    OnlyInRemote,
    /// Outside the allowed branches; excluded from every plan.
    Invisible,
}

impl ResultState {
    /// Mark used by the diff report.
    #[must_use]
    pub fn mark(self) -> &'static str {
        match self {
            ResultState::Equal => "=",
            ResultState::NotEqual => "*",
            ResultState::OnlyInLocal => "+",
            ResultState::OnlyInRemote => "-",
            ResultState::Invisible => " ",
        }
    }
}

/// Changed fields of a result and, for structured fields, the changed paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFields(BTreeMap<String, BTreeSet<String>>);

impl ChangedFields {
    /// Marks `field` as changed.
    pub fn add(&mut self, field: impl Into<String>) -> &mut BTreeSet<String> {
        self.0.entry(field.into()).or_default()
    }

    /// Returns true if `field` changed.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Changed paths inside `field`.
    #[must_use]
    pub fn paths(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.0.get(field)
    }

    /// Names of the changed fields.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ChangedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        f.write_str(&names.join(", "))
    }
}

/// Diff of one key.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    /// Object key.
    pub key: Key,
    /// Classification.
    pub state: ResultState,
    /// Changed fields, non-empty only for [`ResultState::NotEqual`].
    pub changed_fields: ChangedFields,
    /// Local object at diff time.
    pub local: Option<Object>,
    /// Remote object at diff time.
    pub remote: Option<Object>,
}

/// Diff of the whole graph, sorted parents first.
#[derive(Debug, Clone, Default)]
pub struct DiffResults {
    /// Per-key results.
    pub results: Vec<DiffResult>,
}

impl DiffResults {
    /// Returns true if every visible key is equal.
    #[must_use]
    pub fn is_equal(&self) -> bool {
        self.results
            .iter()
            .all(|r| matches!(r.state, ResultState::Equal | ResultState::Invisible))
    }

    /// Result of `key`.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&DiffResult> {
        self.results.iter().find(|r| &r.key == key)
    }

    /// Lines of the diff report.
    ///
    /// Each line is `<mark> <kind abbr> <path>`; with `details` changed
    /// fields and their inner paths follow on indented lines.
    #[must_use]
    pub fn format(&self, state: &State, details: bool) -> Vec<String> {
        let mut out = Vec::new();
        for r in &self.results {
            if matches!(r.state, ResultState::Equal | ResultState::Invisible) {
                continue;
            }
            let path = state
                .path_of(&r.key)
                .unwrap_or_else(|_| r.key.to_string());
            let mut line = format!("{} {} {}", r.state.mark(), r.key.kind().abbr, path);
            if r.state == ResultState::NotEqual && !details {
                line.push_str(&format!(" | changed: {}", r.changed_fields));
            }
            out.push(line);
            if r.state == ResultState::NotEqual && details {
                for name in r.changed_fields.names() {
                    out.push(format!("  {name}:"));
                    if let Some(paths) = r.changed_fields.paths(name) {
                        for p in paths {
                            out.push(format!("    {p}"));
                        }
                    }
                }
            }
        }
        out
    }
}

/// Computes [`DiffResults`] for a state.
#[derive(Debug)]
pub struct Differ<'a> {
    state: &'a State,
}

impl<'a> Differ<'a> {
    /// Creates a differ.
    #[must_use]
    pub fn new(state: &'a State) -> Self {
        Self { state }
    }

    /// Diffs every key present on at least one side.
    pub fn invoke(&self) -> CoreResult<DiffResults> {
        let mut results = Vec::new();
        for node in self.state.objects() {
            let state = if !self.state.is_visible(&node.key) {
                ResultState::Invisible
            } else {
                match (&node.local, &node.remote) {
                    (Some(_), None) => ResultState::OnlyInLocal,
                    (None, Some(_)) => ResultState::OnlyInRemote,
                    (Some(_), Some(_)) => ResultState::Equal,
                    (None, None) => continue,
                }
            };
            let mut result = DiffResult {
                key: node.key.clone(),
                state,
                changed_fields: ChangedFields::default(),
                local: node.local.clone(),
                remote: node.remote.clone(),
            };
            if let (ResultState::Equal, Some(local), Some(remote)) =
                (state, &node.local, &node.remote)
            {
                result.changed_fields = diff_objects(local, remote);
                if !result.changed_fields.is_empty() {
                    result.state = ResultState::NotEqual;
                }
            }
            results.push(result);
        }
        Ok(DiffResults { results })
    }
}

/// Compares two objects of the same key field by field.
#[must_use]
pub fn diff_objects(local: &Object, remote: &Object) -> ChangedFields {
    let mut changed = ChangedFields::default();
    let remote_fields: BTreeMap<&str, Value> = remote.diff_fields().into_iter().collect();
    let local_fields: BTreeMap<&str, Value> = local.diff_fields().into_iter().collect();
    let names: BTreeSet<&str> = local_fields.keys().chain(remote_fields.keys()).copied().collect();
    for name in names {
        let l = local_fields.get(name).unwrap_or(&Value::Null);
        let r = remote_fields.get(name).unwrap_or(&Value::Null);
        if l == r {
            continue;
        }
        let paths = changed.add(name);
        if matches!((l, r), (Value::Object(_), Value::Object(_))) {
            paths.extend(content::diff_paths(l, r));
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, ProjectInfo};
    use crate::model::{Branch, BranchKey, ComponentsMap, Config, ConfigKey};
    use serde_json::json;

    fn config(name: &str, value: Value) -> Object {
        let mut c = Config::new(ConfigKey::new("1", "ex", "2"), name);
        if let Value::Object(map) = value {
            c.content = map;
        }
        c.into()
    }

    #[test]
    fn equal_content_in_different_order() {
        let a = config("c", json!({"a": 1, "b": 2}));
        let b = config("c", json!({"b": 2, "a": 1}));
        assert!(diff_objects(&a, &b).is_empty());
    }

    #[test]
    fn one_changed_field() {
        let a = config("c", json!({"parameters": {"x": 1, "y": 2}}));
        let b = config("c", json!({"parameters": {"x": 1, "y": 3}}));
        let changed = diff_objects(&a, &b);
        assert_eq!(changed.len(), 1);
        let paths: Vec<&String> = changed.paths("configuration").unwrap().iter().collect();
        assert_eq!(paths, vec!["parameters.y"]);
    }

    #[test]
    fn name_change() {
        let a = config("c", json!({}));
        let b = config("renamed", json!({}));
        let changed = diff_objects(&a, &b);
        assert!(changed.has("name"));
        assert_eq!(changed.to_string(), "name");
    }

    #[test]
    fn classification() {
        let mut state =
            State::new(Manifest::new(ProjectInfo::default()), ComponentsMap::default()).unwrap();
        let branch = Key::from(BranchKey::new("1"));
        let b = Object::from(Branch::new(BranchKey::new("1"), "Main", true));
        state.set_local(&branch, Some(b.clone()));
        state.set_remote(&branch, Some(b));
        let only_local = Key::from(ConfigKey::new("1", "ex", "2"));
        state.set_local(&only_local, Some(config("c", json!({}))));
        let only_remote = Key::from(ConfigKey::new("1", "ex", "3"));
        let mut remote = Config::new(ConfigKey::new("1", "ex", "3"), "r");
        remote.content.insert("k".into(), json!(true));
        state.set_remote(&only_remote, Some(remote.into()));

        let results = Differ::new(&state).invoke().unwrap();
        assert_eq!(results.get(&branch).unwrap().state, ResultState::Equal);
        assert_eq!(results.get(&only_local).unwrap().state, ResultState::OnlyInLocal);
        assert_eq!(results.get(&only_remote).unwrap().state, ResultState::OnlyInRemote);
        assert!(!results.is_equal());
    }
}
