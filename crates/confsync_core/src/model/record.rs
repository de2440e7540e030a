//! Manifest records.

use super::key::Key;
use serde::{Deserialize, Serialize};

/// Slash separated path relative to the project root.
pub fn join_path(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{}/{}", parent.trim_end_matches('/'), child),
    }
}

/// Location of an object: the parent's path plus the object's own path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathInProject {
    /// Path of the directory that contains the object.
    pub parent_path: String,
    /// Path of the object relative to `parent_path`.
    #[serde(rename = "path")]
    pub object_path: String,
}

impl PathInProject {
    /// Creates a path.
    pub fn new(parent_path: impl Into<String>, object_path: impl Into<String>) -> Self {
        Self {
            parent_path: parent_path.into(),
            object_path: object_path.into(),
        }
    }

    /// Full path relative to the project root.
    #[must_use]
    pub fn path(&self) -> String {
        join_path(&self.parent_path, &self.object_path)
    }

    /// Returns true if no path has been assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_path.is_empty()
    }
}

/// State bits of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordState {
    /// Local files could not be loaded.
    pub invalid: bool,
    /// The object directory does not exist.
    pub not_found: bool,
    /// The record is written to the manifest.
    pub persisted: bool,
}

/// Manifest view of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Object key.
    pub key: Key,
    /// Object location.
    pub paths: PathInProject,
    /// Files of the object, relative to its path.
    pub related_paths: Vec<String>,
    /// State bits.
    pub state: RecordState,
}

impl Record {
    /// Creates a record without a path.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            paths: PathInProject::default(),
            related_paths: Vec::new(),
            state: RecordState::default(),
        }
    }

    /// Full path of the object.
    #[must_use]
    pub fn path(&self) -> String {
        self.paths.path()
    }

    /// Registers a related path unless it is already known.
    pub fn add_related_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.related_paths.contains(&path) {
            self.related_paths.push(path);
        }
    }

    /// Related paths relative to the project root.
    #[must_use]
    pub fn related_paths_in_project(&self) -> Vec<String> {
        let base = self.path();
        self.related_paths
            .iter()
            .map(|p| join_path(&base, p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::key::BranchKey;

    #[test]
    fn path_join() {
        let p = PathInProject::new("main", "extractor/ex/cfg");
        assert_eq!(p.path(), "main/extractor/ex/cfg");
        assert_eq!(PathInProject::new("", "main").path(), "main");
    }

    #[test]
    fn related_paths_are_unique() {
        let mut r = Record::new(BranchKey::new("1").into());
        r.paths = PathInProject::new("", "main");
        r.add_related_path("meta.json");
        r.add_related_path("meta.json");
        r.add_related_path("description.md");
        assert_eq!(
            r.related_paths_in_project(),
            vec!["main/meta.json", "main/description.md"]
        );
    }
}
