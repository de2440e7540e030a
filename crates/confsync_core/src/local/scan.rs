//! Tracked and untracked paths of the project directory.

use crate::error::CoreResult;
use crate::manifest::Manifest;
use crate::model::join_path;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Paths of the project directory split into tracked and untracked.
///
/// A path is tracked if a manifest record or a related path points at it
/// or below it.
#[derive(Debug, Clone, Default)]
pub struct PathsState {
    dirs: BTreeSet<String>,
    files: BTreeSet<String>,
    tracked: BTreeSet<String>,
}

fn with_ancestors(path: &str, out: &mut BTreeSet<String>) {
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = join_path(&current, segment);
        out.insert(current.clone());
    }
}

fn scan_dir(root: &Path, rel: &str, state: &mut PathsState) -> CoreResult<()> {
    for entry in fs::read_dir(root.join(rel))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = join_path(rel, &name);
        if entry.file_type()?.is_dir() {
            state.dirs.insert(path.clone());
            scan_dir(root, &path, state)?;
        } else {
            state.files.insert(path);
        }
    }
    Ok(())
}

impl PathsState {
    /// Scans the project directory. Hidden entries are skipped.
    pub fn scan(root: &Path, manifest: &Manifest) -> CoreResult<Self> {
        let mut state = Self::default();
        scan_dir(root, "", &mut state)?;
        for record in manifest.records() {
            with_ancestors(&record.path(), &mut state.tracked);
            for related in record.related_paths_in_project() {
                with_ancestors(&related, &mut state.tracked);
            }
        }
        Ok(state)
    }

    /// Returns true if `path` is tracked.
    #[must_use]
    pub fn is_tracked(&self, path: &str) -> bool {
        self.tracked.contains(path)
    }

    /// Untracked directories directly or indirectly below `base`, sorted.
    #[must_use]
    pub fn untracked_dirs_under(&self, base: &str) -> Vec<String> {
        let prefix = format!("{base}/");
        self.dirs
            .iter()
            .filter(|d| d.starts_with(&prefix) && !self.tracked.contains(*d))
            .cloned()
            .collect()
    }

    /// All untracked files and directories, sorted.
    #[must_use]
    pub fn untracked(&self) -> Vec<String> {
        self.dirs
            .iter()
            .chain(self.files.iter())
            .filter(|p| !self.tracked.contains(*p))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Marks `path` and its ancestors as tracked.
    pub fn mark_tracked(&mut self, path: &str) {
        with_ancestors(path, &mut self.tracked);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ProjectInfo;
    use crate::model::{BranchKey, PathInProject, Record};
    use tempfile::tempdir;

    #[test]
    fn untracked_paths() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("main/extractor/ex/new")).unwrap();
        fs::create_dir_all(root.join(".confsync")).unwrap();
        fs::write(root.join("main/meta.json"), "{}").unwrap();

        let mut manifest = Manifest::new(ProjectInfo::default());
        let mut record = Record::new(BranchKey::new("1").into());
        record.paths = PathInProject::new("", "main");
        record.related_paths = vec!["meta.json".into()];
        record.state.persisted = true;
        manifest.set_record(record);

        let mut paths = PathsState::scan(root, &manifest).unwrap();
        assert!(paths.is_tracked("main/meta.json"));
        assert_eq!(
            paths.untracked_dirs_under("main"),
            vec!["main/extractor", "main/extractor/ex", "main/extractor/ex/new"]
        );
        paths.mark_tracked("main/extractor/ex/new");
        assert!(paths.untracked().is_empty());
    }
}
