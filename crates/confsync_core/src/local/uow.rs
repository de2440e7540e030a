//! Local unit of work.
//!
//! Save, delete and rename operations are queued as jobs of a [`Workers`]
//! pool. Jobs never touch the [`State`]; each returns a [`LocalChange`]
//! which [`LocalUnitOfWork::invoke`] applies to the state and the manifest
//! from the calling task, in the order the operations were queued.

use super::files::{rename_batch, SaveTransaction};
use super::mapper::{object_files, MapperContext};
use super::workers::Workers;
use crate::error::{CoreError, CoreResult, MultiError};
use crate::model::{Key, Object, PathInProject, Record, RecordState};
use crate::naming::{CONFIG_FILE, META_FILE};
use crate::state::State;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Manifest update applied after a successful rename.
#[derive(Debug, Clone, PartialEq)]
pub struct PathUpdate {
    /// Renamed object.
    pub key: Key,
    /// New location.
    pub paths: PathInProject,
    /// New related paths, if they changed.
    pub related_paths: Option<Vec<String>>,
    /// Local object with updated block and code paths, if they changed.
    pub object: Option<Object>,
}

/// Result of one local job.
#[derive(Debug)]
pub enum LocalChange {
    /// Object files were written.
    Saved {
        /// Object key.
        key: Key,
        /// The saved object.
        object: Object,
        /// Object location.
        paths: PathInProject,
        /// Written files, relative to the object path.
        related_paths: Vec<String>,
    },
    /// Object files were removed.
    Deleted {
        /// Object key.
        key: Key,
        /// Files that could not be removed.
        errors: MultiError,
    },
    /// A rename batch succeeded.
    Renamed {
        /// Manifest updates.
        updates: Vec<PathUpdate>,
    },
}

/// Context for the mappers of `object`.
#[must_use]
pub fn mapper_context(state: &State, key: &Key) -> MapperContext {
    let component = key.component_id().map(|id| state.component(id));
    let shared_code_target = match key {
        Key::ConfigRow(k) => state
            .get(&Key::Config(k.config_key()))
            .and_then(|node| node.local_or_remote())
            .and_then(|o| match o {
                Object::Config(c) => c.shared_code_target().map(str::to_string),
                _ => None,
            }),
        _ => None,
    };
    MapperContext {
        component,
        shared_code_target,
        naming: state.manifest().naming.clone(),
    }
}

fn relative_to(base: &str, path: &str) -> String {
    path.strip_prefix(base)
        .map(|p| p.trim_start_matches('/'))
        .unwrap_or(path)
        .to_string()
}

fn remove_ignoring_missing(path: &Path, dir: bool) -> io::Result<()> {
    let result = if dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Queue of local operations.
#[derive(Debug)]
pub struct LocalUnitOfWork {
    root: PathBuf,
    workers: Workers<LocalChange>,
    errors: MultiError,
}

impl LocalUnitOfWork {
    /// Creates a unit of work for the project at `root`.
    #[must_use]
    pub fn new(root: &Path, cancel: CancellationToken, max_workers: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            workers: Workers::new(cancel, max_workers),
            errors: MultiError::new(),
        }
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Queues a save of `object` at `paths`.
    ///
    /// The object is copied and validated now; an invalid object is
    /// reported by [`Self::invoke`] and nothing is written for it.
    pub fn save_object(&mut self, state: &State, object: &Object, paths: PathInProject) {
        let object = object.clone();
        if let Err(e) = object.validate() {
            self.errors.push(e);
            return;
        }
        let key = object.key();
        let base = paths.path();
        let files = match object_files(&object, &base, &mapper_context(state, &key)) {
            Ok(files) => files,
            Err(e) => {
                self.errors.push(e);
                return;
            }
        };
        // Untracked files at target paths are backed up as well.
        let mut existing = state
            .record(&key)
            .map(Record::related_paths_in_project)
            .unwrap_or_default();
        for file in &files {
            if !existing.contains(&file.path) {
                existing.push(file.path.clone());
            }
        }
        let root = self.root.clone();

        self.workers.add_worker(move || {
            let mut tx = SaveTransaction::begin(&root, &existing)?;
            let mut related_paths = Vec::with_capacity(files.len());
            for file in &files {
                tx.write(&root, file)?;
                related_paths.push(relative_to(&base, &file.path));
            }
            tx.commit();
            debug!(key = %key, path = %base, "saved");
            Ok(LocalChange::Saved {
                key,
                object,
                paths,
                related_paths,
            })
        });
    }

    /// Queues removal of the object files and directory.
    pub fn delete_object(&mut self, state: &State, key: &Key) {
        let key = key.clone();
        let dir = state.record(&key).map(Record::path);
        let root = self.root.clone();
        self.workers.add_worker(move || {
            let mut errors = MultiError::new();
            if let Some(dir) = dir {
                let base = root.join(&dir);
                for (path, is_dir) in [
                    (base.join(META_FILE), false),
                    (base.join(CONFIG_FILE), false),
                    (base.clone(), true),
                ] {
                    if let Err(e) = remove_ignoring_missing(&path, is_dir) {
                        errors.push(CoreError::invalid_file(
                            path.display().to_string(),
                            format!("cannot remove: {e}"),
                        ));
                    }
                }
                debug!(key = %key, path = %dir, "deleted");
            }
            Ok(LocalChange::Deleted { key, errors })
        });
    }

    /// Queues one rename batch: copy every pair, then delete the old paths.
    pub fn rename(&mut self, pairs: Vec<(String, String)>, updates: Vec<PathUpdate>) {
        let root = self.root.clone();
        self.workers.add_worker(move || {
            rename_batch(&root, &pairs)?;
            for (old, new) in &pairs {
                info!(from = %old, to = %new, "renamed");
            }
            Ok(LocalChange::Renamed { updates })
        });
    }

    /// Queues removal of every object whose record is marked invalid.
    pub fn delete_invalid_objects(&mut self, state: &State) {
        let invalid: Vec<Key> = state
            .manifest()
            .records()
            .filter(|r| r.state.invalid)
            .map(|r| r.key.clone())
            .collect();
        for key in invalid {
            self.delete_object(state, &key);
        }
    }

    /// Runs all queued operations and applies their results to `state`.
    pub async fn invoke(self, state: &mut State) -> CoreResult<()> {
        let LocalUnitOfWork {
            workers,
            mut errors,
            ..
        } = self;
        for result in workers.start_and_wait().await {
            match result {
                Ok(change) => apply(state, change, &mut errors),
                Err(e) => errors.push(e),
            }
        }
        errors.into_result()
    }
}

fn apply(state: &mut State, change: LocalChange, errors: &mut MultiError) {
    match change {
        LocalChange::Saved {
            key,
            object,
            paths,
            related_paths,
        } => {
            let mut record = state
                .record(&key)
                .cloned()
                .unwrap_or_else(|| Record::new(key.clone()));
            record.paths = paths;
            record.related_paths = related_paths;
            record.state = RecordState {
                persisted: true,
                ..RecordState::default()
            };
            if let Err(e) = state.set_record(record) {
                errors.push(e);
            }
            state.set_local(&key, Some(object));
        }
        LocalChange::Deleted { key, errors: failed } => {
            state.remove_record(&key);
            state.set_local(&key, None);
            errors.append(failed);
        }
        LocalChange::Renamed { updates } => {
            for update in updates {
                let mut record = state
                    .record(&update.key)
                    .cloned()
                    .unwrap_or_else(|| Record::new(update.key.clone()));
                record.paths = update.paths;
                if let Some(related) = update.related_paths {
                    record.related_paths = related;
                }
                if let Err(e) = state.set_record(record) {
                    errors.push(e);
                }
                if let Some(object) = update.object {
                    state.set_local(&update.key, Some(object));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Manifest, ProjectInfo};
    use crate::model::{BranchKey, Component, ComponentsMap, Config, ConfigKey};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
        fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let entry = entry.unwrap();
                let path = entry.path();
                let rel = path.strip_prefix(root).unwrap().display().to_string();
                if path.is_dir() {
                    out.insert(format!("{rel}/"), Vec::new());
                    walk(root, &path, out);
                } else {
                    out.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(root, root, &mut out);
        out
    }

    fn state() -> State {
        State::new(
            Manifest::new(ProjectInfo::default()),
            ComponentsMap::new([Component::new("ex-generic-v2", "extractor")]),
        )
        .unwrap()
    }

    fn config(name: &str) -> Object {
        let mut c = Config::new(ConfigKey::new("1", "ex-generic-v2", "2"), name);
        c.content.insert("parameters".into(), json!({"a": 1}));
        c.into()
    }

    #[tokio::test]
    async fn save_writes_files_and_record() {
        let temp = tempdir().unwrap();
        let mut s = state();
        let object = config("Cfg");
        let mut uow = LocalUnitOfWork::new(temp.path(), CancellationToken::new(), 4);
        uow.save_object(&s, &object, PathInProject::new("main", "extractor/ex-generic-v2/cfg"));
        uow.invoke(&mut s).await.unwrap();

        let record = s.record(&object.key()).unwrap();
        assert!(record.state.persisted);
        assert_eq!(
            record.related_paths,
            vec!["meta.json", "config.json", "description.md"]
        );
        assert_eq!(s.local(&object.key()), Some(&object));
        assert!(temp
            .path()
            .join("main/extractor/ex-generic-v2/cfg/config.json")
            .is_file());
    }

    #[tokio::test]
    async fn failed_save_leaves_files_untouched() {
        let temp = tempdir().unwrap();
        let mut s = state();
        let paths = PathInProject::new("main", "extractor/ex-generic-v2/cfg");
        let mut uow = LocalUnitOfWork::new(temp.path(), CancellationToken::new(), 4);
        uow.save_object(&s, &config("Old"), paths.clone());
        uow.invoke(&mut s).await.unwrap();

        // the third file cannot be written: a directory is in the way
        let dir = temp.path().join("main/extractor/ex-generic-v2/cfg");
        fs::remove_file(dir.join("description.md")).unwrap();
        fs::create_dir(dir.join("description.md")).unwrap();
        let before = snapshot(temp.path());

        let mut uow = LocalUnitOfWork::new(temp.path(), CancellationToken::new(), 4);
        uow.save_object(&s, &config("New"), paths);
        assert!(uow.invoke(&mut s).await.is_err());
        assert_eq!(snapshot(temp.path()), before);
    }

    #[tokio::test]
    async fn failed_save_restores_untracked_files() {
        let temp = tempdir().unwrap();
        let mut s = state();
        let dir = temp.path().join("main/cfg");
        fs::create_dir_all(dir.join("description.md")).unwrap();
        fs::write(dir.join("meta.json"), "user data").unwrap();
        let before = snapshot(temp.path());

        let mut uow = LocalUnitOfWork::new(temp.path(), CancellationToken::new(), 4);
        uow.save_object(&s, &config("New"), PathInProject::new("main", "cfg"));
        assert!(uow.invoke(&mut s).await.is_err());
        assert_eq!(snapshot(temp.path()), before);
        assert_eq!(fs::read_to_string(dir.join("meta.json")).unwrap(), "user data");
    }

    #[tokio::test]
    async fn invalid_object_is_not_written() {
        let temp = tempdir().unwrap();
        let mut s = state();
        let mut uow = LocalUnitOfWork::new(temp.path(), CancellationToken::new(), 4);
        uow.save_object(&s, &config(""), PathInProject::new("main", "x"));
        let err = uow.invoke(&mut s).await.unwrap_err();
        assert!(err.to_string().contains("name is required"));
        assert!(!temp.path().join("main").exists());
    }

    #[tokio::test]
    async fn delete_removes_directory_and_record() {
        let temp = tempdir().unwrap();
        let mut s = state();
        let object = config("Cfg");
        let mut uow = LocalUnitOfWork::new(temp.path(), CancellationToken::new(), 4);
        uow.save_object(&s, &object, PathInProject::new("main", "cfg"));
        uow.invoke(&mut s).await.unwrap();
        fs::write(temp.path().join("main/cfg/extra.txt"), "x").unwrap();

        let mut uow = LocalUnitOfWork::new(temp.path(), CancellationToken::new(), 4);
        uow.delete_object(&s, &object.key());
        uow.invoke(&mut s).await.unwrap();
        assert!(!temp.path().join("main/cfg").exists());
        assert!(s.record(&object.key()).is_none());
        assert!(s.get(&object.key()).is_none());
    }

    #[tokio::test]
    async fn rename_updates_record() {
        let temp = tempdir().unwrap();
        let mut s = state();
        let branch = Key::from(BranchKey::new("1"));
        let mut record = Record::new(branch.clone());
        record.paths = PathInProject::new("", "old");
        s.set_record(record).unwrap();
        fs::create_dir_all(temp.path().join("old")).unwrap();
        fs::write(temp.path().join("old/meta.json"), "{}").unwrap();

        let mut uow = LocalUnitOfWork::new(temp.path(), CancellationToken::new(), 4);
        uow.rename(
            vec![("old".into(), "main".into())],
            vec![PathUpdate {
                key: branch.clone(),
                paths: PathInProject::new("", "main"),
                related_paths: None,
                object: None,
            }],
        );
        uow.invoke(&mut s).await.unwrap();
        assert_eq!(s.record(&branch).unwrap().path(), "main");
        assert!(temp.path().join("main/meta.json").is_file());
        assert!(!temp.path().join("old").exists());
    }
}
