//! Object files and the scoped save transaction.

use crate::error::{CoreError, CoreResult, MultiError};
use crate::model::Content;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Suffix of soft-deleted files.
pub const BACKUP_SUFFIX: &str = ".old";

/// Content of one object file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    /// Pretty printed JSON.
    Json(Value),
    /// Plain text.
    Text(String),
}

/// A file to write, with a project relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFile {
    /// Path relative to the project root.
    pub path: String,
    /// File content.
    pub content: FileContent,
}

impl ObjectFile {
    /// JSON file.
    pub fn json(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Json(value),
        }
    }

    /// Text file.
    pub fn text(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Text(text.into()),
        }
    }

    /// Encoded file content.
    pub fn bytes(&self) -> CoreResult<Vec<u8>> {
        match &self.content {
            FileContent::Json(v) => {
                let mut data = serde_json::to_vec_pretty(v)?;
                data.push(b'\n');
                Ok(data)
            }
            FileContent::Text(t) => Ok(t.as_bytes().to_vec()),
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Writes the files of one object so that either all new files or all old
/// files end up on disk.
///
/// [`SaveTransaction::begin`] moves every existing file to a `.old`
/// sibling. Dropping the transaction without [`SaveTransaction::commit`]
/// removes whatever was written and moves the backups back.
#[derive(Debug)]
pub struct SaveTransaction {
    backups: Vec<(PathBuf, PathBuf)>,
    written: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
    committed: bool,
}

impl SaveTransaction {
    /// Soft-deletes `existing` (project relative) files under `root`.
    ///
    /// Callers pass every path the transaction may overwrite, tracked or
    /// not, so a rollback can restore all of them.
    pub fn begin(root: &Path, existing: &[String]) -> CoreResult<Self> {
        let mut tx = Self {
            backups: Vec::new(),
            written: Vec::new(),
            created_dirs: Vec::new(),
            committed: false,
        };
        let mut seen = std::collections::BTreeSet::new();
        for rel in existing {
            if !seen.insert(rel.as_str()) {
                continue;
            }
            let path = root.join(rel);
            if !path.is_file() {
                continue;
            }
            let backup = backup_path(&path);
            fs::rename(&path, &backup)
                .map_err(|e| CoreError::invalid_file(rel.clone(), format!("cannot back up: {e}")))?;
            tx.backups.push((path, backup));
        }
        Ok(tx)
    }

    /// Writes one file, creating missing directories.
    pub fn write(&mut self, root: &Path, file: &ObjectFile) -> CoreResult<()> {
        let path = root.join(&file.path);
        if let Some(parent) = path.parent() {
            self.create_dirs(parent)
                .map_err(|e| CoreError::invalid_file(file.path.clone(), e))?;
        }
        let data = file.bytes()?;
        fs::write(&path, data).map_err(|e| CoreError::invalid_file(file.path.clone(), e))?;
        self.written.push(path);
        Ok(())
    }

    fn create_dirs(&mut self, dir: &Path) -> io::Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.exists() {
                break;
            }
            missing.push(d.to_path_buf());
            current = d.parent();
        }
        for d in missing.into_iter().rev() {
            // Concurrent saves may create a shared parent first.
            match fs::create_dir(&d) {
                Ok(()) => self.created_dirs.push(d),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && d.is_dir() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Removes the backups. The new files stay.
    pub fn commit(mut self) {
        self.committed = true;
        for (_, backup) in &self.backups {
            if let Err(e) = fs::remove_file(backup) {
                warn!(path = %backup.display(), error = %e, "cannot remove backup");
            }
        }
    }

    fn rollback(&mut self) {
        for path in self.written.iter().rev() {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "cannot remove written file");
            }
        }
        for (original, backup) in &self.backups {
            if let Err(e) = fs::rename(backup, original) {
                warn!(path = %original.display(), error = %e, "cannot restore backup");
            }
        }
        for dir in self.created_dirs.iter().rev() {
            let _ = fs::remove_dir(dir);
        }
    }
}

impl Drop for SaveTransaction {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

/// Reads a JSON object file. Returns `None` if the file does not exist.
pub fn read_json_file(root: &Path, rel: &str) -> CoreResult<Option<Content>> {
    let Some(text) = read_text_file(root, rel)? else {
        return Ok(None);
    };
    if text.trim().is_empty() {
        return Ok(Some(Content::new()));
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(CoreError::invalid_file(rel, "expected a JSON object")),
        Err(e) => Err(CoreError::invalid_file(rel, e)),
    }
}

/// Reads a text file. Returns `None` if the file does not exist.
pub fn read_text_file(root: &Path, rel: &str) -> CoreResult<Option<String>> {
    match fs::read_to_string(root.join(rel)) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::invalid_file(rel, e)),
    }
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to).map(|_| ())
    }
}

fn remove_any(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        Ok(())
    }
}

fn roll_back(created: &[PathBuf]) {
    for path in created.iter().rev() {
        if let Err(e) = remove_any(path) {
            warn!(path = %path.display(), error = %e, "cannot roll back rename");
        }
    }
}

/// Copies every `(old, new)` pair, then deletes the old paths.
///
/// If any copy fails, every new path created so far is removed and the
/// old paths are left untouched.
pub fn rename_batch(root: &Path, pairs: &[(String, String)]) -> CoreResult<()> {
    let mut created: Vec<PathBuf> = Vec::new();
    for (old, new) in pairs {
        let to = root.join(new);
        if to.exists() {
            roll_back(&created);
            return Err(CoreError::invalid_file(
                old.clone(),
                format!("cannot rename to \"{new}\": target already exists"),
            ));
        }
        let copied = copy_recursive(&root.join(old), &to);
        created.push(to);
        if let Err(e) = copied {
            roll_back(&created);
            return Err(CoreError::invalid_file(
                old.clone(),
                format!("cannot rename to \"{new}\": {e}"),
            ));
        }
    }

    let mut errors = MultiError::new();
    for (old, _) in pairs {
        if let Err(e) = remove_any(&root.join(old)) {
            errors.push(CoreError::invalid_file(old.clone(), format!("cannot remove: {e}")));
        }
    }
    errors.into_result()
}
