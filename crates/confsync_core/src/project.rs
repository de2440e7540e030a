//! Project directory management.
//!
//! A project directory is recognised by its metadata directory:
//!
//! ```text
//! <project>/
//! ├─ .confsync/
//! │  ├─ manifest.json   # Records of all known objects
//! │  └─ LOCK            # Advisory lock, one process at a time
//! ├─ main/              # Default branch
//! └─ ...
//! ```

use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the metadata directory.
pub const METADATA_DIR: &str = ".confsync";
const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_TEMP: &str = "manifest.json.tmp";
const LOCK_FILE: &str = "LOCK";

/// An opened, locked project directory.
///
/// The lock is held until the value is dropped.
#[derive(Debug)]
pub struct ProjectDir {
    root: PathBuf,
    _lock_file: File,
}

impl ProjectDir {
    /// Finds the project root by walking up from `start` to the first
    /// directory containing [`METADATA_DIR`].
    pub fn discover(start: &Path) -> CoreResult<PathBuf> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if dir.join(METADATA_DIR).is_dir() {
                return Ok(dir.to_path_buf());
            }
            current = dir.parent();
        }
        Err(CoreError::ProjectNotFound {
            path: start.display().to_string(),
        })
    }

    /// Opens an existing project and takes its lock.
    pub fn open(root: &Path) -> CoreResult<Self> {
        let meta = root.join(METADATA_DIR);
        if !meta.is_dir() {
            return Err(CoreError::ProjectNotFound {
                path: root.display().to_string(),
            });
        }
        Self::lock(root)
    }

    /// Creates the metadata directory, writes `manifest` and takes the lock.
    pub fn create(root: &Path, manifest: &Manifest) -> CoreResult<Self> {
        fs::create_dir_all(root.join(METADATA_DIR))?;
        let dir = Self::lock(root)?;
        dir.save_manifest(manifest)?;
        Ok(dir)
    }

    fn lock(root: &Path) -> CoreResult<Self> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(METADATA_DIR).join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::ProjectLocked);
        }
        debug!(root = %root.display(), "project locked");
        Ok(Self {
            root: root.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a project relative path.
    #[must_use]
    pub fn abs(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Path of the manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join(MANIFEST_FILE)
    }

    /// Loads the manifest.
    pub fn load_manifest(&self) -> CoreResult<Manifest> {
        let path = self.manifest_path();
        let data = fs::read(&path).map_err(|e| {
            CoreError::invalid_manifest(format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Manifest::decode(&data)
    }

    /// Saves the manifest atomically: temp file, fsync, rename, fsync dir.
    pub fn save_manifest(&self, manifest: &Manifest) -> CoreResult<()> {
        let meta_dir = self.root.join(METADATA_DIR);
        let temp_path = meta_dir.join(MANIFEST_TEMP);

        let data = manifest.encode()?;
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.manifest_path())?;
        sync_directory(&meta_dir)?;
        debug!(records = manifest.len(), "manifest saved");
        Ok(())
    }
}

#[cfg(unix)]
fn sync_directory(path: &Path) -> CoreResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> CoreResult<()> {
    Ok(())
}
