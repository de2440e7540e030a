//! Removal of empty directories left behind by deletes and renames.

use crate::error::CoreResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn collect_dirs(dir: &Path, depth: usize, out: &mut Vec<(usize, PathBuf)>) -> CoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() && !is_hidden(&path) {
            collect_dirs(&path, depth + 1, out)?;
            out.push((depth + 1, path));
        }
    }
    Ok(())
}

/// Deletes empty directories under each of `roots` (project relative),
/// deepest first. Hidden directories and their content are never touched.
/// The roots themselves are kept. Returns the number of removed directories.
pub fn delete_empty_directories(project_root: &Path, roots: &[String]) -> CoreResult<usize> {
    let mut dirs = Vec::new();
    for root in roots {
        let path = project_root.join(root);
        if path.is_dir() && !is_hidden(&path) {
            collect_dirs(&path, 0, &mut dirs)?;
        }
    }
    dirs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    dirs.dedup_by(|a, b| a.1 == b.1);

    let mut removed = 0;
    for (_, dir) in dirs {
        if fs::read_dir(&dir)?.next().is_none() {
            fs::remove_dir(&dir)?;
            debug!(path = %dir.display(), "removed empty directory");
            removed += 1;
        }
    }
    Ok(removed)
}
