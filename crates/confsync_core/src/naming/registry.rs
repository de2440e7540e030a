//! Registry of paths assigned to objects.

use crate::error::{CoreError, CoreResult};
use crate::model::{Key, PathInProject};
use std::collections::HashMap;

/// Tracks which key owns which path, so generated paths stay unique.
#[derive(Debug, Default, Clone)]
pub struct NamingRegistry {
    by_path: HashMap<String, Key>,
    by_key: HashMap<Key, String>,
}

impl NamingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `path` to `key`, releasing any previous path of the key.
    ///
    /// Fails with [`CoreError::PathCollision`] if another key owns the path.
    pub fn attach(&mut self, key: &Key, path: &str) -> CoreResult<()> {
        if let Some(owner) = self.by_path.get(path) {
            if owner != key {
                return Err(CoreError::PathCollision {
                    path: path.to_string(),
                    owner: owner.desc(),
                    other: key.desc(),
                });
            }
        }
        self.detach(key);
        self.by_path.insert(path.to_string(), key.clone());
        self.by_key.insert(key.clone(), path.to_string());
        Ok(())
    }

    /// Releases the path of `key`.
    pub fn detach(&mut self, key: &Key) {
        if let Some(old) = self.by_key.remove(key) {
            self.by_path.remove(&old);
        }
    }

    /// Key owning `path`.
    #[must_use]
    pub fn key_by_path(&self, path: &str) -> Option<&Key> {
        self.by_path.get(path)
    }

    /// Path owned by `key`.
    #[must_use]
    pub fn path_by_key(&self, key: &Key) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }

    /// Returns `path` or, if another key owns it, the first free variant
    /// with a `-001`, `-002`, ... suffix.
    #[must_use]
    pub fn make_unique(&self, key: &Key, path: PathInProject) -> PathInProject {
        let is_free = |p: &PathInProject| match self.by_path.get(&p.path()) {
            Some(owner) => owner == key,
            None => true,
        };
        if is_free(&path) {
            return path;
        }
        let mut suffix = 1u32;
        loop {
            let candidate = PathInProject::new(
                path.parent_path.clone(),
                format!("{}-{suffix:03}", path.object_path),
            );
            if is_free(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConfigKey;

    #[test]
    fn collision_is_reported() {
        let mut reg = NamingRegistry::new();
        let a = Key::from(ConfigKey::new("1", "ex", "1"));
        let b = Key::from(ConfigKey::new("1", "ex", "2"));
        reg.attach(&a, "main/extractor/ex/cfg").unwrap();
        let err = reg.attach(&b, "main/extractor/ex/cfg").unwrap_err();
        assert!(matches!(err, CoreError::PathCollision { .. }));
    }

    #[test]
    fn unique_suffixes() {
        let mut reg = NamingRegistry::new();
        let a = Key::from(ConfigKey::new("1", "ex", "1"));
        let b = Key::from(ConfigKey::new("1", "ex", "2"));
        let c = Key::from(ConfigKey::new("1", "ex", "3"));
        reg.attach(&a, "main/ex/cfg").unwrap();
        let pb = reg.make_unique(&b, PathInProject::new("main", "ex/cfg"));
        assert_eq!(pb.path(), "main/ex/cfg-001");
        reg.attach(&b, &pb.path()).unwrap();
        let pc = reg.make_unique(&c, PathInProject::new("main", "ex/cfg"));
        assert_eq!(pc.path(), "main/ex/cfg-002");
        // the owner keeps its own path
        let pa = reg.make_unique(&a, PathInProject::new("main", "ex/cfg"));
        assert_eq!(pa.path(), "main/ex/cfg");
    }

    #[test]
    fn attach_moves_the_key() {
        let mut reg = NamingRegistry::new();
        let a = Key::from(ConfigKey::new("1", "ex", "1"));
        reg.attach(&a, "old").unwrap();
        reg.attach(&a, "new").unwrap();
        assert!(reg.key_by_path("old").is_none());
        assert_eq!(reg.path_by_key(&a), Some("new"));
    }
}
