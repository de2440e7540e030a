//! Test fixtures: temporary project directories and a seeded mock API.

use confsync_core::manifest::ProjectInfo;
use confsync_core::model::{BranchKey, ConfigKey, ConfigRowKey, Key, PathInProject, Record};
use confsync_core::naming::{CONFIG_FILE, DESCRIPTION_FILE, META_FILE};
use confsync_core::{Content, Manifest, ProjectDir};
use confsync_sync_engine::{EngineConfig, MockStorageApi, SyncEngine};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Project id written to test manifests.
pub const TEST_PROJECT_ID: u64 = 12345;
/// API host written to test manifests.
pub const TEST_API_HOST: &str = "connection.keboola.com";

/// Components known to the mock API of every [`TestProject`].
pub const TEST_COMPONENTS: &[(&str, &str)] = &[
    ("ex-generic-v2", "extractor"),
    ("keboola.snowflake-transformation", "transformation"),
    ("keboola.shared-code", "other"),
    ("keboola.variables", "other"),
];

/// A project directory in a temporary directory, with a mock API.
///
/// Builder methods write files and manifest records as if the objects had
/// been pulled before. The mock API starts with [`TEST_COMPONENTS`] only;
/// remote branches and configs are added through `api`.
pub struct TestProject {
    /// Mock storage API.
    pub api: Arc<MockStorageApi>,
    manifest: Manifest,
    temp_dir: TempDir,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    /// Creates an empty project.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let manifest = Manifest::new(ProjectInfo {
            id: TEST_PROJECT_ID,
            api_host: TEST_API_HOST.to_string(),
        });
        ProjectDir::create(temp_dir.path(), &manifest).expect("Failed to create project");

        let api = Arc::new(MockStorageApi::new());
        for (id, component_type) in TEST_COMPONENTS {
            api.add_component(id, component_type);
        }
        Self {
            api,
            manifest,
            temp_dir,
        }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of a project relative path.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Opens an engine on the project, bound to the mock API.
    pub fn engine(&self) -> SyncEngine {
        SyncEngine::open(self.root(), self.engine_config(), self.api.clone())
            .expect("Failed to open engine")
    }

    /// Engine configuration used by [`TestProject::engine`].
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(TEST_API_HOST, "test-token")
            .with_change_description("test")
            .with_max_local_workers(4)
            .with_max_remote_requests(4)
    }

    /// Adds a branch directory and its record.
    pub fn with_branch(mut self, id: &str, name: &str, is_default: bool, path: &str) -> Self {
        self.write_json(
            &format!("{path}/{META_FILE}"),
            &json!({"name": name, "isDefault": is_default}),
        );
        self.write_file(&format!("{path}/{DESCRIPTION_FILE}"), "");
        self.add_record(
            Key::Branch(BranchKey::new(id)),
            PathInProject::new("", path),
            &[META_FILE, DESCRIPTION_FILE],
        );
        self
    }

    /// Adds a config directory and its record.
    ///
    /// `path` is relative to the branch directory `branch_path`.
    pub fn with_config(
        mut self,
        key: ConfigKey,
        branch_path: &str,
        path: &str,
        name: &str,
        content: Value,
    ) -> Self {
        let full = format!("{branch_path}/{path}");
        self.write_object_files(&full, name, &content);
        self.add_record(
            Key::Config(key),
            PathInProject::new(branch_path, path),
            &[META_FILE, CONFIG_FILE, DESCRIPTION_FILE],
        );
        self
    }

    /// Adds a row directory and its record.
    ///
    /// `path` is relative to the config directory `config_path`.
    pub fn with_row(
        mut self,
        key: ConfigRowKey,
        config_path: &str,
        path: &str,
        name: &str,
        content: Value,
    ) -> Self {
        let full = format!("{config_path}/{path}");
        self.write_object_files(&full, name, &content);
        self.add_record(
            Key::ConfigRow(key),
            PathInProject::new(config_path, path),
            &[META_FILE, CONFIG_FILE, DESCRIPTION_FILE],
        );
        self
    }

    fn write_object_files(&self, full: &str, name: &str, content: &Value) {
        self.write_json(
            &format!("{full}/{META_FILE}"),
            &json!({"name": name, "isDisabled": false}),
        );
        self.write_json(&format!("{full}/{CONFIG_FILE}"), content);
        self.write_file(&format!("{full}/{DESCRIPTION_FILE}"), "");
    }

    fn add_record(&mut self, key: Key, paths: PathInProject, related: &[&str]) {
        let mut record = Record::new(key);
        record.paths = paths;
        record.related_paths = related.iter().map(|p| p.to_string()).collect();
        record.state.persisted = true;
        self.manifest.set_record(record);
        let dir = ProjectDir::open(self.root()).expect("Failed to open project");
        dir.save_manifest(&self.manifest)
            .expect("Failed to save manifest");
    }

    /// Writes a file, creating parent directories.
    pub fn write_file(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    /// Writes pretty JSON with a trailing newline.
    pub fn write_json(&self, rel: &str, value: &Value) {
        let text = serde_json::to_string_pretty(value).expect("Failed to encode JSON");
        self.write_file(rel, &format!("{text}\n"));
    }

    /// Reads a file.
    pub fn read_file(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("Failed to read file")
    }

    /// Reads a JSON object file.
    pub fn read_json(&self, rel: &str) -> Content {
        serde_json::from_str(&self.read_file(rel)).expect("Failed to decode JSON")
    }

    /// Returns true if `rel` exists.
    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Reads the manifest from disk.
    pub fn load_manifest(&self) -> Manifest {
        ProjectDir::open(self.root())
            .and_then(|dir| dir.load_manifest())
            .expect("Failed to load manifest")
    }

    /// Files and directories of the project, sorted, without the metadata
    /// directory.
    pub fn tree(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_tree(self.root(), "", &mut out);
        out.sort();
        out
    }
}

fn collect_tree(root: &Path, rel: &str, out: &mut Vec<String>) {
    let dir = root.join(rel);
    let Ok(entries) = fs::read_dir(&dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if rel.is_empty() && name.starts_with('.') {
            continue;
        }
        let child = if rel.is_empty() {
            name
        } else {
            format!("{rel}/{name}")
        };
        if entry.path().is_dir() {
            out.push(format!("{child}/"));
            collect_tree(root, &child, out);
        } else {
            out.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_writes_records() {
        let project = TestProject::new()
            .with_branch("111", "Main", true, "main")
            .with_config(
                ConfigKey::new("111", "ex-generic-v2", "1"),
                "main",
                "extractor/ex-generic-v2/cfg",
                "Cfg",
                json!({"a": 1}),
            );
        let manifest = project.load_manifest();
        assert_eq!(manifest.len(), 2);
        assert!(project.exists("main/extractor/ex-generic-v2/cfg/config.json"));
        assert_eq!(
            project.read_json("main/extractor/ex-generic-v2/cfg/config.json")["a"],
            json!(1)
        );
    }

    #[test]
    fn test_tree_skips_metadata() {
        let project = TestProject::new().with_branch("111", "Main", true, "main");
        assert_eq!(
            project.tree(),
            vec!["main/", "main/description.md", "main/meta.json"]
        );
    }
}
