//! Project manifest.
//!
//! The manifest is the registry of every object the project knows about:
//! its key, its location in the project directory, and the files that
//! belong to it. It is stored as `.confsync/manifest.json`:
//!
//! ```text
//! {
//!   "version": 2,
//!   "project": {"id": 12345, "apiHost": "connection.keboola.com"},
//!   "allowedBranches": ["__all__"],
//!   "naming": {...},
//!   "records": [
//!     {"kind": "branch", "id": "111", "path": "main", "relatedPaths": [...]},
//!     {"kind": "config", "branchId": "111", "componentId": "ex", "id": "1", ...}
//!   ]
//! }
//! ```

use crate::error::{CoreError, CoreResult};
use crate::model::{
    Branch, BranchKey, ConfigKey, ConfigRowKey, Key, PathInProject, Record, RecordState,
};
use crate::naming::NamingTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 2;

/// Allowed-branches entry matching every branch.
pub const ALL_BRANCHES: &str = "__all__";

/// Remote project the directory is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    /// Project id.
    pub id: u64,
    /// Storage API host.
    pub api_host: String,
}

/// Filter of branches the project works with.
///
/// Entries are [`ALL_BRANCHES`], a branch id, or a branch name pattern where
/// `*` matches any run of characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowedBranches(Vec<String>);

impl Default for AllowedBranches {
    fn default() -> Self {
        Self(vec![ALL_BRANCHES.to_string()])
    }
}

impl AllowedBranches {
    /// Creates a filter from entries.
    pub fn new(entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(entries.into_iter().map(Into::into).collect())
    }

    /// Returns true if `branch` passes the filter.
    #[must_use]
    pub fn is_allowed(&self, branch: &Branch) -> bool {
        self.0.iter().any(|entry| {
            entry == ALL_BRANCHES
                || entry == branch.key.id.as_str()
                || glob_match(&entry.to_lowercase(), &branch.name.to_lowercase())
        })
    }
}

/// Matches `text` against `pattern` where `*` is a wildcard.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// In-memory manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Bound remote project.
    pub project: ProjectInfo,
    /// Branch filter.
    pub allowed_branches: AllowedBranches,
    /// Naming templates.
    pub naming: NamingTemplate,
    records: BTreeMap<Key, Record>,
}

impl Manifest {
    /// Creates an empty manifest for a project.
    #[must_use]
    pub fn new(project: ProjectInfo) -> Self {
        Self {
            project,
            ..Self::default()
        }
    }

    /// Record of `key`.
    #[must_use]
    pub fn record(&self, key: &Key) -> Option<&Record> {
        self.records.get(key)
    }

    /// Mutable record of `key`.
    pub fn record_mut(&mut self, key: &Key) -> Option<&mut Record> {
        self.records.get_mut(key)
    }

    /// Record of `key`, created empty if missing.
    pub fn record_or_new(&mut self, key: &Key) -> &mut Record {
        self.records
            .entry(key.clone())
            .or_insert_with(|| Record::new(key.clone()))
    }

    /// Adds or replaces a record.
    pub fn set_record(&mut self, record: Record) {
        self.records.insert(record.key.clone(), record);
    }

    /// Removes the record of `key`.
    pub fn remove_record(&mut self, key: &Key) -> Option<Record> {
        self.records.remove(key)
    }

    /// Records sorted parents first.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encodes the persisted records as pretty JSON.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let file = ManifestFile {
            version: MANIFEST_VERSION,
            project: self.project.clone(),
            allowed_branches: self.allowed_branches.clone(),
            naming: self.naming.clone(),
            records: self
                .records
                .values()
                .filter(|r| r.state.persisted)
                .map(RecordFile::from_record)
                .collect(),
        };
        let mut data = serde_json::to_vec_pretty(&file)?;
        data.push(b'\n');
        Ok(data)
    }

    /// Decodes and validates a manifest.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let file: ManifestFile = serde_json::from_slice(data)
            .map_err(|e| CoreError::invalid_manifest(e.to_string()))?;
        if file.version != MANIFEST_VERSION {
            return Err(CoreError::invalid_manifest(format!(
                "unsupported version {}, expected {}",
                file.version, MANIFEST_VERSION
            )));
        }

        let mut manifest = Manifest {
            project: file.project,
            allowed_branches: file.allowed_branches,
            naming: file.naming,
            records: BTreeMap::new(),
        };
        for rf in file.records {
            let record = rf.into_record()?;
            if manifest.records.contains_key(&record.key) {
                return Err(CoreError::invalid_manifest(format!(
                    "duplicate record {}",
                    record.key.desc()
                )));
            }
            manifest.records.insert(record.key.clone(), record);
        }
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks that every record references a known parent.
    pub fn validate(&self) -> CoreResult<()> {
        for record in self.records.values() {
            if record.paths.is_empty() {
                return Err(CoreError::invalid_manifest(format!(
                    "{} has no path",
                    record.key.desc()
                )));
            }
            if let Some(parent) = record.key.parent_key() {
                if !self.records.contains_key(&parent) {
                    return Err(CoreError::invalid_manifest(format!(
                        "{} references missing {}",
                        record.key.desc(),
                        parent.desc()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFile {
    version: u32,
    project: ProjectInfo,
    #[serde(default)]
    allowed_branches: AllowedBranches,
    #[serde(default)]
    naming: NamingTemplate,
    #[serde(default)]
    records: Vec<RecordFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum RecordKind {
    Branch,
    Config,
    ConfigRow,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordFile {
    kind: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    component_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_id: Option<String>,
    id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    parent_path: String,
    path: String,
    #[serde(default)]
    related_paths: Vec<String>,
}

impl RecordFile {
    fn from_record(record: &Record) -> Self {
        let (kind, branch_id, component_id, config_id, id) = match &record.key {
            Key::Branch(k) => (RecordKind::Branch, None, None, None, k.id.to_string()),
            Key::Config(k) => (
                RecordKind::Config,
                Some(k.branch_id.to_string()),
                Some(k.component_id.to_string()),
                None,
                k.id.to_string(),
            ),
            Key::ConfigRow(k) => (
                RecordKind::ConfigRow,
                Some(k.branch_id.to_string()),
                Some(k.component_id.to_string()),
                Some(k.config_id.to_string()),
                k.id.to_string(),
            ),
        };
        Self {
            kind,
            branch_id,
            component_id,
            config_id,
            id,
            parent_path: record.paths.parent_path.clone(),
            path: record.paths.object_path.clone(),
            related_paths: record.related_paths.clone(),
        }
    }

    fn into_record(self) -> CoreResult<Record> {
        let missing = |field: &str| {
            CoreError::invalid_manifest(format!(
                "record \"{}\" is missing \"{field}\"",
                self.path
            ))
        };
        let key = match self.kind {
            RecordKind::Branch => Key::Branch(BranchKey::new(self.id.clone())),
            RecordKind::Config => Key::Config(ConfigKey::new(
                self.branch_id.clone().ok_or_else(|| missing("branchId"))?,
                self.component_id.clone().ok_or_else(|| missing("componentId"))?,
                self.id.clone(),
            )),
            RecordKind::ConfigRow => Key::ConfigRow(ConfigRowKey::new(
                self.branch_id.clone().ok_or_else(|| missing("branchId"))?,
                self.component_id.clone().ok_or_else(|| missing("componentId"))?,
                self.config_id.clone().ok_or_else(|| missing("configId"))?,
                self.id.clone(),
            )),
        };
        if !key.is_complete() {
            return Err(CoreError::invalid_manifest(format!(
                "record \"{}\" has an incomplete key",
                self.path
            )));
        }
        Ok(Record {
            key,
            paths: PathInProject::new(self.parent_path, self.path),
            related_paths: self.related_paths,
            state: RecordState {
                persisted: true,
                ..RecordState::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        let mut m = Manifest::new(ProjectInfo {
            id: 123,
            api_host: "connection.example.com".into(),
        });
        let branch = Key::from(BranchKey::new("111"));
        let config = Key::from(ConfigKey::new("111", "ex-generic-v2", "1"));
        let mut r = Record::new(branch);
        r.paths = PathInProject::new("", "main");
        r.related_paths = vec!["meta.json".into(), "description.md".into()];
        r.state.persisted = true;
        m.set_record(r);
        let mut r = Record::new(config);
        r.paths = PathInProject::new("main", "extractor/ex-generic-v2/cfg");
        r.state.persisted = true;
        m.set_record(r);
        m
    }

    #[test]
    fn encode_decode() {
        let m = sample();
        let data = m.encode().unwrap();
        let decoded = Manifest::decode(&data).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.project.id, 123);
        let cfg = decoded
            .record(&Key::from(ConfigKey::new("111", "ex-generic-v2", "1")))
            .unwrap();
        assert_eq!(cfg.path(), "main/extractor/ex-generic-v2/cfg");
        assert!(cfg.state.persisted);
    }

    #[test]
    fn unpersisted_records_are_not_written() {
        let mut m = sample();
        let mut r = Record::new(Key::from(ConfigKey::new("111", "ex", "9")));
        r.paths = PathInProject::new("main", "x");
        m.set_record(r);
        let decoded = Manifest::decode(&m.encode().unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn missing_parent_is_rejected() {
        let data = br#"{
            "version": 2,
            "project": {"id": 1, "apiHost": "h"},
            "records": [
                {"kind": "config", "branchId": "1", "componentId": "ex", "id": "2", "path": "x"}
            ]
        }"#;
        let err = Manifest::decode(data).unwrap_err();
        assert!(err.to_string().contains("references missing branch"));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let data = br#"{"version": 1, "project": {"id": 1, "apiHost": "h"}}"#;
        assert!(Manifest::decode(data).is_err());
    }

    #[test]
    fn allowed_branches() {
        let main = Branch::new(BranchKey::new("1"), "Main", true);
        let feature = Branch::new(BranchKey::new("2"), "feature-login", false);
        assert!(AllowedBranches::default().is_allowed(&feature));
        let filter = AllowedBranches::new(["1", "feature-*"]);
        assert!(filter.is_allowed(&main));
        assert!(filter.is_allowed(&feature));
        let filter = AllowedBranches::new(["*-logout"]);
        assert!(!filter.is_allowed(&feature));
    }

    #[test]
    fn glob() {
        assert!(glob_match("a*c", "abbbc"));
        assert!(glob_match("*", "anything"));
        assert!(!glob_match("a*c", "abd"));
        assert!(glob_match("a*b*c", "axbyc"));
    }
}
