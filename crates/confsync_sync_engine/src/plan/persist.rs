//! Persist plan: new and deleted objects found in the project directory.
//!
//! Untracked directories are matched against the naming templates in two
//! passes. The first pass looks under existing branches and configs, the
//! second under the configs found by the first pass, so a new config with
//! a new row is persisted at once. Directories that match nothing stay
//! untracked. Records whose directory is gone become
//! [`PersistAction::DeleteRecord`].

use super::Plan;
use confsync_core::local::PathsState;
use confsync_core::model::{ComponentId, Key, PathInProject};
use confsync_core::naming::MatchedDir;
use confsync_core::{CoreResult, State};
use std::path::Path;
use tracing::warn;

/// Parent config of a new row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowParent {
    /// A config already in the manifest.
    Existing(confsync_core::ConfigKey),
    /// A config persisted by the same plan, by its full path.
    New(String),
}

/// One persist action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistAction {
    /// A new config directory.
    NewConfig {
        /// Location.
        paths: PathInProject,
        /// Parent branch.
        parent: Key,
        /// Component taken from the path.
        component_id: ComponentId,
    },
    /// A new row directory.
    NewRow {
        /// Location.
        paths: PathInProject,
        /// Parent config.
        parent: RowParent,
        /// Component of the parent config.
        component_id: ComponentId,
    },
    /// A record whose directory no longer exists.
    DeleteRecord {
        /// Object key.
        key: Key,
        /// Former path.
        path: String,
    },
}

impl PersistAction {
    fn order(&self) -> u8 {
        match self {
            PersistAction::NewConfig { .. } => 1,
            PersistAction::NewRow { .. } => 2,
            PersistAction::DeleteRecord { .. } => 3,
        }
    }

    /// Full path the action acts on.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            PersistAction::NewConfig { paths, .. } | PersistAction::NewRow { paths, .. } => {
                paths.path()
            }
            PersistAction::DeleteRecord { path, .. } => path.clone(),
        }
    }
}

/// Plan of the persist operation.
#[derive(Debug, Clone, Default)]
pub struct PersistPlan {
    actions: Vec<PersistAction>,
    untracked: Vec<String>,
}

fn relative<'a>(base: &str, path: &'a str) -> &'a str {
    path.strip_prefix(base)
        .map(|p| p.trim_start_matches('/'))
        .unwrap_or(path)
}

impl PersistPlan {
    /// Scans the project directory at `root` and builds the plan.
    pub fn build(state: &State, root: &Path) -> CoreResult<Self> {
        let mut paths = PathsState::scan(root, state.manifest())?;
        let generator = state.path_generator();
        let mut actions = Vec::new();

        // First pass: under known branches and configs.
        let mut new_configs = Vec::new();
        for record in state.manifest().records() {
            if state.local(&record.key).is_none() {
                continue;
            }
            let base = record.path();
            match &record.key {
                Key::Branch(_) => {
                    for dir in paths.untracked_dirs_under(&base) {
                        if paths.is_tracked(&dir) {
                            continue;
                        }
                        let rel = relative(&base, &dir);
                        if let Some(MatchedDir::Config { component_id }) =
                            generator.match_config_dir(rel)
                        {
                            paths.mark_tracked(&dir);
                            new_configs.push(actions.len());
                            actions.push(PersistAction::NewConfig {
                                paths: PathInProject::new(base.clone(), rel),
                                parent: record.key.clone(),
                                component_id,
                            });
                        }
                    }
                }
                Key::Config(config_key) => {
                    let component = state.component(&config_key.component_id);
                    for dir in paths.untracked_dirs_under(&base) {
                        if paths.is_tracked(&dir) {
                            continue;
                        }
                        let rel = relative(&base, &dir);
                        if matches!(
                            generator.match_row_dir(&component, rel),
                            Some(MatchedDir::ConfigRow)
                        ) {
                            paths.mark_tracked(&dir);
                            actions.push(PersistAction::NewRow {
                                paths: PathInProject::new(base.clone(), rel),
                                parent: RowParent::Existing(config_key.clone()),
                                component_id: config_key.component_id.clone(),
                            });
                        }
                    }
                }
                Key::ConfigRow(_) => {}
            }
        }

        // Second pass: rows inside the new configs.
        for index in new_configs {
            let PersistAction::NewConfig {
                paths: config_paths,
                component_id,
                ..
            } = actions[index].clone()
            else {
                continue;
            };
            let base = config_paths.path();
            let component = state.component(&component_id);
            for dir in paths.untracked_dirs_under(&base) {
                if paths.is_tracked(&dir) {
                    continue;
                }
                let rel = relative(&base, &dir);
                if matches!(
                    generator.match_row_dir(&component, rel),
                    Some(MatchedDir::ConfigRow)
                ) {
                    paths.mark_tracked(&dir);
                    actions.push(PersistAction::NewRow {
                        paths: PathInProject::new(base.clone(), rel),
                        parent: RowParent::New(base.clone()),
                        component_id: component_id.clone(),
                    });
                }
            }
        }

        for record in state.manifest().records() {
            if record.state.not_found {
                actions.push(PersistAction::DeleteRecord {
                    key: record.key.clone(),
                    path: record.path(),
                });
            }
        }

        actions.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.path().cmp(&b.path())));

        let untracked = paths.untracked();
        for path in &untracked {
            warn!(path = %path, "untracked path");
        }
        Ok(Self { actions, untracked })
    }

    /// Planned actions, configs before rows before deletes, then by path.
    #[must_use]
    pub fn actions(&self) -> &[PersistAction] {
        &self.actions
    }

    /// Paths matched by nothing.
    #[must_use]
    pub fn untracked(&self) -> &[String] {
        &self.untracked
    }

    /// Number of ids the plan needs.
    #[must_use]
    pub fn new_ids_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| !matches!(a, PersistAction::DeleteRecord { .. }))
            .count()
    }
}

impl Plan for PersistPlan {
    fn name(&self) -> &'static str {
        "persist"
    }

    fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn describe(&self, _state: &State) -> Vec<String> {
        self.actions
            .iter()
            .map(|a| match a {
                PersistAction::NewConfig { paths, .. } => format!("+ C {}", paths.path()),
                PersistAction::NewRow { paths, .. } => format!("+ R {}", paths.path()),
                PersistAction::DeleteRecord { key, path } => {
                    format!("- {} {}", key.kind().abbr, path)
                }
            })
            .collect()
    }
}
