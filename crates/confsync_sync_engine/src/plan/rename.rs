//! Rename plan: moves objects to the paths the naming templates produce.

use super::Plan;
use confsync_core::local::PathUpdate;
use confsync_core::model::{join_path, Key, Object};
use confsync_core::naming::PathsGenerator;
use confsync_core::{CoreResult, State};

/// One copy-then-delete instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameAction {
    /// Source path, valid once the parent actions ran.
    pub old: String,
    /// Target path.
    pub new: String,
}

/// Plan of the rename (fix-paths) operation.
#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    actions: Vec<RenameAction>,
    updates: Vec<PathUpdate>,
}

fn replace_prefix(path: &str, old: &str, new: &str) -> Option<String> {
    if path == old {
        Some(new.to_string())
    } else {
        path.strip_prefix(old)
            .filter(|rest| rest.starts_with('/'))
            .map(|rest| format!("{new}{rest}"))
    }
}

/// Renames of transformation blocks and codes, relative to the config.
///
/// Returns the updated object and the `(old, new)` relative pairs.
fn block_renames(state: &State, object: &Object) -> (Object, Vec<(String, String)>) {
    let mut object = object.clone();
    let mut pairs = Vec::new();
    if let Object::Config(config) = &mut object {
        let generator = state.path_generator();
        if let Some(t) = config.transformation.as_mut() {
            for (i, block) in t.blocks.iter_mut().enumerate() {
                let new_block = generator.block_path(i, block);
                if let Some(old_block) = block.path.clone() {
                    if old_block != new_block {
                        pairs.push((old_block, new_block.clone()));
                    }
                }
                block.path = Some(new_block.clone());
                for (j, code) in block.codes.iter_mut().enumerate() {
                    let new_code = generator.code_path(j, code);
                    if let Some(old_code) = code.path.clone() {
                        if old_code != new_code {
                            pairs.push((
                                join_path(&new_block, &old_code),
                                join_path(&new_block, &new_code),
                            ));
                        }
                    }
                    code.path = Some(new_code);
                }
            }
        }
    }
    (object, pairs)
}

impl RenamePlan {
    /// Regenerates the path of every local object and plans the moves.
    ///
    /// An object moves only when its own directory name changes; an object
    /// whose parent moves travels with the parent and only gets a manifest
    /// update.
    pub fn build(state: &State) -> CoreResult<Self> {
        let mut generator = PathsGenerator::new(state, true);
        for node in state.objects() {
            if node.local.is_some() && state.record(&node.key).is_some() {
                generator.add(node.key.clone());
            }
        }

        let mut actions = Vec::new();
        let mut updates = Vec::new();
        for generated in generator.invoke()? {
            let Some(local) = state.local(&generated.key) else {
                continue;
            };
            let new_path = generated.new.path();
            let (object, block_pairs) = block_renames(state, local);

            let own_change = match (&generated.old, generated.old_under_new_parent()) {
                (Some(old), Some(source)) if old.object_path != generated.new.object_path => {
                    Some(source)
                }
                _ => None,
            };
            if let Some(source) = own_change {
                actions.push(RenameAction {
                    old: source,
                    new: new_path.clone(),
                });
            }
            for (old, new) in &block_pairs {
                actions.push(RenameAction {
                    old: join_path(&new_path, old),
                    new: join_path(&new_path, new),
                });
            }

            if !generated.is_changed() && block_pairs.is_empty() {
                continue;
            }
            let related_paths = if block_pairs.is_empty() {
                None
            } else {
                let current = state
                    .record(&generated.key)
                    .map(|r| r.related_paths.clone())
                    .unwrap_or_default();
                Some(
                    current
                        .into_iter()
                        .map(|p| {
                            block_pairs.iter().fold(p, |p, (old, new)| {
                                replace_prefix(&p, old, new).unwrap_or(p)
                            })
                        })
                        .collect(),
                )
            };
            updates.push(PathUpdate {
                key: generated.key.clone(),
                paths: generated.new.clone(),
                related_paths,
                object: (!block_pairs.is_empty()).then_some(object),
            });
        }

        // A target path sorts after the path of its parent.
        actions.sort_by(|a, b| a.new.cmp(&b.new));
        Ok(Self { actions, updates })
    }

    /// Planned moves, parents first.
    #[must_use]
    pub fn actions(&self) -> &[RenameAction] {
        &self.actions
    }

    /// Manifest updates applied after the moves.
    #[must_use]
    pub fn updates(&self) -> &[PathUpdate] {
        &self.updates
    }

    /// Consumes the plan into copy pairs and updates.
    #[must_use]
    pub fn into_parts(self) -> (Vec<(String, String)>, Vec<PathUpdate>) {
        (
            self.actions.into_iter().map(|a| (a.old, a.new)).collect(),
            self.updates,
        )
    }

    /// Keys touched by the plan.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.updates.iter().map(|u| u.key.clone()).collect()
    }
}

impl Plan for RenamePlan {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.updates.is_empty()
    }

    fn describe(&self, _state: &State) -> Vec<String> {
        self.actions
            .iter()
            .map(|a| format!("{} -> {}", a.old, a.new))
            .collect()
    }
}
