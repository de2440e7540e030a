use super::Plan;
use crate::error::{SyncError, SyncResult};
use confsync_core::{DiffResult, DiffResults, Object, ResultState, State};
use std::fmt;

/// Direction of a diff plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Remote state overwrites the project directory.
    Pull,
    /// Project directory overwrites the remote state.
    Push,
}

impl PlanKind {
    /// Operation name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PlanKind::Pull => "pull",
            PlanKind::Push => "push",
        }
    }
}

/// What to do with one diff result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Write the remote object to the project directory.
    SaveLocal,
    /// Write the local object to the API.
    SaveRemote,
    /// Remove the object from the project directory.
    DeleteLocal,
    /// Remove the object from the API.
    DeleteRemote,
}

impl ActionType {
    fn mark(self, state: ResultState) -> &'static str {
        match self {
            ActionType::SaveLocal | ActionType::SaveRemote => {
                if state == ResultState::NotEqual {
                    "*"
                } else {
                    "+"
                }
            }
            ActionType::DeleteLocal | ActionType::DeleteRemote => "×",
        }
    }
}

/// One action of a diff plan.
#[derive(Debug, Clone)]
pub struct DiffAction {
    /// The diff result the action acts on.
    pub result: DiffResult,
    /// The action.
    pub action: ActionType,
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.action.mark(self.result.state),
            self.result.key.kind().abbr,
            self.result.key
        )
    }
}

/// Plan of a pull or push.
#[derive(Debug, Clone)]
pub struct DiffPlan {
    kind: PlanKind,
    actions: Vec<DiffAction>,
    allow_remote_delete: bool,
}

impl DiffPlan {
    /// Pull: the remote state wins.
    #[must_use]
    pub fn pull(results: &DiffResults) -> Self {
        let mut actions = Vec::new();
        for result in &results.results {
            let action = match result.state {
                ResultState::Equal | ResultState::Invisible => continue,
                ResultState::NotEqual | ResultState::OnlyInRemote => ActionType::SaveLocal,
                ResultState::OnlyInLocal => ActionType::DeleteLocal,
            };
            actions.push(DiffAction {
                result: result.clone(),
                action,
            });
        }
        Self {
            kind: PlanKind::Pull,
            actions,
            allow_remote_delete: false,
        }
    }

    /// Push: the local state wins.
    ///
    /// An object present only remotely is deleted only if its parent is
    /// loaded locally, so a partially loaded tree never deletes more than
    /// it can see.
    #[must_use]
    pub fn push(results: &DiffResults, state: &State) -> Self {
        let mut actions = Vec::new();
        for result in &results.results {
            let action = match result.state {
                ResultState::Equal | ResultState::Invisible => continue,
                ResultState::NotEqual | ResultState::OnlyInLocal => ActionType::SaveRemote,
                ResultState::OnlyInRemote => {
                    let parent_exists = match result.key.parent_key() {
                        Some(parent) => state.local(&parent).is_some(),
                        None => true,
                    };
                    if !parent_exists {
                        continue;
                    }
                    ActionType::DeleteRemote
                }
            };
            actions.push(DiffAction {
                result: result.clone(),
                action,
            });
        }
        Self {
            kind: PlanKind::Push,
            actions,
            allow_remote_delete: false,
        }
    }

    /// Lets [`ActionType::DeleteRemote`] actions run; without it they are
    /// skipped with a warning.
    #[must_use]
    pub fn allow_remote_delete(mut self, allow: bool) -> Self {
        self.allow_remote_delete = allow;
        self
    }

    /// Returns true if remote deletes will run.
    #[must_use]
    pub fn remote_delete_allowed(&self) -> bool {
        self.allow_remote_delete
    }

    /// Direction of the plan.
    #[must_use]
    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    /// Planned actions.
    #[must_use]
    pub fn actions(&self) -> &[DiffAction] {
        &self.actions
    }

    /// Checks domain invariants. The default branch is never deleted
    /// remotely.
    pub fn validate(&self) -> SyncResult<()> {
        for action in &self.actions {
            if action.action != ActionType::DeleteRemote {
                continue;
            }
            let Some(object) = action.result.remote.as_ref().or(action.result.local.as_ref())
            else {
                continue;
            };
            if matches!(object, Object::Branch(b) if b.is_default) {
                return Err(SyncError::InvalidPlan(format!(
                    "cannot delete {}: default branch cannot be deleted",
                    object.desc()
                )));
            }
        }
        Ok(())
    }
}

impl Plan for DiffPlan {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn describe(&self, state: &State) -> Vec<String> {
        self.actions
            .iter()
            .map(|a| {
                let path = state
                    .path_of(&a.result.key)
                    .unwrap_or_else(|_| a.result.key.to_string());
                let mut line = format!(
                    "{} {} {}",
                    a.action.mark(a.result.state),
                    a.result.key.kind().abbr,
                    path
                );
                if a.result.state == ResultState::NotEqual {
                    line.push_str(&format!(" | changed: {}", a.result.changed_fields));
                }
                if a.action == ActionType::DeleteRemote && !self.allow_remote_delete {
                    line.push_str(" - SKIPPED");
                }
                line
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsync_core::model::{BranchKey, ConfigKey, Key};
    use confsync_core::{Branch, ComponentsMap, Config, Differ, Manifest, ProjectInfo};

    fn state() -> State {
        State::new(Manifest::new(ProjectInfo::default()), ComponentsMap::default()).unwrap()
    }

    fn branch(id: &str, default: bool) -> (Key, Object) {
        let b = Branch::new(BranchKey::new(id), format!("Branch {id}"), default);
        (Key::Branch(b.key.clone()), b.into())
    }

    fn config(branch: &str, id: &str) -> (Key, Object) {
        let c = Config::new(ConfigKey::new(branch, "ex", id), format!("Config {id}"));
        (Key::Config(c.key.clone()), c.into())
    }

    #[test]
    fn plans_stay_on_one_side() {
        let mut s = state();
        let (bk, b) = branch("1", true);
        s.set_local(&bk, Some(b.clone()));
        s.set_remote(&bk, Some(b));
        let (local_only, c) = config("1", "2");
        s.set_local(&local_only, Some(c));
        let (remote_only, c) = config("1", "3");
        s.set_remote(&remote_only, Some(c));

        let results = Differ::new(&s).invoke().unwrap();
        let pull = DiffPlan::pull(&results);
        assert!(!pull.actions().is_empty());
        assert!(pull
            .actions()
            .iter()
            .all(|a| matches!(a.action, ActionType::SaveLocal | ActionType::DeleteLocal)));
        let push = DiffPlan::push(&results, &s);
        assert!(!push.actions().is_empty());
        assert!(push
            .actions()
            .iter()
            .all(|a| matches!(a.action, ActionType::SaveRemote | ActionType::DeleteRemote)));
    }

    #[test]
    fn pull_rules() {
        let mut s = state();
        let (bk, b) = branch("1", true);
        s.set_local(&bk, Some(b.clone()));
        s.set_remote(&bk, Some(b));
        let (local_only, c) = config("1", "2");
        s.set_local(&local_only, Some(c));
        let (remote_only, c) = config("1", "3");
        s.set_remote(&remote_only, Some(c));

        let plan = DiffPlan::pull(&Differ::new(&s).invoke().unwrap());
        let actions: Vec<(Key, ActionType)> = plan
            .actions()
            .iter()
            .map(|a| (a.result.key.clone(), a.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                (local_only, ActionType::DeleteLocal),
                (remote_only, ActionType::SaveLocal),
            ]
        );
    }

    #[test]
    fn push_deletes_only_under_loaded_parent() {
        let mut s = state();
        let (bk, b) = branch("1", true);
        s.set_local(&bk, Some(b.clone()));
        s.set_remote(&bk, Some(b));
        let (loaded, c) = config("1", "2");
        s.set_remote(&loaded, Some(c));
        let (orphan, c) = config("9", "3");
        s.set_remote(&orphan, Some(c));

        let plan = DiffPlan::push(&Differ::new(&s).invoke().unwrap(), &s);
        assert_eq!(plan.actions().len(), 1);
        assert_eq!(plan.actions()[0].result.key, loaded);
        assert_eq!(plan.actions()[0].action, ActionType::DeleteRemote);
    }

    #[test]
    fn default_branch_cannot_be_deleted() {
        let mut s = state();
        let (bk, b) = branch("1", true);
        s.set_remote(&bk, Some(b));
        let plan = DiffPlan::push(&Differ::new(&s).invoke().unwrap(), &s);
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("default branch cannot be deleted"));

        let mut s = state();
        let (bk, b) = branch("2", false);
        s.set_remote(&bk, Some(b));
        let plan = DiffPlan::push(&Differ::new(&s).invoke().unwrap(), &s);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn skipped_deletes_are_marked() {
        let mut s = state();
        let (bk, b) = branch("2", false);
        s.set_remote(&bk, Some(b));
        let plan = DiffPlan::push(&Differ::new(&s).invoke().unwrap(), &s);
        let lines = plan.report(&s);
        assert_eq!(lines[0], "Plan for \"push\" operation:");
        assert!(lines[1].ends_with("- SKIPPED"));
        let plan = plan.allow_remote_delete(true);
        assert!(!plan.report(&s)[1].ends_with("- SKIPPED"));
    }
}
