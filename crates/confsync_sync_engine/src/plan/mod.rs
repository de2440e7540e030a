//! Plan builders.
//!
//! A plan is an ordered list of actions computed from the diff results or
//! from the state, before anything is executed. Plans can be printed for a
//! dry run and are executed by [`crate::Executor`].

mod diff_plan;
mod encrypt;
mod persist;
mod rename;

pub use diff_plan::{ActionType, DiffAction, DiffPlan, PlanKind};
pub use encrypt::{is_encrypted, EncryptAction, EncryptPlan, ENCRYPTED_PREFIX, SECRET_KEY_PREFIX};
pub use persist::{PersistAction, PersistPlan, RowParent};
pub use rename::{RenameAction, RenamePlan};

use confsync_core::State;

/// Common interface of all plans.
pub trait Plan {
    /// Operation name used in messages, e.g. `push`.
    fn name(&self) -> &'static str;

    /// Returns true if there is nothing to do.
    fn is_empty(&self) -> bool;

    /// Human readable action lines.
    fn describe(&self, state: &State) -> Vec<String>;

    /// Header line plus indented action lines.
    fn report(&self, state: &State) -> Vec<String> {
        let mut out = vec![format!("Plan for \"{}\" operation:", self.name())];
        if self.is_empty() {
            out.push("  no difference".to_string());
        } else {
            out.extend(self.describe(state).into_iter().map(|l| format!("  {l}")));
        }
        out
    }
}
