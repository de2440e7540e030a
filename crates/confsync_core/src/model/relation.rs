//! Relations between configs.

use super::key::{BranchId, ComponentId, ConfigId, ConfigKey, Key};
use serde::{Deserialize, Serialize};

/// A typed link from one object to another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Relation {
    /// Held by a variables config: the config that uses it.
    #[serde(rename_all = "camelCase")]
    VariablesFor {
        /// Component of the owner config.
        component_id: ComponentId,
        /// Id of the owner config.
        config_id: ConfigId,
    },
    /// Held by a config: the variables config it reads values from.
    #[serde(rename_all = "camelCase")]
    VariablesFrom {
        /// Id of the variables config.
        config_id: ConfigId,
    },
    /// Held by a transformation: the shared code config it includes.
    #[serde(rename_all = "camelCase")]
    UsesSharedCode {
        /// Id of the shared code config.
        config_id: ConfigId,
    },
}

impl Relation {
    /// Returns true if the relation is written to `meta.json`.
    ///
    /// `VariablesFrom` is derived from the owner's content and the other
    /// side's `VariablesFor`, so it never hits the disk.
    #[must_use]
    pub fn is_stored_locally(&self) -> bool {
        !matches!(self, Relation::VariablesFrom { .. })
    }

    /// Returns true if the relation is mapped into remote content.
    #[must_use]
    pub fn is_stored_remotely(&self) -> bool {
        !matches!(self, Relation::VariablesFor { .. })
    }

    /// Key of the config whose directory contains the relation holder.
    #[must_use]
    pub fn parent_key(&self, branch_id: &BranchId) -> Option<Key> {
        match self {
            Relation::VariablesFor {
                component_id,
                config_id,
            } => Some(Key::Config(ConfigKey {
                branch_id: branch_id.clone(),
                component_id: component_id.clone(),
                id: config_id.clone(),
            })),
            _ => None,
        }
    }
}

/// Set of relations of an object, kept sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relations(Vec<Relation>);

impl Relations {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a relation unless it is already present.
    pub fn add(&mut self, relation: Relation) {
        if let Err(pos) = self.0.binary_search(&relation) {
            self.0.insert(pos, relation);
        }
    }

    /// Removes all relations matching the predicate.
    pub fn remove_where<F: Fn(&Relation) -> bool>(&mut self, f: F) {
        self.0.retain(|r| !f(r));
    }

    /// Iterates the relations.
    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.0.iter()
    }

    /// Returns true if there are no relations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Relations persisted locally.
    #[must_use]
    pub fn only_stored_locally(&self) -> Relations {
        Relations(self.0.iter().filter(|r| r.is_stored_locally()).cloned().collect())
    }

    /// Relations mapped to remote content.
    #[must_use]
    pub fn only_stored_remotely(&self) -> Relations {
        Relations(self.0.iter().filter(|r| r.is_stored_remotely()).cloned().collect())
    }

    /// First `VariablesFor` relation.
    #[must_use]
    pub fn variables_for(&self) -> Option<&Relation> {
        self.0
            .iter()
            .find(|r| matches!(r, Relation::VariablesFor { .. }))
    }
}

impl FromIterator<Relation> for Relations {
    fn from_iter<I: IntoIterator<Item = Relation>>(iter: I) -> Self {
        let mut out = Relations::new();
        for r in iter {
            out.add(r);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relations_stay_sorted_and_unique() {
        let mut rel = Relations::new();
        rel.add(Relation::UsesSharedCode {
            config_id: "2".into(),
        });
        rel.add(Relation::VariablesFrom {
            config_id: "1".into(),
        });
        rel.add(Relation::VariablesFrom {
            config_id: "1".into(),
        });
        assert_eq!(rel.iter().count(), 2);
        assert!(matches!(
            rel.iter().next(),
            Some(Relation::VariablesFrom { .. })
        ));
    }

    #[test]
    fn meta_json_form() {
        let rel = Relation::VariablesFor {
            component_id: "keboola.ex-db".into(),
            config_id: "7".into(),
        };
        let json = serde_json::to_string(&rel).unwrap();
        assert_eq!(
            json,
            r#"{"type":"variablesFor","componentId":"keboola.ex-db","configId":"7"}"#
        );
        assert!(rel.is_stored_locally());
        assert!(!rel.is_stored_remotely());
    }
}
