//! Typed object keys.
//!
//! Every synchronized object is identified by a [`Key`]. Keys nest: a row key
//! carries the ids of its config and branch, so the parent chain can be
//! walked without touching the object graph.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an id from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the raw id.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true for an id that has not been assigned yet.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Remote id of a branch.
    BranchId
);
id_type!(
    /// Id of a component, e.g. `ex-generic-v2`.
    ComponentId
);
id_type!(
    /// Remote id of a config.
    ConfigId
);
id_type!(
    /// Remote id of a config row.
    RowId
);

/// Kind of an object: a human name and a short abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Kind {
    /// Human readable name.
    pub name: &'static str,
    /// One or two letter abbreviation.
    pub abbr: &'static str,
}

impl Kind {
    /// Branch kind.
    pub const BRANCH: Kind = Kind {
        name: "branch",
        abbr: "B",
    };
    /// Config kind.
    pub const CONFIG: Kind = Kind {
        name: "config",
        abbr: "C",
    };
    /// Config row kind.
    pub const CONFIG_ROW: Kind = Kind {
        name: "config row",
        abbr: "R",
    };
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Key of a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchKey {
    /// Branch id.
    pub id: BranchId,
}

/// Key of a config.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigKey {
    /// Owning branch.
    pub branch_id: BranchId,
    /// Component of the config.
    pub component_id: ComponentId,
    /// Config id, empty until a ticket is resolved.
    pub id: ConfigId,
}

/// Key of a config row.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigRowKey {
    /// Owning branch.
    pub branch_id: BranchId,
    /// Component of the parent config.
    pub component_id: ComponentId,
    /// Parent config id.
    pub config_id: ConfigId,
    /// Row id, empty until a ticket is resolved.
    pub id: RowId,
}

impl BranchKey {
    /// Creates a branch key.
    pub fn new(id: impl Into<BranchId>) -> Self {
        Self { id: id.into() }
    }
}

impl ConfigKey {
    /// Creates a config key.
    pub fn new(
        branch_id: impl Into<BranchId>,
        component_id: impl Into<ComponentId>,
        id: impl Into<ConfigId>,
    ) -> Self {
        Self {
            branch_id: branch_id.into(),
            component_id: component_id.into(),
            id: id.into(),
        }
    }

    /// Key of the owning branch.
    #[must_use]
    pub fn branch_key(&self) -> BranchKey {
        BranchKey {
            id: self.branch_id.clone(),
        }
    }
}

impl ConfigRowKey {
    /// Creates a config row key.
    pub fn new(
        branch_id: impl Into<BranchId>,
        component_id: impl Into<ComponentId>,
        config_id: impl Into<ConfigId>,
        id: impl Into<RowId>,
    ) -> Self {
        Self {
            branch_id: branch_id.into(),
            component_id: component_id.into(),
            config_id: config_id.into(),
            id: id.into(),
        }
    }

    /// Key of the parent config.
    #[must_use]
    pub fn config_key(&self) -> ConfigKey {
        ConfigKey {
            branch_id: self.branch_id.clone(),
            component_id: self.component_id.clone(),
            id: self.config_id.clone(),
        }
    }

    /// Key of the owning branch.
    #[must_use]
    pub fn branch_key(&self) -> BranchKey {
        BranchKey {
            id: self.branch_id.clone(),
        }
    }
}

/// Identifier of any synchronized object.
///
/// Ordering puts branches before configs before rows, so sorting keys
/// schedules parents before children.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    /// A branch.
    Branch(BranchKey),
    /// A config.
    Config(ConfigKey),
    /// A config row.
    ConfigRow(ConfigRowKey),
}

impl Key {
    /// Kind of the keyed object.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Key::Branch(_) => Kind::BRANCH,
            Key::Config(_) => Kind::CONFIG,
            Key::ConfigRow(_) => Kind::CONFIG_ROW,
        }
    }

    /// Hierarchy level, `1` for branches.
    #[must_use]
    pub fn level(&self) -> usize {
        match self {
            Key::Branch(_) => 1,
            Key::Config(_) => 2,
            Key::ConfigRow(_) => 3,
        }
    }

    /// Key of the structural parent, `None` for branches.
    #[must_use]
    pub fn parent_key(&self) -> Option<Key> {
        match self {
            Key::Branch(_) => None,
            Key::Config(k) => Some(Key::Branch(k.branch_key())),
            Key::ConfigRow(k) => Some(Key::Config(k.config_key())),
        }
    }

    /// Own id of the object.
    #[must_use]
    pub fn object_id(&self) -> &str {
        match self {
            Key::Branch(k) => k.id.as_str(),
            Key::Config(k) => k.id.as_str(),
            Key::ConfigRow(k) => k.id.as_str(),
        }
    }

    /// Id of the owning branch.
    #[must_use]
    pub fn branch_id(&self) -> &BranchId {
        match self {
            Key::Branch(k) => &k.id,
            Key::Config(k) => &k.branch_id,
            Key::ConfigRow(k) => &k.branch_id,
        }
    }

    /// Component of the object, `None` for branches.
    #[must_use]
    pub fn component_id(&self) -> Option<&ComponentId> {
        match self {
            Key::Branch(_) => None,
            Key::Config(k) => Some(&k.component_id),
            Key::ConfigRow(k) => Some(&k.component_id),
        }
    }

    /// Returns true if every id in the key is assigned.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self {
            Key::Branch(k) => !k.id.is_empty(),
            Key::Config(k) => {
                !k.branch_id.is_empty() && !k.component_id.is_empty() && !k.id.is_empty()
            }
            Key::ConfigRow(k) => {
                !k.branch_id.is_empty()
                    && !k.component_id.is_empty()
                    && !k.config_id.is_empty()
                    && !k.id.is_empty()
            }
        }
    }

    /// Human readable description, e.g. `config "branch:1/component:ex/config:2"`.
    #[must_use]
    pub fn desc(&self) -> String {
        format!("{} \"{}\"", self.kind().name, self)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Branch(k) => write!(f, "branch:{}", k.id),
            Key::Config(k) => write!(
                f,
                "branch:{}/component:{}/config:{}",
                k.branch_id, k.component_id, k.id
            ),
            Key::ConfigRow(k) => write!(
                f,
                "branch:{}/component:{}/config:{}/row:{}",
                k.branch_id, k.component_id, k.config_id, k.id
            ),
        }
    }
}

impl From<BranchKey> for Key {
    fn from(value: BranchKey) -> Self {
        Key::Branch(value)
    }
}

impl From<ConfigKey> for Key {
    fn from(value: ConfigKey) -> Self {
        Key::Config(value)
    }
}

impl From<ConfigRowKey> for Key {
    fn from(value: ConfigRowKey) -> Self {
        Key::ConfigRow(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_chain() {
        let row = Key::from(ConfigRowKey::new("1", "ex-generic-v2", "10", "100"));
        let config = row.parent_key().unwrap();
        assert_eq!(config, Key::from(ConfigKey::new("1", "ex-generic-v2", "10")));
        let branch = config.parent_key().unwrap();
        assert_eq!(branch, Key::from(BranchKey::new("1")));
        assert!(branch.parent_key().is_none());
    }

    #[test]
    fn string_form_is_stable() {
        let key = Key::from(ConfigRowKey::new("1", "ex", "10", "100"));
        assert_eq!(key.to_string(), "branch:1/component:ex/config:10/row:100");
        assert_eq!(key.kind().abbr, "R");
        assert_eq!(key.level(), 3);
    }

    #[test]
    fn ordering_puts_parents_first() {
        let mut keys = vec![
            Key::from(ConfigRowKey::new("1", "ex", "10", "100")),
            Key::from(ConfigKey::new("1", "ex", "10")),
            Key::from(BranchKey::new("1")),
        ];
        keys.sort();
        assert_eq!(keys[0].level(), 1);
        assert_eq!(keys[1].level(), 2);
        assert_eq!(keys[2].level(), 3);
    }

    #[test]
    fn incomplete_key() {
        assert!(!Key::from(ConfigKey::new("1", "ex", "")).is_complete());
        assert!(Key::from(ConfigKey::new("1", "ex", "5")).is_complete());
    }
}
