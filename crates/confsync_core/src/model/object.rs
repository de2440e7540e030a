//! Typed objects synchronized between the project directory and the API.

use super::content::Content;
use super::key::{BranchKey, ConfigKey, ConfigRowKey, Key, Kind};
use super::relation::Relations;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A development branch of the project.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Key.
    pub key: BranchKey,
    /// Branch name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// The default (production) branch.
    pub is_default: bool,
}

/// A component configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Key.
    pub key: ConfigKey,
    /// Config name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Disabled configs are skipped by the orchestrator.
    pub is_disabled: bool,
    /// Content without fields mapped to typed values.
    pub content: Content,
    /// Blocks of a transformation config.
    pub transformation: Option<Transformation>,
    /// Links to other configs.
    pub relations: Relations,
}

/// A row of a config.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRow {
    /// Key.
    pub key: ConfigRowKey,
    /// Row name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Disabled rows are skipped by the orchestrator.
    pub is_disabled: bool,
    /// Row content.
    pub content: Content,
    /// Links to other configs.
    pub relations: Relations,
}

/// Blocks of a transformation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// Ordered blocks.
    pub blocks: Vec<Block>,
}

/// One block of a transformation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block name.
    pub name: String,
    /// Ordered codes.
    pub codes: Vec<Code>,
    /// Directory name under `blocks/`, set only for locally loaded blocks.
    #[serde(skip)]
    pub path: Option<String>,
}

/// One code of a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Code {
    /// Code name.
    pub name: String,
    /// Script, statements joined by an empty line.
    pub script: String,
    /// Directory name inside the block, set only for locally loaded codes.
    #[serde(skip)]
    pub path: Option<String>,
}

impl Transformation {
    /// Copy with local directory names removed.
    #[must_use]
    pub fn without_paths(&self) -> Transformation {
        Transformation {
            blocks: self
                .blocks
                .iter()
                .map(|b| Block {
                    name: b.name.clone(),
                    codes: b
                        .codes
                        .iter()
                        .map(|c| Code {
                            name: c.name.clone(),
                            script: c.script.clone(),
                            path: None,
                        })
                        .collect(),
                    path: None,
                })
                .collect(),
        }
    }
}

/// Any synchronized object.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// A branch.
    Branch(Branch),
    /// A config.
    Config(Config),
    /// A config row.
    ConfigRow(ConfigRow),
}

impl Object {
    /// Key of the object.
    #[must_use]
    pub fn key(&self) -> Key {
        match self {
            Object::Branch(o) => Key::Branch(o.key.clone()),
            Object::Config(o) => Key::Config(o.key.clone()),
            Object::ConfigRow(o) => Key::ConfigRow(o.key.clone()),
        }
    }

    /// Kind of the object.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.key().kind()
    }

    /// Name of the object.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Object::Branch(o) => &o.name,
            Object::Config(o) => &o.name,
            Object::ConfigRow(o) => &o.name,
        }
    }

    /// Description of the object.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Object::Branch(o) => &o.description,
            Object::Config(o) => &o.description,
            Object::ConfigRow(o) => &o.description,
        }
    }

    /// Content, `None` for branches.
    #[must_use]
    pub fn content(&self) -> Option<&Content> {
        match self {
            Object::Branch(_) => None,
            Object::Config(o) => Some(&o.content),
            Object::ConfigRow(o) => Some(&o.content),
        }
    }

    /// Mutable content, `None` for branches.
    pub fn content_mut(&mut self) -> Option<&mut Content> {
        match self {
            Object::Branch(_) => None,
            Object::Config(o) => Some(&mut o.content),
            Object::ConfigRow(o) => Some(&mut o.content),
        }
    }

    /// Relations, `None` for branches.
    #[must_use]
    pub fn relations(&self) -> Option<&Relations> {
        match self {
            Object::Branch(_) => None,
            Object::Config(o) => Some(&o.relations),
            Object::ConfigRow(o) => Some(&o.relations),
        }
    }

    /// Mutable relations, `None` for branches.
    pub fn relations_mut(&mut self) -> Option<&mut Relations> {
        match self {
            Object::Branch(_) => None,
            Object::Config(o) => Some(&mut o.relations),
            Object::ConfigRow(o) => Some(&mut o.relations),
        }
    }

    /// Returns true for the default branch.
    #[must_use]
    pub fn is_default_branch(&self) -> bool {
        matches!(self, Object::Branch(b) if b.is_default)
    }

    /// Replaces the key, used once a ticket assigns a new id.
    pub fn set_key(&mut self, key: Key) -> CoreResult<()> {
        match (self, key) {
            (Object::Branch(o), Key::Branch(k)) => o.key = k,
            (Object::Config(o), Key::Config(k)) => o.key = k,
            (Object::ConfigRow(o), Key::ConfigRow(k)) => o.key = k,
            (o, k) => {
                return Err(CoreError::invalid_operation(format!(
                    "cannot assign {} to {}",
                    k.desc(),
                    o.kind()
                )))
            }
        }
        Ok(())
    }

    /// Human readable description: kind, name and key.
    #[must_use]
    pub fn desc(&self) -> String {
        format!("{} \"{}\" ({})", self.kind(), self.name(), self.key())
    }

    /// Checks structural validity.
    pub fn validate(&self) -> CoreResult<()> {
        let key = self.key();
        if self.name().trim().is_empty() {
            return Err(CoreError::validation(key.desc(), "name is required"));
        }
        match self {
            Object::Branch(b) if b.key.id.is_empty() => {
                Err(CoreError::validation(key.desc(), "branch id is required"))
            }
            Object::Config(c) if c.key.component_id.is_empty() => {
                Err(CoreError::validation(key.desc(), "component id is required"))
            }
            Object::ConfigRow(r) if r.key.component_id.is_empty() => {
                Err(CoreError::validation(key.desc(), "component id is required"))
            }
            Object::Config(Config {
                transformation: Some(t),
                ..
            }) => {
                for (i, block) in t.blocks.iter().enumerate() {
                    if block.name.trim().is_empty() {
                        return Err(CoreError::validation(
                            key.desc(),
                            format!("block {} has no name", i + 1),
                        ));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Fields compared by the diff engine, as `(name, value)` pairs.
    ///
    /// Manifest-only data (paths, record state) is never part of the list.
    #[must_use]
    pub fn diff_fields(&self) -> Vec<(&'static str, Value)> {
        match self {
            Object::Branch(b) => vec![
                ("name", Value::String(b.name.clone())),
                ("description", Value::String(b.description.trim().to_string())),
            ],
            Object::Config(c) => {
                let mut fields = vec![
                    ("name", Value::String(c.name.clone())),
                    ("description", Value::String(c.description.trim().to_string())),
                    ("isDisabled", Value::Bool(c.is_disabled)),
                    ("configuration", Value::Object(c.content.clone())),
                    ("relations", relations_value(&c.relations)),
                ];
                if let Some(t) = &c.transformation {
                    fields.push((
                        "transformation",
                        serde_json::to_value(t.without_paths()).unwrap_or(Value::Null),
                    ));
                }
                fields
            }
            Object::ConfigRow(r) => vec![
                ("name", Value::String(r.name.clone())),
                ("description", Value::String(r.description.trim().to_string())),
                ("isDisabled", Value::Bool(r.is_disabled)),
                ("configuration", Value::Object(r.content.clone())),
                ("relations", relations_value(&r.relations)),
            ],
        }
    }
}

fn relations_value(relations: &Relations) -> Value {
    serde_json::to_value(relations).unwrap_or(Value::Null)
}

impl From<Branch> for Object {
    fn from(value: Branch) -> Self {
        Object::Branch(value)
    }
}

impl From<Config> for Object {
    fn from(value: Config) -> Self {
        Object::Config(value)
    }
}

impl From<ConfigRow> for Object {
    fn from(value: ConfigRow) -> Self {
        Object::ConfigRow(value)
    }
}

impl Config {
    /// Creates an empty config.
    pub fn new(key: ConfigKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            description: String::new(),
            is_disabled: false,
            content: Content::new(),
            transformation: None,
            relations: Relations::new(),
        }
    }

    /// Target component of a shared code config, read from content.
    #[must_use]
    pub fn shared_code_target(&self) -> Option<&str> {
        self.content.get("componentId").and_then(Value::as_str)
    }
}

impl ConfigRow {
    /// Creates an empty row.
    pub fn new(key: ConfigRowKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            description: String::new(),
            is_disabled: false,
            content: Content::new(),
            relations: Relations::new(),
        }
    }
}

impl Branch {
    /// Creates a branch.
    pub fn new(key: BranchKey, name: impl Into<String>, is_default: bool) -> Self {
        Self {
            key,
            name: name.into(),
            description: String::new(),
            is_default,
        }
    }
}
