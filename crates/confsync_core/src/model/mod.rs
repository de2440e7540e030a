//! Object model: keys, objects, relations, components and manifest records.

pub mod component;
pub mod content;
pub mod key;
pub mod object;
pub mod record;
pub mod relation;

pub use component::{code_file_ext, Component, ComponentsMap};
pub use content::{Content, ContentPath, PathStep};
pub use key::{
    BranchId, BranchKey, ComponentId, ConfigId, ConfigKey, ConfigRowKey, Key, Kind, RowId,
};
pub use object::{Block, Branch, Code, Config, ConfigRow, Object, Transformation};
pub use record::{join_path, PathInProject, Record, RecordState};
pub use relation::{Relation, Relations};
