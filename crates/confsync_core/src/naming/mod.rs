//! Naming: templates, path generation, inverse matching and the registry
//! that keeps generated paths unique.

mod generator;
mod paths;
mod registry;
mod template;

pub use generator::{
    MatchedDir, PathGenerator, BLOCKS_DIR, CODE_FILE_NAME, CONFIG_FILE, DEFAULT_BRANCH_DIR,
    DESCRIPTION_FILE, META_FILE,
};
pub use paths::{path_parent_key, GeneratedPath, PathsGenerator};
pub use registry::NamingRegistry;
pub use template::{match_path, normalize_name, render, NamingTemplate};
