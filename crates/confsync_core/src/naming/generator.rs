//! Path generation for objects, blocks and codes.

use super::template::{match_path, normalize_name, render, NamingTemplate};
use crate::model::{
    code_file_ext, Block, Branch, Code, Component, ComponentId, Config, ConfigRow,
};

/// Directory of the default branch.
pub const DEFAULT_BRANCH_DIR: &str = "main";
/// Metadata file of every object.
pub const META_FILE: &str = "meta.json";
/// Content file of configs and rows.
pub const CONFIG_FILE: &str = "config.json";
/// Description file of every object.
pub const DESCRIPTION_FILE: &str = "description.md";
/// Directory of transformation blocks, relative to the config.
pub const BLOCKS_DIR: &str = "blocks";
/// Base name of code files.
pub const CODE_FILE_NAME: &str = "code";

/// Kind of a directory recognised by the inverse matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedDir {
    /// A config of the given component.
    Config {
        /// Component id taken from the path.
        component_id: ComponentId,
    },
    /// A config row.
    ConfigRow,
}

/// Generates object paths from a [`NamingTemplate`].
#[derive(Debug, Clone, Copy)]
pub struct PathGenerator<'a> {
    template: &'a NamingTemplate,
}

impl<'a> PathGenerator<'a> {
    /// Creates a generator over `template`.
    #[must_use]
    pub fn new(template: &'a NamingTemplate) -> Self {
        Self { template }
    }

    /// Branch directory, relative to the project root.
    #[must_use]
    pub fn branch_path(&self, branch: &Branch) -> String {
        if branch.is_default {
            return DEFAULT_BRANCH_DIR.to_string();
        }
        let name = name_or(&branch.name, "branch");
        render(
            &self.template.branch,
            &[
                ("branch_id", branch.key.id.as_str()),
                ("branch_name", name.as_str()),
            ],
        )
    }

    /// Config directory, relative to its parent directory.
    ///
    /// Variables configs live inside the config that uses them, shared code
    /// configs under the shared directory of their branch.
    #[must_use]
    pub fn config_path(&self, component: &Component, config: &Config) -> String {
        if component.is_variables() && config.relations.variables_for().is_some() {
            return render(&self.template.variables_config, &[]);
        }
        if component.is_shared_code() {
            if let Some(target) = config.shared_code_target() {
                return render(
                    &self.template.shared_code_config,
                    &[("target_component_id", target)],
                );
            }
        }
        let name = name_or(&config.name, "config");
        render(
            &self.template.config,
            &[
                ("component_type", component.component_type.as_str()),
                ("component_id", component.id.as_str()),
                ("config_name", name.as_str()),
            ],
        )
    }

    /// Row directory, relative to the parent config.
    #[must_use]
    pub fn row_path(&self, component: &Component, row: &ConfigRow) -> String {
        let name = row_name(row);
        let template = if component.is_shared_code() {
            &self.template.shared_code_config_row
        } else if component.is_variables() {
            &self.template.variables_values_row
        } else {
            &self.template.config_row
        };
        render(template, &[("config_row_name", name.as_str())])
    }

    /// Block directory, relative to the config. `index` is zero based.
    #[must_use]
    pub fn block_path(&self, index: usize, block: &Block) -> String {
        let order = (index + 1).to_string();
        let name = name_or(&block.name, "block");
        render(
            &self.template.block,
            &[("block_order", order.as_str()), ("block_name", name.as_str())],
        )
    }

    /// Code directory, relative to the block. `index` is zero based.
    #[must_use]
    pub fn code_path(&self, index: usize, code: &Code) -> String {
        let order = (index + 1).to_string();
        let name = name_or(&code.name, "code");
        render(
            &self.template.code,
            &[("code_order", order.as_str()), ("code_name", name.as_str())],
        )
    }

    /// Code file name for a component, e.g. `code.sql`.
    #[must_use]
    pub fn code_file_name(&self, component_id: &str) -> String {
        format!("{CODE_FILE_NAME}.{}", code_file_ext(component_id))
    }

    /// Recognises a directory, relative to a branch, as a config.
    #[must_use]
    pub fn match_config_dir(&self, relative: &str) -> Option<MatchedDir> {
        let captures = match_path(&self.template.config, relative)?;
        let component_id = captures.get("component_id")?;
        Some(MatchedDir::Config {
            component_id: ComponentId::new(component_id.clone()),
        })
    }

    /// Recognises a directory, relative to a config, as a row.
    #[must_use]
    pub fn match_row_dir(&self, component: &Component, relative: &str) -> Option<MatchedDir> {
        let template = if component.is_shared_code() {
            &self.template.shared_code_config_row
        } else if component.is_variables() {
            &self.template.variables_values_row
        } else {
            &self.template.config_row
        };
        match_path(template, relative).map(|_| MatchedDir::ConfigRow)
    }
}

fn name_or(name: &str, fallback: &str) -> String {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        fallback.to_string()
    } else {
        normalized
    }
}

/// Row name for paths: the row name, else the `name` content key, else `row`.
fn row_name(row: &ConfigRow) -> String {
    let from_name = normalize_name(&row.name);
    if !from_name.is_empty() {
        return from_name;
    }
    let from_content = row
        .content
        .get("name")
        .and_then(serde_json::Value::as_str)
        .map(normalize_name)
        .unwrap_or_default();
    if from_content.is_empty() {
        "row".to_string()
    } else {
        from_content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BranchKey, ConfigKey, ConfigRowKey, Relation};
    use serde_json::json;

    #[test]
    fn branch_paths() {
        let t = NamingTemplate::default();
        let g = PathGenerator::new(&t);
        assert_eq!(g.branch_path(&Branch::new(BranchKey::new("1"), "Main", true)), "main");
        assert_eq!(
            g.branch_path(&Branch::new(BranchKey::new("7"), "My Feature", false)),
            "7-my-feature"
        );
    }

    #[test]
    fn config_paths_by_component() {
        let t = NamingTemplate::default();
        let g = PathGenerator::new(&t);
        let ex = Component::new("ex-generic-v2", "extractor");
        let cfg = Config::new(ConfigKey::new("1", "ex-generic-v2", "2"), "New Config");
        assert_eq!(g.config_path(&ex, &cfg), "extractor/ex-generic-v2/new-config");

        let shared = Component::new("keboola.shared-code", "other");
        let mut cfg = Config::new(ConfigKey::new("1", "keboola.shared-code", "3"), "Shared");
        cfg.content
            .insert("componentId".into(), json!("keboola.python-transformation-v2"));
        assert_eq!(
            g.config_path(&shared, &cfg),
            "_shared/keboola.python-transformation-v2"
        );

        let vars = Component::new("keboola.variables", "other");
        let mut cfg = Config::new(ConfigKey::new("1", "keboola.variables", "4"), "Vars");
        cfg.relations.add(Relation::VariablesFor {
            component_id: "ex-generic-v2".into(),
            config_id: "2".into(),
        });
        assert_eq!(g.config_path(&vars, &cfg), "variables");
    }

    #[test]
    fn row_name_fallbacks() {
        let t = NamingTemplate::default();
        let g = PathGenerator::new(&t);
        let ex = Component::new("ex", "extractor");
        let mut row = ConfigRow::new(ConfigRowKey::new("1", "ex", "2", "3"), "");
        assert_eq!(g.row_path(&ex, &row), "rows/row");
        row.content.insert("name".into(), json!("From Content"));
        assert_eq!(g.row_path(&ex, &row), "rows/from-content");
        row.name = "Own Name".into();
        assert_eq!(g.row_path(&ex, &row), "rows/own-name");
    }

    #[test]
    fn blocks_and_codes() {
        let t = NamingTemplate::default();
        let g = PathGenerator::new(&t);
        let block = Block {
            name: "Load Data".into(),
            ..Block::default()
        };
        assert_eq!(g.block_path(0, &block), "blocks/001-load-data");
        let code = Code {
            name: "first".into(),
            ..Code::default()
        };
        assert_eq!(g.code_path(11, &code), "012-first");
        assert_eq!(g.code_file_name("keboola.snowflake-transformation"), "code.sql");
    }

    #[test]
    fn inverse_matching() {
        let t = NamingTemplate::default();
        let g = PathGenerator::new(&t);
        assert_eq!(
            g.match_config_dir("extractor/ex-generic-v2/new-config"),
            Some(MatchedDir::Config {
                component_id: "ex-generic-v2".into()
            })
        );
        assert_eq!(g.match_config_dir("extractor/ex-generic-v2"), None);
        let ex = Component::new("ex", "extractor");
        assert_eq!(g.match_row_dir(&ex, "rows/a"), Some(MatchedDir::ConfigRow));
        assert_eq!(g.match_row_dir(&ex, "codes/a"), None);
    }
}
