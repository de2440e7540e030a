//! Component metadata.

use super::key::ComponentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Id of the shared code component.
pub const SHARED_CODE_COMPONENT_ID: &str = "keboola.shared-code";
/// Id of the variables component.
pub const VARIABLES_COMPONENT_ID: &str = "keboola.variables";
/// Component type of transformations.
pub const TRANSFORMATION_TYPE: &str = "transformation";
/// Component type used when the API does not know the component.
pub const UNKNOWN_TYPE: &str = "other";

/// A component as reported by the storage API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component id.
    pub id: ComponentId,
    /// Component type, e.g. `extractor` or `transformation`.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl Component {
    /// Creates a component.
    pub fn new(id: impl Into<ComponentId>, component_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            component_type: component_type.into(),
        }
    }

    /// Returns true for transformation components.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        self.component_type == TRANSFORMATION_TYPE
    }

    /// Returns true for the shared code component.
    #[must_use]
    pub fn is_shared_code(&self) -> bool {
        self.id.as_str() == SHARED_CODE_COMPONENT_ID
    }

    /// Returns true for the variables component.
    #[must_use]
    pub fn is_variables(&self) -> bool {
        self.id.as_str() == VARIABLES_COMPONENT_ID
    }
}

/// Extension of code files written for a component.
#[must_use]
pub fn code_file_ext(component_id: &str) -> &'static str {
    let suffix = component_id.rsplit('.').next().unwrap_or(component_id);
    let suffix = suffix.split('-').next().unwrap_or(suffix);
    match suffix {
        "snowflake" | "redshift" | "synapse" | "oracle" | "bigquery" => "sql",
        "python" => "py",
        "r" => "r",
        _ => "txt",
    }
}

/// Known components, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ComponentsMap {
    components: BTreeMap<ComponentId, Component>,
}

impl ComponentsMap {
    /// Creates a map from a list of components.
    pub fn new(components: impl IntoIterator<Item = Component>) -> Self {
        let mut map = Self::default();
        for c in components {
            map.insert(c);
        }
        map
    }

    /// Adds or replaces a component.
    pub fn insert(&mut self, component: Component) {
        self.components.insert(component.id.clone(), component);
    }

    /// Looks a component up.
    #[must_use]
    pub fn get(&self, id: &ComponentId) -> Option<&Component> {
        self.components.get(id)
    }

    /// Looks a component up, falling back to an untyped placeholder.
    #[must_use]
    pub fn get_or_unknown(&self, id: &ComponentId) -> Component {
        self.get(id)
            .cloned()
            .unwrap_or_else(|| Component::new(id.clone(), UNKNOWN_TYPE))
    }

    /// Number of known components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if no component is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_extensions() {
        assert_eq!(code_file_ext("keboola.snowflake-transformation"), "sql");
        assert_eq!(code_file_ext("keboola.python-transformation-v2"), "py");
        assert_eq!(code_file_ext("keboola.r-transformation"), "r");
        assert_eq!(code_file_ext("keboola.something"), "txt");
    }

    #[test]
    fn unknown_component_fallback() {
        let map = ComponentsMap::new([Component::new("ex", "extractor")]);
        assert_eq!(map.get_or_unknown(&"ex".into()).component_type, "extractor");
        assert_eq!(map.get_or_unknown(&"nope".into()).component_type, UNKNOWN_TYPE);
    }
}
