//! Naming templates and the inverse path matcher.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Templates used to generate object paths.
///
/// Placeholders are written as `{name}`; numeric placeholders accept a
/// zero-padding width, e.g. `{block_order:03}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamingTemplate {
    /// Branch directory, relative to the project root.
    pub branch: String,
    /// Config directory, relative to its branch.
    pub config: String,
    /// Row directory, relative to its config.
    pub config_row: String,
    /// Shared code config directory, relative to its branch.
    pub shared_code_config: String,
    /// Shared code row directory, relative to its config.
    pub shared_code_config_row: String,
    /// Variables config directory, relative to the config that uses it.
    pub variables_config: String,
    /// Variables values row directory, relative to the variables config.
    pub variables_values_row: String,
    /// Transformation block directory, relative to its config.
    pub block: String,
    /// Transformation code directory, relative to its block.
    pub code: String,
}

impl Default for NamingTemplate {
    fn default() -> Self {
        Self {
            branch: "{branch_id}-{branch_name}".to_string(),
            config: "{component_type}/{component_id}/{config_name}".to_string(),
            config_row: "rows/{config_row_name}".to_string(),
            shared_code_config: "_shared/{target_component_id}".to_string(),
            shared_code_config_row: "codes/{config_row_name}".to_string(),
            variables_config: "variables".to_string(),
            variables_values_row: "values/{config_row_name}".to_string(),
            block: "blocks/{block_order:03}-{block_name}".to_string(),
            code: "{code_order:03}-{code_name}".to_string(),
        }
    }
}

/// Normalizes a name for use in a path: lowercase ASCII alphanumerics
/// joined by single dashes.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Replaces placeholders in `template` with the given values.
///
/// Unknown placeholders are left untouched.
#[must_use]
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('}') else {
            rest = &rest[start..];
            break;
        };
        let inner = &rest[start + 1..start + len];
        let (name, width) = match inner.split_once(':') {
            Some((name, fmt)) => (name, fmt.parse::<usize>().ok()),
            None => (inner, None),
        };
        match values.iter().find(|(k, _)| *k == name) {
            Some((_, value)) => match width {
                Some(w) if value.chars().all(|c| c.is_ascii_digit()) => {
                    out.push_str(&format!("{value:0>w$}"));
                }
                _ => out.push_str(value),
            },
            None => out.push_str(&rest[start..=start + len]),
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

/// One parsed template segment.
#[derive(Debug)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder {
        prefix: &'a str,
        name: &'a str,
        suffix: &'a str,
    },
    /// Several placeholders in one segment; matches any non-empty value.
    Compound,
}

fn parse_segment(segment: &str) -> Segment<'_> {
    let opens = segment.matches('{').count();
    match opens {
        0 => Segment::Literal(segment),
        1 => {
            let (Some(start), Some(end)) = (segment.find('{'), segment.find('}')) else {
                return Segment::Literal(segment);
            };
            if end < start {
                return Segment::Literal(segment);
            }
            let inner = &segment[start + 1..end];
            let name = inner.split(':').next().unwrap_or(inner);
            Segment::Placeholder {
                prefix: &segment[..start],
                name,
                suffix: &segment[end + 1..],
            }
        }
        _ => Segment::Compound,
    }
}

/// Matches `path` against `template` segment by segment.
///
/// Returns the captured placeholder values, or `None` if the number of
/// segments differs or a literal part does not match.
#[must_use]
pub fn match_path(template: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let t_segments: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
    let p_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if t_segments.len() != p_segments.len() {
        return None;
    }
    let mut captures = BTreeMap::new();
    for (t, p) in t_segments.iter().zip(&p_segments) {
        match parse_segment(t) {
            Segment::Literal(lit) => {
                if lit != *p {
                    return None;
                }
            }
            Segment::Placeholder {
                prefix,
                name,
                suffix,
            } => {
                let value = p.strip_prefix(prefix)?.strip_suffix(suffix)?;
                if value.is_empty() {
                    return None;
                }
                captures.insert(name.to_string(), value.to_string());
            }
            Segment::Compound => {
                if p.is_empty() {
                    return None;
                }
            }
        }
    }
    Some(captures)
}
