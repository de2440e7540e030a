//! JSON content helpers.
//!
//! Config and row content is an ordered JSON map. Comparison is
//! order-insensitive for object keys and positional for arrays.

use serde_json::{Map, Value};
use std::fmt;

/// Ordered JSON content of a config or row.
pub type Content = Map<String, Value>;

/// One step of a path into JSON content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathStep {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

/// Path into JSON content, rendered as `parameters.items[0].#secret`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentPath(Vec<PathStep>);

impl ContentPath {
    /// Empty path pointing at the root.
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new path with `step` appended.
    #[must_use]
    pub fn with(&self, step: PathStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }

    /// Steps of the path.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Last object key on the path.
    #[must_use]
    pub fn last_key(&self) -> Option<&str> {
        match self.0.last() {
            Some(PathStep::Key(k)) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Key(k) if i == 0 => f.write_str(k)?,
                PathStep::Key(k) => write!(f, ".{k}")?,
                PathStep::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// Visits every value in `content` depth-first, parents before children.
pub fn walk<F>(content: &Content, visit: &mut F)
where
    F: FnMut(&ContentPath, &Value),
{
    for (k, v) in content {
        walk_value(&ContentPath::root().with(PathStep::Key(k.clone())), v, visit);
    }
}

fn walk_value<F>(path: &ContentPath, value: &Value, visit: &mut F)
where
    F: FnMut(&ContentPath, &Value),
{
    visit(path, value);
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                walk_value(&path.with(PathStep::Key(k.clone())), v, visit);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                walk_value(&path.with(PathStep::Index(i)), v, visit);
            }
        }
        _ => {}
    }
}

/// Replaces the value at `path`. Returns false if the path does not exist.
pub fn set_path(content: &mut Content, path: &ContentPath, value: Value) -> bool {
    let Some((first, rest)) = path.steps().split_first() else {
        return false;
    };
    let PathStep::Key(first) = first else {
        return false;
    };
    let Some(mut current) = content.get_mut(first) else {
        return false;
    };
    for step in rest {
        current = match (step, current) {
            (PathStep::Key(k), Value::Object(map)) => match map.get_mut(k) {
                Some(v) => v,
                None => return false,
            },
            (PathStep::Index(i), Value::Array(items)) => match items.get_mut(*i) {
                Some(v) => v,
                None => return false,
            },
            _ => return false,
        };
    }
    *current = value;
    true
}

/// Returns true if both values are equal, ignoring object key order.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    // serde_json's map equality already compares by key lookup
    a == b
}

/// Lists paths where `a` and `b` differ, sorted.
///
/// Object keys present on only one side are reported at the key itself;
/// differing leaves are reported at the leaf.
#[must_use]
pub fn diff_paths(a: &Value, b: &Value) -> Vec<String> {
    let mut out = Vec::new();
    diff_into(&ContentPath::root(), a, b, &mut out);
    out.sort();
    out.dedup();
    out
}

fn diff_into(path: &ContentPath, a: &Value, b: &Value, out: &mut Vec<String>) {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            for (k, lv) in left {
                let child = path.with(PathStep::Key(k.clone()));
                match right.get(k) {
                    Some(rv) => diff_into(&child, lv, rv, out),
                    None => out.push(child.to_string()),
                }
            }
            for k in right.keys() {
                if !left.contains_key(k) {
                    out.push(path.with(PathStep::Key(k.clone())).to_string());
                }
            }
        }
        (Value::Array(left), Value::Array(right)) if left.len() == right.len() => {
            for (i, (lv, rv)) in left.iter().zip(right).enumerate() {
                diff_into(&path.with(PathStep::Index(i)), lv, rv, out);
            }
        }
        _ => {
            if a != b {
                out.push(path.to_string());
            }
        }
    }
}
