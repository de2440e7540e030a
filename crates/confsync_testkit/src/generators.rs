//! Property-based test generators using proptest.

use confsync_core::Content;
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for scalar JSON values.
pub fn json_leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for nested JSON values of bounded depth.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    json_leaf_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for object contents.
pub fn content_strategy() -> impl Strategy<Value = Content> {
    prop::collection::btree_map("[a-z_]{1,8}", json_value_strategy(), 0..6)
        .prop_map(|m| m.into_iter().collect())
}

/// Strategy for contents holding plaintext secrets under `#` keys.
pub fn secret_content_strategy() -> impl Strategy<Value = Content> {
    prop::collection::btree_map("#[a-z]{1,8}", "[a-z0-9]{1,12}", 1..4).prop_map(|m| {
        m.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    })
}

/// Strategy for object names, including characters that paths normalize.
pub fn object_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 _#.-]{0,23}").expect("Invalid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn secrets_are_marked(content in secret_content_strategy()) {
            prop_assert!(content.keys().all(|k| k.starts_with('#')));
        }

        #[test]
        fn names_are_not_empty(name in object_name_strategy()) {
            prop_assert!(!name.is_empty());
        }
    }
}
