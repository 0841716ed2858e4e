//! Recursive merge of nested JSON configuration.

use serde_json::Value;

use crate::types::Map;

/// Merge `overrides` into `base`.
///
/// When both sides hold an object under the same key the objects are merged
/// recursively. Any other collision is resolved in favour of `overrides`.
pub fn deep_merge(base: &mut Map, overrides: &Map) {
    for (key, value) in overrides {
        match (base.get_mut(key), value) {
            (Some(Value::Object(target)), Value::Object(source)) => deep_merge(target, source),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Convenience wrapper returning a merged copy.
#[must_use]
pub fn merged(base: &Map, overrides: &Map) -> Map {
    let mut out = base.clone();
    deep_merge(&mut out, overrides);
    out
}
