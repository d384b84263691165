//! Pure configuration merger.
//!
//! Merge rules (deliberately shallow):
//! - Every key except `children` is replaced wholesale by the override
//!   when present; nested objects and arrays are not deep-merged.
//! - `children` is merged per slot: an overridden slot replaces the
//!   default slot entirely; untouched default slots survive.
//! - Same inputs always produce the same output.

use serde_json::{Map, Value};

use crate::model::CHILDREN_KEY;

/// Merge a module's default configuration with an instance's override.
///
/// Non-object inputs are tolerated: a non-object default contributes
/// nothing, a non-object override leaves the default in place.
pub fn merge_config(default: &Value, overrides: &Value) -> Value {
    let base = default.as_object().cloned().unwrap_or_default();
    let Some(over) = overrides.as_object() else {
        return Value::Object(base);
    };

    let mut out = base;
    for (key, value) in over {
        if key == CHILDREN_KEY {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }

    if let Some(children) = merge_children(default.get(CHILDREN_KEY), over.get(CHILDREN_KEY)) {
        out.insert(CHILDREN_KEY.to_string(), children);
    }

    Value::Object(out)
}

fn merge_children(default: Option<&Value>, overrides: Option<&Value>) -> Option<Value> {
    match (default, overrides) {
        (None, None) => None,
        (Some(d), None) => Some(d.clone()),
        (None, Some(o)) => Some(o.clone()),
        (Some(d), Some(o)) => match (d.as_object(), o.as_object()) {
            (Some(d_slots), Some(o_slots)) => {
                let mut out: Map<String, Value> = d_slots.clone();
                for (slot, children) in o_slots {
                    out.insert(slot.clone(), children.clone());
                }
                Some(Value::Object(out))
            }
            // Legacy bare-array children have no slot structure to merge.
            _ => Some(o.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn override_replaces_key_wholesale() {
        let default = json!({"title": "Default", "style": {"color": "red", "size": 12}});
        let over = json!({"style": {"color": "blue"}});
        let merged = merge_config(&default, &over);
        assert_eq!(merged["title"], "Default");
        // Shallow replace: "size" from the default object is gone.
        assert_eq!(merged["style"], json!({"color": "blue"}));
    }

    #[test]
    fn missing_override_key_keeps_default() {
        let default = json!({"a": 1, "b": 2});
        let over = json!({"b": 3});
        let merged = merge_config(&default, &over);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 3);
    }

    #[test]
    fn merge_is_deterministic() {
        let default = json!({"a": [1, 2], "children": {"main": [{"module": "x"}]}});
        let over = json!({"a": [3], "extra": true});
        let first = merge_config(&default, &over);
        let second = merge_config(&default, &over);
        assert_eq!(first, second);
    }

    #[test]
    fn children_merged_per_slot() {
        let default = json!({
            "children": {
                "header": [{"module": "logo"}],
                "body": [{"module": "text"}]
            }
        });
        let over = json!({
            "children": {
                "body": [{"module": "image"}]
            }
        });
        let merged = merge_config(&default, &over);
        assert_eq!(merged["children"]["header"], json!([{"module": "logo"}]));
        assert_eq!(merged["children"]["body"], json!([{"module": "image"}]));
    }

    #[test]
    fn children_slot_absent_in_override_keeps_default() {
        let default = json!({"children": {"main": [{"module": "a"}]}});
        let over = json!({"text": "hi"});
        let merged = merge_config(&default, &over);
        assert_eq!(merged["children"]["main"], json!([{"module": "a"}]));
        assert_eq!(merged["text"], "hi");
    }

    #[test]
    fn bare_array_children_override_replaces() {
        let default = json!({"children": {"main": [{"module": "a"}]}});
        let over = json!({"children": [{"module": "b"}]});
        let merged = merge_config(&default, &over);
        assert_eq!(merged["children"], json!([{"module": "b"}]));
    }

    #[test]
    fn non_object_inputs_tolerated() {
        assert_eq!(merge_config(&json!(null), &json!({"a": 1})), json!({"a": 1}));
        assert_eq!(merge_config(&json!({"a": 1}), &json!(null)), json!({"a": 1}));
        assert_eq!(merge_config(&json!(null), &json!(null)), json!({}));
    }
}
