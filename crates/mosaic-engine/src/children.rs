//! Pure helpers over the `children` section of an instance config.
//!
//! Canonically `children` is an object mapping slot names to arrays of
//! child specs. A bare array is accepted as legacy shorthand for the
//! `default` slot; mutation helpers normalize it before editing.

use serde_json::{Map, Value};

use mosaic_core::{ChildSpec, CHILDREN_KEY, DEFAULT_SLOT};

/// Extract the child specs of one slot. Tolerates a missing or malformed
/// `children` section and individual entries that do not parse.
pub fn children_of(config: &Value, slot: &str) -> Vec<ChildSpec> {
    let entries = match config.get(CHILDREN_KEY) {
        Some(Value::Array(entries)) if slot == DEFAULT_SLOT => entries,
        Some(Value::Object(slots)) => match slots.get(slot) {
            Some(Value::Array(entries)) => entries,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect()
}

/// Slot names present in a config, in document order. A bare array
/// exposes the single `default` slot.
pub fn slots_of(config: &Value) -> Vec<String> {
    match config.get(CHILDREN_KEY) {
        Some(Value::Array(_)) => vec![DEFAULT_SLOT.to_string()],
        Some(Value::Object(slots)) => slots.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Rewrite a legacy bare-array `children` into `{"default": [...]}`.
/// Canonical and absent forms pass through untouched.
pub fn normalize_children(config: &mut Value) {
    let Some(children) = config.get_mut(CHILDREN_KEY) else {
        return;
    };
    if children.is_array() {
        let entries = children.take();
        let mut slots = Map::new();
        slots.insert(DEFAULT_SLOT.to_string(), entries);
        *children = Value::Object(slots);
    }
}

/// Append a child to a slot, creating the slot (and the `children`
/// object) if needed.
pub fn append_child(config: &mut Value, slot: &str, child: &ChildSpec) {
    normalize_children(config);
    let Value::Object(root) = config else { return };
    let children = root
        .entry(CHILDREN_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    if !children.is_object() {
        *children = Value::Object(Map::new());
    }
    let Value::Object(slots) = children else { return };
    let slot_entries = slots
        .entry(slot)
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot_entries.is_array() {
        *slot_entries = Value::Array(Vec::new());
    }
    if let (Value::Array(entries), Ok(value)) =
        (slot_entries, serde_json::to_value(child))
    {
        entries.push(value);
    }
}

/// Remove the child at `index` within a slot. Returns false when the
/// slot or index does not exist.
pub fn remove_child(config: &mut Value, slot: &str, index: usize) -> bool {
    normalize_children(config);
    let Some(Value::Object(slots)) = config.get_mut(CHILDREN_KEY) else {
        return false;
    };
    let Some(Value::Array(entries)) = slots.get_mut(slot) else {
        return false;
    };
    if index >= entries.len() {
        return false;
    }
    entries.remove(index);
    true
}

/// Reorder a slot's children by the given permutation of current
/// indexes. Rejects (returns false, no change) anything that is not a
/// full permutation of `0..len`.
pub fn reorder_children(config: &mut Value, slot: &str, order: &[usize]) -> bool {
    normalize_children(config);
    let Some(Value::Object(slots)) = config.get_mut(CHILDREN_KEY) else {
        return false;
    };
    let Some(Value::Array(entries)) = slots.get_mut(slot) else {
        return false;
    };
    if order.len() != entries.len() {
        return false;
    }
    let mut seen = vec![false; entries.len()];
    for &i in order {
        if i >= entries.len() || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    let reordered: Vec<Value> = order.iter().map(|&i| entries[i].clone()).collect();
    *entries = reordered;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn children_of_reads_canonical_slots() {
        let config = json!({
            "children": {
                "default": [{"module": "button", "config": {"label": "Go"}}],
                "sidebar": [{"module": "nav"}]
            }
        });
        let main = children_of(&config, "default");
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].module.as_deref(), Some("button"));
        assert_eq!(children_of(&config, "sidebar").len(), 1);
        assert!(children_of(&config, "footer").is_empty());
    }

    #[test]
    fn children_of_accepts_bare_array_as_default_slot() {
        let config = json!({"children": [{"module": "button"}]});
        assert_eq!(children_of(&config, "default").len(), 1);
        assert!(children_of(&config, "sidebar").is_empty());
    }

    #[test]
    fn children_of_tolerates_garbage() {
        assert!(children_of(&json!({}), "default").is_empty());
        assert!(children_of(&json!({"children": 42}), "default").is_empty());
        assert!(children_of(&json!({"children": {"default": "nope"}}), "default").is_empty());
        // unparseable entries are skipped, not fatal
        let config = json!({"children": [{"module": "ok"}, 17]});
        assert_eq!(children_of(&config, "default").len(), 1);
    }

    #[test]
    fn normalize_wraps_bare_array() {
        let mut config = json!({"children": [{"module": "button"}]});
        normalize_children(&mut config);
        assert_eq!(config, json!({"children": {"default": [{"module": "button"}]}}));

        // idempotent on canonical form
        let before = config.clone();
        normalize_children(&mut config);
        assert_eq!(config, before);
    }

    #[test]
    fn append_creates_slot_on_demand() {
        let mut config = json!({"title": "Hi"});
        append_child(
            &mut config,
            "sidebar",
            &ChildSpec { module: Some("nav".into()), instance_name: None, config: json!({}) },
        );
        assert_eq!(children_of(&config, "sidebar").len(), 1);
        assert_eq!(config["title"], "Hi");
    }

    #[test]
    fn append_normalizes_legacy_form_first() {
        let mut config = json!({"children": [{"module": "a"}]});
        append_child(
            &mut config,
            "default",
            &ChildSpec { module: Some("b".into()), instance_name: None, config: json!({}) },
        );
        let specs = children_of(&config, "default");
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].module.as_deref(), Some("b"));
    }

    #[test]
    fn remove_by_index() {
        let mut config = json!({"children": {"default": [{"module": "a"}, {"module": "b"}]}});
        assert!(remove_child(&mut config, "default", 0));
        let specs = children_of(&config, "default");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].module.as_deref(), Some("b"));
        assert!(!remove_child(&mut config, "default", 5));
        assert!(!remove_child(&mut config, "missing", 0));
    }

    #[test]
    fn reorder_requires_full_permutation() {
        let mut config =
            json!({"children": {"default": [{"module": "a"}, {"module": "b"}, {"module": "c"}]}});
        let before = config.clone();

        assert!(!reorder_children(&mut config, "default", &[0, 1]));
        assert!(!reorder_children(&mut config, "default", &[0, 0, 1]));
        assert!(!reorder_children(&mut config, "default", &[0, 1, 3]));
        assert_eq!(config, before);

        assert!(reorder_children(&mut config, "default", &[2, 0, 1]));
        let specs = children_of(&config, "default");
        let modules: Vec<_> = specs.iter().map(|s| s.module.as_deref().unwrap()).collect();
        assert_eq!(modules, vec!["c", "a", "b"]);
    }

    #[test]
    fn slots_of_lists_slot_names() {
        assert_eq!(slots_of(&json!({})), Vec::<String>::new());
        assert_eq!(slots_of(&json!({"children": []})), vec!["default"]);
        let config = json!({"children": {"default": [], "sidebar": []}});
        assert_eq!(slots_of(&config), vec!["default", "sidebar"]);
    }
}
