//! RFC-7386 JSON merge-patch.
//!
//! This intentionally differs from a plain deep merge: a `null` in the patch
//! *deletes* the corresponding base key (a deep merge would skip it). That
//! is what lets a profile explicitly unset a template value.

use serde_json::{Map, Value};

/// Apply an RFC-7386 merge-patch to `base`.
///
/// - Object patches recurse per key; `null` entries delete the key.
/// - Non-object patches (including arrays) replace the base outright.
/// - An empty object patch returns a deep copy of `base` — callers never
///   observe mutation of a cached base document.
#[must_use]
pub fn merge_patch(base: &Value, patch: &Value) -> Value {
    match patch {
        Value::Object(patch_map) => {
            let mut target = match base {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    let _ = target.remove(key);
                } else {
                    let merged = match target.get(key) {
                        Some(base_val) => merge_patch(base_val, patch_val),
                        None => merge_patch(&Value::Null, patch_val),
                    };
                    let _ = target.insert(key.clone(), merged);
                }
            }
            Value::Object(target)
        }
        other => other.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_patch_is_deep_copy() {
        let base = json!({"a": 1, "b": {"c": [1, 2]}});
        let merged = merge_patch(&base, &json!({}));
        assert_eq!(merged, base);
    }

    #[test]
    fn simple_override() {
        let merged = merge_patch(&json!({"a": 1, "b": 2}), &json!({"a": 10}));
        assert_eq!(merged, json!({"a": 10, "b": 2}));
    }

    #[test]
    fn nested_override_preserves_siblings() {
        let base = json!({"llm": {"model": "gpt-4o", "temperature": 0.3}});
        let patch = json!({"llm": {"model": "gpt-4o-mini"}});
        let merged = merge_patch(&base, &patch);
        assert_eq!(merged["llm"]["model"], "gpt-4o-mini");
        assert_eq!(merged["llm"]["temperature"], 0.3);
    }

    #[test]
    fn null_deletes_key() {
        let merged = merge_patch(&json!({"a": 1, "b": 2}), &json!({"a": null}));
        assert_eq!(merged, json!({"b": 2}));
    }

    #[test]
    fn null_deletes_nested_key() {
        let base = json!({"actuator_config": {"UIComponents": {"request": {}, "response": {}}}});
        let patch = json!({"actuator_config": {"UIComponents": {"request": null}}});
        let merged = merge_patch(&base, &patch);
        assert!(merged["actuator_config"]["UIComponents"].get("request").is_none());
        assert!(merged["actuator_config"]["UIComponents"].get("response").is_some());
    }

    #[test]
    fn null_for_absent_key_is_noop() {
        let merged = merge_patch(&json!({"a": 1}), &json!({"zzz": null}));
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn arrays_replace_wholesale() {
        let merged = merge_patch(&json!({"tags": [1, 2, 3]}), &json!({"tags": [9]}));
        assert_eq!(merged, json!({"tags": [9]}));
    }

    #[test]
    fn scalar_patch_replaces_object_base() {
        let merged = merge_patch(&json!({"a": {"deep": true}}), &json!(42));
        assert_eq!(merged, json!(42));
    }

    #[test]
    fn object_patch_replaces_scalar_base() {
        let merged = merge_patch(&json!("flat"), &json!({"a": 1}));
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn base_is_not_mutated() {
        let base = json!({"a": {"b": 1}});
        let before = base.clone();
        let _ = merge_patch(&base, &json!({"a": {"b": 2}}));
        assert_eq!(base, before);
    }

    // ── algebraic laws ──────────────────────────────────────────────

    mod laws {
        use super::*;
        use proptest::prelude::*;

        /// Strategy producing arbitrary JSON values of bounded depth.
        fn arb_json() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(|n| json!(n)),
                "[a-z]{0,8}".prop_map(Value::String),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    prop::collection::hash_map("[a-z]{1,6}", inner, 0..4).prop_map(|m| {
                        Value::Object(m.into_iter().collect())
                    }),
                ]
            })
        }

        proptest! {
            #[test]
            fn empty_patch_is_identity(base in arb_json()) {
                let merged = merge_patch(&base, &json!({}));
                if base.is_object() {
                    prop_assert_eq!(merged, base);
                } else {
                    // Non-object bases are replaced by the (empty) object patch
                    // per RFC 7386.
                    prop_assert_eq!(merged, json!({}));
                }
            }

            #[test]
            fn merge_is_deterministic(base in arb_json(), patch in arb_json()) {
                prop_assert_eq!(merge_patch(&base, &patch), merge_patch(&base, &patch));
            }

            #[test]
            fn null_patch_keys_never_survive(base in arb_json(), key in "[a-z]{1,6}") {
                let patch = json!({ key.clone(): null });
                let merged = merge_patch(&base, &patch);
                prop_assert!(merged.get(key.as_str()).is_none());
            }
        }
    }
}
