use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A piece's (or line's) arbitrary metadata: a JSON object of scalars
/// and nested objects. Spec §3 calls this "an optional map of
/// arbitrary JSON-like attributes".
pub type Meta = Map<String, Value>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

/// A single JSON-Patch-style operation produced by `merge_meta` (spec
/// §4.4). `value` is absent for `Remove`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    pub op: PatchOp,
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Patch {
    fn replace(path: Vec<String>, value: Value) -> Patch {
        Patch {
            op: PatchOp::Replace,
            path,
            value: Some(value),
        }
    }

    fn add(path: Vec<String>, value: Value) -> Patch {
        Patch {
            op: PatchOp::Add,
            path,
            value: Some(value),
        }
    }

    fn remove(path: Vec<String>) -> Patch {
        Patch {
            op: PatchOp::Remove,
            path,
            value: None,
        }
    }
}

/// Deep-merges `source` onto a copy of `target`, returning the merged
/// map plus the forward and inverse patch lists (spec §4.4).
///
/// Patch order is deterministic: within an object, nested objects
/// present on both sides are fully recursed (in `source`'s insertion
/// order) before any sibling scalar of the enclosing object is
/// emitted — see spec §8 scenario S4.
pub fn merge_meta(target: &Meta, source: &Meta) -> (Meta, Vec<Patch>, Vec<Patch>) {
    merge_at(target, source, &[])
}

fn merge_at(target: &Meta, source: &Meta, path: &[String]) -> (Meta, Vec<Patch>, Vec<Patch>) {
    let mut merged = target.clone();
    let mut forward = Vec::new();
    let mut inverse = Vec::new();

    let mut nested_keys = Vec::new();
    let mut scalar_keys = Vec::new();
    for key in source.keys() {
        let both_objects = matches!(target.get(key), Some(Value::Object(_)))
            && matches!(source.get(key), Some(Value::Object(_)));
        if both_objects {
            nested_keys.push(key.clone());
        } else {
            scalar_keys.push(key.clone());
        }
    }

    for key in nested_keys {
        let t_child = target[&key].as_object().unwrap();
        let s_child = source[&key].as_object().unwrap();

        let mut child_path = path.to_vec();
        child_path.push(key.clone());

        let (merged_child, fwd, inv) = merge_at(t_child, s_child, &child_path);
        merged.insert(key, Value::Object(merged_child));
        forward.extend(fwd);
        inverse.extend(inv);
    }

    for key in scalar_keys {
        let new_value = source[&key].clone();
        let mut full_path = path.to_vec();
        full_path.push(key.clone());

        match target.get(&key) {
            Some(old_value) if *old_value == new_value => {}
            Some(old_value) => {
                forward.push(Patch::replace(full_path.clone(), new_value.clone()));
                inverse.push(Patch::replace(full_path, old_value.clone()));
                merged.insert(key, new_value);
            }
            None => {
                forward.push(Patch::add(full_path.clone(), new_value.clone()));
                inverse.push(Patch::remove(full_path));
                merged.insert(key, new_value);
            }
        }
    }

    (merged, forward, inverse)
}

/// Applies `patches` to `meta` in place. Used to replay `inversePatches`
/// (or redo a format) without recomputing a diff — spec §4.5
/// `FormatChange⁻¹`.
pub fn apply_patches(meta: &mut Meta, patches: &[Patch]) {
    for patch in patches {
        apply_one(meta, patch);
    }
}

fn apply_one(meta: &mut Meta, patch: &Patch) {
    let Some((last, parents)) = patch.path.split_last() else {
        return;
    };

    let mut current = meta;
    for key in parents {
        let Some(Value::Object(next)) = current.get_mut(key) else {
            return;
        };
        current = next;
    }

    match patch.op {
        PatchOp::Add | PatchOp::Replace => {
            if let Some(value) = &patch.value {
                current.insert(last.clone(), value.clone());
            }
        }
        PatchOp::Remove => {
            current.remove(last);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Meta {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn merge_patches_match_scenario_s4() {
        let target = obj(json!({"age": 10, "obj": {"color": 10}}));
        let source = obj(json!({"age": 11, "obj": {"color": 11, "ss": 10}}));

        let (merged, forward, inverse) = merge_meta(&target, &source);

        assert_eq!(merged, obj(json!({"age": 11, "obj": {"color": 11, "ss": 10}})));
        assert_eq!(
            forward,
            vec![
                Patch::replace(vec!["obj".into(), "color".into()], json!(11)),
                Patch::add(vec!["obj".into(), "ss".into()], json!(10)),
                Patch::replace(vec!["age".into()], json!(11)),
            ]
        );
        assert_eq!(
            inverse,
            vec![
                Patch::replace(vec!["obj".into(), "color".into()], json!(10)),
                Patch::remove(vec!["obj".into(), "ss".into()]),
                Patch::replace(vec!["age".into()], json!(10)),
            ]
        );
    }

    #[test]
    fn round_trip_via_inverse_patches() {
        let target = obj(json!({"age": 10, "obj": {"color": 10}}));
        let source = obj(json!({"age": 11, "obj": {"color": 11, "ss": 10}}));

        let (mut merged, _, inverse) = merge_meta(&target, &source);
        apply_patches(&mut merged, &inverse);

        assert_eq!(merged, target);
    }

    #[test]
    fn equal_values_produce_no_patch() {
        let target = obj(json!({"a": 1}));
        let source = obj(json!({"a": 1}));
        let (merged, forward, inverse) = merge_meta(&target, &source);
        assert!(forward.is_empty());
        assert!(inverse.is_empty());
        assert_eq!(merged, target);
    }
}
