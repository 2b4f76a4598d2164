//! Property inheritance: deep-merge an element/page's own bag over a named template's bag.
//!
//! Rules, per key of `base`:
//! - key missing in `own`: taken from `base`;
//! - both arrays of objects: merged by string `id`, anchored on `base` order; matches are merged
//!   recursively in place (own wins), unmatched own items are appended;
//! - both objects: shallow merge, own wins per key;
//! - anything else: own wins.
//!
//! Duplicate ids pair up in order of occurrence: the k-th own item with id `x` merges into the
//! k-th base item with id `x`, surplus own items are appended. An id-less own item deep-equal to
//! an unclaimed id-less base item counts as already present. Together this keeps
//! `merge(&merge(a, b), b) == merge(a, b)`.
//!
//! The merge is not commutative.

use std::collections::HashMap;

use serde_json::Value;

use crate::foundation::props::Props;

/// Resolve `own` over `base`. With no base the own bag is returned unchanged.
pub fn merge(own: &Props, base: Option<&Props>) -> Props {
    let Some(base) = base else {
        return own.clone();
    };

    let mut out = own.clone();
    for (key, base_value) in base {
        let Some(own_value) = out.get_mut(key) else {
            out.insert(key.clone(), base_value.clone());
            continue;
        };

        if let (Some(own_items), Some(base_items)) =
            (object_items(own_value), object_items(base_value))
        {
            let merged = merge_arrays(&own_items, &base_items);
            *own_value = Value::Array(merged.into_iter().map(Value::Object).collect());
        } else if let (Value::Object(own_obj), Value::Object(base_obj)) = (&*own_value, base_value)
        {
            let mut merged = base_obj.clone();
            for (k, v) in own_obj {
                merged.insert(k.clone(), v.clone());
            }
            *own_value = Value::Object(merged);
        }
    }
    out
}

fn object_items(v: &Value) -> Option<Vec<&Props>> {
    v.as_array()?.iter().map(Value::as_object).collect()
}

fn item_id(item: &Props) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

fn merge_arrays(own: &[&Props], base: &[&Props]) -> Vec<Props> {
    let mut out: Vec<Props> = base.iter().map(|p| (*p).clone()).collect();
    let mut claimed = vec![false; base.len()];

    let mut slots_by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, item) in base.iter().enumerate() {
        if let Some(id) = item_id(item) {
            slots_by_id.entry(id).or_default().push(i);
        }
    }

    for item in own {
        match item_id(item) {
            Some(id) => {
                let slot = slots_by_id
                    .get(id)
                    .and_then(|slots| slots.iter().copied().find(|&i| !claimed[i]));
                match slot {
                    Some(i) => {
                        claimed[i] = true;
                        out[i] = merge(item, Some(base[i]));
                    }
                    None => out.push((*item).clone()),
                }
            }
            None => {
                let twin = (0..base.len())
                    .find(|&i| !claimed[i] && item_id(base[i]).is_none() && base[i] == *item);
                match twin {
                    Some(i) => claimed[i] = true,
                    None => out.push((*item).clone()),
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/model/inherit.rs"]
mod tests;
