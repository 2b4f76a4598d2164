//! Typed read access to loosely-typed JSON property bags.

use serde_json::Value;

/// A resolved property bag (document JSON object).
pub type Props = serde_json::Map<String, Value>;

/// Shape-checked accessors over [`Props`].
///
/// Every accessor returns `None` when the key is missing or has the wrong shape, so callers can
/// fall back to a default instead of failing.
pub trait PropsExt {
    fn value(&self, key: &str) -> Option<&Value>;

    fn num(&self, key: &str) -> Option<f64> {
        self.value(key).and_then(as_num)
    }

    fn string(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(Value::as_bool)
    }

    fn object(&self, key: &str) -> Option<&Props> {
        self.value(key).and_then(Value::as_object)
    }

    fn array(&self, key: &str) -> Option<&Vec<Value>> {
        self.value(key).and_then(Value::as_array)
    }

    /// Two numbers given as a `[a, b]` array.
    fn num_pair(&self, key: &str) -> Option<(f64, f64)> {
        self.value(key).and_then(as_num_pair)
    }

    /// First present key among `keys` (legacy aliases).
    fn any_of(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.value(k))
    }
}

impl PropsExt for Props {
    fn value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

/// Numbers, or strings holding a plain number.
pub fn as_num(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn as_num_pair(v: &Value) -> Option<(f64, f64)> {
    let arr = v.as_array()?;
    if arr.len() < 2 {
        return None;
    }
    Some((as_num(&arr[0])?, as_num(&arr[1])?))
}

/// Pick a localized string: plain strings pass through, objects are keyed by language id with
/// `"*"` as the fallback key, then any entry.
pub fn localized<'a>(v: &'a Value, lang: Option<&str>) -> Option<&'a str> {
    match v {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => lang
            .and_then(|l| map.get(l))
            .or_else(|| map.get("*"))
            .or_else(|| map.values().next())
            .and_then(Value::as_str),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/props.rs"]
mod tests;
