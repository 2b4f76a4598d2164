use super::*;
use serde_json::json;

fn bag(v: Value) -> Props {
    v.as_object().cloned().unwrap()
}

#[test]
fn accessors_reject_wrong_shapes() {
    let p = bag(json!({"n": 3, "s": "x", "b": true, "o": {}, "a": [1, 2], "ns": "4.5"}));
    assert_eq!(p.num("n"), Some(3.0));
    assert_eq!(p.num("ns"), Some(4.5));
    assert_eq!(p.num("s"), None);
    assert_eq!(p.string("n"), None);
    assert_eq!(p.flag("b"), Some(true));
    assert!(p.object("o").is_some());
    assert!(p.object("a").is_none());
    assert_eq!(p.num_pair("a"), Some((1.0, 2.0)));
    assert_eq!(p.num_pair("missing"), None);
}

#[test]
fn any_of_prefers_first_key() {
    let p = bag(json!({"scene": "old", "template": "new"}));
    assert_eq!(
        p.any_of(&["template", "scene"]).and_then(Value::as_str),
        Some("new")
    );
    let p = bag(json!({"scene": "old"}));
    assert_eq!(
        p.any_of(&["template", "scene"]).and_then(Value::as_str),
        Some("old")
    );
}

#[test]
fn localized_falls_back_to_star() {
    let v = json!({"*": "hello", "ja": "konnichiwa"});
    assert_eq!(localized(&v, Some("ja")), Some("konnichiwa"));
    assert_eq!(localized(&v, Some("fr")), Some("hello"));
    assert_eq!(localized(&json!("plain"), Some("ja")), Some("plain"));
    assert_eq!(localized(&json!(1), None), None);
}
