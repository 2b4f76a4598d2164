use serde_json::json;

use super::*;

fn geo(v: Value, natural: Option<Size>, scale: f64) -> Geometry {
    resolve_geometry(v.as_object().unwrap(), Size::new(200.0, 400.0), natural, scale)
}

#[test]
fn explicit_numbers_are_scaled() {
    let g = geo(json!({"x": 10, "y": 20, "w": 30, "h": 40}), None, 2.0);
    assert_eq!(g.frame, Rect::new(20.0, 40.0, 80.0, 120.0));
    assert_eq!(g.anchor, Point::new(0.5, 0.5));
}

#[test]
fn percentages_use_the_container() {
    let g = geo(json!({"x": "10%", "y": "25%", "w": "50%", "h": "50%"}), None, 2.0);
    assert_eq!(g.frame, Rect::new(20.0, 100.0, 120.0, 300.0));
}

#[test]
fn keywords_place_against_container_edges() {
    let g = geo(json!({"x": "right", "y": "bottom", "w": 50, "h": 100}), None, 1.0);
    assert_eq!(g.frame.origin(), Point::new(150.0, 300.0));
    let g = geo(json!({"x": "center", "y": "center", "w": 50, "h": 100}), None, 1.0);
    assert_eq!(g.frame.origin(), Point::new(75.0, 150.0));
    let g = geo(json!({"x": "left", "y": "top", "w": 50, "h": 100}), None, 1.0);
    assert_eq!(g.frame.origin(), Point::ZERO);
}

#[test]
fn natural_size_fills_missing_dimensions() {
    let natural = Some(Size::new(40.0, 20.0));
    assert_eq!(geo(json!({}), natural, 2.0).frame.size(), Size::new(80.0, 40.0));
    assert_eq!(geo(json!({"w": 100}), natural, 1.0).frame.size(), Size::new(100.0, 50.0));
    assert_eq!(geo(json!({"h": 100}), natural, 1.0).frame.size(), Size::new(200.0, 100.0));
}

#[test]
fn without_natural_size_the_container_is_used() {
    assert_eq!(geo(json!({}), None, 1.0).frame.size(), Size::new(200.0, 400.0));
    assert_eq!(geo(json!({"w": 10}), None, 1.0).frame.size(), Size::new(10.0, 400.0));
}

#[test]
fn fill_covers_and_fit_contains() {
    let natural = Some(Size::new(100.0, 100.0));
    assert_eq!(
        geo(json!({"w": "fill"}), natural, 1.0).frame.size(),
        Size::new(400.0, 400.0)
    );
    assert_eq!(
        geo(json!({"h": "fit"}), natural, 1.0).frame.size(),
        Size::new(200.0, 200.0)
    );
    assert_eq!(
        geo(json!({"w": "fill"}), None, 1.0).frame.size(),
        Size::new(200.0, 400.0)
    );
}

#[test]
fn pos_places_the_center() {
    let g = geo(json!({"pos": ["50%", 100], "w": 20, "h": 10}), None, 1.0);
    assert_eq!(g.frame, Rect::new(90.0, 95.0, 110.0, 105.0));
}

#[test]
fn anchor_accepts_percentages_and_points() {
    let g = geo(json!({"w": 100, "h": 50, "anchor": ["0%", 25]}), None, 1.0);
    assert_eq!(g.anchor, Point::new(0.0, 0.5));
}

#[test]
fn malformed_values_fall_back_silently() {
    let g = geo(json!({"x": {"bogus": 1}, "w": "wide", "h": -5}), None, 1.0);
    assert_eq!(g.frame, Rect::new(0.0, 0.0, 200.0, 400.0));
}
