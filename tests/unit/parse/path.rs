use super::*;
use kurbo::PathEl;

#[test]
fn absolute_and_relative_lines() {
    let p = parse_path("M10 10 L20 10 l0 10 h-10 v-10 Z", 1.0);
    let els = p.elements();
    assert_eq!(els[0], PathEl::MoveTo(Point::new(10.0, 10.0)));
    assert_eq!(els[1], PathEl::LineTo(Point::new(20.0, 10.0)));
    assert_eq!(els[2], PathEl::LineTo(Point::new(20.0, 20.0)));
    assert_eq!(els[3], PathEl::LineTo(Point::new(10.0, 20.0)));
    assert_eq!(els[4], PathEl::LineTo(Point::new(10.0, 10.0)));
    assert_eq!(els[5], PathEl::ClosePath);
}

#[test]
fn implicit_lineto_after_moveto() {
    let p = parse_path("M0,0 10,0 10,10", 1.0);
    assert_eq!(p.elements().len(), 3);
    assert_eq!(p.elements()[2], PathEl::LineTo(Point::new(10.0, 10.0)));
}

#[test]
fn compact_numbers_and_exponents() {
    let p = parse_path("M-1.5.5L1e1-2", 1.0);
    assert_eq!(p.elements()[0], PathEl::MoveTo(Point::new(-1.5, 0.5)));
    assert_eq!(p.elements()[1], PathEl::LineTo(Point::new(10.0, -2.0)));
}

#[test]
fn smooth_cubic_reflects_previous_control() {
    let p = parse_path("M0 0 C0 10 10 10 10 0 S20 -10 20 0", 1.0);
    match p.elements()[2] {
        PathEl::CurveTo(c1, _, end) => {
            assert_eq!(c1, Point::new(10.0, -10.0));
            assert_eq!(end, Point::new(20.0, 0.0));
        }
        ref other => panic!("expected curve, got {other:?}"),
    }
}

#[test]
fn arcs_become_cubics() {
    let p = parse_path("M0 0 A10 10 0 0 1 20 0", 1.0);
    assert!(p.elements().len() >= 2);
    assert!(
        p.elements()[1..]
            .iter()
            .all(|e| matches!(e, PathEl::CurveTo(..)))
    );
    match p.elements().last() {
        Some(PathEl::CurveTo(_, _, end)) => {
            assert!((end.x - 20.0).abs() < 1e-6);
            assert!(end.y.abs() < 1e-6);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_commands_are_skipped() {
    let p = parse_path("M0 0 X 5 5 L10 10", 1.0);
    assert_eq!(p.elements().len(), 2);
    assert_eq!(p.elements()[1], PathEl::LineTo(Point::new(10.0, 10.0)));
}

#[test]
fn missing_arguments_stop_parsing() {
    let p = parse_path("M0 0 L10", 1.0);
    assert_eq!(p.elements().len(), 1);
}

#[test]
fn scale_applies_uniformly() {
    let p = parse_path("M1 2 L3 4", 2.0);
    assert_eq!(p.elements()[1], PathEl::LineTo(Point::new(6.0, 8.0)));
}

#[test]
fn natural_size_uses_bounding_box_from_origin() {
    let p = parse_path("M10 20 L30 60", 1.0);
    assert_eq!(natural_size(&p), Some((30.0, 60.0)));
    assert_eq!(natural_size(&BezPath::new()), None);
}
