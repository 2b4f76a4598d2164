//! `to` and `loop` descriptors → layer property animations.
//!
//! Timing windows are fractions of the driving clock's `0..1` range; scale factors are applied
//! here so the layer model only ever sees device units.

use serde_json::Value;

use crate::{
    foundation::{
        core::{Color, Vec2},
        props::{Props, PropsExt},
    },
    model::document::Document,
    parse::{
        path::parse_path,
        style::{parse_color, parse_rotation, parse_scale, parse_translate},
    },
    timeline::{
        ease::Ease,
        layer::{AnimValue, Layer, LayerContents, LayerProperty, PropertyAnimation},
    },
};

/// `timing: [start, end]`, clamped to `0..=1` and ordered. Defaults to the full range.
pub fn timing(props: &Props) -> (f64, f64) {
    match props.num_pair("timing") {
        Some((a, b)) => {
            let a = a.clamp(0.0, 1.0);
            let b = b.clamp(0.0, 1.0);
            (a.min(b), a.max(b))
        }
        None => (0.0, 1.0),
    }
}

/// A path given inline as path data or by name from the document's `paths` table.
pub fn path_value(v: &Value, doc: &Document, scale: f64) -> Option<kurbo::BezPath> {
    let s = v.as_str()?;
    let d = doc.path_named(s).unwrap_or(s);
    let path = parse_path(d, scale);
    (!path.elements().is_empty()).then_some(path)
}

pub fn to_animations(to: &Props, layer: &Layer, doc: &Document, scale: f64) -> Vec<PropertyAnimation> {
    let (start, end) = timing(to);
    let ease = Ease::from_value(to.value("ease"));
    let shape = match &layer.contents {
        LayerContents::Shape(s) => Some(s),
        _ => None,
    };
    let tween = |property, from, target| {
        PropertyAnimation::tween(property, from, target, start, end - start, ease)
    };

    let mut out = Vec::new();
    if let Some(delta) = parse_translate(to.value("translate"), scale) {
        let from = layer.transform.translate;
        out.push(tween(
            LayerProperty::Translate,
            AnimValue::Vec2(from),
            AnimValue::Vec2(from + delta),
        ));
    }
    if let Some(r) = to.value("rotate").and_then(parse_rotation) {
        out.push(tween(
            LayerProperty::Rotate,
            AnimValue::Scalar(layer.transform.rotate[2]),
            AnimValue::Scalar(r[2]),
        ));
    }
    if let Some(s) = to.value("scale").and_then(parse_scale) {
        out.push(tween(
            LayerProperty::Scale,
            AnimValue::Vec2(layer.transform.scale),
            AnimValue::Vec2(s),
        ));
    }
    if let Some(o) = to.num("opacity") {
        out.push(tween(
            LayerProperty::Opacity,
            AnimValue::Scalar(layer.opacity),
            AnimValue::Scalar(o.clamp(0.0, 1.0)),
        ));
    }
    if let Some(c) = to.value("bc").and_then(parse_color) {
        out.push(tween(
            LayerProperty::BackgroundColor,
            AnimValue::Color(layer.background),
            AnimValue::Color(c),
        ));
    }
    if let Some(shape) = shape {
        let colors = [
            ("fillColor", LayerProperty::FillColor, shape.fill),
            ("strokeColor", LayerProperty::StrokeColor, shape.stroke),
        ];
        for (key, property, current) in colors {
            if let Some(c) = to.value(key).and_then(parse_color) {
                let from = current.unwrap_or(Color::CLEAR);
                out.push(tween(property, AnimValue::Color(from), AnimValue::Color(c)));
            }
        }
        if let Some(w) = to.num("lineWidth") {
            out.push(tween(
                LayerProperty::LineWidth,
                AnimValue::Scalar(shape.line_width),
                AnimValue::Scalar(w * scale),
            ));
        }
        let strokes = [
            ("strokeStart", LayerProperty::StrokeStart, shape.stroke_start),
            ("strokeEnd", LayerProperty::StrokeEnd, shape.stroke_end),
        ];
        for (key, property, current) in strokes {
            if let Some(v) = to.num(key) {
                out.push(tween(
                    property,
                    AnimValue::Scalar(current),
                    AnimValue::Scalar(v.clamp(0.0, 1.0)),
                ));
            }
        }
        if let Some(path) = to.value("path").and_then(|v| path_value(v, doc, scale)) {
            out.push(tween(
                LayerProperty::Path,
                AnimValue::Path(shape.path.clone()),
                AnimValue::Path(path),
            ));
        }
    }
    out
}

/// `0, +a, 0, -a, 0` over one cycle.
fn wobble(amplitude: AnimValue, zero: AnimValue) -> Vec<AnimValue> {
    let negative = match &amplitude {
        AnimValue::Scalar(v) => AnimValue::Scalar(-v),
        AnimValue::Vec2(v) => AnimValue::Vec2(-*v),
        other => other.clone(),
    };
    vec![zero.clone(), amplitude, zero.clone(), negative, zero]
}

pub fn loop_animations(
    lp: &Props,
    layer: &Layer,
    doc: &Document,
    scale: f64,
) -> Vec<PropertyAnimation> {
    let (start, end) = timing(lp);
    let count = lp.num("count").filter(|c| *c >= 1.0).unwrap_or(1.0).floor();
    let cycle = (end - start) / count;
    let keyed = |property, values, discrete| {
        PropertyAnimation::keyframes(property, values, start, cycle, discrete).repeating(count, false)
    };
    let frame = layer.frame;

    let style = lp.string("style").unwrap_or_default();
    let anim = match style {
        "vibrate" => {
            let d = lp.num("delta").unwrap_or(10.0) * scale;
            let values = wobble(AnimValue::Vec2(Vec2::new(d, 0.0)), AnimValue::Vec2(Vec2::ZERO));
            Some(keyed(LayerProperty::Translate, values, false).additive())
        }
        "wiggle" => {
            let d = lp.num("delta").unwrap_or(15.0);
            let values = wobble(AnimValue::Scalar(d), AnimValue::Scalar(0.0));
            Some(keyed(LayerProperty::Rotate, values, false).additive())
        }
        "shift" => {
            let delta = match lp.string("direction").unwrap_or("s") {
                "n" => Vec2::new(0.0, -frame.height()),
                "e" => Vec2::new(frame.width(), 0.0),
                "w" => Vec2::new(-frame.width(), 0.0),
                _ => Vec2::new(0.0, frame.height()),
            };
            let values = vec![AnimValue::Vec2(Vec2::ZERO), AnimValue::Vec2(delta)];
            Some(keyed(LayerProperty::Translate, values, false).additive())
        }
        "blink" => {
            let values = vec![AnimValue::Scalar(layer.opacity), AnimValue::Scalar(0.0)];
            Some(keyed(LayerProperty::Opacity, values, true))
        }
        "spin" => {
            let turn = if lp.flag("clockwise").unwrap_or(true) {
                360.0
            } else {
                -360.0
            };
            let values = vec![AnimValue::Scalar(0.0), AnimValue::Scalar(turn)];
            Some(keyed(LayerProperty::Rotate, values, false).additive())
        }
        "path" => match &layer.contents {
            LayerContents::Shape(shape) => {
                let mut values = vec![AnimValue::Path(shape.path.clone())];
                values.extend(
                    lp.array("path")
                        .into_iter()
                        .flatten()
                        .filter_map(|v| path_value(v, doc, scale))
                        .map(AnimValue::Path),
                );
                values.push(AnimValue::Path(shape.path.clone()));
                (values.len() > 2).then(|| keyed(LayerProperty::Path, values, false))
            }
            _ => None,
        },
        "sprite" => match &layer.contents {
            LayerContents::Sprite(sheet) => {
                let (cols, row) = (sheet.slice.0.max(1), sheet.slot.1);
                let values = (0..cols)
                    .map(|c| AnimValue::Vec2(Vec2::new(f64::from(c), f64::from(row))))
                    .collect();
                Some(keyed(LayerProperty::SpriteCell, values, true))
            }
            _ => None,
        },
        other => {
            tracing::debug!(style = other, "unknown loop style ignored");
            None
        }
    };
    anim.into_iter().collect()
}

#[cfg(test)]
#[path = "../../tests/unit/element/animation.rs"]
mod tests;
