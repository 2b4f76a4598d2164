//! Element frame resolution.
//!
//! Sizes: explicit number or percentage, else the natural size of the attached media, else the
//! container. `"fill"` covers the container and `"fit"` fits inside it, both keeping the natural
//! aspect ratio. Positions: number, percentage, or `left|right|center` / `top|bottom|center`;
//! `pos: [x, y]` places the element's center instead.

use serde_json::Value;

use crate::{
    foundation::{
        core::{Point, Rect, Size},
        props::{Props, PropsExt, as_num},
    },
    parse::style::parse_percent,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub frame: Rect,
    /// Unit anchor within the frame.
    pub anchor: Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fit {
    Cover,
    Contain,
}

/// A document length in device units: numbers are scaled, percentages are taken of `full`.
pub fn length(v: &Value, full: f64, scale: f64) -> Option<f64> {
    match v {
        Value::String(s) if s.trim_end().ends_with('%') => parse_percent(v, full),
        other => as_num(other).map(|n| n * scale),
    }
}

fn fit_mode(props: &Props) -> Option<Fit> {
    ["w", "h"]
        .iter()
        .filter_map(|k| props.string(k))
        .find_map(|s| match s {
            "fill" => Some(Fit::Cover),
            "fit" => Some(Fit::Contain),
            _ => None,
        })
}

fn size(props: &Props, container: Size, natural: Option<Size>, scale: f64) -> Size {
    let natural = natural
        .filter(|n| n.width > 0.0 && n.height > 0.0)
        .map(|n| Size::new(n.width * scale, n.height * scale));

    if let Some(mode) = fit_mode(props) {
        let Some(n) = natural else {
            return container;
        };
        let (sx, sy) = (container.width / n.width, container.height / n.height);
        let s = match mode {
            Fit::Cover => sx.max(sy),
            Fit::Contain => sx.min(sy),
        };
        return Size::new(n.width * s, n.height * s);
    }

    let w = props
        .value("w")
        .and_then(|v| length(v, container.width, scale))
        .filter(|w| w.is_finite() && *w >= 0.0);
    let h = props
        .value("h")
        .and_then(|v| length(v, container.height, scale))
        .filter(|h| h.is_finite() && *h >= 0.0);
    match (w, h, natural) {
        (Some(w), Some(h), _) => Size::new(w, h),
        (Some(w), None, Some(n)) => Size::new(w, w * n.height / n.width),
        (None, Some(h), Some(n)) => Size::new(h * n.width / n.height, h),
        (Some(w), None, None) => Size::new(w, container.height),
        (None, Some(h), None) => Size::new(container.width, h),
        (None, None, Some(n)) => n,
        (None, None, None) => container,
    }
}

fn coordinate(v: Option<&Value>, full: f64, extent: f64, scale: f64, axis_x: bool) -> f64 {
    let Some(v) = v else {
        return 0.0;
    };
    match v.as_str().map(str::trim) {
        Some("center") => (full - extent) / 2.0,
        Some("left") if axis_x => 0.0,
        Some("right") if axis_x => full - extent,
        Some("top") if !axis_x => 0.0,
        Some("bottom") if !axis_x => full - extent,
        _ => length(v, full, scale).unwrap_or(0.0),
    }
}

fn anchor(props: &Props, size: Size, scale: f64) -> Point {
    let Some(arr) = props.array("anchor").filter(|a| a.len() >= 2) else {
        return Point::new(0.5, 0.5);
    };
    let unit = |v: &Value, extent: f64| {
        if extent <= 0.0 {
            return 0.5;
        }
        length(v, extent, scale).map_or(0.5, |l| l / extent)
    };
    Point::new(unit(&arr[0], size.width), unit(&arr[1], size.height))
}

pub fn resolve_geometry(
    props: &Props,
    container: Size,
    natural: Option<Size>,
    scale: f64,
) -> Geometry {
    let size = size(props, container, natural, scale);
    let origin = match props.array("pos").filter(|a| a.len() >= 2) {
        Some(pos) => {
            let cx = length(&pos[0], container.width, scale).unwrap_or(container.width / 2.0);
            let cy = length(&pos[1], container.height, scale).unwrap_or(container.height / 2.0);
            Point::new(cx - size.width / 2.0, cy - size.height / 2.0)
        }
        None => Point::new(
            coordinate(props.value("x"), container.width, size.width, scale, true),
            coordinate(props.value("y"), container.height, size.height, scale, false),
        ),
    };
    Geometry {
        frame: Rect::from_origin_size(origin, size),
        anchor: anchor(props, size, scale),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/element/geometry.rs"]
mod tests;
