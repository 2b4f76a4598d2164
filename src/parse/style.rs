//! Loosely-typed document values: colors, percentages, fonts, shadows and transforms.
//!
//! Malformed values yield `None` (or the documented default); nothing here fails hard.

use serde_json::Value;

use crate::foundation::{
    core::{Affine, Color, Point, Vec2},
    props::{Props, PropsExt, as_num, as_num_pair},
};

pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, a color name, or `{r,g,b,a}` with channels in `[0,1]`.
pub fn parse_color(v: &Value) -> Option<Color> {
    match v {
        Value::String(s) => parse_color_str(s),
        Value::Object(o) => {
            let ch = |k: &str, d: f64| o.num(k).unwrap_or(d).clamp(0.0, 1.0);
            Some(Color::rgba(ch("r", 0.0), ch("g", 0.0), ch("b", 0.0), ch("a", 1.0)))
        }
        _ => None,
    }
}

fn parse_color_str(s: &str) -> Option<Color> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let named = match s.to_ascii_lowercase().as_str() {
        "red" => Color::rgba(1.0, 0.0, 0.0, 1.0),
        "black" => Color::BLACK,
        "blue" => Color::rgba(0.0, 0.0, 1.0, 1.0),
        "white" => Color::WHITE,
        "green" => Color::rgba(0.0, 1.0, 0.0, 1.0),
        "yellow" => Color::rgba(1.0, 1.0, 0.0, 1.0),
        "purple" => Color::rgba(0.5, 0.0, 0.5, 1.0),
        "gray" => Color::rgba(0.5, 0.5, 0.5, 1.0),
        "darkgray" => Color::rgba(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 1.0),
        "lightgray" => Color::rgba(2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0, 1.0),
        "brown" => Color::rgba(0.6, 0.4, 0.2, 1.0),
        "orange" => Color::rgba(1.0, 0.5, 0.0, 1.0),
        "cyan" => Color::rgba(0.0, 1.0, 1.0, 1.0),
        "magenta" => Color::rgba(1.0, 0.0, 1.0, 1.0),
        "clear" => Color::CLEAR,
        _ => return None,
    };
    Some(named)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nib = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Color::from_rgba8(nib(0)?, nib(1)?, nib(2)?, 255)),
        4 => Some(Color::from_rgba8(nib(0)?, nib(1)?, nib(2)?, nib(3)?)),
        6 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

/// A number, or a `"NN%"` string relative to `full`.
pub fn parse_percent(v: &Value, full: f64) -> Option<f64> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(p) => p.trim().parse::<f64>().ok().map(|p| full * p / 100.0),
                None => s.parse::<f64>().ok(),
            }
        }
        other => as_num(other),
    }
}

/// `[w, h]` pair; either slot may be 0 to mean "derive from aspect ratio".
pub fn parse_size(v: &Value) -> Option<(f64, f64)> {
    let (w, h) = as_num_pair(v)?;
    (w >= 0.0 && h >= 0.0 && (w > 0.0 || h > 0.0)).then_some((w, h))
}

#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    /// Point size, already scaled to device units.
    pub size: f64,
    /// Candidate family names, first match wins.
    pub names: Vec<String>,
}

/// `fontSize` (number or percentage of `full_height`) and `fontName` (string or list).
pub fn parse_font(props: &Props, full_height: f64, scale: f64) -> FontSpec {
    let size = props
        .value("fontSize")
        .and_then(|v| parse_percent(v, full_height))
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE);
    let names = match props.value("fontName") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    };
    FontSpec {
        size: size * scale,
        names,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub offset: Vec2,
    pub opacity: f64,
    pub radius: f64,
}

pub fn parse_shadow(v: &Value, scale: f64) -> Option<Shadow> {
    let o = v.as_object()?;
    let offset = o.num_pair("offset").unwrap_or((1.0, 1.0));
    Some(Shadow {
        color: o.value("color").and_then(parse_color).unwrap_or(Color::BLACK),
        offset: Vec2::new(offset.0 * scale, offset.1 * scale),
        opacity: o.num("opacity").unwrap_or(0.5).clamp(0.0, 1.0),
        radius: o.num("radius").unwrap_or(1.0).max(0.0) * scale,
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
    Justified,
}

pub fn parse_text_align(v: Option<&Value>) -> TextAlign {
    match v.and_then(Value::as_str) {
        Some("left") => TextAlign::Left,
        Some("right") => TextAlign::Right,
        Some("justified") => TextAlign::Justified,
        _ => TextAlign::Center,
    }
}

/// Layer transform in device units. `rotate` holds x/y/z rotations in degrees; only z enters the
/// 2D affine, x/y are carried for hosts with a 3D layer model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTransform {
    pub translate: Vec2,
    pub rotate: [f64; 3],
    pub scale: Vec2,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self {
            translate: Vec2::ZERO,
            rotate: [0.0; 3],
            scale: Vec2::new(1.0, 1.0),
        }
    }
}

impl LayerTransform {
    /// 2D part of the transform, pivoting around `anchor` (in the layer's parent space).
    pub fn to_affine(&self, anchor: Point) -> Affine {
        let pivot = anchor.to_vec2();
        Affine::translate(self.translate + pivot)
            * Affine::rotate(self.rotate[2].to_radians())
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * Affine::translate(-pivot)
    }
}

/// `translate: [x, y]`, `rotate: deg | [x, y, z]`, `scale: s | [sx, sy]`.
pub fn parse_transform(props: &Props, scale: f64) -> LayerTransform {
    let mut t = LayerTransform::default();
    if let Some(v) = parse_translate(props.value("translate"), scale) {
        t.translate = v;
    }
    if let Some(r) = props.value("rotate").and_then(parse_rotation) {
        t.rotate = r;
    }
    if let Some(s) = props.value("scale").and_then(parse_scale) {
        t.scale = s;
    }
    t
}

pub fn parse_translate(v: Option<&Value>, scale: f64) -> Option<Vec2> {
    let (x, y) = as_num_pair(v?)?;
    Some(Vec2::new(x * scale, y * scale))
}

pub fn parse_rotation(v: &Value) -> Option<[f64; 3]> {
    if let Some(z) = as_num(v) {
        return Some([0.0, 0.0, z]);
    }
    let arr = v.as_array()?;
    let n = |i: usize| arr.get(i).and_then(as_num);
    match arr.len() {
        3 => Some([n(0)?, n(1)?, n(2)?]),
        _ => None,
    }
}

pub fn parse_scale(v: &Value) -> Option<Vec2> {
    if let Some(s) = as_num(v) {
        return Some(Vec2::new(s, s));
    }
    let (sx, sy) = as_num_pair(v)?;
    Some(Vec2::new(sx, sy))
}

#[cfg(test)]
#[path = "../../tests/unit/parse/style.rs"]
mod tests;
