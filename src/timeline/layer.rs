//! Retained layer model handed to the host renderer.
//!
//! A layer carries its base (model) values plus a list of property animations timed in the
//! layer's local time. [`Layer::present`] evaluates the animated (presentation) values for a given
//! parent time; hosts call it once per frame per layer, feeding children the parent's local time.

use std::path::PathBuf;

use kurbo::{PathEl, Shape as _};

use crate::{
    foundation::core::{Affine, BezPath, Color, Point, Rect, Vec2},
    parse::{
        markdown::TextRun,
        style::{LayerTransform, Shadow},
    },
    timeline::{clock::LayerClock, ease::Ease},
};

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Vec2 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Vec2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

impl Lerp for Color {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Color::rgba(
            Lerp::lerp(&a.r, &b.r, t),
            Lerp::lerp(&a.g, &b.g, t),
            Lerp::lerp(&a.b, &b.b, t),
            Lerp::lerp(&a.a, &b.a, t),
        )
    }
}

impl Lerp for BezPath {
    /// Point-wise morph between paths with identical command structure; otherwise snaps to the
    /// target at the end of the segment.
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        let (ea, eb) = (a.elements(), b.elements());
        let same_shape = ea.len() == eb.len()
            && ea
                .iter()
                .zip(eb)
                .all(|(x, y)| std::mem::discriminant(x) == std::mem::discriminant(y));
        if !same_shape {
            return if t < 1.0 { a.clone() } else { b.clone() };
        }
        let p = |x: Point, y: Point| x.lerp(y, t);
        ea.iter()
            .zip(eb)
            .map(|(x, y)| match (*x, *y) {
                (PathEl::MoveTo(x), PathEl::MoveTo(y)) => PathEl::MoveTo(p(x, y)),
                (PathEl::LineTo(x), PathEl::LineTo(y)) => PathEl::LineTo(p(x, y)),
                (PathEl::QuadTo(x1, x2), PathEl::QuadTo(y1, y2)) => {
                    PathEl::QuadTo(p(x1, y1), p(x2, y2))
                }
                (PathEl::CurveTo(x1, x2, x3), PathEl::CurveTo(y1, y2, y3)) => {
                    PathEl::CurveTo(p(x1, y1), p(x2, y2), p(x3, y3))
                }
                (el, _) => el,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnimValue {
    Scalar(f64),
    Vec2(Vec2),
    Color(Color),
    Path(BezPath),
}

impl Lerp for AnimValue {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        match (a, b) {
            (Self::Scalar(x), Self::Scalar(y)) => Self::Scalar(Lerp::lerp(x, y, t)),
            (Self::Vec2(x), Self::Vec2(y)) => Self::Vec2(Lerp::lerp(x, y, t)),
            (Self::Color(x), Self::Color(y)) => Self::Color(Lerp::lerp(x, y, t)),
            (Self::Path(x), Self::Path(y)) => Self::Path(Lerp::lerp(x, y, t)),
            _ if t < 1.0 => a.clone(),
            _ => b.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerProperty {
    Translate,
    /// Z rotation in degrees.
    Rotate,
    Scale,
    Opacity,
    BackgroundColor,
    FillColor,
    StrokeColor,
    LineWidth,
    StrokeStart,
    StrokeEnd,
    Path,
    /// Sprite cell as `(column, row)`.
    SpriteCell,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    /// Position within one cycle, `0..=1`.
    pub at: f64,
    pub value: AnimValue,
}

/// One animated property, timed in its layer's local time.
///
/// Before `begin` the first key holds and after the active duration the final value holds, so a
/// frozen clock can be scrubbed to any offset and land on a deterministic state.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyAnimation {
    pub property: LayerProperty,
    pub keys: Vec<Keyframe>,
    pub begin: f64,
    pub duration: f64,
    pub repeat_count: f64,
    pub autoreverses: bool,
    pub ease: Ease,
    pub discrete: bool,
    /// Sampled values are added to the layer's base value instead of replacing it.
    pub additive: bool,
}

impl PropertyAnimation {
    pub fn tween(
        property: LayerProperty,
        from: AnimValue,
        to: AnimValue,
        begin: f64,
        duration: f64,
        ease: Ease,
    ) -> Self {
        Self {
            property,
            keys: vec![
                Keyframe {
                    at: 0.0,
                    value: from,
                },
                Keyframe { at: 1.0, value: to },
            ],
            begin,
            duration,
            repeat_count: 1.0,
            autoreverses: false,
            ease,
            discrete: false,
            additive: false,
        }
    }

    /// Evenly spaced keys. Discrete animations give each value an equal slice of the cycle.
    pub fn keyframes(
        property: LayerProperty,
        values: Vec<AnimValue>,
        begin: f64,
        duration: f64,
        discrete: bool,
    ) -> Self {
        let n = values.len();
        let step = if discrete {
            1.0 / n.max(1) as f64
        } else {
            1.0 / n.saturating_sub(1).max(1) as f64
        };
        let keys = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Keyframe {
                at: i as f64 * step,
                value,
            })
            .collect();
        Self {
            property,
            keys,
            begin,
            duration,
            repeat_count: 1.0,
            autoreverses: false,
            ease: Ease::Linear,
            discrete,
            additive: false,
        }
    }

    pub fn repeating(mut self, count: f64, autoreverses: bool) -> Self {
        self.repeat_count = if count > 0.0 { count } else { 1.0 };
        self.autoreverses = autoreverses;
        self
    }

    pub fn additive(mut self) -> Self {
        self.additive = true;
        self
    }

    /// Cycle progress in `0..=1` at local time `t`.
    pub fn progress(&self, t: f64) -> f64 {
        if self.duration <= 0.0 || !self.duration.is_finite() {
            return if t >= self.begin { 1.0 } else { 0.0 };
        }
        let elapsed = t - self.begin;
        if elapsed <= 0.0 {
            return 0.0;
        }
        let legs = if self.autoreverses { 2.0 } else { 1.0 };
        let active = self.duration * self.repeat_count * legs;
        if elapsed >= active {
            if self.autoreverses {
                return 0.0;
            }
            let f = self.repeat_count.fract();
            return if f == 0.0 { 1.0 } else { f };
        }
        let cycles = elapsed / self.duration;
        let leg = cycles.floor();
        let frac = cycles - leg;
        if self.autoreverses && leg as u64 % 2 == 1 {
            1.0 - frac
        } else {
            frac
        }
    }

    pub fn sample(&self, t: f64) -> Option<AnimValue> {
        let first = self.keys.first()?;
        let p = self.ease.apply(self.progress(t));
        if self.discrete {
            let idx = self.keys.partition_point(|k| k.at <= p).max(1) - 1;
            return Some(self.keys[idx.min(self.keys.len() - 1)].value.clone());
        }
        let idx = self.keys.partition_point(|k| k.at <= p);
        if idx == 0 {
            return Some(first.value.clone());
        }
        if idx >= self.keys.len() {
            return self.keys.last().map(|k| k.value.clone());
        }
        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        let span = b.at - a.at;
        if span <= 0.0 {
            return Some(a.value.clone());
        }
        Some(AnimValue::lerp(&a.value, &b.value, (p - a.at) / span))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShapeStyle {
    pub path: BezPath,
    pub line_width: f64,
    pub stroke: Option<Color>,
    pub fill: Option<Color>,
    pub stroke_start: f64,
    pub stroke_end: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteSheet {
    pub source: MediaSource,
    /// Columns and rows in the sheet.
    pub slice: (u32, u32),
    /// Initially visible cell.
    pub slot: (u32, u32),
}

/// A remote URL and, once prefetched, its local file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MediaSource {
    pub url: String,
    pub local: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LayerContents {
    #[default]
    Empty,
    Image(MediaSource),
    Sprite(SpriteSheet),
    Shape(ShapeStyle),
    Text(Vec<TextRun>),
    Video(MediaSource),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// Frame in the parent's coordinate space, device units.
    pub frame: Rect,
    /// Unit anchor point within the frame.
    pub anchor: Point,
    pub transform: LayerTransform,
    pub opacity: f64,
    pub background: Color,
    pub corner_radius: f64,
    pub border_width: f64,
    pub border_color: Color,
    pub shadow: Option<Shadow>,
    pub clip: bool,
    pub mask: Option<MediaSource>,
    pub hidden: bool,
    pub contents: LayerContents,
    /// Eye distance from the plane of the sublayers, device units. Hosts apply it as the
    /// sublayers' perspective; `None` keeps them flat.
    pub perspective: Option<f64>,
    pub clock: LayerClock,
    pub animations: Vec<PropertyAnimation>,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            frame: Rect::ZERO,
            anchor: Point::new(0.5, 0.5),
            transform: LayerTransform::default(),
            opacity: 1.0,
            background: Color::CLEAR,
            corner_radius: 0.0,
            border_width: 0.0,
            border_color: Color::BLACK,
            shadow: None,
            clip: false,
            mask: None,
            hidden: false,
            contents: LayerContents::Empty,
            perspective: None,
            clock: LayerClock::default(),
            animations: Vec::new(),
        }
    }
}

/// Animated values of a layer at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Local time children should be presented at.
    pub local_time: f64,
    pub translate: Vec2,
    pub rotate: [f64; 3],
    pub scale: Vec2,
    pub opacity: f64,
    pub background: Color,
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub line_width: f64,
    pub stroke_start: f64,
    pub stroke_end: f64,
    pub path: Option<BezPath>,
    pub sprite_cell: Option<(u32, u32)>,
    pub hidden: bool,
}

impl Presentation {
    /// Layer-to-parent transform for a frame, rotating and scaling about the unit anchor.
    pub fn affine(&self, frame: Rect, anchor: Point) -> Affine {
        let pivot = Point::new(
            frame.x0 + frame.width() * anchor.x,
            frame.y0 + frame.height() * anchor.y,
        );
        let t = LayerTransform {
            translate: self.translate,
            rotate: self.rotate,
            scale: self.scale,
        };
        t.to_affine(pivot)
    }
}

impl Layer {
    pub fn present(&self, parent_time: f64) -> Presentation {
        let local = self.clock.local_time(parent_time);
        let shape = match &self.contents {
            LayerContents::Shape(s) => Some(s),
            _ => None,
        };
        let mut p = Presentation {
            local_time: local,
            translate: self.transform.translate,
            rotate: self.transform.rotate,
            scale: self.transform.scale,
            opacity: self.opacity,
            background: self.background,
            fill: shape.and_then(|s| s.fill),
            stroke: shape.and_then(|s| s.stroke),
            line_width: shape.map_or(0.0, |s| s.line_width),
            stroke_start: shape.map_or(0.0, |s| s.stroke_start),
            stroke_end: shape.map_or(1.0, |s| s.stroke_end),
            path: shape.map(|s| s.path.clone()),
            sprite_cell: match &self.contents {
                LayerContents::Sprite(s) => Some(s.slot),
                _ => None,
            },
            hidden: self.hidden,
        };
        for anim in &self.animations {
            if let Some(v) = anim.sample(local) {
                apply(&mut p, anim.property, v, anim.additive);
            }
        }
        p
    }

    /// Bounding box of the layer's shape contents, if any.
    pub fn shape_bounds(&self) -> Option<Rect> {
        match &self.contents {
            LayerContents::Shape(s) => Some(s.path.bounding_box()),
            _ => None,
        }
    }
}

fn apply(p: &mut Presentation, property: LayerProperty, value: AnimValue, additive: bool) {
    let add = |base: f64, v: f64| if additive { base + v } else { v };
    match (property, value) {
        (LayerProperty::Translate, AnimValue::Vec2(v)) => {
            p.translate = if additive { p.translate + v } else { v };
        }
        (LayerProperty::Rotate, AnimValue::Scalar(v)) => p.rotate[2] = add(p.rotate[2], v),
        (LayerProperty::Scale, AnimValue::Vec2(v)) => {
            p.scale = if additive {
                Vec2::new(p.scale.x * v.x, p.scale.y * v.y)
            } else {
                v
            };
        }
        (LayerProperty::Opacity, AnimValue::Scalar(v)) => p.opacity = v.clamp(0.0, 1.0),
        (LayerProperty::BackgroundColor, AnimValue::Color(c)) => p.background = c,
        (LayerProperty::FillColor, AnimValue::Color(c)) => p.fill = Some(c),
        (LayerProperty::StrokeColor, AnimValue::Color(c)) => p.stroke = Some(c),
        (LayerProperty::LineWidth, AnimValue::Scalar(v)) => p.line_width = add(p.line_width, v),
        (LayerProperty::StrokeStart, AnimValue::Scalar(v)) => p.stroke_start = v,
        (LayerProperty::StrokeEnd, AnimValue::Scalar(v)) => p.stroke_end = v,
        (LayerProperty::Path, AnimValue::Path(path)) => p.path = Some(path),
        (LayerProperty::SpriteCell, AnimValue::Vec2(v)) => {
            p.sprite_cell = Some((v.x.max(0.0) as u32, v.y.max(0.0) as u32));
        }
        (property, value) => {
            tracing::trace!(?property, ?value, "animation value does not fit property");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/layer.rs"]
mod tests;
