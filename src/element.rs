//! One visual node of a page.
//!
//! Elements live in their page's arena and refer to each other by [`ElementIdx`]. Construction
//! resolves the element's bag over its prototype once; after that the bag is read-only.

pub mod action;
pub mod animation;
pub mod geometry;
pub mod media;

use serde_json::Value;

use crate::{
    assets::prefetch::Prefetcher,
    element::{
        action::{Action, EventTable},
        animation::{loop_animations, path_value, to_animations},
        geometry::resolve_geometry,
        media::PlayerState,
    },
    foundation::{
        core::{Color, Size},
        ids::{ElementIdx, PageIdx},
        props::{Props, PropsExt, localized},
    },
    host::MediaKind,
    model::document::Document,
    parse::{
        markdown::{TextRun, render_markdown},
        path::natural_size,
        style::{parse_color, parse_font, parse_shadow, parse_text_align, parse_transform},
    },
    timeline::{
        clock::LayerClock,
        layer::{Layer, LayerContents, MediaSource, ShapeStyle, SpriteSheet},
    },
};

/// Everything element construction reads.
pub struct BuildCtx<'a> {
    pub doc: &'a Document,
    pub page: PageIdx,
    pub generation: u64,
    pub lang: Option<&'a str>,
    pub prefetcher: Option<&'a Prefetcher>,
}

impl BuildCtx<'_> {
    fn source(&self, reference: Option<&str>) -> Option<MediaSource> {
        let url = self.doc.resolve_url(reference?)?;
        let local = self.prefetcher.and_then(|p| p.map(&url));
        Some(MediaSource { url, local })
    }
}

#[derive(Debug)]
pub enum Attachment {
    Player(PlayerState),
    Speech { text: String, voice: Option<Props> },
}

#[derive(Debug)]
pub struct Element {
    pub id: Option<String>,
    pub props: Props,
    pub parent: Option<ElementIdx>,
    pub children: Vec<ElementIdx>,
    pub layer: Layer,
    /// Keeps looping on its own clock after the page's master line stopped.
    pub repeat: bool,
    pub action: Option<Action>,
    pub events: EventTable,
    pub attachment: Option<Attachment>,
}

fn image_size(source: &MediaSource) -> Option<Size> {
    let path = source.local.as_deref()?;
    match image::image_dimensions(path) {
        Ok((w, h)) => Some(Size::new(f64::from(w), f64::from(h))),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no natural size");
            None
        }
    }
}

fn u32_pair(props: &Props, key: &str, default: (u32, u32)) -> (u32, u32) {
    props
        .num_pair(key)
        .filter(|(a, b)| *a >= 0.0 && *b >= 0.0)
        .map_or(default, |(a, b)| (a as u32, b as u32))
}

struct Contents {
    contents: LayerContents,
    natural: Option<Size>,
    attachment: Option<Attachment>,
}

fn contents(props: &Props, container: Size, ctx: &BuildCtx<'_>) -> Contents {
    let scale = ctx.doc.scale;
    let plain = |contents| Contents {
        contents,
        natural: None,
        attachment: None,
    };

    if let Some(v) = props.value("path")
        && let Some(path) = path_value(v, ctx.doc, scale)
    {
        let natural = path_value(v, ctx.doc, 1.0)
            .as_ref()
            .and_then(natural_size)
            .map(|(w, h)| Size::new(w, h));
        return Contents {
            natural,
            ..plain(LayerContents::Shape(ShapeStyle {
                path,
                line_width: props.num("lineWidth").unwrap_or(0.0).max(0.0) * scale,
                stroke: props.value("strokeColor").and_then(parse_color),
                fill: props.value("fillColor").and_then(parse_color),
                stroke_start: props.num("strokeStart").unwrap_or(0.0).clamp(0.0, 1.0),
                stroke_end: props.num("strokeEnd").unwrap_or(1.0).clamp(0.0, 1.0),
            }))
        };
    }
    if let Some(source) = ctx.source(props.string("img")) {
        return Contents {
            natural: image_size(&source),
            ..plain(LayerContents::Image(source))
        };
    }
    if let Some(source) = ctx.source(props.string("sprite")) {
        let slice = u32_pair(props, "slice", (1, 1));
        let slice = (slice.0.max(1), slice.1.max(1));
        let natural = image_size(&source).map(|s| {
            Size::new(s.width / f64::from(slice.0), s.height / f64::from(slice.1))
        });
        return Contents {
            natural,
            ..plain(LayerContents::Sprite(SpriteSheet {
                source,
                slice,
                slot: u32_pair(props, "slot", (0, 0)),
            }))
        };
    }
    if let Some(source) = ctx.source(props.string("video")) {
        let scrub = props
            .num("videoDuration")
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| (props.num("videoStart").unwrap_or(0.0).max(0.0), d));
        return Contents {
            attachment: Some(Attachment::Player(PlayerState::new(
                MediaKind::Video,
                source.clone(),
                scrub,
            ))),
            ..plain(LayerContents::Video(source))
        };
    }
    if let Some(text) = props.value("text").and_then(|v| localized(v, ctx.lang)) {
        let run = TextRun {
            text: text.to_owned(),
            font: parse_font(props, container.height, scale),
            color: props
                .value("textColor")
                .and_then(parse_color)
                .unwrap_or(Color::BLACK),
            align: parse_text_align(props.value("textAlign")),
            bullet: None,
        };
        return plain(LayerContents::Text(vec![run]));
    }
    if let Some(md) = props.value("markdown") {
        let lines: Vec<String> = match md {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| localized(v, ctx.lang))
                .map(str::to_owned)
                .collect(),
            other => localized(other, ctx.lang)
                .map(|s| s.lines().map(str::to_owned).collect())
                .unwrap_or_default(),
        };
        let runs = render_markdown(&lines, &ctx.doc.markdown, container.height, scale);
        return plain(LayerContents::Text(runs));
    }

    let attachment = if let Some(source) = ctx.source(props.string("radio")) {
        Some(Attachment::Player(PlayerState::new(
            MediaKind::Radio,
            source,
            None,
        )))
    } else {
        props
            .value("speech")
            .and_then(|v| localized(v, ctx.lang))
            .map(|text| Attachment::Speech {
                text: text.to_owned(),
                voice: props
                    .string("voice")
                    .and_then(|name| ctx.doc.voice_named(name))
                    .cloned(),
            })
    };
    Contents {
        attachment,
        ..plain(LayerContents::Empty)
    }
}

impl Element {
    /// Build `items` (own bags) and their descendants into `arena`, returning the new roots.
    pub fn build_tree(
        items: &[Value],
        container: Size,
        parent: Option<ElementIdx>,
        ctx: &BuildCtx<'_>,
        arena: &mut Vec<Element>,
    ) -> Vec<ElementIdx> {
        items
            .iter()
            .filter_map(Value::as_object)
            .map(|own| Self::build(own, container, parent, ctx, arena))
            .collect()
    }

    fn build(
        own: &Props,
        container: Size,
        parent: Option<ElementIdx>,
        ctx: &BuildCtx<'_>,
        arena: &mut Vec<Element>,
    ) -> ElementIdx {
        let props = ctx.doc.element_props(own);
        let scale = ctx.doc.scale;
        let Contents {
            contents,
            natural,
            attachment,
        } = contents(&props, container, ctx);
        let geometry = resolve_geometry(&props, container, natural, scale);

        let repeat = props.flag("repeat").unwrap_or(false);
        let frozen = repeat || props.flag("tiling").unwrap_or(false);
        let mut layer = Layer {
            frame: geometry.frame,
            anchor: geometry.anchor,
            transform: parse_transform(&props, scale),
            opacity: props.num("opacity").unwrap_or(1.0).clamp(0.0, 1.0),
            background: props
                .value("bc")
                .and_then(parse_color)
                .unwrap_or(Color::CLEAR),
            corner_radius: props.num("cornerRadius").unwrap_or(0.0).max(0.0) * scale,
            border_width: props.num("borderWidth").unwrap_or(0.0).max(0.0) * scale,
            border_color: props
                .value("borderColor")
                .and_then(parse_color)
                .unwrap_or(Color::BLACK),
            shadow: props.value("shadow").and_then(|v| parse_shadow(v, scale)),
            clip: props.flag("clip").unwrap_or(false),
            mask: ctx.source(props.string("mask")),
            hidden: false,
            contents,
            perspective: None,
            clock: if frozen {
                LayerClock::frozen()
            } else {
                LayerClock::default()
            },
            animations: Vec::new(),
        };
        if let Some(to) = props.object("to") {
            layer.animations = to_animations(to, &layer, ctx.doc, scale);
        }
        if let Some(lp) = props.object("loop") {
            let looped = loop_animations(lp, &layer, ctx.doc, scale);
            layer.animations.extend(looped);
        }

        let idx = ElementIdx(arena.len() as u32);
        let box_size = layer.frame.size();
        let child_items = props.array("elements").cloned().unwrap_or_default();
        arena.push(Element {
            id: props.string("id").map(str::to_owned),
            action: Action::parse(props.value("action")),
            events: EventTable::parse(props.value("events")),
            props,
            parent,
            children: Vec::new(),
            layer,
            repeat,
            attachment,
        });
        let children = Self::build_tree(&child_items, box_size, Some(idx), ctx, arena);
        arena[idx.get()].children = children;
        idx
    }

    /// The element's own share of a time-offset update. Returns whether descendants should be
    /// visited.
    pub fn apply_offset(&mut self, offset: f64, element_repeat: bool) -> bool {
        if element_repeat && !self.repeat {
            return false;
        }
        if self.layer.clock.is_frozen() {
            self.layer.clock.time_offset = offset;
        }
        true
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        match self.attachment.as_mut() {
            Some(Attachment::Player(p)) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/element.rs"]
mod tests;
