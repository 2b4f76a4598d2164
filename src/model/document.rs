//! Parsed document plus derived, document-wide settings.
//!
//! Construction is two-phase: [`Document::parse`] validates the JSON and resolves everything that
//! only depends on the document (page inheritance, lookup tables, styles); [`Document::resolve`]
//! computes the viewport-dependent fields and is re-run whenever the viewport changes.

use std::collections::BTreeMap;

use serde_json::Value;
use url::Url;

use crate::{
    foundation::{
        core::{Color, Size},
        error::{BookError, BookResult},
        props::{Props, PropsExt, as_num_pair, localized},
    },
    model::inherit,
    parse::{markdown::MarkdownStyles, style::parse_color},
};

const DEFAULT_DIMENSION: (f64, f64) = (320.0, 568.0);

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RawTemplates {
    pages: BTreeMap<String, Props>,
    scenes: BTreeMap<String, Props>,
    elements: BTreeMap<String, Props>,
}

#[derive(Debug, serde::Deserialize)]
struct RawDocument {
    #[serde(alias = "items")]
    pages: Vec<Props>,
    #[serde(default)]
    templates: RawTemplates,
    #[serde(default)]
    paths: BTreeMap<String, Value>,
    #[serde(default)]
    voices: BTreeMap<String, Props>,
    #[serde(default)]
    markdown: Option<Props>,
    #[serde(default)]
    dimension: Option<Value>,
    #[serde(default)]
    orientation: Option<String>,
    #[serde(default)]
    paging: Option<String>,
    #[serde(default)]
    viewstate: bool,
    #[serde(default)]
    languages: Vec<Props>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    bc: Option<Value>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum Paging {
    #[default]
    Vertical,
    LeftToRight,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Language {
    pub id: String,
    pub props: Props,
}

/// A page's own bag resolved over its page template.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPage {
    pub props: Props,
    pub template: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Document {
    pub base_url: Option<Url>,
    pub title: Option<Value>,
    pub pages: Vec<ResolvedPage>,
    page_templates: BTreeMap<String, Props>,
    prototypes: BTreeMap<String, Props>,
    paths: BTreeMap<String, String>,
    voices: BTreeMap<String, Props>,
    pub markdown: MarkdownStyles,
    pub languages: Vec<Language>,
    pub orientation: Orientation,
    pub paging: Paging,
    pub viewstate: bool,
    pub background: Color,
    declared_dimension: (f64, f64),
    /// Canvas size in document units, zero slots derived from the viewport aspect ratio.
    pub dimension: Size,
    /// Device units per document unit; uniform in x and y.
    pub scale: f64,
}

impl Document {
    #[tracing::instrument(skip(json))]
    pub fn parse(json: &Value, base_url: Option<Url>) -> BookResult<Self> {
        if !json.is_object() {
            return Err(BookError::document("document root must be an object"));
        }
        let raw = RawDocument::deserialize_from(json)?;

        let mut page_templates = raw.templates.scenes;
        page_templates.extend(raw.templates.pages);

        let pages = raw
            .pages
            .iter()
            .enumerate()
            .map(|(i, own)| {
                let template = own
                    .any_of(&["template", "scene"])
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let base = template.as_deref().and_then(|name| {
                    let found = page_templates.get(name);
                    if found.is_none() {
                        tracing::warn!(page = i, template = name, "unknown page template");
                    }
                    found
                });
                ResolvedPage {
                    props: inherit::merge(own, base),
                    template,
                }
            })
            .collect();

        let paths = raw
            .paths
            .into_iter()
            .filter_map(|(name, v)| match v {
                Value::String(d) => Some((name, d)),
                _ => {
                    tracing::warn!(name, "named path is not a string");
                    None
                }
            })
            .collect();

        let languages = raw
            .languages
            .into_iter()
            .filter_map(|props| {
                let id = props.string("id")?.to_owned();
                Some(Language { id, props })
            })
            .collect();

        let declared_dimension = raw
            .dimension
            .as_ref()
            .and_then(as_num_pair)
            .filter(|(w, h)| *w >= 0.0 && *h >= 0.0 && (*w > 0.0 || *h > 0.0))
            .unwrap_or(DEFAULT_DIMENSION);

        let mut doc = Self {
            base_url,
            title: raw.title,
            pages,
            page_templates,
            prototypes: raw.templates.elements,
            paths,
            voices: raw.voices,
            markdown: MarkdownStyles::resolve(raw.markdown.as_ref()),
            languages,
            orientation: match raw.orientation.as_deref() {
                Some("landscape") => Orientation::Landscape,
                _ => Orientation::Portrait,
            },
            paging: match raw.paging.as_deref() {
                Some("leftToRight") => Paging::LeftToRight,
                _ => Paging::Vertical,
            },
            viewstate: raw.viewstate,
            background: raw
                .bc
                .as_ref()
                .and_then(parse_color)
                .unwrap_or(Color::WHITE),
            declared_dimension,
            dimension: Size::new(declared_dimension.0, declared_dimension.1),
            scale: 1.0,
        };
        doc.resolve(Size::new(declared_dimension.0, declared_dimension.1));
        tracing::debug!(pages = doc.pages.len(), "document parsed");
        Ok(doc)
    }

    pub fn from_json_str(text: &str, base_url: Option<Url>) -> BookResult<Self> {
        let json: Value = serde_json::from_str(text)
            .map_err(|e| BookError::document(format!("not valid JSON: {e}")))?;
        Self::parse(&json, base_url)
    }

    /// Recompute the viewport-dependent fields.
    pub fn resolve(&mut self, viewport: Size) {
        let (mut w, mut h) = self.declared_dimension;
        let aspect = (viewport.width > 0.0 && viewport.height > 0.0)
            .then(|| viewport.height / viewport.width);
        match aspect {
            Some(a) if w == 0.0 => w = h / a,
            Some(a) if h == 0.0 => h = w * a,
            None if w == 0.0 => w = DEFAULT_DIMENSION.0,
            None if h == 0.0 => h = DEFAULT_DIMENSION.1,
            _ => {}
        }
        self.dimension = Size::new(w, h);
        self.scale = if viewport.width > 0.0 && w > 0.0 {
            viewport.width / w
        } else {
            1.0
        };
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn template_named(&self, name: &str) -> Option<&Props> {
        self.page_templates.get(name)
    }

    pub fn prototype_named(&self, name: &str) -> Option<&Props> {
        self.prototypes.get(name)
    }

    pub fn path_named(&self, name: &str) -> Option<&str> {
        self.paths.get(name).map(String::as_str)
    }

    pub fn voice_named(&self, name: &str) -> Option<&Props> {
        self.voices.get(name)
    }

    /// An element's own bag resolved over its prototype (`template`, legacy `element`).
    pub fn element_props(&self, own: &Props) -> Props {
        let name = own.any_of(&["template", "element"]).and_then(Value::as_str);
        let base = name.and_then(|n| {
            let found = self.prototype_named(n);
            if found.is_none() {
                tracing::warn!(prototype = n, "unknown element prototype");
            }
            found
        });
        inherit::merge(own, base)
    }

    pub fn language(&self, id: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.id == id)
    }

    pub fn title(&self, lang: Option<&str>) -> Option<&str> {
        self.title.as_ref().and_then(|v| localized(v, lang))
    }

    /// Canvas size in device units.
    pub fn canvas(&self) -> Size {
        Size::new(
            self.dimension.width * self.scale,
            self.dimension.height * self.scale,
        )
    }

    /// Absolute form of a resource reference, joined onto the base URL when relative.
    pub fn resolve_url(&self, reference: &str) -> Option<String> {
        if reference.is_empty() {
            return None;
        }
        match Url::parse(reference) {
            Ok(u) => Some(u.into()),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(reference).ok().map(Into::into),
                None => Some(reference.to_owned()),
            },
            Err(e) => {
                tracing::warn!(reference, error = %e, "unusable resource url");
                None
            }
        }
    }
}

impl RawDocument {
    fn deserialize_from(json: &Value) -> BookResult<Self> {
        serde::Deserialize::deserialize(json).map_err(|e: serde_json::Error| {
            BookError::document(e.to_string())
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/document.rs"]
mod tests;
