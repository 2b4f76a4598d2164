//! Resource closure of a page: every remote file it needs before it can render.

use serde_json::Value;

use crate::{
    assets::prefetch::ResourceSet,
    foundation::props::{Props, PropsExt},
    model::document::Document,
};

pub const IMAGES: &str = "images";
pub const VIDEO: &str = "video";
pub const AUDIO: &str = "audio";

/// Walk a resolved page bag: page audio, the template's ambient track and the element tree with
/// prototypes expanded. Streams are left out.
pub fn page_resources(doc: &Document, page: &Props) -> ResourceSet {
    let mut set = ResourceSet::new();
    if !page.flag("stream").unwrap_or(false) {
        for key in ["audio", "bgm"] {
            add(doc, &mut set, page.string(key), AUDIO);
        }
    }
    if let Some(items) = page.array("elements") {
        walk(doc, items, &mut set);
    }
    set
}

/// Resources of one element subtree given by its own (unexpanded) bag.
pub fn element_resources(doc: &Document, own: &Props) -> ResourceSet {
    let mut set = ResourceSet::new();
    walk_one(doc, own, &mut set);
    set
}

fn walk(doc: &Document, items: &[Value], set: &mut ResourceSet) {
    for own in items.iter().filter_map(Value::as_object) {
        walk_one(doc, own, set);
    }
}

fn walk_one(doc: &Document, own: &Props, set: &mut ResourceSet) {
    let props = doc.element_props(own);
    for key in ["img", "mask", "sprite"] {
        add(doc, set, props.string(key), IMAGES);
    }
    if !props.flag("stream").unwrap_or(false) {
        add(doc, set, props.string("video"), VIDEO);
    }
    if let Some(children) = props.array("elements") {
        walk(doc, children, set);
    }
}

fn add(doc: &Document, set: &mut ResourceSet, reference: Option<&str>, prefix: &str) {
    if let Some(url) = reference.and_then(|r| doc.resolve_url(r)) {
        set.entry(url).or_insert_with(|| prefix.to_owned());
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/closure.rs"]
mod tests;
