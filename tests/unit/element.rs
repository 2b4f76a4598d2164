use serde_json::json;

use super::*;

fn doc(extra: Value) -> Document {
    let mut raw = json!({"dimension": [100, 200], "pages": [{}]});
    if let (Some(obj), Value::Object(more)) = (raw.as_object_mut(), extra) {
        obj.extend(more);
    }
    let mut doc = Document::parse(&raw, None).unwrap();
    doc.resolve(Size::new(200.0, 400.0));
    doc
}

fn build(doc: &Document, items: Value) -> Vec<Element> {
    let ctx = BuildCtx {
        doc,
        page: PageIdx(0),
        generation: 1,
        lang: Some("ja"),
        prefetcher: None,
    };
    let mut arena = Vec::new();
    let items = items.as_array().cloned().unwrap();
    Element::build_tree(&items, doc.canvas(), None, &ctx, &mut arena);
    arena
}

#[test]
fn children_are_linked_through_the_arena() {
    let doc = doc(json!({}));
    let arena = build(
        &doc,
        json!([
            {"id": "a", "w": 50, "h": 50, "elements": [{"id": "b"}, {"id": "c"}]},
            {"id": "d"}
        ]),
    );
    assert_eq!(arena.len(), 4);
    assert_eq!(arena[0].children, vec![ElementIdx(1), ElementIdx(2)]);
    assert_eq!(arena[1].parent, Some(ElementIdx(0)));
    assert_eq!(arena[3].id.as_deref(), Some("d"));
    assert_eq!(arena[3].parent, None);
    // Children fill the parent's box, which is 100x100 device units at scale 2.
    assert_eq!(arena[1].layer.frame.size(), Size::new(100.0, 100.0));
}

#[test]
fn prototypes_supply_defaults() {
    let doc = doc(json!({"templates": {"elements": {"red": {"bc": "#ff0000", "w": 10}}}}));
    let arena = build(&doc, json!([{"template": "red", "h": 20}]));
    assert_eq!(arena[0].layer.background, Color::rgba(1.0, 0.0, 0.0, 1.0));
    assert_eq!(arena[0].layer.frame.size(), Size::new(20.0, 40.0));
}

#[test]
fn repeat_and_tiling_freeze_the_clock() {
    let doc = doc(json!({}));
    let arena = build(&doc, json!([{"repeat": true}, {"tiling": true}, {}]));
    assert!(arena[0].repeat && arena[0].layer.clock.is_frozen());
    assert!(!arena[1].repeat && arena[1].layer.clock.is_frozen());
    assert!(!arena[2].layer.clock.is_frozen());
}

#[test]
fn text_is_localized() {
    let doc = doc(json!({}));
    let arena = build(&doc, json!([{"text": {"en": "Hello", "ja": "Konnichiwa"}}]));
    let LayerContents::Text(runs) = &arena[0].layer.contents else {
        panic!("expected text");
    };
    assert_eq!(runs[0].text, "Konnichiwa");
}

#[test]
fn markdown_strings_split_into_lines() {
    let doc = doc(json!({}));
    let arena = build(&doc, json!([{"markdown": "# Title\nbody"}]));
    let LayerContents::Text(runs) = &arena[0].layer.contents else {
        panic!("expected text");
    };
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].text, "Title");
}

#[test]
fn path_gets_natural_size() {
    let doc = doc(json!({}));
    let arena = build(&doc, json!([{"path": "M0,0 L30,0 L30,10 Z", "lineWidth": 2}]));
    assert_eq!(arena[0].layer.frame.size(), Size::new(60.0, 20.0));
    let LayerContents::Shape(shape) = &arena[0].layer.contents else {
        panic!("expected shape");
    };
    assert_eq!(shape.line_width, 4.0);
}

#[test]
fn video_with_duration_is_scrubbed() {
    let doc = doc(json!({}));
    let mut arena = build(
        &doc,
        json!([{"video": "file:///tmp/clip.mp4", "videoStart": 1, "videoDuration": 4}, {"video": "file:///tmp/b.mp4"}]),
    );
    let p = arena[0].player_mut().unwrap();
    assert_eq!(p.scrub, Some((1.0, 4.0)));
    assert!(!arena[1].player_mut().unwrap().is_scrubbed());
}

#[test]
fn speech_resolves_its_voice() {
    let doc = doc(json!({"voices": {"narrator": {"rate": 0.5}}}));
    let arena = build(&doc, json!([{"speech": "hi", "voice": "narrator"}]));
    match &arena[0].attachment {
        Some(Attachment::Speech { text, voice }) => {
            assert_eq!(text, "hi");
            assert_eq!(voice.as_ref().and_then(|v| v.num("rate")), Some(0.5));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn element_repeat_offsets_skip_non_repeating_subtrees() {
    let doc = doc(json!({}));
    let mut arena = build(&doc, json!([{"repeat": true}, {"tiling": true}]));
    assert!(arena[0].apply_offset(0.3, true));
    assert_eq!(arena[0].layer.clock.time_offset, 0.3);
    assert!(!arena[1].apply_offset(0.3, true));
    assert_eq!(arena[1].layer.clock.time_offset, 0.0);
    assert!(arena[1].apply_offset(0.6, false));
    assert_eq!(arena[1].layer.clock.time_offset, 0.6);
}
