use std::{cell::RefCell, path::Path, rc::Rc, sync::Arc};

use serde_json::{Value, json};

use super::*;
use crate::{
    assets::{fetch::OfflineFetcher, store::InMemoryAssetStore},
    config::CacheConfig,
    events::EventBus,
    host::SeekCompletion,
};

type Log = Rc<RefCell<Vec<String>>>;

struct Player {
    name: String,
    log: Log,
}

impl MediaPlayer for Player {
    fn seek(&mut self, seconds: f64, done: SeekCompletion) {
        self.log.borrow_mut().push(format!("seek {} {seconds}", self.name));
        done.complete();
    }
    fn play(&mut self) {
        self.log.borrow_mut().push(format!("play {}", self.name));
    }
    fn pause(&mut self) {
        self.log.borrow_mut().push(format!("pause {}", self.name));
    }
}

#[derive(Default)]
struct Recorder {
    log: Log,
}

impl MediaBackend for Recorder {
    fn open(
        &mut self,
        _kind: MediaKind,
        url: &str,
        _local: Option<&Path>,
        _signal: MediaSignal,
    ) -> Box<dyn MediaPlayer> {
        let name = url.rsplit('/').next().unwrap_or(url).to_owned();
        Box::new(Player {
            name,
            log: self.log.clone(),
        })
    }

    fn speak(&mut self, text: &str, _voice: Option<&Props>, _lang: Option<&str>, _s: MediaSignal) {
        self.log.borrow_mut().push(format!("speak {text}"));
    }

    fn stop_speech(&mut self) {
        self.log.borrow_mut().push("stop speech".into());
    }

    fn vibrate(&mut self) {
        self.log.borrow_mut().push("vibrate".into());
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    doc: Document,
    cache: ResourceCache,
    media: Recorder,
    bus: EventBus,
    tx: Sender<DocEvent>,
    timers: Scheduler<PageTick>,
    notes: Vec<Notification>,
    commands: Vec<Command>,
    options: BookOptions,
}

impl Fixture {
    fn new(pages: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResourceCache::new(
            &CacheConfig::with_root(dir.path().join("cache")),
            Arc::new(InMemoryAssetStore::new()),
            Arc::new(OfflineFetcher),
        )
        .unwrap();
        let doc = Document::parse(&json!({ "pages": pages }), None).unwrap();
        let bus = EventBus::default();
        Self {
            _dir: dir,
            doc,
            cache,
            media: Recorder::default(),
            tx: bus.sender(),
            bus,
            timers: Scheduler::default(),
            notes: Vec::new(),
            commands: Vec::new(),
            options: BookOptions::default(),
        }
    }

    fn env(&mut self) -> PageEnv<'_> {
        PageEnv {
            doc: &self.doc,
            cache: &self.cache,
            media: &mut self.media,
            events: &self.tx,
            timers: &mut self.timers,
            notes: &mut self.notes,
            commands: &mut self.commands,
            options: &self.options,
            lang: None,
        }
    }

    fn page(&self, i: u32) -> Page {
        Page::new(PageIdx(i), &self.doc.pages[i as usize], &self.options)
    }

    fn pump(&mut self, page: &mut Page) {
        while let Some(ev) = self.bus.try_next() {
            match ev {
                DocEvent::ResourcesReady { generation, .. } => {
                    page.finish_load(generation, &mut self.env())
                }
                DocEvent::SeekCompleted(h) => page.seek_completed(&h, &mut self.env()),
                DocEvent::MediaFinished(h) => page.media_finished(&h, &mut self.env()),
            }
        }
    }

    fn loaded(&mut self, i: u32) -> Page {
        let mut page = self.page(i);
        page.load_view(&mut self.env());
        self.pump(&mut page);
        assert_eq!(page.state(), PageState::Ready);
        page
    }

    /// Fire every tick due within `dt`, recording the offset after each.
    fn advance(&mut self, page: &mut Page, dt: f64) -> Vec<f64> {
        let until = self.timers.now() + dt;
        let mut offsets = Vec::new();
        while let Some(tick) = self.timers.pop_due(until) {
            page.on_tick(tick, &mut self.env());
            offsets.push(page.offset());
            self.pump(page);
        }
        self.timers.settle_at(until);
        offsets
    }

    fn log(&self) -> Vec<String> {
        self.media.log.borrow().clone()
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn autoplay_advances_by_one_tick_step_and_stops() {
    let mut fx = Fixture::new(json!([{"duration": 0.2, "fps": 60}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());
    assert!(page.is_playing_token(PlayToken::Autoplay));

    let offsets = fx.advance(&mut page, 1.0);
    assert_eq!(offsets.len(), 12);
    for (i, pair) in offsets.windows(2).enumerate() {
        assert!(close(pair[1] - pair[0], 1.0 / 12.0), "step {i}: {pair:?}");
    }
    assert_eq!(*offsets.last().unwrap(), 1.0);
    assert!(!page.is_playing());
    assert!(fx.timers.is_empty());
    assert_eq!(
        fx.notes
            .iter()
            .filter(|n| matches!(n, Notification::PageFinishedPlaying(_)))
            .count(),
        1
    );
}

#[test]
fn fractional_tick_counts_step_exactly_and_clamp_at_the_end() {
    let mut fx = Fixture::new(json!([{"duration": 0.25, "fps": 30}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());

    let offsets = fx.advance(&mut page, 2.0);
    assert_eq!(offsets.len(), 8);
    assert!(close(offsets[0], 1.0 / 7.5), "{offsets:?}");
    assert!(close(offsets[6], 7.0 / 7.5));
    assert_eq!(offsets[7], 1.0);
    assert!(!page.is_playing());
}

#[test]
fn repeating_page_wraps_to_zero() {
    let mut fx = Fixture::new(json!([{"duration": 0.2, "fps": 60, "repeat": true}]));
    let mut page = fx.loaded(0);
    page.did_enter(false, &mut fx.env());
    let offsets = fx.advance(&mut page, 13.5 / 60.0);
    assert_eq!(offsets.len(), 13);
    assert!(close(offsets[10], 11.0 / 12.0));
    assert_eq!(offsets[11], 0.0);
    assert!(close(offsets[12], 1.0 / 12.0));
    assert!(page.is_playing());
}

#[test]
fn leaving_stops_the_loop_at_fire_time() {
    let mut fx = Fixture::new(json!([{"repeat": true}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());
    fx.advance(&mut page, 3.5 / 60.0);
    page.will_leave(true);
    page.did_leave(false, &mut fx.env());
    let offset = page.offset();
    let late = fx.advance(&mut page, 1.0);
    assert!(late.iter().all(|o| *o == offset));
    assert!(fx.timers.is_empty());
    assert!(!page.is_playing());
}

#[test]
fn reentering_before_the_pending_tick_does_not_double_the_loop() {
    let mut fx = Fixture::new(json!([{"repeat": true}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());
    page.did_leave(false, &mut fx.env());
    page.did_enter(true, &mut fx.env());
    assert_eq!(fx.timers.len(), 1);
    assert_eq!(fx.advance(&mut page, 2.5 / 60.0).len(), 2);
}

#[test]
fn play_mode_decides_autoplay() {
    let mut fx = Fixture::new(json!([{}, {"play": "always"}, {"animation": "never"}]));
    let mut auto = fx.loaded(0);
    auto.did_enter(false, &mut fx.env());
    assert!(!auto.is_playing());

    let mut always = fx.loaded(1);
    always.did_enter(false, &mut fx.env());
    assert!(always.is_playing());

    let mut never = fx.loaded(2);
    never.did_enter(true, &mut fx.env());
    assert!(!never.is_playing());
}

#[test]
fn non_repeating_page_hands_over_to_element_repeat() {
    let mut fx = Fixture::new(json!([{"duration": 0.05, "fps": 60, "elements": [
        {"id": "spinner", "repeat": true},
        {"id": "still", "tiling": true}
    ]}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());
    fx.advance(&mut page, 3.5 / 60.0);
    assert_eq!(page.offset(), 1.0);
    assert_eq!(page.tick_mode(), TickMode::ElementRepeat);

    fx.advance(&mut page, 1.0 / 60.0);
    assert_eq!(page.offset(), 1.0);
    let spinner = page.element(page.find("spinner").unwrap()).unwrap();
    let still = page.element(page.find("still").unwrap()).unwrap();
    assert!(close(spinner.layer.clock.time_offset, 1.0 / 3.0));
    assert_eq!(still.layer.clock.time_offset, 1.0);
}

#[test]
fn element_repeat_only_loop_holds_the_master() {
    let mut fx = Fixture::new(json!([{"play": "never", "elements": [{"repeat": true}]}]));
    let mut page = fx.loaded(0);
    page.prepare(true, &mut fx.env());
    page.did_enter(true, &mut fx.env());
    assert!(!page.is_playing());
    assert_eq!(page.tick_mode(), TickMode::ElementRepeat);
    fx.advance(&mut page, 2.5 / 60.0);
    assert_eq!(page.offset(), 0.0);
    assert!(close(page.elements()[0].layer.clock.time_offset, 2.0 / 12.0));
}

#[test]
fn did_enter_waits_for_the_load() {
    let mut fx = Fixture::new(json!([{}]));
    let mut page = fx.page(0);
    page.load_view(&mut fx.env());
    page.did_enter(true, &mut fx.env());
    assert!(!page.is_entered());
    fx.pump(&mut page);
    assert!(page.is_entered());
    assert!(page.is_playing());
}

#[test]
fn stale_load_completions_are_ignored() {
    let mut fx = Fixture::new(json!([{"elements": [{}]}]));
    let mut page = fx.page(0);
    page.load_view(&mut fx.env());
    page.unload_view(&mut fx.env());
    fx.pump(&mut page);
    assert_eq!(page.state(), PageState::Unloaded);
    assert!(page.elements().is_empty());
}

#[test]
fn missing_resources_fail_the_page_when_required() {
    let mut fx = Fixture::new(json!([{"elements": [{"img": "https://down.invalid/a.png"}]}]));
    fx.options.require_all_resources = true;
    let mut page = fx.page(0);
    page.load_view(&mut fx.env());
    assert!(fx.cache.run_until_idle(std::time::Duration::from_secs(5)));
    fx.pump(&mut page);
    assert_eq!(page.state(), PageState::Failed);
    assert!(matches!(fx.notes.last(), Some(Notification::PageFailed { failed, .. }) if failed.len() == 1));
}

#[test]
fn prepare_sets_rest_offsets() {
    let mut fx = Fixture::new(json!([{"elements": [{"tiling": true}]}]));
    let mut page = fx.loaded(0);
    page.prepare(false, &mut fx.env());
    assert_eq!(page.offset(), 1.0);
    assert_eq!(page.elements()[0].layer.clock.time_offset, 1.0);
    assert_eq!(page.view().clock.time_offset, 1.0);
    assert!(!page.is_entered());
    page.prepare(true, &mut fx.env());
    assert_eq!(page.offset(), 0.0);
}

#[test]
fn did_leave_rewinds_when_asked() {
    let mut fx = Fixture::new(json!([{"play": "never"}, {"play": "never", "rewind": true}]));
    let mut plain = fx.loaded(0);
    plain.set_time_offset(0.5, false, &mut fx.env());
    plain.did_leave(false, &mut fx.env());
    assert_eq!(plain.offset(), 0.5);
    plain.did_leave(true, &mut fx.env());
    assert_eq!(plain.offset(), 0.0);

    let mut rewinding = fx.loaded(1);
    rewinding.set_time_offset(0.5, false, &mut fx.env());
    rewinding.did_leave(false, &mut fx.env());
    assert_eq!(rewinding.offset(), 0.0);
}

#[test]
fn dragging_only_scrubs_scroll_pages() {
    let mut fx = Fixture::new(json!([{"play": "never"}, {"transition": "replace"}]));
    let mut scroll = fx.loaded(0);
    scroll.did_enter(true, &mut fx.env());
    assert!(scroll.is_entered());
    scroll.set_time_offset_while_dragging(0.4, &mut fx.env());
    assert_eq!(scroll.offset(), 0.4);
    assert!(!scroll.is_entered());

    let mut replace = fx.loaded(1);
    replace.set_time_offset_while_dragging(0.4, &mut fx.env());
    assert_eq!(replace.offset(), 0.0);
}

#[test]
fn pause_and_play_resume_from_the_paused_offset() {
    let mut fx = Fixture::new(json!([{"duration": 1.0, "fps": 10}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());
    fx.advance(&mut page, 0.35);
    assert!(close(page.offset(), 0.3));
    page.pause(&mut fx.env());
    fx.advance(&mut page, 1.0);
    assert!(close(page.offset(), 0.3));
    page.play(&mut fx.env());
    let offsets = fx.advance(&mut page, 0.15);
    assert!(close(offsets[0], 0.4));
}

#[test]
fn playing_edges_collapse_nested_media() {
    let mut fx = Fixture::new(json!([{"audio": "file:///tmp/theme.mp3", "elements": [
        {"radio": "file:///tmp/live.mp3"},
        {"speech": "hello"},
        {"action": "play", "id": "button"}
    ]}]));
    let mut page = fx.loaded(0);
    let button = page.find("button").unwrap();
    page.did_enter(true, &mut fx.env());
    assert!(page.is_playing_token(PlayToken::Audio));
    assert!(page.element(button).unwrap().layer.hidden);
    let started = |notes: &[Notification]| {
        notes
            .iter()
            .filter(|n| matches!(n, Notification::PageStartedPlaying(_)))
            .count()
    };
    assert_eq!(started(&fx.notes), 1);
    assert!(fx.log().contains(&"play theme.mp3".to_owned()));
    assert!(fx.log().contains(&"speak hello".to_owned()));

    page.did_leave(false, &mut fx.env());
    assert!(!page.is_playing());
    assert!(!page.element(button).unwrap().layer.hidden);
    assert!(fx.log().contains(&"pause live.mp3".to_owned()));
    assert!(fx.log().contains(&"stop speech".to_owned()));
    assert_eq!(
        fx.notes
            .iter()
            .filter(|n| matches!(n, Notification::PageFinishedPlaying(_)))
            .count(),
        1
    );
}

#[test]
fn media_finishing_ends_playing_after_autoplay() {
    let mut fx = Fixture::new(json!([{"duration": 0.05, "fps": 60, "audio": "file:///tmp/a.mp3"}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());
    fx.advance(&mut page, 1.0);
    assert!(page.is_playing());
    let handle = MediaHandle {
        owner: MediaOwner::Page(PageIdx(0)),
        generation: page.generation(),
    };
    page.media_finished(&handle, &mut fx.env());
    assert!(!page.is_playing());
}

#[test]
fn scrubbed_video_seeks_to_mapped_time() {
    let mut fx = Fixture::new(json!([{"play": "never", "elements": [
        {"video": "file:///tmp/clip.mp4", "videoStart": 2, "videoDuration": 10}
    ]}]));
    let mut page = fx.loaded(0);
    page.set_time_offset(0.5, false, &mut fx.env());
    fx.pump(&mut page);
    assert!(fx.log().contains(&"seek clip.mp4 7".to_owned()));
}

#[test]
fn vibrate_on_will_enter() {
    let mut fx = Fixture::new(json!([{"vibrate": true}]));
    let mut page = fx.loaded(0);
    page.will_enter(true, &mut fx.env());
    assert_eq!(fx.log(), vec!["vibrate".to_owned()]);
}

#[test]
fn tap_queues_element_commands() {
    let mut fx = Fixture::new(json!([{"play": "never", "elements": [
        {"id": "go", "events": {"tapped": {"actions": [{"goto": {"page": 3}}]}}},
        {"id": "start", "action": "play"}
    ]}]));
    let mut page = fx.loaded(0);
    let go = page.find("go").unwrap();
    page.tap(go, &mut fx.env());
    assert_eq!(fx.commands, vec![Command::GoTo(3)]);
    let start = page.find("start").unwrap();
    page.tap(start, &mut fx.env());
    assert_eq!(fx.commands.len(), 1);
    assert!(page.is_playing_token(PlayToken::Autoplay));
}

#[test]
fn unload_clears_the_view_and_bumps_generation() {
    let mut fx = Fixture::new(json!([{"elements": [{}, {}]}]));
    let mut page = fx.loaded(0);
    let generation = page.generation();
    page.unload_view(&mut fx.env());
    assert_eq!(page.generation(), generation + 1);
    assert!(page.elements().is_empty());
    assert_eq!(fx.notes.last(), Some(&Notification::PageUnloaded(PageIdx(0))));
}

#[test]
fn entering_queues_enter_commands() {
    let mut fx = Fixture::new(json!([{"play": "never", "events": {"enter": {"actions": [{"play": {}}]}}}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());
    assert_eq!(fx.commands, vec![Command::Play]);
}

#[test]
fn eye_position_sets_a_scaled_view_perspective() {
    let mut fx = Fixture::new(json!([{"eyePosition": 500}, {"eyePosition": -3}, {}]));
    fx.doc.resolve(crate::foundation::core::Size::new(640.0, 1136.0));
    assert_eq!(fx.loaded(0).view().perspective, Some(1000.0));
    assert_eq!(fx.loaded(1).view().perspective, None);
    assert_eq!(fx.loaded(2).view().perspective, None);
}

#[test]
fn autoplay_ticks_seek_scrubbed_video_like_a_manual_scrub() {
    let mut fx = Fixture::new(json!([{"duration": 1.0, "fps": 4, "elements": [
        {"video": "file:///tmp/clip.mp4", "videoDuration": 8}
    ]}]));
    let mut page = fx.loaded(0);
    page.did_enter(true, &mut fx.env());
    assert_eq!(fx.advance(&mut page, 0.3), vec![0.25]);
    assert!(fx.log().contains(&"seek clip.mp4 2".to_owned()));

    page.set_time_offset(0.5, false, &mut fx.env());
    fx.pump(&mut page);
    assert!(fx.log().contains(&"seek clip.mp4 4".to_owned()));
}
