//! A page: lifecycle, playback bookkeeping and the timer loop that drives its timeline.
//!
//! Every time-offset change, whether it comes from autoplay ticks, a drag or a rest position,
//! goes through the same element walk. The timer loop has no cancellation token: each tick checks
//! `entered && !pausing` when it fires and simply does not reschedule otherwise.

pub mod policy;

use std::collections::HashSet;

use crossbeam_channel::Sender;

use crate::{
    assets::{cache::ResourceCache, closure::page_resources, prefetch::Prefetcher},
    config::BookOptions,
    element::{
        Attachment, BuildCtx, Element,
        action::{Action, Command, EventTable},
        media::MediaCtx,
    },
    events::{DocEvent, Notification},
    foundation::{
        core::{Color, Point, Rect, clamp_offset},
        ids::{ElementIdx, PageIdx},
        props::{Props, PropsExt},
    },
    host::{MediaBackend, MediaHandle, MediaKind, MediaOwner, MediaPlayer, MediaSignal},
    model::document::{Document, ResolvedPage},
    page::policy::PagePolicy,
    parse::style::parse_color,
    timeline::{clock::LayerClock, layer::Layer, scheduler::Scheduler},
};

/// Accumulated steps this close to the end of a pass count as having reached it.
const PASS_EPSILON: f64 = 1e-9;

/// Timer payload for a page's playback loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageTick {
    pub page: PageIdx,
    pub generation: u64,
}

/// Book-owned services a page operation may touch.
pub struct PageEnv<'a> {
    pub doc: &'a Document,
    pub cache: &'a ResourceCache,
    pub media: &'a mut dyn MediaBackend,
    pub events: &'a Sender<DocEvent>,
    pub timers: &'a mut Scheduler<PageTick>,
    pub notes: &'a mut Vec<Notification>,
    /// Commands raised by page and element events, run by the book afterwards.
    pub commands: &'a mut Vec<Command>,
    pub options: &'a BookOptions,
    pub lang: Option<&'a str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageState {
    Unloaded,
    /// View requested, resources still being fetched.
    Loading,
    Ready,
    /// Resources failed while the host requires all of them.
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickMode {
    /// Advance the page's master offset.
    Master,
    /// Hold the master offset and cycle only `repeat` elements.
    ElementRepeat,
}

/// Something that keeps the page "playing".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlayToken {
    Autoplay,
    Audio,
    Element(ElementIdx),
}

pub struct Page {
    index: PageIdx,
    props: Props,
    template: Option<String>,
    policy: PagePolicy,
    state: PageState,
    generation: u64,
    prefetcher: Option<Prefetcher>,
    deferred_enter: Option<bool>,
    view: Layer,
    elements: Vec<Element>,
    roots: Vec<ElementIdx>,
    events: EventTable,
    audio: Option<Box<dyn MediaPlayer>>,
    entered: bool,
    pausing: bool,
    offset: f64,
    paused_offset: Option<f64>,
    /// Offset of the element-repeat loop; the master offset stays put meanwhile.
    repeat_offset: f64,
    tick_mode: TickMode,
    tick_pending: bool,
    playing: HashSet<PlayToken>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .field("template", &self.template)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("elements", &self.elements.len())
            .field("entered", &self.entered)
            .field("pausing", &self.pausing)
            .field("offset", &self.offset)
            .field("tick_mode", &self.tick_mode)
            .field("playing", &self.playing)
            .finish()
    }
}

impl Page {
    pub fn new(index: PageIdx, resolved: &ResolvedPage, options: &BookOptions) -> Self {
        Self {
            index,
            policy: PagePolicy::from_props(&resolved.props, options),
            props: resolved.props.clone(),
            template: resolved.template.clone(),
            state: PageState::Unloaded,
            generation: 0,
            prefetcher: None,
            deferred_enter: None,
            view: Layer::default(),
            elements: Vec::new(),
            roots: Vec::new(),
            events: EventTable::default(),
            audio: None,
            entered: false,
            pausing: false,
            offset: 0.0,
            paused_offset: None,
            repeat_offset: 0.0,
            tick_mode: TickMode::Master,
            tick_pending: false,
            playing: HashSet::new(),
        }
    }

    pub fn index(&self) -> PageIdx {
        self.index
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Name of the page template this page was resolved over.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn policy(&self) -> &PagePolicy {
        &self.policy
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Load generation; bumped by every load and unload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn prefetcher(&self) -> Option<&Prefetcher> {
        self.prefetcher.as_ref()
    }

    /// Root layer of the page; its frozen clock carries the master offset.
    pub fn view(&self) -> &Layer {
        &self.view
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn roots(&self) -> &[ElementIdx] {
        &self.roots
    }

    pub fn element(&self, idx: ElementIdx) -> Option<&Element> {
        self.elements.get(idx.get())
    }

    pub fn find(&self, id: &str) -> Option<ElementIdx> {
        self.elements
            .iter()
            .position(|e| e.id.as_deref() == Some(id))
            .map(|i| ElementIdx(i as u32))
    }

    pub fn events(&self) -> &EventTable {
        &self.events
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn tick_mode(&self) -> TickMode {
        self.tick_mode
    }

    pub fn is_playing(&self) -> bool {
        !self.playing.is_empty()
    }

    pub fn is_playing_token(&self, token: PlayToken) -> bool {
        self.playing.contains(&token)
    }

    pub fn has_repeat_elements(&self) -> bool {
        self.elements.iter().any(|e| e.repeat)
    }

    /// Materialize the view: prefetch the page's resource closure. Elements are built once the
    /// prefetch settles (see [`Page::finish_load`]).
    #[tracing::instrument(skip(self, env), fields(page = self.index.0))]
    pub fn load_view(&mut self, env: &mut PageEnv<'_>) {
        if self.state != PageState::Unloaded {
            return;
        }
        self.generation += 1;
        self.state = PageState::Loading;
        let urls = page_resources(env.doc, &self.props);
        tracing::debug!(resources = urls.len(), "page loading");

        let prefetcher = Prefetcher::new(env.cache.clone());
        let (page, generation, tx) = (self.index, self.generation, env.events.clone());
        prefetcher.start(&urls, move |_| {
            let _ = tx.send(DocEvent::ResourcesReady { page, generation });
        });
        self.prefetcher = Some(prefetcher);
    }

    /// Build elements after the prefetch of load `generation` settled. Stale generations are
    /// ignored.
    pub fn finish_load(&mut self, generation: u64, env: &mut PageEnv<'_>) {
        if generation != self.generation || self.state != PageState::Loading {
            tracing::trace!(page = self.index.0, generation, "stale load completion");
            return;
        }
        let Some(prefetcher) = self.prefetcher.clone() else {
            return;
        };
        let outcome = prefetcher.outcome();
        if env.options.require_all_resources && !outcome.failed.is_empty() {
            tracing::warn!(
                page = self.index.0,
                failed = outcome.failed.len(),
                "page resources missing"
            );
            self.state = PageState::Failed;
            self.deferred_enter = None;
            env.notes.push(Notification::PageFailed {
                page: self.index,
                failed: outcome.errors,
            });
            return;
        }

        let canvas = env.doc.canvas();
        self.view = Layer {
            frame: Rect::from_origin_size(Point::ZERO, canvas),
            background: self
                .props
                .value("bc")
                .and_then(parse_color)
                .unwrap_or(Color::CLEAR),
            perspective: self.policy.eye_position.map(|eye| eye * env.doc.scale),
            clock: LayerClock::frozen(),
            ..Layer::default()
        };
        let ctx = BuildCtx {
            doc: env.doc,
            page: self.index,
            generation,
            lang: env.lang,
            prefetcher: Some(&prefetcher),
        };
        let items = self.props.array("elements").cloned().unwrap_or_default();
        self.elements.clear();
        self.roots = Element::build_tree(&items, canvas, None, &ctx, &mut self.elements);
        self.events = EventTable::parse(self.props.value("events"));
        self.state = PageState::Ready;
        tracing::debug!(
            page = self.index.0,
            elements = self.elements.len(),
            "page ready"
        );
        env.notes.push(Notification::PageLoaded {
            page: self.index,
            failed: outcome.errors,
        });

        self.apply_offset(self.offset, false, env);
        self.refresh_action_elements();
        if let Some(forward) = self.deferred_enter.take() {
            self.did_enter(forward, env);
        }
    }

    /// Tear the view down. In-flight completions for the old load become no-ops.
    pub fn unload_view(&mut self, env: &mut PageEnv<'_>) {
        if self.state == PageState::Unloaded {
            return;
        }
        self.halt(env);
        self.generation += 1;
        self.state = PageState::Unloaded;
        self.elements.clear();
        self.roots.clear();
        self.events = EventTable::default();
        self.prefetcher = None;
        self.audio = None;
        self.view = Layer::default();
        self.entered = false;
        self.pausing = false;
        self.tick_pending = false;
        self.deferred_enter = None;
        self.paused_offset = None;
        tracing::debug!(page = self.index.0, "page unloaded");
        env.notes.push(Notification::PageUnloaded(self.index));
    }

    /// Put the page at its rest offset for the travel direction without entering it.
    pub fn prepare(&mut self, forward: bool, env: &mut PageEnv<'_>) {
        self.entered = false;
        self.paused_offset = None;
        self.apply_offset(if forward { 0.0 } else { 1.0 }, false, env);
    }

    pub fn will_enter(&mut self, forward: bool, env: &mut PageEnv<'_>) {
        tracing::trace!(page = self.index.0, forward, "will enter");
        self.pausing = false;
        if self.policy.vibrate {
            env.media.vibrate();
        }
    }

    /// Start autoplay or the element-repeat loop. Deferred until the view is ready.
    pub fn did_enter(&mut self, forward: bool, env: &mut PageEnv<'_>) {
        match self.state {
            PageState::Loading => {
                self.deferred_enter = Some(forward);
                return;
            }
            PageState::Ready => {}
            PageState::Unloaded | PageState::Failed => return,
        }
        tracing::trace!(page = self.index.0, forward, "did enter");
        self.entered = true;
        self.pausing = false;
        env.commands.extend_from_slice(self.events.commands("enter"));
        if self.policy.autoplays(forward) {
            self.play(env);
        } else if self.has_repeat_elements() {
            self.tick_mode = TickMode::ElementRepeat;
            self.repeat_offset = 0.0;
            self.schedule_tick(env);
        }
    }

    pub fn will_leave(&mut self, advancing: bool) {
        tracing::trace!(page = self.index.0, advancing, "will leave");
        self.deferred_enter = None;
    }

    /// Pause everything; rewind to the start when the page asks for it or the reader went back.
    pub fn did_leave(&mut self, going_back: bool, env: &mut PageEnv<'_>) {
        tracing::trace!(page = self.index.0, going_back, "did leave");
        self.pause(env);
        self.entered = false;
        self.deferred_enter = None;
        self.paused_offset = None;
        if self.policy.rewind || going_back {
            self.apply_offset(0.0, false, env);
        }
    }

    /// Start the master timeline from the paused or current offset, plus the page's media.
    pub fn play(&mut self, env: &mut PageEnv<'_>) {
        if self.state != PageState::Ready {
            return;
        }
        self.pausing = false;
        let mut start = self.paused_offset.take().unwrap_or(self.offset);
        if start >= 1.0 {
            start = 0.0;
        }
        self.tick_mode = TickMode::Master;
        self.apply_offset(start, false, env);
        self.add_token(PlayToken::Autoplay, env.notes);
        self.start_media(env);
        self.schedule_tick(env);
    }

    pub fn pause(&mut self, env: &mut PageEnv<'_>) {
        if self.playing.contains(&PlayToken::Autoplay) {
            self.paused_offset = Some(self.offset);
        }
        self.pausing = true;
        self.halt(env);
    }

    /// Drag-driven scrub. Only pages with the scroll transition follow the drag; the page stops
    /// counting as entered so the timer loop does not fight the finger.
    pub fn set_time_offset_while_dragging(&mut self, offset: f64, env: &mut PageEnv<'_>) {
        if self.policy.transition != policy::Transition::Scroll {
            return;
        }
        self.entered = false;
        self.remove_token(PlayToken::Autoplay, env.notes);
        self.apply_offset(offset, false, env);
    }

    /// Apply `offset` to the master clock (unless `element_repeat`) and every element.
    pub fn set_time_offset(&mut self, offset: f64, element_repeat: bool, env: &mut PageEnv<'_>) {
        self.apply_offset(offset, element_repeat, env);
    }

    /// One fire of the playback timer.
    pub fn on_tick(&mut self, tick: PageTick, env: &mut PageEnv<'_>) {
        if tick.generation != self.generation {
            return;
        }
        self.tick_pending = false;
        if !self.entered || self.pausing || self.state != PageState::Ready {
            return;
        }
        let step = self.policy.step();
        match self.tick_mode {
            TickMode::Master => {
                let next = self.offset + step;
                if next < 1.0 - PASS_EPSILON {
                    self.apply_offset(next, false, env);
                } else if self.policy.repeat {
                    self.apply_offset(0.0, false, env);
                } else {
                    self.apply_offset(1.0, false, env);
                    self.remove_token(PlayToken::Autoplay, env.notes);
                    if !self.has_repeat_elements() {
                        return;
                    }
                    self.tick_mode = TickMode::ElementRepeat;
                    self.repeat_offset = 0.0;
                }
            }
            TickMode::ElementRepeat => {
                let next = self.repeat_offset + step;
                self.repeat_offset = if next < 1.0 - PASS_EPSILON { next } else { 0.0 };
                self.apply_offset(self.repeat_offset, true, env);
            }
        }
        self.schedule_tick(env);
    }

    /// Handle a tap on `element`; its `tapped` commands are queued for the book.
    pub fn tap(&mut self, element: ElementIdx, env: &mut PageEnv<'_>) {
        let Some(el) = self.elements.get(element.get()) else {
            return;
        };
        env.commands.extend_from_slice(el.events.commands("tapped"));
        if el.action == Some(Action::Play) {
            self.play(env);
        }
    }

    pub fn seek_completed(&mut self, handle: &MediaHandle, env: &mut PageEnv<'_>) {
        let MediaOwner::Element(_, element) = handle.owner else {
            return;
        };
        if handle.generation != self.generation {
            return;
        }
        let (page, generation) = (self.index, self.generation);
        if let Some(player) = self
            .elements
            .get_mut(element.get())
            .and_then(Element::player_mut)
        {
            let mut ctx = MediaCtx {
                media: &mut *env.media,
                events: env.events,
                handle: MediaHandle::element(page, element, generation),
            };
            player.seek_completed(&mut ctx);
        }
    }

    /// Media owned by this page reached its end on its own.
    pub fn media_finished(&mut self, handle: &MediaHandle, env: &mut PageEnv<'_>) {
        if handle.generation != self.generation {
            return;
        }
        match handle.owner {
            MediaOwner::Page(_) => {
                self.audio = None;
                self.remove_token(PlayToken::Audio, env.notes);
            }
            MediaOwner::Element(_, element) => {
                if let Some(player) = self
                    .elements
                    .get_mut(element.get())
                    .and_then(Element::player_mut)
                {
                    player.finished();
                }
                self.remove_token(PlayToken::Element(element), env.notes);
            }
            MediaOwner::Template(_) => {}
        }
    }

    fn apply_offset(&mut self, offset: f64, element_repeat: bool, env: &mut PageEnv<'_>) {
        let offset = clamp_offset(offset);
        if !element_repeat {
            self.offset = offset;
            self.view.clock.time_offset = offset;
        }
        for root in self.roots.clone() {
            self.visit(root, offset, element_repeat, env);
        }
    }

    fn visit(
        &mut self,
        idx: ElementIdx,
        offset: f64,
        element_repeat: bool,
        env: &mut PageEnv<'_>,
    ) {
        let (page, generation) = (self.index, self.generation);
        let Some(el) = self.elements.get_mut(idx.get()) else {
            return;
        };
        if !el.apply_offset(offset, element_repeat) {
            return;
        }
        if let Some(player) = el.player_mut()
            && player.is_scrubbed()
        {
            let mut ctx = MediaCtx {
                media: &mut *env.media,
                events: env.events,
                handle: MediaHandle::element(page, idx, generation),
            };
            player.scrub_to(offset, &mut ctx);
        }
        for child in el.children.clone() {
            self.visit(child, offset, element_repeat, env);
        }
    }

    fn schedule_tick(&mut self, env: &mut PageEnv<'_>) {
        if self.tick_pending {
            return;
        }
        self.tick_pending = true;
        env.timers.schedule_in(
            self.policy.tick_interval(),
            PageTick {
                page: self.index,
                generation: self.generation,
            },
        );
    }

    fn start_media(&mut self, env: &mut PageEnv<'_>) {
        let mut started = Vec::new();

        if self.audio.is_none()
            && let Some(url) = self.props.string("audio").and_then(|r| env.doc.resolve_url(r))
        {
            let local = self.prefetcher.as_ref().and_then(|p| p.map(&url));
            let kind = if self.props.flag("stream").unwrap_or(false) {
                MediaKind::Radio
            } else {
                MediaKind::Audio
            };
            let handle = MediaHandle {
                owner: MediaOwner::Page(self.index),
                generation: self.generation,
            };
            let mut player = env.media.open(
                kind,
                &url,
                local.as_deref(),
                MediaSignal::new(handle, env.events.clone()),
            );
            player.play();
            self.audio = Some(player);
            started.push(PlayToken::Audio);
        }

        let (page, generation) = (self.index, self.generation);
        for (i, el) in self.elements.iter_mut().enumerate() {
            let idx = ElementIdx(i as u32);
            let handle = MediaHandle::element(page, idx, generation);
            match el.attachment.as_mut() {
                Some(Attachment::Player(player)) if !player.is_scrubbed() => {
                    let mut ctx = MediaCtx {
                        media: &mut *env.media,
                        events: env.events,
                        handle,
                    };
                    if player.play(&mut ctx) {
                        started.push(PlayToken::Element(idx));
                    }
                }
                Some(Attachment::Speech { text, voice }) => {
                    env.media.speak(
                        text,
                        voice.as_ref(),
                        env.lang,
                        MediaSignal::new(handle, env.events.clone()),
                    );
                    started.push(PlayToken::Element(idx));
                }
                _ => {}
            }
        }
        for token in started {
            self.add_token(token, env.notes);
        }
    }

    /// Stop all media and drop every playing token.
    fn halt(&mut self, env: &mut PageEnv<'_>) {
        if let Some(mut audio) = self.audio.take() {
            audio.pause();
        }
        let mut speaking = false;
        for (i, el) in self.elements.iter_mut().enumerate() {
            match el.attachment.as_mut() {
                Some(Attachment::Player(player)) => {
                    player.pause();
                }
                Some(Attachment::Speech { .. }) => {
                    speaking |= self
                        .playing
                        .contains(&PlayToken::Element(ElementIdx(i as u32)));
                }
                None => {}
            }
        }
        if speaking {
            env.media.stop_speech();
        }
        if !self.playing.is_empty() {
            self.playing.clear();
            env.notes.push(Notification::PageFinishedPlaying(self.index));
            self.refresh_action_elements();
        }
    }

    fn add_token(&mut self, token: PlayToken, notes: &mut Vec<Notification>) {
        let was_idle = self.playing.is_empty();
        if self.playing.insert(token) && was_idle {
            notes.push(Notification::PageStartedPlaying(self.index));
            self.refresh_action_elements();
        }
    }

    fn remove_token(&mut self, token: PlayToken, notes: &mut Vec<Notification>) {
        if self.playing.remove(&token) && self.playing.is_empty() {
            notes.push(Notification::PageFinishedPlaying(self.index));
            self.refresh_action_elements();
        }
    }

    fn refresh_action_elements(&mut self) {
        let playing = !self.playing.is_empty();
        for el in &mut self.elements {
            if el.action == Some(Action::Play) {
                el.layer.hidden = playing;
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/page.rs"]
mod tests;
