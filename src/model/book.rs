//! An open document: pages, active template tracking and navigation.
//!
//! The book is the only owner of mutable playback state. Pages are addressed by index, and
//! everything that completes off the main thread comes back through the book's event bus and is
//! dispatched from [`Book::pump`].

use std::{collections::BTreeMap, time::Duration};

use serde_json::Value;
use url::Url;

use crate::{
    assets::cache::ResourceCache,
    config::BookOptions,
    element::action::Command,
    events::{DocEvent, EventBus, Notification},
    foundation::{
        core::{Color, Size},
        error::{BookError, BookResult},
        ids::{ElementIdx, PageIdx},
        props::{Props, PropsExt},
    },
    host::{MediaBackend, MediaHandle, MediaOwner},
    model::{
        document::{Document, Orientation, Paging},
        template::PageTemplate,
        viewstate::{ViewState, ViewStateStore},
    },
    page::{Page, PageEnv, PageState, PageTick},
    timeline::scheduler::Scheduler,
};

/// Platform services an open book runs against.
pub struct BookHost {
    pub cache: ResourceCache,
    pub media: Box<dyn MediaBackend>,
    pub options: BookOptions,
    pub viewport: Size,
    pub view_state: Option<Box<dyn ViewStateStore>>,
}

pub struct Book {
    doc: Document,
    pages: Vec<Page>,
    templates: BTreeMap<String, PageTemplate>,
    active_template: Option<String>,
    current: Option<usize>,
    position: f64,
    dragged: bool,
    lang: Option<String>,
    cache: ResourceCache,
    media: Box<dyn MediaBackend>,
    options: BookOptions,
    view_state: Option<Box<dyn ViewStateStore>>,
    bus: EventBus,
    tx: crossbeam_channel::Sender<DocEvent>,
    timers: Scheduler<PageTick>,
    notes: Vec<Notification>,
    queued: Vec<Command>,
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book")
            .field("pages", &self.pages.len())
            .field("current", &self.current)
            .field("position", &self.position)
            .field("active_template", &self.active_template)
            .field("lang", &self.lang)
            .finish()
    }
}

/// Borrow one page and the services it needs from disjoint fields of the book.
macro_rules! with_page {
    ($book:expr, $idx:expr, |$page:ident, $env:ident| $body:expr) => {{
        let book = &mut *$book;
        match book.pages.get_mut($idx) {
            Some($page) => {
                let $env = &mut PageEnv {
                    doc: &book.doc,
                    cache: &book.cache,
                    media: book.media.as_mut(),
                    events: &book.tx,
                    timers: &mut book.timers,
                    notes: &mut book.notes,
                    commands: &mut book.queued,
                    options: &book.options,
                    lang: book.lang.as_deref(),
                };
                Some($body)
            }
            None => None,
        }
    }};
}

impl Book {
    /// Parse `json`, lay it out for the host viewport and enter the first (or restored) page.
    #[tracing::instrument(skip_all, fields(base = base_url.as_ref().map(|u| u.as_str())))]
    pub fn open(json: &Value, base_url: Option<Url>, host: BookHost) -> BookResult<Self> {
        host.options.validate()?;
        let mut doc = Document::parse(json, base_url)?;
        doc.resolve(host.viewport);
        let pages: Vec<Page> = doc
            .pages
            .iter()
            .enumerate()
            .map(|(i, resolved)| Page::new(PageIdx(i as u32), resolved, &host.options))
            .collect();
        let bus = EventBus::default();
        let mut book = Self {
            tx: bus.sender(),
            bus,
            pages,
            templates: BTreeMap::new(),
            active_template: None,
            current: None,
            position: 0.0,
            dragged: false,
            lang: None,
            cache: host.cache,
            media: host.media,
            options: host.options,
            view_state: host.view_state,
            timers: Scheduler::default(),
            notes: Vec::new(),
            queued: Vec::new(),
            doc,
        };

        let restored = book.restore_view_state();
        if let Some(lang) = restored.as_ref().and_then(|s| s.lang_id.clone()) {
            book.lang = Some(lang);
        }
        let start = restored.map_or(0, |s| s.page);
        if book.pages.is_empty() {
            tracing::warn!("document has no pages");
        } else {
            book.go_to(start.min(book.pages.len() - 1))?;
        }
        Ok(book)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn title(&self) -> Option<&str> {
        self.doc.title(self.lang.as_deref())
    }

    pub fn paging(&self) -> Paging {
        self.doc.paging
    }

    pub fn orientation(&self) -> Orientation {
        self.doc.orientation
    }

    pub fn scale(&self) -> f64 {
        self.doc.scale
    }

    pub fn background(&self) -> Color {
        self.doc.background
    }

    pub fn dimension(&self) -> Size {
        self.doc.dimension
    }

    pub fn template_named(&self, name: &str) -> Option<&Props> {
        self.doc.template_named(name)
    }

    pub fn prototype_named(&self, name: &str) -> Option<&Props> {
        self.doc.prototype_named(name)
    }

    pub fn path_named(&self, name: &str) -> Option<&str> {
        self.doc.path_named(name)
    }

    pub fn voice_named(&self, name: &str) -> Option<&Props> {
        self.doc.voice_named(name)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, idx: usize) -> Option<&Page> {
        self.pages.get(idx)
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn language(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn active_template(&self) -> Option<&str> {
        self.active_template.as_deref()
    }

    pub fn template(&self, name: &str) -> Option<&PageTemplate> {
        self.templates.get(name)
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Virtual time of the playback clock, in seconds.
    pub fn now(&self) -> f64 {
        self.timers.now()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notes)
    }

    /// Continuous scroll position from the host, in pages. The page sliding in (the one after
    /// `floor(position)`) scrubs along with the fractional part.
    pub fn scroll_to(&mut self, position: f64) {
        let last = self.pages.len().saturating_sub(1) as f64;
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, last)
        };
        self.position = position;
        let base = position.floor();
        let target = base as usize + 1;
        let fraction = position - base;
        if with_page!(self, target, |page, env| page
            .set_time_offset_while_dragging(fraction, env))
        .is_some()
            && self.current == Some(target)
        {
            self.dragged = true;
        }
    }

    /// End of a drag: snap to the nearest page.
    pub fn settle(&mut self) -> BookResult<()> {
        if self.pages.is_empty() {
            return Ok(());
        }
        let target = (self.position.round() as usize).min(self.pages.len() - 1);
        self.scroll_to(target as f64);
        if self.current == Some(target) {
            if std::mem::take(&mut self.dragged) {
                with_page!(self, target, |page, env| {
                    page.prepare(false, env);
                    page.did_enter(false, env);
                });
            }
            return Ok(());
        }
        self.go_to(target)
    }

    /// Make `target` the active page, running the lifecycle hooks in order: old `will_leave`,
    /// new `will_enter`, old `did_leave`, new `did_enter`.
    #[tracing::instrument(skip(self))]
    pub fn go_to(&mut self, target: usize) -> BookResult<()> {
        if target >= self.pages.len() {
            return Err(BookError::validation(format!(
                "page {target} out of range (book has {})",
                self.pages.len()
            )));
        }
        if self.current == Some(target) {
            return Ok(());
        }
        let from = self.current;
        let forward = from.is_none_or(|f| target > f);
        self.position = target as f64;
        self.dragged = false;
        self.update_window(target);

        if let Some(old) = from {
            with_page!(self, old, |page, _env| page.will_leave(forward));
        }
        with_page!(self, target, |page, env| page.will_enter(forward, env));
        if let Some(old) = from {
            with_page!(self, old, |page, env| page.did_leave(!forward, env));
        }
        with_page!(self, target, |page, env| page.did_enter(forward, env));
        self.current = Some(target);
        self.set_active_page(target);
        self.notes
            .push(Notification::ActivePageChanged(PageIdx(target as u32)));

        if forward {
            with_page!(self, target + 1, |page, env| page.prepare(true, env));
        } else if let Some(prev) = target.checked_sub(1) {
            with_page!(self, prev, |page, env| page.prepare(false, env));
        }
        self.save_view_state();
        Ok(())
    }

    pub fn next(&mut self) -> BookResult<()> {
        match self.current {
            Some(c) if c + 1 < self.pages.len() => self.go_to(c + 1),
            _ => Ok(()),
        }
    }

    pub fn previous(&mut self) -> BookResult<()> {
        match self.current.and_then(|c| c.checked_sub(1)) {
            Some(p) => self.go_to(p),
            None => Ok(()),
        }
    }

    /// Enter or leave page templates when the active page's template identity changes.
    pub fn set_active_page(&mut self, idx: usize) {
        let Some(page) = self.pages.get(idx) else {
            return;
        };
        let incoming = page.template().map(str::to_owned);
        if incoming == self.active_template {
            return;
        }
        if let Some(old) = self.active_template.take() {
            if let Some(t) = self.templates.get_mut(&old) {
                t.did_leave();
            }
            self.notes.push(Notification::TemplateLeft(old));
        }
        if let Some(name) = incoming.as_deref() {
            let doc = &self.doc;
            let template = self.templates.entry(name.to_owned()).or_insert_with(|| {
                let props = doc.template_named(name).cloned().unwrap_or_default();
                let bgm = props.string("bgm").and_then(|r| doc.resolve_url(r));
                PageTemplate::new(name, props, bgm)
            });
            template.did_enter(page.prefetcher(), self.media.as_mut(), &self.tx);
            self.notes
                .push(Notification::TemplateEntered(name.to_owned()));
        }
        self.active_template = incoming;
    }

    /// Tap on an element of the current page.
    pub fn tap(&mut self, page: usize, element: ElementIdx) -> BookResult<()> {
        with_page!(self, page, |p, env| p.tap(element, env));
        let commands = std::mem::take(&mut self.queued);
        self.run_commands(page, commands)
    }

    pub fn set_language(&mut self, id: &str) -> BookResult<()> {
        if self.doc.language(id).is_none() {
            return Err(BookError::validation(format!("unknown language '{id}'")));
        }
        if self.lang.as_deref() == Some(id) {
            return Ok(());
        }
        self.lang = Some(id.to_owned());
        self.rebuild_views();
        self.notes.push(Notification::LanguageChanged(id.to_owned()));
        self.save_view_state();
        Ok(())
    }

    /// Lay the document out for a new viewport and rebuild every materialized page.
    pub fn set_viewport(&mut self, viewport: Size) {
        self.doc.resolve(viewport);
        self.rebuild_views();
    }

    /// Run cache completions and dispatch every queued document event.
    pub fn pump(&mut self) -> BookResult<usize> {
        self.cache.poll();
        let mut handled = 0;
        while let Some(event) = self.bus.try_next() {
            handled += 1;
            self.dispatch(event);
            self.cache.poll();
        }
        // Entry commands may navigate again; bound the chain by the page count.
        for _ in 0..=self.pages.len() {
            if self.queued.is_empty() {
                break;
            }
            let commands = std::mem::take(&mut self.queued);
            let page = self.current.unwrap_or(0);
            self.run_commands(page, commands)?;
        }
        self.queued.clear();
        Ok(handled)
    }

    /// Advance the playback clock by `dt` seconds, firing every timer due on the way.
    pub fn advance(&mut self, dt: f64) -> BookResult<()> {
        let until = self.timers.now() + dt.max(0.0);
        self.pump()?;
        while let Some(tick) = self.timers.pop_due(until) {
            with_page!(self, tick.page.get(), |page, env| page.on_tick(tick, env));
            self.pump()?;
        }
        self.timers.settle_at(until);
        Ok(())
    }

    /// Block until the cache has no outstanding work and every event was dispatched.
    pub fn run_until_idle(&mut self, timeout: Duration) -> BookResult<bool> {
        let idle = self.cache.run_until_idle(timeout);
        self.pump()?;
        Ok(idle && self.cache.outstanding() == 0)
    }

    fn dispatch(&mut self, event: DocEvent) {
        match event {
            DocEvent::ResourcesReady { page, generation } => {
                with_page!(self, page.get(), |p, env| p.finish_load(generation, env));
            }
            DocEvent::SeekCompleted(handle) => {
                if let MediaOwner::Element(page, _) = handle.owner {
                    with_page!(self, page.get(), |p, env| p.seek_completed(&handle, env));
                }
            }
            DocEvent::MediaFinished(handle) => self.media_finished(&handle),
        }
    }

    fn media_finished(&mut self, handle: &MediaHandle) {
        match &handle.owner {
            MediaOwner::Element(page, _) | MediaOwner::Page(page) => {
                with_page!(self, page.get(), |p, env| p.media_finished(handle, env));
            }
            MediaOwner::Template(name) => {
                if let Some(t) = self.templates.get_mut(name) {
                    t.media_finished(handle);
                }
            }
        }
    }

    fn run_commands(&mut self, page: usize, commands: Vec<Command>) -> BookResult<()> {
        for command in commands {
            match command {
                Command::Play => {
                    with_page!(self, page, |p, env| p.play(env));
                }
                Command::Pause => {
                    with_page!(self, page, |p, env| p.pause(env));
                }
                Command::GoTo(target) => self.go_to(target.min(self.pages.len().saturating_sub(1)))?,
                Command::Next => self.next()?,
                Command::Previous => self.previous()?,
                Command::Unknown(name) => tracing::debug!(command = %name, "unknown command"),
            }
        }
        Ok(())
    }

    /// Keep views for `center ± view_radius` and unload everything else.
    fn update_window(&mut self, center: usize) {
        let radius = self.options.view_radius;
        let lo = center.saturating_sub(radius);
        let hi = center.saturating_add(radius);
        for i in 0..self.pages.len() {
            if (lo..=hi).contains(&i) {
                with_page!(self, i, |page, env| page.load_view(env));
            } else {
                with_page!(self, i, |page, env| page.unload_view(env));
            }
        }
    }

    fn rebuild_views(&mut self) {
        let current = self.current;
        for i in 0..self.pages.len() {
            with_page!(self, i, |page, env| {
                if page.state() != PageState::Unloaded {
                    page.unload_view(env);
                    page.load_view(env);
                    if Some(i) == current {
                        page.did_enter(false, env);
                    }
                }
            });
        }
    }

    fn document_key(&self) -> Option<String> {
        self.doc.base_url.as_ref().map(|u| u.to_string())
    }

    fn restore_view_state(&self) -> Option<ViewState> {
        if !self.doc.viewstate {
            return None;
        }
        let (store, key) = (self.view_state.as_ref()?, self.document_key()?);
        match store.load(&key) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "view state not restored");
                None
            }
        }
    }

    fn save_view_state(&self) {
        if !self.doc.viewstate {
            return;
        }
        let (Some(store), Some(key), Some(page)) =
            (self.view_state.as_ref(), self.document_key(), self.current)
        else {
            return;
        };
        let state = ViewState {
            page,
            lang_id: self.lang.clone(),
        };
        if let Err(e) = store.save(&key, &state) {
            tracing::warn!(error = %e, "view state not saved");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/book.rs"]
mod tests;
