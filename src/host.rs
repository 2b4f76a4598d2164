//! Seams to the platform media stack.
//!
//! Players may complete seeks and playback on any thread; they report through [`SeekCompletion`]
//! and [`MediaSignal`], which only enqueue a [`DocEvent`] for the owning book.

use std::path::Path;

use crossbeam_channel::Sender;

use crate::{
    events::DocEvent,
    foundation::{
        ids::{ElementIdx, PageIdx},
        props::Props,
    },
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MediaOwner {
    Element(PageIdx, ElementIdx),
    Page(PageIdx),
    Template(String),
}

/// Identifies one media attachment for one load of its owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaHandle {
    pub owner: MediaOwner,
    pub generation: u64,
}

impl MediaHandle {
    pub fn element(page: PageIdx, element: ElementIdx, generation: u64) -> Self {
        Self {
            owner: MediaOwner::Element(page, element),
            generation,
        }
    }
}

/// One-shot completion for a single seek request.
#[derive(Debug)]
pub struct SeekCompletion {
    handle: MediaHandle,
    tx: Sender<DocEvent>,
}

impl SeekCompletion {
    pub fn new(handle: MediaHandle, tx: Sender<DocEvent>) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> &MediaHandle {
        &self.handle
    }

    pub fn complete(self) {
        // A closed bus means the book is gone.
        let _ = self.tx.send(DocEvent::SeekCompleted(self.handle));
    }
}

/// Lets a player report that playback reached its end.
#[derive(Clone, Debug)]
pub struct MediaSignal {
    handle: MediaHandle,
    tx: Sender<DocEvent>,
}

impl MediaSignal {
    pub fn new(handle: MediaHandle, tx: Sender<DocEvent>) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> &MediaHandle {
        &self.handle
    }

    pub fn finished(&self) {
        let _ = self.tx.send(DocEvent::MediaFinished(self.handle.clone()));
    }
}

pub trait MediaPlayer {
    /// Seek to `seconds`; call `done.complete()` once the frame at that time is displayed.
    fn seek(&mut self, seconds: f64, done: SeekCompletion);
    fn play(&mut self);
    fn pause(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    /// Live stream; never prefetched.
    Radio,
}

pub trait MediaBackend {
    /// `local` is the prefetched file when one exists; streams only get `url`.
    fn open(
        &mut self,
        kind: MediaKind,
        url: &str,
        local: Option<&Path>,
        signal: MediaSignal,
    ) -> Box<dyn MediaPlayer>;

    fn speak(&mut self, text: &str, voice: Option<&Props>, lang: Option<&str>, signal: MediaSignal);

    fn stop_speech(&mut self);

    fn vibrate(&mut self) {}
}

/// Headless backend: seeks complete immediately and playback ends as soon as it starts.
#[derive(Debug, Default)]
pub struct NullMedia;

struct NullPlayer {
    signal: MediaSignal,
}

impl MediaPlayer for NullPlayer {
    fn seek(&mut self, seconds: f64, done: SeekCompletion) {
        tracing::trace!(seconds, handle = ?done.handle(), "null seek");
        done.complete();
    }

    fn play(&mut self) {
        self.signal.finished();
    }

    fn pause(&mut self) {}
}

impl MediaBackend for NullMedia {
    fn open(
        &mut self,
        kind: MediaKind,
        url: &str,
        _local: Option<&Path>,
        signal: MediaSignal,
    ) -> Box<dyn MediaPlayer> {
        tracing::debug!(?kind, url, "null media open");
        Box::new(NullPlayer { signal })
    }

    fn speak(&mut self, text: &str, _voice: Option<&Props>, lang: Option<&str>, signal: MediaSignal) {
        tracing::debug!(text, lang, "null speech");
        signal.finished();
    }

    fn stop_speech(&mut self) {}
}
