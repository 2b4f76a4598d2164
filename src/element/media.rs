//! Media attached to an element.
//!
//! Scrubbed video maps the time offset to `video_start + offset * video_duration`. At most one
//! seek is in flight per player; requests arriving meanwhile overwrite a single pending target
//! that is issued when the in-flight seek completes, so out-of-order completions cannot pile up.

use crossbeam_channel::Sender;

use crate::{
    events::DocEvent,
    host::{MediaBackend, MediaHandle, MediaKind, MediaPlayer, MediaSignal, SeekCompletion},
    timeline::layer::MediaSource,
};

/// What a media operation needs from the host.
pub struct MediaCtx<'a> {
    pub media: &'a mut dyn MediaBackend,
    pub events: &'a Sender<DocEvent>,
    pub handle: MediaHandle,
}

pub struct PlayerState {
    pub kind: MediaKind,
    pub source: MediaSource,
    /// Scrub mapping `(start, duration)` in seconds; `None` for media that plays on its own.
    pub scrub: Option<(f64, f64)>,
    player: Option<Box<dyn MediaPlayer>>,
    seeking: bool,
    pending: Option<f64>,
    playing: bool,
}

impl std::fmt::Debug for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerState")
            .field("kind", &self.kind)
            .field("url", &self.source.url)
            .field("scrub", &self.scrub)
            .field("seeking", &self.seeking)
            .field("pending", &self.pending)
            .field("playing", &self.playing)
            .finish()
    }
}

impl PlayerState {
    pub fn new(kind: MediaKind, source: MediaSource, scrub: Option<(f64, f64)>) -> Self {
        Self {
            kind,
            source,
            scrub,
            player: None,
            seeking: false,
            pending: None,
            playing: false,
        }
    }

    pub fn is_scrubbed(&self) -> bool {
        self.scrub.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_seeking(&self) -> bool {
        self.seeking
    }

    pub fn pending_seek(&self) -> Option<f64> {
        self.pending
    }

    fn player(&mut self, ctx: &mut MediaCtx<'_>) -> &mut Box<dyn MediaPlayer> {
        let (kind, source) = (self.kind, &self.source);
        self.player.get_or_insert_with(|| {
            ctx.media.open(
                kind,
                &source.url,
                source.local.as_deref(),
                MediaSignal::new(ctx.handle.clone(), ctx.events.clone()),
            )
        })
    }

    /// Map a time offset onto the scrub range and seek there.
    pub fn scrub_to(&mut self, offset: f64, ctx: &mut MediaCtx<'_>) {
        if let Some((start, duration)) = self.scrub {
            self.seek(start + offset * duration, ctx);
        }
    }

    pub fn seek(&mut self, seconds: f64, ctx: &mut MediaCtx<'_>) {
        if self.seeking {
            self.pending = Some(seconds);
            return;
        }
        self.seeking = true;
        let done = SeekCompletion::new(ctx.handle.clone(), ctx.events.clone());
        self.player(ctx).seek(seconds, done);
    }

    /// The in-flight seek finished; issue the latest deferred target, if any.
    pub fn seek_completed(&mut self, ctx: &mut MediaCtx<'_>) {
        self.seeking = false;
        if let Some(seconds) = self.pending.take() {
            self.seek(seconds, ctx);
        }
    }

    /// Returns `true` when playback actually started.
    pub fn play(&mut self, ctx: &mut MediaCtx<'_>) -> bool {
        if self.playing {
            return false;
        }
        self.playing = true;
        self.player(ctx).play();
        true
    }

    /// Returns `true` when something was playing.
    pub fn pause(&mut self) -> bool {
        let was = std::mem::replace(&mut self.playing, false);
        if let Some(p) = self.player.as_mut() {
            p.pause();
        }
        was
    }

    /// Playback reached the end on its own.
    pub fn finished(&mut self) -> bool {
        std::mem::replace(&mut self.playing, false)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/element/media.rs"]
mod tests;
