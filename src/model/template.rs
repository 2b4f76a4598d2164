//! Page templates as playback entities.
//!
//! A template's ambient track (`bgm`) plays for as long as consecutive active pages share the
//! template; the book enters and leaves templates only when the template identity changes.

use crossbeam_channel::Sender;

use crate::{
    assets::prefetch::Prefetcher,
    events::DocEvent,
    foundation::props::{Props, PropsExt},
    host::{MediaBackend, MediaHandle, MediaKind, MediaOwner, MediaPlayer, MediaSignal},
};

pub struct PageTemplate {
    pub name: String,
    pub props: Props,
    bgm: Option<String>,
    player: Option<Box<dyn MediaPlayer>>,
    generation: u64,
}

impl std::fmt::Debug for PageTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTemplate")
            .field("name", &self.name)
            .field("bgm", &self.bgm)
            .field("playing", &self.player.is_some())
            .finish()
    }
}

impl PageTemplate {
    /// `bgm` is the already resolved URL of the ambient track.
    pub fn new(name: impl Into<String>, props: Props, bgm: Option<String>) -> Self {
        Self {
            name: name.into(),
            props,
            bgm,
            player: None,
            generation: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_some()
    }

    /// Start the ambient track, reusing the entering page's prefetched copy when there is one.
    pub fn did_enter(
        &mut self,
        prefetcher: Option<&Prefetcher>,
        media: &mut dyn MediaBackend,
        events: &Sender<DocEvent>,
    ) {
        self.generation += 1;
        let Some(url) = self.bgm.as_deref() else {
            return;
        };
        let local = prefetcher.and_then(|p| p.map(url));
        let handle = MediaHandle {
            owner: MediaOwner::Template(self.name.clone()),
            generation: self.generation,
        };
        let kind = if self.props.flag("stream").unwrap_or(false) {
            MediaKind::Radio
        } else {
            MediaKind::Audio
        };
        let mut player = media.open(
            kind,
            url,
            local.as_deref(),
            MediaSignal::new(handle, events.clone()),
        );
        player.play();
        tracing::debug!(template = %self.name, url, "template audio started");
        self.player = Some(player);
    }

    pub fn did_leave(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.pause();
            tracing::debug!(template = %self.name, "template audio stopped");
        }
    }

    /// Playback of the ambient track ended on its own.
    pub fn media_finished(&mut self, handle: &MediaHandle) {
        if handle.generation == self.generation {
            self.player = None;
        }
    }
}
