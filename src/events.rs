//! Per-book event bus and host notifications.
//!
//! Everything that completes off the main thread (prefetch, media seeks, media playback) reports
//! back as a [`DocEvent`] on the owning book's channel; the book drains it in `pump`. Because the
//! bus is scoped to one open document, signals cannot leak between documents.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::{
    foundation::{error::LoadFailed, ids::PageIdx},
    host::MediaHandle,
};

#[derive(Clone, Debug, PartialEq)]
pub enum DocEvent {
    /// The prefetch started by a page load finished.
    ResourcesReady { page: PageIdx, generation: u64 },
    SeekCompleted(MediaHandle),
    MediaFinished(MediaHandle),
}

/// Observable state changes, collected by the book for the host shell.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    PageLoaded {
        page: PageIdx,
        failed: Vec<LoadFailed>,
    },
    PageFailed {
        page: PageIdx,
        failed: Vec<LoadFailed>,
    },
    PageUnloaded(PageIdx),
    ActivePageChanged(PageIdx),
    PageStartedPlaying(PageIdx),
    PageFinishedPlaying(PageIdx),
    TemplateEntered(String),
    TemplateLeft(String),
    LanguageChanged(String),
}

#[derive(Clone, Debug)]
pub struct EventBus {
    tx: Sender<DocEvent>,
    rx: Receiver<DocEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl EventBus {
    pub fn sender(&self) -> Sender<DocEvent> {
        self.tx.clone()
    }

    pub fn try_next(&self) -> Option<DocEvent> {
        self.rx.try_recv().ok()
    }
}
