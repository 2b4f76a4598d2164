use std::{cell::RefCell, path::Path, rc::Rc};

use crossbeam_channel::unbounded;

use super::*;
use crate::{
    foundation::{
        ids::{ElementIdx, PageIdx},
        props::Props,
    },
    host::SeekCompletion,
};

#[derive(Default)]
struct Log {
    opened: usize,
    seeks: Vec<f64>,
    held: Vec<SeekCompletion>,
}

struct HoldingPlayer(Rc<RefCell<Log>>);

impl MediaPlayer for HoldingPlayer {
    fn seek(&mut self, seconds: f64, done: SeekCompletion) {
        let mut log = self.0.borrow_mut();
        log.seeks.push(seconds);
        log.held.push(done);
    }
    fn play(&mut self) {}
    fn pause(&mut self) {}
}

struct HoldingBackend(Rc<RefCell<Log>>);

impl MediaBackend for HoldingBackend {
    fn open(
        &mut self,
        _kind: MediaKind,
        _url: &str,
        _local: Option<&Path>,
        _signal: MediaSignal,
    ) -> Box<dyn MediaPlayer> {
        self.0.borrow_mut().opened += 1;
        Box::new(HoldingPlayer(self.0.clone()))
    }
    fn speak(&mut self, _: &str, _: Option<&Props>, _: Option<&str>, _: MediaSignal) {}
    fn stop_speech(&mut self) {}
}

#[test]
fn seeks_coalesce_to_the_latest_request() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut backend = HoldingBackend(log.clone());
    let (tx, rx) = unbounded();
    let handle = MediaHandle::element(PageIdx(0), ElementIdx(3), 1);
    let mut ctx = MediaCtx {
        media: &mut backend,
        events: &tx,
        handle: handle.clone(),
    };
    let mut video = PlayerState::new(
        MediaKind::Video,
        MediaSource::default(),
        Some((1.0, 10.0)),
    );

    video.scrub_to(0.1, &mut ctx);
    video.scrub_to(0.2, &mut ctx);
    video.scrub_to(0.3, &mut ctx);
    video.scrub_to(0.4, &mut ctx);
    assert_eq!(log.borrow().seeks, vec![2.0]);
    assert_eq!(video.pending_seek(), Some(5.0));

    let first = log.borrow_mut().held.remove(0);
    first.complete();
    assert_eq!(rx.try_recv().unwrap(), DocEvent::SeekCompleted(handle));
    video.seek_completed(&mut ctx);
    assert_eq!(log.borrow().seeks, vec![2.0, 5.0]);
    assert!(video.is_seeking());

    video.seek_completed(&mut ctx);
    assert_eq!(log.borrow().seeks.len(), 2);
    assert!(!video.is_seeking());
    assert_eq!(log.borrow().opened, 1);
}

#[test]
fn unscrubbed_media_ignores_offsets() {
    let log = Rc::new(RefCell::new(Log::default()));
    let mut backend = HoldingBackend(log.clone());
    let (tx, _rx) = unbounded();
    let mut ctx = MediaCtx {
        media: &mut backend,
        events: &tx,
        handle: MediaHandle::element(PageIdx(0), ElementIdx(0), 1),
    };
    let mut audio = PlayerState::new(MediaKind::Audio, MediaSource::default(), None);
    audio.scrub_to(0.5, &mut ctx);
    assert!(log.borrow().seeks.is_empty());

    assert!(audio.play(&mut ctx));
    assert!(!audio.play(&mut ctx));
    assert!(audio.pause());
    assert!(!audio.finished());
}
