//! Aggregate readiness for a set of resources.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{assets::cache::ResourceCache, foundation::error::LoadFailed};

/// Remote URL → cache subdirectory hint.
pub type ResourceSet = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrefetchOutcome {
    pub fetched: usize,
    pub failed: Vec<String>,
    pub errors: Vec<LoadFailed>,
}

impl PrefetchOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

type DoneCallback = Box<dyn FnOnce(&PrefetchOutcome)>;

#[derive(Default)]
struct PrefetchState {
    pending: usize,
    fetched: HashMap<String, PathBuf>,
    failed: Vec<String>,
    errors: Vec<LoadFailed>,
    requested: HashSet<String>,
    waiting: Vec<DoneCallback>,
}

impl PrefetchState {
    fn outcome(&self) -> PrefetchOutcome {
        PrefetchOutcome {
            fetched: self.fetched.len(),
            failed: self.failed.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// Drives a [`ResourceCache`] over a URL set and reports once when everything settled.
///
/// Cheap to clone; clones share state. Only used from the thread that polls the cache.
#[derive(Clone)]
pub struct Prefetcher {
    cache: ResourceCache,
    state: Rc<RefCell<PrefetchState>>,
}

impl std::fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("Prefetcher")
            .field("pending", &s.pending)
            .field("fetched", &s.fetched.len())
            .field("failed", &s.failed.len())
            .finish()
    }
}

impl Prefetcher {
    pub fn new(cache: ResourceCache) -> Self {
        Self {
            cache,
            state: Rc::default(),
        }
    }

    /// Fetch `urls`; `done` fires exactly once, immediately when nothing needs fetching.
    pub fn start(&self, urls: &ResourceSet, done: impl FnOnce(&PrefetchOutcome) + 'static) {
        self.append(urls, done);
    }

    /// Extend a running or finished prefetch. URLs already requested are not loaded again; `done`
    /// fires once every URL requested so far has settled.
    pub fn append(&self, urls: &ResourceSet, done: impl FnOnce(&PrefetchOutcome) + 'static) {
        {
            let mut s = self.state.borrow_mut();
            s.waiting.push(Box::new(done));
            // Held until every load below is issued, so synchronous failures cannot complete the
            // batch early.
            s.pending += 1;
        }
        for (url, prefix) in urls {
            if !self.state.borrow_mut().requested.insert(url.clone()) {
                continue;
            }
            if let Some(path) = file_path(url) {
                self.state.borrow_mut().fetched.insert(url.clone(), path);
                continue;
            }
            self.state.borrow_mut().pending += 1;
            let state = Rc::clone(&self.state);
            let key = url.clone();
            self.cache.load(url, prefix, false, move |res| {
                {
                    let mut s = state.borrow_mut();
                    match res {
                        Ok(path) => {
                            s.fetched.insert(key, path);
                        }
                        Err(e) => {
                            s.failed.push(key);
                            s.errors.push(e);
                        }
                    }
                }
                settle(&state);
            });
        }
        settle(&self.state);
    }

    /// Local file for a fetched URL.
    pub fn map(&self, url: &str) -> Option<PathBuf> {
        self.state.borrow().fetched.get(url).cloned()
    }

    pub fn is_settled(&self) -> bool {
        self.state.borrow().pending == 0
    }

    pub fn outcome(&self) -> PrefetchOutcome {
        self.state.borrow().outcome()
    }
}

fn file_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file:")?;
    match url::Url::parse(url).ok().and_then(|u| u.to_file_path().ok()) {
        Some(p) => Some(p),
        None => Some(Path::new(rest.trim_start_matches("//")).to_path_buf()),
    }
}

fn settle(state: &Rc<RefCell<PrefetchState>>) {
    let ready = {
        let mut s = state.borrow_mut();
        s.pending = s.pending.saturating_sub(1);
        if s.pending > 0 {
            return;
        }
        let waiting = std::mem::take(&mut s.waiting);
        (waiting, s.outcome())
    };
    let (waiting, outcome) = ready;
    tracing::debug!(
        fetched = outcome.fetched,
        failed = outcome.failed.len(),
        "prefetch settled"
    );
    for cb in waiting {
        cb(&outcome);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/prefetch.rs"]
mod tests;
