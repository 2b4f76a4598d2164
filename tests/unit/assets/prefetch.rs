use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use super::*;
use crate::{
    assets::{
        fetch::{Fetch, FetchResponse},
        store::InMemoryAssetStore,
    },
    config::CacheConfig,
};

#[derive(Default)]
struct CountingFetcher {
    calls: Mutex<usize>,
}

impl Fetch for CountingFetcher {
    fn fetch(&self, url: &url::Url) -> anyhow::Result<FetchResponse> {
        *self.calls.lock().unwrap() += 1;
        let status = if url.path().contains("missing") { 404 } else { 200 };
        Ok(FetchResponse {
            status,
            body: b"data".to_vec(),
        })
    }
}

fn cache() -> (tempfile::TempDir, ResourceCache, Arc<CountingFetcher>) {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(CountingFetcher::default());
    let cache = ResourceCache::new(
        &CacheConfig::with_root(dir.path()),
        Arc::new(InMemoryAssetStore::new()),
        fetcher.clone(),
    )
    .unwrap();
    (dir, cache, fetcher)
}

fn set(urls: &[&str]) -> ResourceSet {
    urls.iter()
        .map(|u| (u.to_string(), "images".to_string()))
        .collect()
}

#[test]
fn empty_set_completes_immediately() {
    let (_dir, cache, _) = cache();
    let p = Prefetcher::new(cache);
    let fired = Rc::new(RefCell::new(0));
    let f = fired.clone();
    p.start(&ResourceSet::new(), move |o| {
        assert!(o.is_complete_success());
        *f.borrow_mut() += 1;
    });
    assert_eq!(*fired.borrow(), 1);
    assert!(p.is_settled());
}

#[test]
fn completion_fires_exactly_once_for_mixed_urls() {
    let (_dir, cache, fetcher) = cache();
    let p = Prefetcher::new(cache.clone());
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let o = outcomes.clone();
    let urls = set(&[
        "file:///tmp/local.png",
        "https://example.com/a.png",
        "https://example.com/b.png",
        "https://example.com/missing.png",
    ]);
    p.start(&urls, move |out| o.borrow_mut().push(out.clone()));
    // Duplicates from a second walk of the same page.
    p.append(&set(&["https://example.com/a.png"]), |_| {});
    assert!(outcomes.borrow().is_empty());

    assert!(cache.run_until_idle(Duration::from_secs(10)));
    let outcomes = outcomes.borrow();
    assert_eq!(outcomes.len(), 1);
    let out = &outcomes[0];
    assert_eq!(out.fetched + out.failed.len(), 4);
    assert_eq!(out.failed, vec!["https://example.com/missing.png".to_string()]);
    assert_eq!(out.errors.len(), 1);
    assert_eq!(*fetcher.calls.lock().unwrap(), 3);

    assert_eq!(p.map("file:///tmp/local.png"), Some(PathBuf::from("/tmp/local.png")));
    assert!(p.map("https://example.com/a.png").is_some());
    assert_eq!(p.map("https://example.com/missing.png"), None);
}

#[test]
fn append_after_completion_only_loads_new_urls() {
    let (_dir, cache, fetcher) = cache();
    let p = Prefetcher::new(cache.clone());
    p.start(&set(&["https://example.com/a.png"]), |_| {});
    assert!(cache.run_until_idle(Duration::from_secs(10)));

    let fired = Rc::new(RefCell::new(None));
    let f = fired.clone();
    p.append(
        &set(&["https://example.com/a.png", "https://example.com/c.png"]),
        move |o| *f.borrow_mut() = Some(o.fetched),
    );
    assert!(cache.run_until_idle(Duration::from_secs(10)));
    assert_eq!(*fired.borrow(), Some(2));
    assert_eq!(*fetcher.calls.lock().unwrap(), 2);
}

#[test]
fn synchronous_failures_do_not_complete_early() {
    let (_dir, cache, _) = cache();
    let p = Prefetcher::new(cache.clone());
    let fired = Rc::new(RefCell::new(Vec::new()));
    let f = fired.clone();
    p.start(
        &set(&["bad url", "https://example.com/a.png"]),
        move |o| f.borrow_mut().push(o.clone()),
    );
    assert!(fired.borrow().is_empty());
    assert!(cache.run_until_idle(Duration::from_secs(10)));
    assert_eq!(fired.borrow().len(), 1);
    assert_eq!(fired.borrow()[0].failed, vec!["bad url".to_string()]);
}
