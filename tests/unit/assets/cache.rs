use std::sync::Mutex;

use super::*;
use crate::assets::{fetch::FetchResponse, store::InMemoryAssetStore};

#[derive(Default)]
struct FakeFetcher {
    calls: Mutex<Vec<String>>,
    status: Mutex<HashMap<String, u16>>,
}

impl FakeFetcher {
    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn respond(&self, url: &str, status: u16) {
        self.status.lock().unwrap().insert(url.to_owned(), status);
    }
}

impl Fetch for FakeFetcher {
    fn fetch(&self, url: &Url) -> anyhow::Result<FetchResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        if url.host_str() == Some("down.invalid") {
            anyhow::bail!("connection refused");
        }
        let status = self
            .status
            .lock()
            .unwrap()
            .get(url.as_str())
            .copied()
            .unwrap_or(200);
        Ok(FetchResponse {
            status,
            body: url.as_str().as_bytes().to_vec(),
        })
    }
}

type Results = Rc<RefCell<Vec<Result<PathBuf, LoadFailed>>>>;

fn setup() -> (tempfile::TempDir, ResourceCache, Arc<FakeFetcher>, Arc<InMemoryAssetStore>) {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FakeFetcher::default());
    let store = Arc::new(InMemoryAssetStore::new());
    let cache = ResourceCache::new(
        &CacheConfig::with_root(dir.path().join("cache")),
        store.clone(),
        fetcher.clone(),
    )
    .unwrap();
    (dir, cache, fetcher, store)
}

fn load(cache: &ResourceCache, url: &str, bypass: bool, out: &Results) {
    let out = out.clone();
    cache.load(url, "images", bypass, move |r| out.borrow_mut().push(r));
}

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn file_urls_complete_synchronously() {
    let (_dir, cache, fetcher, store) = setup();
    let out = Results::default();
    load(&cache, "file:///tmp/a.png", false, &out);
    assert_eq!(out.borrow()[0], Ok(PathBuf::from("/tmp/a.png")));
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(store.len().unwrap(), 0);
    assert_eq!(cache.outstanding(), 0);
}

#[test]
fn invalid_urls_fail_synchronously() {
    let (_dir, cache, _fetcher, _store) = setup();
    let out = Results::default();
    load(&cache, "not a url", false, &out);
    assert!(out.borrow()[0].is_err());
}

#[test]
fn fetched_file_is_written_and_reused() {
    let (_dir, cache, fetcher, store) = setup();
    let url = "https://example.com/pic.png";
    let out = Results::default();
    load(&cache, url, false, &out);
    assert!(out.borrow().is_empty());
    assert!(cache.run_until_idle(TIMEOUT));

    let path = out.borrow()[0].clone().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), url.as_bytes());
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    let entry = store.get(url).unwrap().unwrap();
    assert!(entry.loaded);
    assert_eq!(entry.size_bytes, url.len() as u64);

    load(&cache, url, false, &out);
    // Hits still complete asynchronously.
    assert_eq!(out.borrow().len(), 1);
    assert!(cache.run_until_idle(TIMEOUT));
    assert_eq!(out.borrow()[1], Ok(path));
    assert_eq!(fetcher.calls(), 1);
    assert!(store.get(url).unwrap().unwrap().last_accessed > entry.last_accessed);

    load(&cache, url, true, &out);
    assert!(cache.run_until_idle(TIMEOUT));
    assert_eq!(fetcher.calls(), 2);
}

#[test]
fn concurrent_loads_of_one_url_share_a_fetch() {
    let (_dir, cache, fetcher, _store) = setup();
    let out = Results::default();
    for _ in 0..3 {
        load(&cache, "https://example.com/v.mp4", false, &out);
    }
    assert_eq!(cache.stats().unwrap().in_flight, 1);
    assert!(cache.run_until_idle(TIMEOUT));
    assert_eq!(fetcher.calls(), 1);
    let out = out.borrow();
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|r| r == &out[0]));
}

#[test]
fn bypass_behind_a_cached_load_still_refetches() {
    let (_dir, cache, fetcher, _store) = setup();
    let url = "https://example.com/a.png";
    let out = Results::default();
    load(&cache, url, false, &out);
    assert!(cache.run_until_idle(TIMEOUT));
    assert_eq!(fetcher.calls(), 1);

    load(&cache, url, false, &out);
    load(&cache, url, true, &out);
    load(&cache, url, true, &out);
    assert!(cache.run_until_idle(TIMEOUT));
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(out.borrow().len(), 4);
    assert!(out.borrow().iter().all(Result::is_ok));
    assert_eq!(cache.stats().unwrap().in_flight, 0);
}

#[test]
fn plain_loads_join_an_in_flight_bypass() {
    let (_dir, cache, fetcher, _store) = setup();
    let url = "https://example.com/b.png";
    let out = Results::default();
    load(&cache, url, true, &out);
    load(&cache, url, false, &out);
    assert!(cache.run_until_idle(TIMEOUT));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(out.borrow().len(), 2);
}

#[test]
fn http_and_transport_errors_become_load_failed() {
    let (_dir, cache, fetcher, _store) = setup();
    fetcher.respond("https://example.com/missing.png", 404);
    let out = Results::default();
    load(&cache, "https://example.com/missing.png", false, &out);
    load(&cache, "https://down.invalid/x.png", false, &out);
    assert!(cache.run_until_idle(TIMEOUT));
    let out = out.borrow();
    let errs: Vec<_> = out.iter().map(|r| r.clone().unwrap_err()).collect();
    assert!(errs.iter().any(|e| e.reason.contains("404")));
    assert!(errs.iter().any(|e| e.url == "https://down.invalid/x.png"));
}

#[test]
fn reduce_keeps_the_most_recent_entries() {
    let (_dir, cache, _fetcher, store) = setup();
    let mut paths = Vec::new();
    for i in 0..30u64 {
        let mut e = AssetEntry::new(format!("https://example.com/{i}.png"), "images", i + 1);
        e.loaded = true;
        let p = e.local_path(cache.root());
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, b"x").unwrap();
        paths.push(p);
        store.put(&e).unwrap();
    }
    // One file already gone: not an error.
    std::fs::remove_file(&paths[0]).unwrap();

    let report = Rc::new(RefCell::new(None));
    let r = report.clone();
    cache.reduce(10, 5, move |res| *r.borrow_mut() = Some(res.unwrap()));
    assert!(cache.run_until_idle(TIMEOUT));

    let report = report.borrow().unwrap();
    assert_eq!(report.removed, 20);
    assert_eq!(report.remaining, 10);
    assert_eq!(store.len().unwrap(), 10);
    let mut kept: Vec<u64> = store
        .oldest(100)
        .unwrap()
        .iter()
        .map(|e| e.last_accessed)
        .collect();
    kept.sort_unstable();
    assert_eq!(kept, (21..=30).collect::<Vec<_>>());
    assert!(paths[..20].iter().all(|p| !p.exists()));
    assert!(paths[20..].iter().all(|p| p.exists()));
}

#[test]
fn reduce_below_limit_is_a_no_op() {
    let (_dir, cache, _fetcher, store) = setup();
    store.put(&AssetEntry::new("https://x/1", "", 1)).unwrap();
    let seen = Rc::new(RefCell::new(None));
    let s = seen.clone();
    cache.reduce(10, 5, move |res| *s.borrow_mut() = Some(res.unwrap()));
    assert!(cache.run_until_idle(TIMEOUT));
    assert_eq!(seen.borrow().unwrap().removed, 0);
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn flush_removes_files_and_metadata() {
    let (_dir, cache, _fetcher, store) = setup();
    let out = Results::default();
    load(&cache, "https://example.com/a.png", false, &out);
    load(&cache, "https://example.com/b.png", false, &out);
    assert!(cache.run_until_idle(TIMEOUT));
    let files: Vec<PathBuf> = out.borrow().iter().map(|r| r.clone().unwrap()).collect();

    assert_eq!(cache.flush().unwrap(), 2);
    assert_eq!(store.len().unwrap(), 0);
    assert!(files.iter().all(|p| !p.exists()));
    assert_eq!(cache.stats().unwrap(), CacheStats::default());
}
