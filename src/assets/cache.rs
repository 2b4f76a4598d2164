//! Capacity-bounded local cache for remote resources.
//!
//! [`ResourceCache`] is a main-thread handle. Store lookups, fetches and file writes run on a
//! small rayon pool; their results travel back over a channel and callbacks only run from
//! [`ResourceCache::poll`] (or the blocking helpers built on it), i.e. on the thread that owns the
//! handle. Loads of the same URL are coalesced into one in-flight job.

use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use url::Url;

use crate::{
    assets::{
        fetch::Fetch,
        store::{AssetEntry, AssetStore, write_atomic},
    },
    config::CacheConfig,
    foundation::error::{BookError, BookResult, LoadFailed},
};

pub type LoadCallback = Box<dyn FnOnce(Result<PathBuf, LoadFailed>)>;
pub type ReduceCallback = Box<dyn FnOnce(BookResult<ReduceReport>)>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReduceReport {
    pub examined: usize,
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
    pub in_flight: usize,
}

enum Completion {
    Load {
        url: String,
        result: Result<PathBuf, LoadFailed>,
    },
    Reduce {
        id: u64,
        result: BookResult<ReduceReport>,
    },
}

struct Shared {
    root: PathBuf,
    store: Arc<dyn AssetStore>,
    fetcher: Arc<dyn Fetch>,
    stamp: AtomicU64,
}

impl Shared {
    /// Wall-clock milliseconds, forced strictly increasing.
    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        let prev = self
            .stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }
}

/// One fetch job per URL plus everyone waiting on it.
struct InFlight {
    prefix: String,
    bypass: bool,
    waiters: Vec<LoadCallback>,
    /// Bypass requests that arrived while a cache-allowed job ran; they get a fresh fetch once it
    /// lands.
    refetch: Vec<LoadCallback>,
}

struct CacheInner {
    pool: rayon::ThreadPool,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    in_flight: HashMap<String, InFlight>,
    reduce_waiters: HashMap<u64, ReduceCallback>,
    next_reduce: u64,
    outstanding: usize,
}

#[derive(Clone)]
pub struct ResourceCache {
    shared: Arc<Shared>,
    inner: Rc<RefCell<CacheInner>>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("root", &self.shared.root)
            .field("outstanding", &self.inner.borrow().outstanding)
            .finish_non_exhaustive()
    }
}

fn build_thread_pool(workers: usize) -> BookResult<rayon::ThreadPool> {
    if workers == 0 {
        return Err(BookError::validation("cache 'workers' must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("swipebook-cache-{i}"))
        .build()
        .map_err(|e| BookError::validation(format!("failed to build cache thread pool: {e}")))
}

impl ResourceCache {
    pub fn new(
        config: &CacheConfig,
        store: Arc<dyn AssetStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> BookResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.root).map_err(|e| {
            BookError::store(format!(
                "create cache root '{}': {e}",
                config.root.display()
            ))
        })?;
        let (tx, rx) = unbounded();
        Ok(Self {
            shared: Arc::new(Shared {
                root: config.root.clone(),
                store,
                fetcher,
                stamp: AtomicU64::new(0),
            }),
            inner: Rc::new(RefCell::new(CacheInner {
                pool: build_thread_pool(config.workers)?,
                tx,
                rx,
                in_flight: HashMap::new(),
                reduce_waiters: HashMap::new(),
                next_reduce: 0,
                outstanding: 0,
            })),
        })
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.shared.store
    }

    /// Materialize `url` in the cache under `prefix`.
    ///
    /// `file:` URLs (and unparseable URLs, as failures) complete synchronously. Everything else
    /// completes from a later [`poll`](Self::poll), even when the file is already cached.
    pub fn load(
        &self,
        url: &str,
        prefix: &str,
        bypass_cache: bool,
        callback: impl FnOnce(Result<PathBuf, LoadFailed>) + 'static,
    ) {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                callback(Err(LoadFailed::new(url, format!("invalid url: {e}"))));
                return;
            }
        };
        if parsed.scheme() == "file" {
            callback(
                parsed
                    .to_file_path()
                    .map_err(|()| LoadFailed::new(url, "file url has no local path")),
            );
            return;
        }

        let mut inner = self.inner.borrow_mut();
        if let Some(job) = inner.in_flight.get_mut(url) {
            if bypass_cache && !job.bypass {
                tracing::trace!(url, "queueing refetch behind in-flight load");
                job.refetch.push(Box::new(callback));
            } else {
                tracing::trace!(url, "joining in-flight load");
                job.waiters.push(Box::new(callback));
            }
            return;
        }
        let job = InFlight {
            prefix: prefix.to_owned(),
            bypass: bypass_cache,
            waiters: vec![Box::new(callback)],
            refetch: Vec::new(),
        };
        self.spawn_load(&mut inner, parsed, url, job);
    }

    fn spawn_load(&self, inner: &mut CacheInner, parsed: Url, url: &str, job: InFlight) {
        inner.outstanding += 1;
        let shared = Arc::clone(&self.shared);
        let tx = inner.tx.clone();
        let (url, prefix, bypass) = (url.to_owned(), job.prefix.clone(), job.bypass);
        inner.in_flight.insert(url.clone(), job);
        inner.pool.spawn(move || {
            let result = run_load(&shared, &parsed, &url, &prefix, bypass);
            let _ = tx.send(Completion::Load { url, result });
        });
    }

    /// Delete the least recently used entries until at most `limit` remain. Entries are read in
    /// batches of `limit + extra`.
    #[tracing::instrument(skip(self, done))]
    pub fn reduce(
        &self,
        limit: usize,
        extra: usize,
        done: impl FnOnce(BookResult<ReduceReport>) + 'static,
    ) {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_reduce;
        inner.next_reduce += 1;
        inner.reduce_waiters.insert(id, Box::new(done));
        inner.outstanding += 1;

        let shared = Arc::clone(&self.shared);
        let tx = inner.tx.clone();
        inner.pool.spawn(move || {
            let result = run_reduce(&shared, limit, extra);
            let _ = tx.send(Completion::Reduce { id, result });
        });
    }

    /// Delete every cached file and all metadata.
    #[tracing::instrument(skip(self))]
    pub fn flush(&self) -> BookResult<usize> {
        let removed = self.shared.store.clear()?;
        let mut prefixes: Vec<&str> = Vec::new();
        for entry in &removed {
            delete_file(&entry.local_path(&self.shared.root));
            if !prefixes.contains(&entry.prefix.as_str()) {
                prefixes.push(&entry.prefix);
            }
        }
        for prefix in prefixes.into_iter().filter(|p| !p.is_empty()) {
            // Only succeeds when nothing else lives there.
            let _ = std::fs::remove_dir(self.shared.root.join(prefix));
        }
        tracing::debug!(removed = removed.len(), "cache flushed");
        Ok(removed.len())
    }

    pub fn stats(&self) -> BookResult<CacheStats> {
        Ok(CacheStats {
            entries: self.shared.store.len()?,
            bytes: self.shared.store.total_bytes()?,
            in_flight: self.inner.borrow().in_flight.len(),
        })
    }

    /// Jobs dispatched whose completion has not been delivered yet.
    pub fn outstanding(&self) -> usize {
        self.inner.borrow().outstanding
    }

    /// Deliver every completion that has arrived. Returns how many were delivered.
    pub fn poll(&self) -> usize {
        let rx = self.inner.borrow().rx.clone();
        let mut n = 0;
        while let Ok(done) = rx.try_recv() {
            self.dispatch(done);
            n += 1;
        }
        n
    }

    /// Block until at least one completion is delivered or `timeout` passes.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.outstanding() == 0 {
            return false;
        }
        let rx = self.inner.borrow().rx.clone();
        match rx.recv_timeout(timeout) {
            Ok(done) => {
                self.dispatch(done);
                self.poll();
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Deliver completions until nothing is outstanding. Returns `false` on timeout.
    pub fn run_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if self.outstanding() == 0 {
                return true;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() || !self.wait(left) {
                return self.outstanding() == 0;
            }
        }
    }

    fn dispatch(&self, done: Completion) {
        match done {
            Completion::Load { url, result } => {
                let waiters = {
                    let mut inner = self.inner.borrow_mut();
                    inner.outstanding = inner.outstanding.saturating_sub(1);
                    match inner.in_flight.remove(&url) {
                        Some(mut job) => {
                            let refetch = std::mem::take(&mut job.refetch);
                            if !refetch.is_empty() {
                                match Url::parse(&url) {
                                    Ok(parsed) => {
                                        let next = InFlight {
                                            prefix: job.prefix.clone(),
                                            bypass: true,
                                            waiters: refetch,
                                            refetch: Vec::new(),
                                        };
                                        self.spawn_load(&mut inner, parsed, &url, next);
                                    }
                                    Err(_) => job.waiters.extend(refetch),
                                }
                            }
                            job.waiters
                        }
                        None => Vec::new(),
                    }
                };
                if let Err(e) = &result {
                    tracing::warn!(error = %e, waiters = waiters.len(), "resource load failed");
                }
                for cb in waiters {
                    cb(result.clone());
                }
            }
            Completion::Reduce { id, result } => {
                let waiter = {
                    let mut inner = self.inner.borrow_mut();
                    inner.outstanding = inner.outstanding.saturating_sub(1);
                    inner.reduce_waiters.remove(&id)
                };
                if let Some(cb) = waiter {
                    cb(result);
                }
            }
        }
    }
}

fn run_load(
    shared: &Shared,
    parsed: &Url,
    url: &str,
    prefix: &str,
    bypass_cache: bool,
) -> Result<PathBuf, LoadFailed> {
    let failed = |reason: String| LoadFailed::new(url, reason);
    let stamp = shared.next_stamp();
    let mut entry = match shared.store.get(url).map_err(|e| failed(e.to_string()))? {
        Some(e) => e,
        None => {
            let e = AssetEntry::new(url, prefix, stamp);
            shared.store.put(&e).map_err(|e| failed(e.to_string()))?;
            e
        }
    };
    let path = entry.local_path(&shared.root);
    entry.last_accessed = stamp;

    if entry.loaded && !bypass_cache && path.is_file() {
        tracing::trace!(url, path = %path.display(), "cache hit");
        shared.store.put(&entry).map_err(|e| failed(e.to_string()))?;
        return Ok(path);
    }

    tracing::debug!(url, "fetching");
    let res = shared
        .fetcher
        .fetch(parsed)
        .map_err(|e| failed(format!("{e:#}")))?;
    if res.status != 200 {
        return Err(failed(format!("http status {}", res.status)));
    }
    write_atomic(&path, &res.body).map_err(|e| failed(format!("{e:#}")))?;

    entry.loaded = true;
    entry.size_bytes = res.body.len() as u64;
    shared.store.put(&entry).map_err(|e| failed(e.to_string()))?;
    Ok(path)
}

fn run_reduce(shared: &Shared, limit: usize, extra: usize) -> BookResult<ReduceReport> {
    let count = shared.store.len()?;
    let mut report = ReduceReport {
        remaining: count,
        ..ReduceReport::default()
    };
    let mut to_remove = count.saturating_sub(limit);
    let batch = limit.saturating_add(extra).max(1);
    while to_remove > 0 {
        let oldest = shared.store.oldest(batch)?;
        if oldest.is_empty() {
            break;
        }
        report.examined += oldest.len();
        for entry in oldest.into_iter().take(to_remove) {
            delete_file(&entry.local_path(&shared.root));
            shared.store.remove(&entry.remote_url)?;
            report.removed += 1;
            to_remove -= 1;
        }
    }
    report.remaining = count - report.removed;
    tracing::debug!(?report, "cache reduced");
    Ok(report)
}

fn delete_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to delete cached file"),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
