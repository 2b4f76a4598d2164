//! Persistent bookkeeping for cached assets.
//!
//! An [`AssetStore`] maps remote URLs to [`AssetEntry`] rows. The cache calls it from worker
//! threads, so implementations are internally synchronized.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context as _;

use crate::foundation::error::{BookError, BookResult};

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssetEntry {
    pub remote_url: String,
    /// Opaque file stem, generated once per entry and never reused.
    pub local_uuid: String,
    /// Cache subdirectory hint (`images`, `video`, ...).
    pub prefix: String,
    /// Monotonic access stamp; larger is more recent.
    pub last_accessed: u64,
    pub size_bytes: u64,
    pub loaded: bool,
}

impl AssetEntry {
    pub fn new(remote_url: impl Into<String>, prefix: impl Into<String>, stamp: u64) -> Self {
        Self {
            remote_url: remote_url.into(),
            local_uuid: uuid::Uuid::new_v4().to_string(),
            prefix: prefix.into(),
            last_accessed: stamp,
            size_bytes: 0,
            loaded: false,
        }
    }

    /// `<root>/<prefix>/<uuid><.ext>`, extension taken from the remote URL path.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        let mut name = self.local_uuid.clone();
        if let Some(ext) = url_extension(&self.remote_url) {
            name.push('.');
            name.push_str(&ext);
        }
        let dir = if self.prefix.is_empty() {
            root.to_path_buf()
        } else {
            root.join(&self.prefix)
        };
        dir.join(name)
    }
}

fn url_extension(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

pub trait AssetStore: Send + Sync {
    fn get(&self, url: &str) -> BookResult<Option<AssetEntry>>;

    /// Insert or replace the entry for `entry.remote_url`.
    fn put(&self, entry: &AssetEntry) -> BookResult<()>;

    fn remove(&self, url: &str) -> BookResult<()>;

    fn len(&self) -> BookResult<usize>;

    fn is_empty(&self) -> BookResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Up to `n` entries, least recently accessed first.
    fn oldest(&self, n: usize) -> BookResult<Vec<AssetEntry>>;

    /// Remove every entry, returning what was removed.
    fn clear(&self) -> BookResult<Vec<AssetEntry>>;

    fn total_bytes(&self) -> BookResult<u64>;
}

fn oldest_of<'a>(entries: impl Iterator<Item = &'a AssetEntry>, n: usize) -> Vec<AssetEntry> {
    let mut all: Vec<AssetEntry> = entries.cloned().collect();
    all.sort_by(|a, b| {
        a.last_accessed
            .cmp(&b.last_accessed)
            .then_with(|| a.remote_url.cmp(&b.remote_url))
    });
    all.truncate(n);
    all
}

fn poisoned<T>(_: T) -> BookError {
    BookError::store("asset store lock poisoned")
}

#[derive(Debug, Default)]
pub struct InMemoryAssetStore {
    entries: Mutex<HashMap<String, AssetEntry>>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssetStore for InMemoryAssetStore {
    fn get(&self, url: &str) -> BookResult<Option<AssetEntry>> {
        Ok(self.entries.lock().map_err(poisoned)?.get(url).cloned())
    }

    fn put(&self, entry: &AssetEntry) -> BookResult<()> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(entry.remote_url.clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, url: &str) -> BookResult<()> {
        self.entries.lock().map_err(poisoned)?.remove(url);
        Ok(())
    }

    fn len(&self) -> BookResult<usize> {
        Ok(self.entries.lock().map_err(poisoned)?.len())
    }

    fn oldest(&self, n: usize) -> BookResult<Vec<AssetEntry>> {
        Ok(oldest_of(self.entries.lock().map_err(poisoned)?.values(), n))
    }

    fn clear(&self) -> BookResult<Vec<AssetEntry>> {
        let mut map = self.entries.lock().map_err(poisoned)?;
        Ok(map.drain().map(|(_, e)| e).collect())
    }

    fn total_bytes(&self) -> BookResult<u64> {
        Ok(self
            .entries
            .lock()
            .map_err(poisoned)?
            .values()
            .map(|e| e.size_bytes)
            .sum())
    }
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct AssetStoreFile {
    entries: Vec<AssetEntry>,
}

/// Single-file JSON store. Every mutation rewrites the file through a temp file in the same
/// directory, so a crash leaves either the old or the new table.
#[derive(Debug)]
pub struct JsonAssetStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, AssetEntry>>,
}

impl JsonAssetStore {
    /// Open (or start) the table at `path`. A corrupt file is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> BookResult<Self> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<AssetStoreFile>(&bytes) {
                Ok(file) => file
                    .entries
                    .into_iter()
                    .map(|e| (e.remote_url.clone(), e))
                    .collect(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "asset table unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("read asset table '{}'", path.display()))
                    .into());
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &HashMap<String, AssetEntry>) -> BookResult<()> {
        let mut file = AssetStoreFile {
            entries: entries.values().cloned().collect(),
        };
        file.entries.sort_by(|a, b| a.remote_url.cmp(&b.remote_url));
        let bytes = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &bytes)
            .map_err(|e| BookError::store(format!("write asset table: {e:#}")))
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut HashMap<String, AssetEntry>) -> R) -> BookResult<R> {
        let mut map = self.entries.lock().map_err(poisoned)?;
        let out = f(&mut map);
        self.save(&map)?;
        Ok(out)
    }
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write as _;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("create '{}'", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("temp file in '{}'", dir.display()))?;
    tmp.write_all(bytes).context("write temp file")?;
    tmp.persist(path)
        .with_context(|| format!("persist '{}'", path.display()))?;
    Ok(())
}

impl AssetStore for JsonAssetStore {
    fn get(&self, url: &str) -> BookResult<Option<AssetEntry>> {
        Ok(self.entries.lock().map_err(poisoned)?.get(url).cloned())
    }

    fn put(&self, entry: &AssetEntry) -> BookResult<()> {
        self.mutate(|m| {
            m.insert(entry.remote_url.clone(), entry.clone());
        })
    }

    fn remove(&self, url: &str) -> BookResult<()> {
        self.mutate(|m| {
            m.remove(url);
        })
    }

    fn len(&self) -> BookResult<usize> {
        Ok(self.entries.lock().map_err(poisoned)?.len())
    }

    fn oldest(&self, n: usize) -> BookResult<Vec<AssetEntry>> {
        Ok(oldest_of(self.entries.lock().map_err(poisoned)?.values(), n))
    }

    fn clear(&self) -> BookResult<Vec<AssetEntry>> {
        self.mutate(|m| m.drain().map(|(_, e)| e).collect())
    }

    fn total_bytes(&self) -> BookResult<u64> {
        Ok(self
            .entries
            .lock()
            .map_err(poisoned)?
            .values()
            .map(|e| e.size_bytes)
            .sum())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
