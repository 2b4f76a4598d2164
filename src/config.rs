use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{BookError, BookResult};

fn default_cache_root() -> PathBuf {
    PathBuf::from("./swipebook-cache")
}

fn default_workers() -> usize {
    2
}

fn default_reduce_limit() -> usize {
    100
}

fn default_reduce_extra() -> usize {
    20
}

/// Resource cache placement and sizing.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
    /// Threads fetching and writing cache files.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Entry count kept by opportunistic `reduce` calls.
    #[serde(default = "default_reduce_limit")]
    pub reduce_limit: usize,
    #[serde(default = "default_reduce_extra")]
    pub reduce_extra: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            workers: default_workers(),
            reduce_limit: default_reduce_limit(),
            reduce_extra: default_reduce_extra(),
        }
    }
}

impl CacheConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> BookResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read cache config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> BookResult<()> {
        if self.workers == 0 {
            return Err(BookError::validation("cache 'workers' must be >= 1"));
        }
        if self.reduce_limit == 0 {
            return Err(BookError::validation("cache 'reduce_limit' must be >= 1"));
        }
        if self.root.as_os_str().is_empty() {
            return Err(BookError::validation("cache 'root' must not be empty"));
        }
        Ok(())
    }
}

fn default_view_radius() -> usize {
    2
}

fn default_fps() -> f64 {
    60.0
}

fn default_duration() -> f64 {
    0.2
}

/// Host policy knobs for an open book.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BookOptions {
    /// Pages on each side of the current one that keep a materialized view.
    #[serde(default = "default_view_radius")]
    pub view_radius: usize,
    /// Mark a page failed instead of showing it when any of its resources failed to load.
    #[serde(default)]
    pub require_all_resources: bool,
    #[serde(default = "default_fps")]
    pub default_fps: f64,
    /// Seconds for one pass of the page timeline when the page does not say.
    #[serde(default = "default_duration")]
    pub default_duration: f64,
}

impl Default for BookOptions {
    fn default() -> Self {
        Self {
            view_radius: default_view_radius(),
            require_all_resources: false,
            default_fps: default_fps(),
            default_duration: default_duration(),
        }
    }
}

impl BookOptions {
    pub fn validate(&self) -> BookResult<()> {
        if !(self.default_fps.is_finite() && self.default_fps > 0.0) {
            return Err(BookError::validation("'default_fps' must be > 0"));
        }
        if !(self.default_duration.is_finite() && self.default_duration > 0.0) {
            return Err(BookError::validation("'default_duration' must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
