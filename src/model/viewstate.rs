//! Persisted reading position per document.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    assets::store::write_atomic,
    foundation::error::{BookError, BookResult},
};

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ViewState {
    pub page: usize,
    #[serde(rename = "langId", default, skip_serializing_if = "Option::is_none")]
    pub lang_id: Option<String>,
}

/// Key-value store for [`ViewState`], keyed by document URL.
pub trait ViewStateStore {
    fn load(&self, document: &str) -> BookResult<Option<ViewState>>;
    fn save(&self, document: &str, state: &ViewState) -> BookResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryViewStateStore {
    states: Mutex<BTreeMap<String, ViewState>>,
}

fn poisoned<T>(_: T) -> BookError {
    BookError::store("view state lock poisoned")
}

impl ViewStateStore for InMemoryViewStateStore {
    fn load(&self, document: &str) -> BookResult<Option<ViewState>> {
        Ok(self.states.lock().map_err(poisoned)?.get(document).cloned())
    }

    fn save(&self, document: &str, state: &ViewState) -> BookResult<()> {
        self.states
            .lock()
            .map_err(poisoned)?
            .insert(document.to_owned(), state.clone());
        Ok(())
    }
}

/// All documents' states in one JSON object file.
#[derive(Debug)]
pub struct JsonViewStateStore {
    path: PathBuf,
}

impl JsonViewStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BookResult<BTreeMap<String, ViewState>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "view state unreadable, ignoring");
                BTreeMap::new()
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(BookError::store(format!(
                "read view state '{}': {e}",
                self.path.display()
            ))),
        }
    }
}

impl ViewStateStore for JsonViewStateStore {
    fn load(&self, document: &str) -> BookResult<Option<ViewState>> {
        Ok(self.read_all()?.remove(document))
    }

    fn save(&self, document: &str, state: &ViewState) -> BookResult<()> {
        let mut all = self.read_all()?;
        all.insert(document.to_owned(), state.clone());
        let bytes = serde_json::to_vec_pretty(&all)?;
        write_atomic(&self.path, &bytes)
            .map_err(|e| BookError::store(format!("write view state: {e:#}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/viewstate.rs"]
mod tests;
