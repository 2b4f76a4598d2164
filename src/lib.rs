//! Swipebook plays declarative, JSON-described swipeable documents.
//!
//! A document is a list of pages, each a tree of elements with geometry, media and animations.
//! Every page's animations hang off one normalized time offset in `[0, 1]` that autoplay, drag
//! and manual scrub all drive the same way. Resources are prefetched per page into a
//! capacity-bounded local cache.
//!
//! - Parse a [`Document`] and open it as a [`Book`] against a [`BookHost`]
//! - Feed scroll positions ([`Book::scroll_to`], [`Book::settle`]) and time ([`Book::advance`])
//! - Render each page's [`Layer`] tree and drain [`Notification`]s
#![forbid(unsafe_code)]

mod foundation;
pub mod parse;

pub mod assets;
pub mod config;
pub mod element;
pub mod events;
pub mod host;
pub mod model;
pub mod page;
pub mod timeline;

pub use crate::foundation::core::{Affine, BezPath, Color, Point, Rect, Size, Vec2, clamp_offset};
pub use crate::foundation::error::{BookError, BookResult, LoadFailed};
pub use crate::foundation::ids::{ElementIdx, PageIdx};
pub use crate::foundation::props::{Props, PropsExt, localized};

pub use crate::assets::cache::{CacheStats, ReduceReport, ResourceCache};
pub use crate::assets::fetch::{Fetch, FetchResponse, OfflineFetcher};
pub use crate::assets::prefetch::{PrefetchOutcome, Prefetcher, ResourceSet};
pub use crate::assets::store::{AssetEntry, AssetStore, InMemoryAssetStore, JsonAssetStore};
pub use crate::config::{BookOptions, CacheConfig};
pub use crate::events::{DocEvent, Notification};
pub use crate::host::{
    MediaBackend, MediaHandle, MediaKind, MediaOwner, MediaPlayer, MediaSignal, NullMedia,
    SeekCompletion,
};
pub use crate::model::book::{Book, BookHost};
pub use crate::model::document::{Document, Orientation, Paging};
pub use crate::model::inherit::merge;
pub use crate::model::viewstate::{
    InMemoryViewStateStore, JsonViewStateStore, ViewState, ViewStateStore,
};
pub use crate::page::{Page, PageState, PlayToken};
pub use crate::timeline::layer::{Layer, LayerContents, Presentation};

#[cfg(feature = "http")]
pub use crate::assets::fetch::HttpFetcher;
#[cfg(feature = "sqlite")]
pub use crate::assets::sqlite::SqliteAssetStore;
