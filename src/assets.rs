pub mod cache;
pub mod closure;
pub mod fetch;
pub mod prefetch;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
