//! Storage layer: device-local cache of the inspector's profile, schools, and
//! visits, plus the outbox of finalized visits awaiting delivery.

mod cache;
mod error;

pub use cache::{CacheStore, CachedState, JsonFileCache, MemoryCache};
pub use error::StoreError;
