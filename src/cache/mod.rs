//! Shared cache for API documents.
//!
//! The store is handed to its consumers explicitly (`Arc<dyn CacheStore>`)
//! rather than living in a global, so tests and separate sessions each get
//! their own instance. Entries outlive their TTL and remain available for
//! stale reads until overwritten or removed.

mod store;

pub use store::{CacheEntry, CacheStore, MemoryStore};
