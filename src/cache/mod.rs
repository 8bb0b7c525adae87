//! Caching subsystem.
//!
//! [`ResultCache`] is the durable record id → analysis store that makes
//! repeated runs free. Entries are keyed by record id and tagged with the
//! [`Fingerprint`](crate::types::Fingerprint) of the model that produced
//! them; see [`result`] for the file format and failure handling.

pub mod result;

pub use result::{
    CACHE_FORMAT_VERSION, CacheEntry, CacheLookup, CacheStatus, ResultCache, default_cache_path,
};
