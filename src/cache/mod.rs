//! Hash caching module.
//!
//! This module provides persistent storage for file hashes to speed up
//! subsequent scans by avoiding re-hashing of unchanged files.
//!
//! # Architecture
//!
//! The caching system is split into two main components:
//!
//! * [`store`]: Owns the on-disk cache file for one target root, including
//!   its fingerprint, exclusive lock, load, index and save.
//! * [`entry`]: Defines the per-file snapshot stored in the cache.
//!
//! # Cache Invalidation
//!
//! Entries are keyed by the digest of the file's absolute path and validated
//! by the file's last-write time in whole seconds. If the timestamp moved,
//! the file is re-hashed during the next scan even when its content is
//! byte-identical.

pub mod entry;
pub mod store;

pub use entry::{unix_seconds, CacheEntry};
pub use store::{fingerprint, CacheError, CacheResult, CacheStore};
