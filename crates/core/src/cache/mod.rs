//! SQLite-backed cache store for the offline page shell.
//!
//! The store holds named cache generations and their request/response
//! entries, with async access via tokio-rusqlite. It supports:
//!
//! - Generation lifecycle (open, enumerate, sweep superseded names)
//! - Request-keyed response snapshots with last-writer-wins upserts
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! There is no size-based eviction, TTL expiry, or LRU policy: deleting
//! superseded generations at activate time is the sole reclaim mechanism,
//! so storage is bounded by the manifest plus visited navigation URLs.

pub mod connection;
pub mod entries;
pub mod generations;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredResponse;
