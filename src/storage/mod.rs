//! Storage Module
//!
//! The in-memory data structures behind the keyspace. Everything here is
//! single-threaded and owned by the event loop; the only concurrency is the
//! one-way handoff of doomed entries to the worker pool.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       StorageEngine                          │
//! │                                                              │
//! │  ┌────────────────┐   ┌───────────────┐   ┌──────────────┐   │
//! │  │   HashTable    │   │   TtlHeap     │   │  SortedSet   │   │
//! │  │  progressive   │   │  min-heap of  │   │  one per     │   │
//! │  │  two-gen       │   │  deadlines    │   │  zset key    │   │
//! │  │  chained table │   │  w/ back-refs │   │              │   │
//! │  └────────────────┘   └───────────────┘   └──────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Notes
//!
//! - **Arena keys instead of pointers**: every structure lives in a
//!   [`slab::Slab`] and cross-references are plain `usize` keys, so nodes
//!   can be relinked (hashtable migration, tree rotations) without moving.
//! - **Progressive growth**: the hashtable migrates a bounded batch per
//!   operation; no single operation ever pays for a full rehash.
//! - **Budgeted expiry**: TTLs fire from a sweep with a per-tick budget, so
//!   a pile of simultaneous deadlines cannot monopolize the loop.

pub mod engine;
pub mod hashmap;
pub mod heap;
pub mod zset;

// Re-export commonly used types
pub use engine::{Entry, StorageEngine, StoredValue, TypeError, LARGE_CONTAINER_SIZE};
pub use hashmap::{hash_bytes, HashTable};
pub use heap::{TtlHeap, TtlItem};
pub use zset::SortedSet;
