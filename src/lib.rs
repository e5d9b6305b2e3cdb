//! # RapidKV - A Single-Threaded In-Memory Key-Value Server
//!
//! RapidKV is an in-memory key-value server speaking a binary
//! length-prefixed protocol, with string values, sorted sets and per-key
//! TTLs. It demonstrates systems programming concepts like readiness-driven
//! I/O, progressive data-structure maintenance, and latency-bounded
//! housekeeping.
//!
//! ## Features
//!
//! - **Sorted Sets**: members ordered by (score, name), with O(log n)
//!   rank-offset range queries backed by a size-augmented AVL tree
//! - **TTL Support**: per-key expiration via a min-heap of deadlines,
//!   reclaimed by a budgeted sweep
//! - **Progressive Hashtable**: the keyspace grows by migrating a bounded
//!   batch per operation, so no request ever pays for a full rehash
//! - **Single-Threaded Core**: one event loop owns all state; the only
//!   other threads are workers absorbing large deallocations
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                              RapidKV                               │
//! │                                                                    │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐             │
//! │  │  Listener   │───>│ Connection  │───>│  dispatch   │             │
//! │  │  + Poll     │    │ state machine│   │  (commands) │             │
//! │  └──────┬──────┘    └─────────────┘    └──────┬──────┘             │
//! │         │                                     │                    │
//! │         │ one thread, one loop                ▼                    │
//! │         │                 ┌──────────────────────────────────────┐ │
//! │         │                 │            StorageEngine             │ │
//! │         ▼                 │  ┌───────────┐ ┌─────────┐ ┌───────┐ │ │
//! │  ┌─────────────┐          │  │ HashTable │ │ TtlHeap │ │ ZSets │ │ │
//! │  │  IdleList   │          │  │ (2 gens)  │ │         │ │ (AVL) │ │ │
//! │  │  (timeouts) │          │  └───────────┘ └─────────┘ └───────┘ │ │
//! │  └─────────────┘          └──────────────────┬───────────────────┘ │
//! │                                              │ large teardowns     │
//! │                                              ▼                     │
//! │                           ┌─────────────────────────────────────┐  │
//! │                           │      ThreadPool (4 workers)         │  │
//! │                           └─────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use rapidkv::server::Server;
//!
//! fn main() -> std::io::Result<()> {
//!     let mut server = Server::bind("0.0.0.0:1234".parse().unwrap())?;
//!     server.run()
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `get key` / `set key value` / `del key`
//! - `pexpire key ttl_ms` / `pttl key`
//! - `keys`
//! - `zadd key score name` / `zrem key name` / `zscore key name`
//! - `zquery key score name offset limit`
//!
//! ## Module Overview
//!
//! - [`protocol`]: wire framing, request parsing, tagged response values
//! - [`storage`]: the keyspace (hashtable, sorted sets, TTL heap, engine)
//! - [`commands`]: command dispatch against the storage engine
//! - [`connection`]: per-connection state machine and the idle list
//! - [`server`]: the readiness-driven event loop
//! - [`pool`]: worker threads for offloaded teardown
//!
//! ## Design Highlights
//!
//! ### Bounded Work Everywhere
//!
//! Every potentially unbounded job is cut into budgeted pieces: hashtable
//! rehashing migrates at most 128 nodes per operation, the TTL sweep
//! reclaims at most 2000 keys per tick, a client gets one bounded read per
//! loop iteration, and sorted sets past 1000 members are freed on a worker
//! thread. The event loop's latency ceiling is the point of the design.
//!
//! ### No Shared State
//!
//! The engine is owned by the event loop and mutated from exactly one
//! thread. The worker pool only ever receives values that have already been
//! unlinked from every index, so there is nothing to lock.

pub mod commands;
pub mod connection;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::dispatch;
pub use connection::{Connection, IdleList};
pub use pool::ThreadPool;
pub use protocol::{ParseError, Value};
pub use server::Server;
pub use storage::{SortedSet, StorageEngine, TypeError};

/// The default port RapidKV listens on
pub const DEFAULT_PORT: u16 = 1234;

/// The default host RapidKV binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of RapidKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
