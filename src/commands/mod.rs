//! Command Module
//!
//! The layer between the wire and the storage engine: parsed argument lists
//! go in, response values come out.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request Parser  │  (protocol module)
//! └────────┬────────┘
//!          │ Vec<Bytes>
//!          ▼
//! ┌─────────────────┐
//! │   dispatch()    │  (this module)
//! │  match on name  │
//! │  + exact arity  │
//! └────────┬────────┘
//!          │ Value
//!          ▼
//! ┌─────────────────┐
//! │  write_frame()  │  (protocol module)
//! └─────────────────┘
//! ```
//!
//! ## Commands
//!
//! | command                              | answer                        |
//! |--------------------------------------|-------------------------------|
//! | `get key`                            | value or nil                  |
//! | `set key value`                      | nil                           |
//! | `del key`                            | 1 if removed, else 0          |
//! | `pexpire key ttl_ms`                 | 1 if the key exists, else 0   |
//! | `pttl key`                           | ms left, -1 no TTL, -2 absent |
//! | `keys`                               | array of every key            |
//! | `zadd key score name`                | 1 if added, 0 if updated      |
//! | `zrem key name`                      | 1 if removed, else 0          |
//! | `zscore key name`                    | score or nil                  |
//! | `zquery key score name offset limit` | flattened (name, score) pairs |

pub mod handler;

// Re-export the dispatch entry point
pub use handler::dispatch;
