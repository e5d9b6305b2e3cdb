//! Connection Module
//!
//! Per-client state for the single-threaded server. There is no task per
//! client; every connection is a plain struct in the server's slab, and the
//! event loop advances whichever ones have work, one bounded step at a time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        event loop                           │
//! │                                                             │
//! │   Slab<Connection>            IdleList                      │
//! │   ┌───────────────┐           ┌───────────────────────┐     │
//! │   │ conn 0        │<─ keys ──>│ oldest ──────> newest │     │
//! │   │ conn 1        │           └───────────────────────┘     │
//! │   │ conn 2        │             front expires first         │
//! │   └───────────────┘                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - `handler`: the [`Connection`] state machine (buffers, intent flags,
//!   read/write turns, request framing)
//! - `idle`: the activity-ordered [`IdleList`] behind the idle timeout

pub mod handler;
pub mod idle;

// Re-export commonly used types
pub use handler::Connection;
pub use idle::IdleList;
