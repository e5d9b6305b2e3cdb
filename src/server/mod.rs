//! Server Module
//!
//! The [`Server`] owns everything: the listening socket, the poller, the
//! connection table, the idle list and the storage engine. No globals, no
//! shared state; integration tests run several servers in one process on
//! different ports.
//!
//! See `event_loop` for the iteration structure and the timer handling.

pub mod event_loop;

// Re-export the server type
pub use event_loop::Server;
