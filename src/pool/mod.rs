//! Worker Pool Module
//!
//! A small fixed pool of OS threads fed by a FIFO channel. The event loop
//! hands it work it must not do inline, which today means tearing down large
//! sorted sets: freeing a million-member set on the event-loop thread would
//! stall every connected client, so the storage engine moves the doomed
//! entry into the queue and a worker drops it.
//!
//! Tasks are owned closures moved through the channel, so there is no shared
//! state between the event loop and the workers beyond the channel itself.

pub mod worker;

// Re-export the pool type
pub use worker::{ThreadPool, DEFAULT_WORKERS};
