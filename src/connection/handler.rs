//! Per-Connection State Machine
//!
//! Each client connection owns its socket, an incoming byte buffer and an
//! outgoing byte buffer, and advances through intent flags the event loop
//! reads to decide what to do with it:
//!
//! ```text
//!            ┌──────────────┐  request parsed,  ┌───────────────┐
//!   accept ─>│  want_read   │ ────────────────> │  want_write   │
//!            └──────▲───────┘  response queued  └───────┬───────┘
//!                   │                                   │
//!                   └────────── outgoing drained ───────┘
//!
//!            want_close: protocol violation, EOF, or I/O error
//! ```
//!
//! Alongside the intent flags sit two readiness flags, `readable` and
//! `writable`, which mirror what the kernel last reported. The poller is
//! edge-triggered, so an event only marks a flag; it is cleared again the
//! moment a syscall returns `WouldBlock`. A connection is worth servicing
//! when an intent and its readiness line up ([`Connection::is_actionable`]).
//!
//! Fairness rule: one bounded read per turn. A single turn never drains a
//! flooding client's socket in a loop, so its neighbors on the same loop
//! keep getting served. Everything already buffered is parsed greedily, and
//! a freshly queued response is given one opportunistic write in the same
//! turn, which spares the common request/response exchange a poll round.

use std::io::{self, Read, Write};
use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use mio::net::TcpStream;
use tracing::{debug, error, trace, warn};

use crate::commands::dispatch;
use crate::protocol::parser::{parse_request, write_frame, MAX_MSG_SIZE};
use crate::storage::StorageEngine;

/// Bytes drained from the socket per read turn.
const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    incoming: BytesMut,
    outgoing: BytesMut,
    /// Intent: waiting for request bytes.
    pub want_read: bool,
    /// Intent: a response is queued and not yet fully written.
    pub want_write: bool,
    /// Intent: tear this connection down.
    pub want_close: bool,
    /// Kernel readiness, set by poll events, cleared on `WouldBlock`.
    pub readable: bool,
    pub writable: bool,
    /// Timestamp of the last serviced event, for the idle sweep.
    pub last_active_ms: u64,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr, now_ms: u64) -> Self {
        Connection {
            stream,
            addr,
            incoming: BytesMut::new(),
            outgoing: BytesMut::new(),
            want_read: true,
            want_write: false,
            want_close: false,
            readable: false,
            writable: false,
            last_active_ms: now_ms,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The socket, for poll registration and deregistration.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Whether an intent flag lines up with kernel readiness.
    pub fn is_actionable(&self) -> bool {
        (self.want_read && self.readable) || (self.want_write && self.writable)
    }

    /// One read turn: a single bounded read, greedy parsing of everything
    /// buffered, and an opportunistic write if a response got queued.
    pub fn handle_read(&mut self, engine: &mut StorageEngine, now_ms: u64) {
        let old = self.incoming.len();
        self.incoming.resize(old + READ_CHUNK, 0);
        let result = self.stream.read(&mut self.incoming[old..]);
        match result {
            Ok(0) => {
                self.incoming.truncate(old);
                if self.incoming.is_empty() {
                    debug!(client = %self.addr, "client closed connection");
                } else {
                    warn!(client = %self.addr, buffered = self.incoming.len(),
                          "unexpected EOF mid-request");
                }
                self.want_close = true;
                return;
            }
            Ok(n) => {
                self.incoming.truncate(old + n);
                trace!(client = %self.addr, bytes = n, "read");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.incoming.truncate(old);
                self.readable = false;
                return;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                self.incoming.truncate(old);
                return;
            }
            Err(e) => {
                self.incoming.truncate(old);
                error!(client = %self.addr, error = %e, "read failed");
                self.want_close = true;
                return;
            }
        }

        // pipelining: service every complete request already buffered
        while self.try_one_request(engine, now_ms) {}
        if self.want_close {
            return;
        }
        if !self.outgoing.is_empty() {
            self.want_read = false;
            self.want_write = true;
            // the socket is almost always writable right now; try before
            // going back to the poller
            self.handle_write();
        }
    }

    /// One write turn: a single write, consuming what the kernel accepted.
    /// Once the buffer drains the connection flips back to reading.
    pub fn handle_write(&mut self) {
        debug_assert!(!self.outgoing.is_empty());
        match self.stream.write(&self.outgoing) {
            Ok(n) => {
                self.outgoing.advance(n);
                trace!(client = %self.addr, bytes = n, "wrote");
                if self.outgoing.is_empty() {
                    self.want_write = false;
                    self.want_read = true;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.writable = false;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                error!(client = %self.addr, error = %e, "write failed");
                self.want_close = true;
            }
        }
    }

    /// Tries to cut one framed request off the incoming buffer and queue its
    /// response. Returns `false` when the buffer holds no complete frame (or
    /// the connection is now doomed).
    fn try_one_request(&mut self, engine: &mut StorageEngine, now_ms: u64) -> bool {
        if self.incoming.len() < 4 {
            return false;
        }
        let len = u32::from_le_bytes([
            self.incoming[0],
            self.incoming[1],
            self.incoming[2],
            self.incoming[3],
        ]) as usize;
        if len > MAX_MSG_SIZE {
            warn!(client = %self.addr, len, "request over the message size limit");
            self.want_close = true;
            return false;
        }
        if self.incoming.len() < 4 + len {
            return false; // frame not complete yet
        }
        let response = match parse_request(&self.incoming[4..4 + len]) {
            Ok(args) => dispatch(engine, now_ms, &args),
            Err(e) => {
                warn!(client = %self.addr, error = %e, "malformed request");
                self.want_close = true;
                return false;
            }
        };
        write_frame(&mut self.outgoing, &response);
        self.incoming.advance(4 + len);
        true
    }
}
