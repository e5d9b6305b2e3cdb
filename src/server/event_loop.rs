//! Readiness-Driven Event Loop
//!
//! One thread, one poller, every connection. Each iteration of
//! [`Server::run`]:
//!
//! 1. polls with a timeout derived from the nearest timer (idle deadline or
//!    TTL-heap root), or zero when some connection still has actionable
//!    readiness left over from the previous turn;
//! 2. marks connection readiness from the delivered events and accepts any
//!    pending clients;
//! 3. gives every actionable connection one read or write turn;
//! 4. sweeps idle connections and expired keys.
//!
//! The poller is edge-triggered, so readiness is remembered per connection
//! and only forgotten on `WouldBlock`. That is what keeps the one-turn-per-
//! iteration fairness honest: a firehosing client gets exactly one bounded
//! read per iteration, and the zero timeout in step 1 makes sure the loop
//! comes straight back for the rest without stalling anyone else.

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use tracing::{error, info, warn};

use crate::connection::{Connection, IdleList};
use crate::storage::StorageEngine;

/// Token for the listening socket; connections use their slab keys, which
/// stay comfortably below this.
const LISTENER: Token = Token(1 << 30);

/// Connections idle longer than this are closed.
const IDLE_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on expired keys reclaimed per iteration.
const TTL_SWEEP_BUDGET: usize = 2_000;

const EVENT_CAPACITY: usize = 1024;

/// The server: listener, poller, connection table, keyspace and timers,
/// all owned by one struct and driven from one thread.
pub struct Server {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    conns: Slab<Connection>,
    idle: IdleList,
    engine: StorageEngine,
    started: Instant,
}

impl Server {
    /// Binds the listener and sets up the poller. The keyspace starts
    /// empty; nothing is persisted.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Server {
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            listener,
            conns: Slab::new(),
            idle: IdleList::new(),
            engine: StorageEngine::new(),
            started: Instant::now(),
        })
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the loop forever (or until a fatal poller error).
    pub fn run(&mut self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "listening");
        loop {
            self.tick()?;
        }
    }

    /// One loop iteration. Public so integration tests can drive the server
    /// without committing a thread to `run`.
    pub fn tick(&mut self) -> io::Result<()> {
        let timeout = self.poll_timeout();
        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(e);
        }

        let mut accept_ready = false;
        for event in self.events.iter() {
            match event.token() {
                LISTENER => accept_ready = true,
                Token(key) => {
                    // the connection may have been closed this very tick
                    if let Some(conn) = self.conns.get_mut(key) {
                        if event.is_readable() {
                            conn.readable = true;
                        }
                        if event.is_writable() {
                            conn.writable = true;
                        }
                    }
                }
            }
        }

        if accept_ready {
            self.accept_pending();
        }
        self.drive_connections();
        self.process_timers();
        Ok(())
    }

    /// Milliseconds since the server started; the monotonic clock every
    /// deadline in the system is expressed in.
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Zero while leftover readiness is actionable, otherwise the time to
    /// the nearest timer, otherwise block indefinitely.
    fn poll_timeout(&self) -> Option<Duration> {
        if self.conns.iter().any(|(_, conn)| conn.is_actionable()) {
            return Some(Duration::ZERO);
        }
        let idle_deadline = self
            .idle
            .front()
            .map(|key| self.conns[key].last_active_ms + IDLE_TIMEOUT_MS);
        let ttl_deadline = self.engine.next_deadline_ms();
        let deadline = match (idle_deadline, ttl_deadline) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };
        Some(Duration::from_millis(deadline.saturating_sub(self.now_ms())))
    }

    /// Accepts until the listener has nothing left.
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let now = self.now_ms();
                    let entry = self.conns.vacant_entry();
                    let key = entry.key();
                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        Token(key),
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        // dropping the stream closes the socket
                        error!(client = %addr, error = %e, "register failed");
                        continue;
                    }
                    entry.insert(Connection::new(stream, addr, now));
                    self.idle.push_back(key);
                    info!(client = %addr, "connection accepted");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // transient accept errors must not kill the server
                    error!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    /// Gives each actionable connection one turn, reads before writes.
    fn drive_connections(&mut self) {
        let now = self.now_ms();
        let keys: Vec<usize> = self
            .conns
            .iter()
            .filter(|(_, conn)| conn.is_actionable())
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            let Some(conn) = self.conns.get_mut(key) else {
                continue;
            };
            if conn.want_read && conn.readable {
                conn.last_active_ms = now;
                conn.handle_read(&mut self.engine, now);
                self.idle.touch(key);
            } else if conn.want_write && conn.writable {
                conn.last_active_ms = now;
                conn.handle_write();
                self.idle.touch(key);
            }
            if self.conns[key].want_close {
                self.close(key);
            }
        }
    }

    /// Expires idle connections from the front of the list, then sweeps the
    /// TTL heap within its budget.
    fn process_timers(&mut self) {
        let now = self.now_ms();
        while let Some(key) = self.idle.front() {
            let deadline = self.conns[key].last_active_ms + IDLE_TIMEOUT_MS;
            if deadline >= now {
                break;
            }
            info!(client = %self.conns[key].addr(), "idle timeout");
            self.close(key);
        }
        self.engine.expire_sweep(now, TTL_SWEEP_BUDGET);
    }

    fn close(&mut self, key: usize) {
        self.idle.remove(key);
        let mut conn = self.conns.remove(key);
        if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
            warn!(client = %conn.addr(), error = %e, "deregister failed");
        }
        info!(client = %conn.addr(), "connection closed");
        // dropping the connection closes the socket
    }
}
