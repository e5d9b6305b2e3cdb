//! Fixed-size thread pool over an unbounded FIFO channel.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::debug;

/// Worker-thread count used when the caller has no reason to pick another.
pub const DEFAULT_WORKERS: usize = 4;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A pool of worker threads draining a shared task queue in FIFO order.
///
/// Dropping the pool closes the queue and joins the workers, so every task
/// enqueued before the drop still runs.
#[derive(Debug)]
pub struct ThreadPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns `workers` threads, each blocking on the shared queue.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn a thread; the pool is created once
    /// at startup, where that failure is fatal anyway.
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "thread pool needs at least one worker");
        let (sender, receiver) = unbounded::<Task>();
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("rapidkv-worker-{i}"))
                .spawn(move || {
                    // recv fails only when all senders are gone; that is the
                    // shutdown signal
                    while let Ok(task) = receiver.recv() {
                        task();
                    }
                    debug!("worker exiting");
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        ThreadPool {
            sender: Some(sender),
            workers: handles,
        }
    }

    /// Queues a task for the next free worker.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            // the receivers live as long as the pool, so send cannot fail here
            let _ = sender.send(Box::new(task));
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
