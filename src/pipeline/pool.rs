//! Bounded worker pool with unordered result delivery.
//!
//! A feeder thread pulls items from the input iterator into a bounded job
//! channel; `workers` threads apply the task and push results into a bounded
//! result channel. Results come out in completion order, never input order.
//! Callers that need a deterministic aggregate fold them with an
//! [`Accumulator`].

use crossbeam_channel::{Receiver, bounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Folds results that arrive in completion order.
///
/// Implementations must be commutative: accumulating the same items in any
/// order must leave the accumulator in the same final state.
pub trait Accumulator<T> {
    fn accumulate(&mut self, item: T);
}

impl<T> Accumulator<T> for Vec<T> {
    fn accumulate(&mut self, item: T) {
        self.push(item);
    }
}

/// Fixed-size pool of OS threads.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    queue: usize,
}

impl WorkerPool {
    /// Pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue: workers * 2,
        }
    }

    /// Override the job/result channel capacity.
    pub fn with_queue(mut self, queue: usize) -> Self {
        self.queue = queue.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `task` to every item on the pool.
    ///
    /// The input is consumed lazily by a feeder thread, so it may itself be
    /// the output of another pool. The returned iterator yields results as
    /// workers finish them and joins all threads once drained.
    pub fn map_unordered<I, T, R, F>(&self, items: I, task: F) -> Unordered<R>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let (job_tx, job_rx) = bounded::<T>(self.queue);
        let (result_tx, result_rx) = bounded::<R>(self.queue);
        let task = Arc::new(task);
        let mut handles = Vec::with_capacity(self.workers + 1);

        let items = items.into_iter();
        handles.push(thread::spawn(move || {
            for item in items {
                if job_tx.send(item).is_err() {
                    // All workers gone
                    break;
                }
            }
        }));

        for _ in 0..self.workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let task = Arc::clone(&task);
            handles.push(thread::spawn(move || {
                while let Ok(item) = job_rx.recv() {
                    if result_tx.send(task(item)).is_err() {
                        break;
                    }
                }
            }));
        }

        Unordered {
            results: result_rx,
            handles,
        }
    }
}

/// Results of [`WorkerPool::map_unordered`] in completion order.
pub struct Unordered<R> {
    results: Receiver<R>,
    handles: Vec<JoinHandle<()>>,
}

impl<R> Unordered<R> {
    /// Drain every result into `acc`.
    pub fn accumulate_into<A: Accumulator<R>>(self, mut acc: A) -> A {
        for item in self {
            acc.accumulate(item);
        }
        acc
    }

    fn join_all(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(panic_info) = handle.join() {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("unknown panic");
                tracing::error!("worker thread panicked: {msg}");
            }
        }
    }
}

impl<R> Iterator for Unordered<R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        match self.results.recv() {
            Ok(item) => Some(item),
            Err(_) => {
                // Every worker has dropped its sender.
                self.join_all();
                None
            }
        }
    }
}

impl<R> Drop for Unordered<R> {
    fn drop(&mut self) {
        // Dropping the receiver first lets blocked workers exit.
        let (_, closed) = bounded(0);
        drop(std::mem::replace(&mut self.results, closed));
        self.join_all();
    }
}
