// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A fixed-size worker pool over a crossbeam channel.

use crossbeam_channel::{unbounded, Sender};
use std::thread::JoinHandle;

pub(crate) type Job = Box<dyn FnOnce() + Send>;

/// `threads` OS threads draining one job queue.
pub(crate) struct WorkerPool {
    tx: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the workers, named `<name>-<i>`.
    pub(crate) fn new(threads: usize, name: &str) -> Self {
        let threads = threads.max(1);
        let (tx, rx) = unbounded::<Job>();
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || {
                    for job in rx.iter() {
                        job();
                    }
                })
                .expect("failed to spawn executor worker");
            handles.push(handle);
        }
        Self {
            tx: Some(tx),
            handles,
        }
    }

    /// Enqueues a job. Jobs submitted after `shutdown` are dropped.
    pub(crate) fn execute(&self, job: Job) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(job);
        }
    }

    /// Drains the queue and joins the workers.
    pub(crate) fn shutdown(&mut self) {
        self.tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_jobs_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(2, "test");
        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_execute_after_shutdown_is_noop() {
        let mut pool = WorkerPool::new(1, "test");
        pool.shutdown();
        pool.execute(Box::new(|| panic!("must not run")));
    }
}
