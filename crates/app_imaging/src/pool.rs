//! Dedicated low-priority worker pool for background preloading
//!
//! Kept apart from rayon's global pool (which foreground decodes may fan
//! out on) so warming neighbours never competes with interactive work at
//! the same priority.

use crate::error::PoolError;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded queue consumed by a fixed set of named worker threads
pub struct PreloadPool {
    sender: Sender<Job>,
    workers: usize,
    capacity: usize,
}

impl PreloadPool {
    /// Spawn `workers` threads (at least 1) behind a queue of `capacity`
    /// pending jobs (at least 1).
    pub fn new(workers: usize, capacity: usize) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded::<Job>(capacity);

        for id in 0..workers {
            let receiver = receiver.clone();
            thread::Builder::new()
                .name(format!("preload-worker-{}", id))
                .spawn(move || worker_loop(receiver))?;
        }

        tracing::debug!("[PreloadPool] Started {} workers, queue capacity {}", workers, capacity);

        Ok(Self {
            sender,
            workers,
            capacity,
        })
    }

    /// Queue a job without blocking
    pub fn try_submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PoolError::Full),
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Closed),
        }
    }

    /// Jobs waiting to start
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for PreloadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadPool")
            .field("workers", &self.workers)
            .field("capacity", &self.capacity)
            .field("pending", &self.pending())
            .finish()
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    lower_current_thread_priority();

    // Ends once every sender is gone and the queue is drained
    for job in receiver.iter() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            tracing::error!(
                "[PreloadPool] Job panicked on {}: {}",
                thread::current().name().unwrap_or("preload-worker"),
                message
            );
        }
    }

    tracing::trace!("[PreloadPool] {} exiting", thread::current().name().unwrap_or("preload-worker"));
}

#[cfg(target_os = "linux")]
fn lower_current_thread_priority() {
    // On Linux the nice value is per thread; who = 0 targets the caller
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, 10) };
    if result != 0 {
        tracing::debug!(
            "[PreloadPool] Could not lower worker priority: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(windows)]
fn lower_current_thread_priority() {
    use windows::Win32::System::Threading::{
        GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_BELOW_NORMAL,
    };

    if let Err(e) = unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_BELOW_NORMAL) } {
        tracing::debug!("[PreloadPool] Could not lower worker priority: {}", e);
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
fn lower_current_thread_priority() {}
