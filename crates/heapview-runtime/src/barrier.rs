use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarrierError {
    /// A decrement arrived with no outstanding work: some request completed twice.
    Underflow,
    TimedOut { outstanding: usize },
}

impl fmt::Display for BarrierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Underflow => {
                write!(f, "completion barrier decremented below zero (double completion)")
            }
            Self::TimedOut { outstanding } => write!(
                f,
                "timed out waiting for snapshot completion ({outstanding} requests outstanding)"
            ),
        }
    }
}

impl Error for BarrierError {}

/// Counts outstanding asynchronous work; waiters block until it drains.
///
/// Work may be registered from any thread, including while someone is
/// already waiting. The initiator must hold a [`Pending`] registration of
/// its own while it dispatches, so the count cannot touch zero before
/// dispatch is over.
#[derive(Clone, Default)]
pub struct CompletionBarrier {
    inner: Arc<BarrierInner>,
}

#[derive(Default)]
struct BarrierInner {
    outstanding: AtomicUsize,
    violated: AtomicBool,
    lock: Mutex<()>,
    released: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Completes one unit of work, releasing waiters when it was the last.
    ///
    /// Decrementing at zero poisons the barrier: current and future waits
    /// fail with [`BarrierError::Underflow`].
    pub fn decrement(&self) -> Result<(), BarrierError> {
        let previous = self
            .inner
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                self.notify();
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(_) => {
                error!("completion barrier decremented below zero");
                self.inner.violated.store(true, Ordering::Release);
                self.notify();
                Err(BarrierError::Underflow)
            }
        }
    }

    /// Registers one unit of work, completed when the returned token drops.
    pub fn register(&self) -> Pending {
        self.increment();
        Pending {
            barrier: self.clone(),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Blocks until no work is outstanding.
    pub fn wait(&self) -> Result<(), BarrierError> {
        let mut guard = self.inner.lock.lock();
        loop {
            if let Some(result) = self.settled() {
                return result;
            }
            self.inner.released.wait(&mut guard);
        }
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), BarrierError> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        loop {
            if let Some(result) = self.settled() {
                return result;
            }
            if self
                .inner
                .released
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return self.settled().unwrap_or(Err(BarrierError::TimedOut {
                    outstanding: self.outstanding(),
                }));
            }
        }
    }

    fn settled(&self) -> Option<Result<(), BarrierError>> {
        if self.inner.violated.load(Ordering::Acquire) {
            Some(Err(BarrierError::Underflow))
        } else if self.outstanding() == 0 {
            Some(Ok(()))
        } else {
            None
        }
    }

    // Taking the lock orders this notify after any waiter's check.
    fn notify(&self) {
        let _guard = self.inner.lock.lock();
        self.inner.released.notify_all();
    }
}

/// One registered unit of work. Dropping it completes the work exactly once.
#[must_use = "dropping a Pending token completes its work immediately"]
pub struct Pending {
    barrier: CompletionBarrier,
}

impl Pending {
    pub fn complete(self) {}
}

impl Drop for Pending {
    fn drop(&mut self) {
        // Cannot underflow: this token's increment is still counted.
        let _ = self.barrier.decrement();
    }
}
