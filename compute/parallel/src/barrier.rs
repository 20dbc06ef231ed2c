//! Synchronization point between consecutive tile-diagonals

use log::trace;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Reusable barrier that marks the end of each tile-diagonal
///
/// Unlike `std::sync::Barrier`, this barrier can be aborted, which releases
/// every waiting worker with an error. This is needed to shut down cleanly
/// when a worker dies mid-run, as the surviving workers would otherwise wait
/// for it forever.
#[derive(Debug)]
pub(crate) struct PhaseBarrier {
    /// Number of workers that must arrive before the phase ends
    num_workers: usize,

    /// Progress of the current phase
    state: Mutex<PhaseState>,

    /// Signaled when a phase ends or the barrier is aborted
    phase_end: Condvar,
}
//
impl PhaseBarrier {
    /// Set up a barrier for a certain number of workers
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            state: Mutex::new(PhaseState::default()),
            phase_end: Condvar::new(),
        }
    }

    /// Wait for all workers to be done with the current phase
    pub fn wait(&self) -> Result<(), Aborted> {
        let mut state = self.lock();
        if state.aborted {
            return Err(Aborted);
        }
        state.arrived += 1;
        if state.arrived == self.num_workers {
            trace!("All workers done with phase {}", state.phase);
            state.arrived = 0;
            state.phase += 1;
            self.phase_end.notify_all();
            return Ok(());
        }
        let phase = state.phase;
        while state.phase == phase && !state.aborted {
            state = self
                .phase_end
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.phase == phase {
            Err(Aborted)
        } else {
            Ok(())
        }
    }

    /// Release all current and future waiters with an error
    pub fn abort(&self) {
        self.lock().aborted = true;
        self.phase_end.notify_all();
    }

    /// Get a guard that aborts the barrier if the current thread panics
    pub fn abort_on_panic(&self) -> AbortOnPanic<'_> {
        AbortOnPanic(self)
    }

    /// Access the barrier state
    fn lock(&self) -> MutexGuard<'_, PhaseState> {
        // State is never left inconsistent, so poisoning can be ignored
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Progress of the current phase
#[derive(Debug, Default)]
struct PhaseState {
    /// Number of workers that reached the end of the phase
    arrived: usize,

    /// Number of phases that have ended
    phase: usize,

    /// Truth that the run was aborted
    aborted: bool,
}

/// Error returned to workers when the run was aborted
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Aborted;

/// Guard that aborts a [`PhaseBarrier`] when dropped during a panic
pub(crate) struct AbortOnPanic<'barrier>(&'barrier PhaseBarrier);
//
impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn phases_are_separated() {
        const NUM_WORKERS: usize = 4;
        const NUM_PHASES: usize = 50;
        let barrier = PhaseBarrier::new(NUM_WORKERS);
        let counter = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..NUM_WORKERS {
                s.spawn(|| {
                    for phase in 0..NUM_PHASES {
                        counter.fetch_add(1, Ordering::Relaxed);
                        barrier.wait().unwrap();
                        // Everyone incremented before anyone went through
                        assert!(counter.load(Ordering::Relaxed) >= (phase + 1) * NUM_WORKERS);
                        barrier.wait().unwrap();
                    }
                });
            }
        });
        assert_eq!(counter.load(Ordering::Relaxed), NUM_WORKERS * NUM_PHASES);
    }

    #[test]
    fn abort_releases_waiters() {
        let barrier = PhaseBarrier::new(3);
        std::thread::scope(|s| {
            let waiters = (0..2)
                .map(|_| s.spawn(|| barrier.wait()))
                .collect::<Vec<_>>();
            let dying = s.spawn(|| {
                let _guard = barrier.abort_on_panic();
                panic!("worker died");
            });
            assert!(dying.join().is_err());
            for waiter in waiters {
                assert_eq!(waiter.join().unwrap(), Err(Aborted));
            }
        });
        assert_eq!(barrier.wait(), Err(Aborted));
    }
}
