//! Single-flight gate.
//!
//! At most one job runs at a time. `try_acquire` is a non-blocking
//! test-and-set: a second caller is rejected with `EngineError::Busy` instead
//! of waiting. The returned `GateToken` releases the gate when dropped, so
//! every exit path of a job (including a panic) frees it exactly once.
//!
//! The gate also owns the process-wide `JobState`; only a token holder can
//! change it, everyone can read a snapshot.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{JobProgress, JobState};

#[derive(Debug, Default)]
pub struct SingleFlightGate {
    held: AtomicBool,
    state: Mutex<JobState>,
}

impl SingleFlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate for a job described by `command`.
    ///
    /// # Errors
    /// Returns `EngineError::Busy` naming the running command if the gate is
    /// already held.
    pub fn try_acquire(self: &Arc<Self>, command: impl Into<String>) -> Result<GateToken, EngineError> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let running = self.lock_state().command.clone();
            tracing::debug!(running = %running, "gate busy, rejecting");
            return Err(EngineError::Busy { command: running });
        }

        let job_id = Uuid::new_v4();
        let command = command.into();
        {
            let mut state = self.lock_state();
            state.busy = true;
            state.command = command.clone();
            state.job_id = Some(job_id);
            state.started_at = Some(Utc::now());
        }
        tracing::debug!(%job_id, %command, "gate acquired");

        Ok(GateToken {
            gate: Arc::clone(self),
            job_id,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Copy of the current job state, for observers that just connected.
    pub fn snapshot(&self) -> JobState {
        self.lock_state().clone()
    }

    fn release(&self) {
        {
            let mut state = self.lock_state();
            state.busy = false;
            state.command.clear();
        }
        self.held.store(false, Ordering::Release);
    }

    // A job that panicked while holding the lock leaves plain data behind
    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive ownership of the gate for one job.
#[derive(Debug)]
pub struct GateToken {
    gate: Arc<SingleFlightGate>,
    job_id: Uuid,
}

impl GateToken {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Record the last published progress value.
    pub fn set_progress(&self, percent: i32, target: &Path) {
        let mut state = self.gate.lock_state();
        state.last_progress = JobProgress {
            percent,
            target_path: target.to_path_buf(),
        };
    }
}

impl Drop for GateToken {
    fn drop(&mut self) {
        self.gate.release();
        tracing::debug!(job_id = %self.job_id, "gate released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_second_acquire_is_rejected() {
        let gate = Arc::new(SingleFlightGate::new());
        let token = gate.try_acquire("Copy 'a'").expect("first acquire");

        match gate.try_acquire("Delete 'b'") {
            Err(EngineError::Busy { command }) => assert_eq!(command, "Copy 'a'"),
            other => panic!("expected busy, got {other:?}"),
        }

        drop(token);
        assert!(gate.try_acquire("Delete 'b'").is_ok());
    }

    #[test]
    fn test_state_follows_token() {
        let gate = Arc::new(SingleFlightGate::new());
        assert!(!gate.snapshot().busy);

        let token = gate.try_acquire("Verify 'x'").expect("acquire");
        token.set_progress(40, Path::new("/data"));
        let state = gate.snapshot();
        assert!(state.busy);
        assert!(gate.is_busy());
        assert_eq!(state.command, "Verify 'x'");
        assert_eq!(state.job_id, Some(token.job_id()));
        assert!(state.started_at.is_some());

        drop(token);
        let state = gate.snapshot();
        assert!(!state.busy);
        assert!(!gate.is_busy());
        assert!(state.command.is_empty());
        // Last progress survives for late joiners
        assert_eq!(state.last_progress.percent, 40);
        assert_eq!(state.last_progress.target_path, Path::new("/data"));
    }

    #[test]
    fn test_released_on_panic() {
        let gate = Arc::new(SingleFlightGate::new());
        let inner = Arc::clone(&gate);
        let result = thread::spawn(move || {
            let _token = inner.try_acquire("doomed").expect("acquire");
            panic!("job blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!gate.is_busy());
        assert!(gate.try_acquire("next").is_ok());
    }

    #[test]
    fn test_concurrent_acquire_admits_one() {
        for _ in 0..50 {
            let gate = Arc::new(SingleFlightGate::new());
            let barrier = Arc::new(Barrier::new(8));

            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let gate = Arc::clone(&gate);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        // Hold the token until every thread has tried
                        let token = gate.try_acquire(format!("job {i}")).ok();
                        barrier.wait();
                        token.is_some()
                    })
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().expect("thread"))
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }
}
