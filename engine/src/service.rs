//! Job service.
//!
//! Ties the gate, the throttle, the notification bus and the job operations
//! together. This is what a transport layer (web socket hub, CLI, ...) calls:
//!
//! 1. take the gate or reject with `EngineError::Busy`
//! 2. announce busy + command text
//! 3. run the operation, publishing throttled progress and log lines
//! 4. on every exit path: refresh hint, release the gate, announce not busy

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::bus::{Notification, NotificationBus};
use crate::error::EngineError;
use crate::fs_ops;
use crate::gate::{GateToken, SingleFlightGate};
use crate::job::JobRequest;
use crate::model::{DirectoryEntry, JobState};
use crate::progress::{JobReporter, ProgressThrottle};

#[derive(Debug, Clone)]
pub struct JobService {
    gate: Arc<SingleFlightGate>,
    bus: Arc<NotificationBus>,
    throttle_interval: Duration,
}

impl JobService {
    pub fn new() -> Self {
        Self::with_parts(Arc::new(SingleFlightGate::new()), Arc::new(NotificationBus::new()))
    }

    pub fn with_parts(gate: Arc<SingleFlightGate>, bus: Arc<NotificationBus>) -> Self {
        JobService {
            gate,
            bus,
            throttle_interval: ProgressThrottle::DEFAULT_INTERVAL,
        }
    }

    /// Change the minimum spacing of intermediate progress notifications.
    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    pub fn gate(&self) -> &Arc<SingleFlightGate> {
        &self.gate
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    pub fn state(&self) -> JobState {
        self.gate.snapshot()
    }

    /// Subscribe a new observer.
    ///
    /// Returns the subscription and the messages the observer needs to catch
    /// up: busy flag, command text and last progress, in that order.
    pub fn connect(&self) -> (Receiver<Notification>, Vec<Notification>) {
        let rx = self.bus.subscribe();
        let state = self.gate.snapshot();
        let resync = vec![
            Notification::Busy { busy: state.busy },
            Notification::Command {
                command: state.command,
            },
            Notification::percentage(state.last_progress.percent, &state.last_progress.target_path),
        ];
        (rx, resync)
    }

    /// Tell every observer to clear its log.
    pub fn clear_log(&self) {
        self.bus.emit(Notification::message(""));
    }

    /// List a folder. Not gated: listings are read-only and observers need
    /// them while a job runs. Problems go to the bus as log lines.
    pub fn list_contents(&self, folder: &Path) -> Vec<DirectoryEntry> {
        fs_ops::list_contents(folder, &|message| {
            tracing::info!("{message}");
            self.bus.emit(Notification::message(message));
        })
    }

    /// Run a job on the calling thread.
    ///
    /// # Errors
    /// `EngineError::Busy` if another job holds the gate. Failures of the job
    /// itself are reported as `Ok(false)` plus log lines.
    pub fn run(&self, request: JobRequest) -> Result<bool, EngineError> {
        let token = self.begin(&request)?;
        Ok(execute_held(token, &self.bus, &request, self.throttle_interval))
    }

    /// Run a job on a dedicated worker thread.
    ///
    /// The gate is taken before this returns, so a busy server is reported
    /// immediately rather than from the worker.
    pub fn submit(&self, request: JobRequest) -> Result<JoinHandle<bool>, EngineError> {
        let token = self.begin(&request)?;
        let bus = Arc::clone(&self.bus);
        let interval = self.throttle_interval;

        // If spawning fails the closure, and with it the token, is dropped
        thread::Builder::new()
            .name("filemover-job".to_string())
            .spawn(move || execute_held(token, &bus, &request, interval))
            .map_err(|e| EngineError::Io {
                path: PathBuf::new(),
                source: e,
            })
    }

    fn begin(&self, request: &JobRequest) -> Result<GateToken, EngineError> {
        let command = request.describe();
        let token = self.gate.try_acquire(command.clone()).map_err(|e| {
            tracing::info!(requested = %command, error = %e, "job rejected");
            e
        })?;

        self.bus.emit(Notification::Busy { busy: true });
        self.bus.emit(Notification::Command { command });
        Ok(token)
    }
}

impl Default for JobService {
    fn default() -> Self {
        Self::new()
    }
}

fn execute_held(token: GateToken, bus: &NotificationBus, request: &JobRequest, interval: Duration) -> bool {
    let target = request.target_folder();
    let span = tracing::info_span!("job", id = %token.job_id(), command = %request.describe());
    let _entered = span.enter();

    let held = scopeguard::guard(token, |token| {
        bus.emit(Notification::refresh(&target));
        drop(token);
        bus.emit(Notification::Busy { busy: false });
    });

    let reporter = BusReporter {
        bus,
        token: &*held,
        target: &target,
        throttle: Mutex::new(ProgressThrottle::with_interval(interval)),
    };

    tracing::info!("job started");
    let ok = request.execute(&reporter);
    tracing::info!(ok, "job finished");
    ok
}

/// Publishes a job's output on the bus and records progress in the gate.
struct BusReporter<'a> {
    bus: &'a NotificationBus,
    token: &'a GateToken,
    target: &'a Path,
    throttle: Mutex<ProgressThrottle>,
}

impl JobReporter for BusReporter<'_> {
    fn report(&self, percent: i32) {
        let emit = self
            .throttle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .should_emit(percent);
        if emit {
            self.token.set_progress(percent, self.target);
            self.bus.emit(Notification::percentage(percent, self.target));
        }
    }

    fn log(&self, message: &str) {
        tracing::info!("{message}");
        self.bus.emit(Notification::message(message));
    }
}
