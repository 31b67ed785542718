//! Job handles: completion of one pump run, observable from any thread.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::base::PumpStats;
use super::error::PumpError;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Unique id of a pump run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Outcome of a pump run: its statistics, or the error that faulted it.
pub type JobOutcome = Result<PumpStats, PumpError>;

type Watcher = Box<dyn FnOnce() + Send>;

struct JobInner {
    id: JobId,
    name: String,
    outcome: Mutex<Option<JobOutcome>>,
    finished: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
    watchers: Mutex<Vec<Watcher>>,
}

/// Handle to a running (or finished) pump.
///
/// Cloning gives another handle to the same job. Waiting works the same
/// whether the pump runs on a dedicated thread or as a runtime task.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

impl JobHandle {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: JobId::next(),
                name: name.into(),
                outcome: Mutex::new(None),
                finished: Condvar::new(),
                thread: Mutex::new(None),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the pump has exited.
    pub fn is_finished(&self) -> bool {
        self.lock_outcome().is_some()
    }

    /// The outcome, if the pump has exited.
    pub fn outcome(&self) -> Option<JobOutcome> {
        self.lock_outcome().clone()
    }

    /// Block until the pump exits.
    ///
    /// Must not be called from a runtime thread the pump itself needs.
    pub fn wait(&self) -> JobOutcome {
        let mut outcome = self.lock_outcome();
        loop {
            if let Some(result) = outcome.as_ref() {
                let result = result.clone();
                drop(outcome);
                self.join_thread();
                return result;
            }
            outcome = self
                .inner
                .finished
                .wait(outcome)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Block until the pump exits or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.lock_outcome();
        loop {
            if let Some(result) = outcome.as_ref() {
                let result = result.clone();
                drop(outcome);
                self.join_thread();
                return Some(result);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            outcome = self
                .inner
                .finished
                .wait_timeout(outcome, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    /// Run `watcher` once the pump has exited, on the thread that records
    /// the outcome. Runs it right away if the job already finished.
    ///
    /// The watcher must not block: it runs on the pump's worker.
    pub fn on_finish(&self, watcher: impl FnOnce() + Send + 'static) {
        {
            let outcome = self.lock_outcome();
            if outcome.is_none() {
                self.lock_watchers().push(Box::new(watcher));
                return;
            }
        }
        watcher();
    }

    pub(crate) fn attach_thread(&self, handle: JoinHandle<()>) {
        *self.inner.thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// A guard that records the outcome; dropping it unfinished faults the job.
    pub(crate) fn completion(&self) -> JobCompletion {
        JobCompletion {
            job: self.clone(),
            completed: false,
        }
    }

    fn finish(&self, result: JobOutcome) {
        let mut outcome = self.lock_outcome();
        if outcome.is_none() {
            *outcome = Some(result);
        }
        drop(outcome);
        self.inner.finished.notify_all();

        let watchers = std::mem::take(&mut *self.lock_watchers());
        for watcher in watchers {
            watcher();
        }
    }

    fn join_thread(&self) {
        let handle = self
            .inner
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            // Never join ourselves
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    fn lock_outcome(&self) -> std::sync::MutexGuard<'_, Option<JobOutcome>> {
        self.inner.outcome.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_watchers(&self) -> std::sync::MutexGuard<'_, Vec<Watcher>> {
        self.inner.watchers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PartialEq for JobHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for JobHandle {}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Records a job's outcome exactly once.
pub(crate) struct JobCompletion {
    job: JobHandle,
    completed: bool,
}

impl JobCompletion {
    pub(crate) fn complete(mut self, outcome: JobOutcome) {
        self.completed = true;
        self.job.finish(outcome);
    }
}

impl Drop for JobCompletion {
    fn drop(&mut self) {
        if !self.completed {
            let reason = if std::thread::panicking() {
                "worker panicked"
            } else {
                "worker cancelled"
            };
            self.job.finish(Err(PumpError::Aborted(reason.to_string())));
        }
    }
}
