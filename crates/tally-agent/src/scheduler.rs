//! Per-task due times with bounded exponential backoff.
//!
//! Every periodic task owns one [`TaskState`]. The daemon loop is the only
//! reader and writer, so there is no synchronization here.

use std::{fmt, time::Duration};

use tokio::time::Instant;
use tracing::debug;

use crate::config::TaskSettings;

/// Consecutive failures retried at the plain retry interval.
pub const BACKOFF_THRESHOLD: u32 = 5;
/// Largest exponent of the backoff multiplier, i.e. at most 16x.
pub const MAX_BACKOFF_EXPONENT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    ConfigPoll,
    CodeBase,
    InvocationData,
    Upload,
}

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::ConfigPoll => "config-poll",
            TaskKind::CodeBase => "code-base",
            TaskKind::InvocationData => "invocation-data",
            TaskKind::Upload => "upload",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct TaskState {
    kind: TaskKind,
    interval: Duration,
    retry_interval: Duration,
    /// `None` means due on the next check.
    next_due: Option<Instant>,
    failures: u32,
    multiplier: u32,
}

impl TaskState {
    /// A new task is due immediately.
    pub fn new(kind: TaskKind, settings: &TaskSettings) -> Self {
        Self {
            kind,
            interval: settings.interval(),
            retry_interval: settings.retry_interval(),
            next_due: None,
            failures: 0,
            multiplier: 1,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_none_or(|due| now >= due)
    }

    /// After a success: clears the failure state and waits one interval.
    pub fn schedule_next(&mut self, now: Instant) {
        if self.failures > 0 {
            debug!(task = %self.kind, failures = self.failures, "task recovered");
        }
        self.failures = 0;
        self.multiplier = 1;
        self.next_due = Some(due_after(now, self.interval));
    }

    /// After a failure: waits the retry interval, doubled per failure beyond
    /// the threshold up to 16x. Returns the delay chosen.
    pub fn schedule_retry(&mut self, now: Instant) -> Duration {
        self.multiplier = if self.failures < BACKOFF_THRESHOLD {
            1
        } else {
            let exponent = (self.failures - BACKOFF_THRESHOLD + 1).min(MAX_BACKOFF_EXPONENT);
            1 << exponent
        };
        let delay = self.retry_interval.saturating_mul(self.multiplier);
        self.next_due = Some(due_after(now, delay));
        self.failures = self.failures.saturating_add(1);
        debug!(
            task = %self.kind,
            failures = self.failures,
            delay_ms = delay.as_millis() as u64,
            "task will retry"
        );
        delay
    }

    /// New cadence: failure state is cleared and the next run is one new
    /// interval from now, whatever the task was doing.
    pub fn update_intervals(&mut self, settings: &TaskSettings, now: Instant) {
        self.interval = settings.interval();
        self.retry_interval = settings.retry_interval();
        self.schedule_next(now);
    }

    /// Whether `settings` would change this task's cadence.
    pub fn differs_from(&self, settings: &TaskSettings) -> bool {
        self.interval != settings.interval() || self.retry_interval != settings.retry_interval()
    }

    pub fn schedule_now(&mut self) {
        self.next_due = None;
    }
}

/// `now + delay`, or the latest representable instant when that overflows.
fn due_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(Duration::from_secs(u64::from(u32::MAX))))
        .unwrap_or(now)
}
