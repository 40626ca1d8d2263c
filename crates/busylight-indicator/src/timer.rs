//! Cancelable delayed actions.
//!
//! A [`DisplayTimer`] runs a callback once a duration has elapsed, unless it
//! is cancelled first. The callback runs on a Tokio task, so scheduling
//! requires a runtime, either the caller's or a [`Handle`] captured earlier.
//! Dropping the timer cancels it, which keeps a superseded timer from
//! outliving its owner or firing late.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// A delayed action that can be cancelled until it fires.
#[derive(Debug)]
pub struct DisplayTimer {
    /// Handle to the task driving the delay, or `None` once released.
    task: Option<AbortHandle>,
    /// When the action is due.
    deadline: Instant,
}

impl DisplayTimer {
    /// Schedules `action` to run after `delay` on the current Tokio runtime.
    ///
    /// Returns `None` when called outside a runtime.
    #[must_use = "dropping the timer cancels it"]
    pub fn schedule<F>(delay: Duration, action: F) -> Option<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = Handle::try_current().ok()?;
        Some(Self::schedule_on(&handle, delay, action))
    }

    /// Schedules `action` to run after `delay` on the runtime behind `handle`.
    ///
    /// Unlike [`schedule`](Self::schedule), this works from threads that are
    /// not inside a runtime context.
    #[must_use = "dropping the timer cancels it"]
    pub fn schedule_on<F>(handle: &Handle, delay: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        // Read the runtime's clock, which may be paused in tests.
        let _context = handle.enter();
        let deadline = Instant::now() + delay;

        let task = handle.spawn(async move {
            sleep_until(deadline).await;
            trace!("display timer fired");
            action();
        });

        trace!(delay_ms = delay.as_millis() as u64, "display timer scheduled");

        Self {
            task: Some(task.abort_handle()),
            deadline,
        }
    }

    /// Returns when the action is due.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns true if the action has run or the timer was cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(AbortHandle::is_finished)
    }

    /// Cancels the timer. The action will not run.
    pub fn cancel(mut self) {
        self.abort();
    }

    /// Forgets the timer without aborting its task.
    ///
    /// Used from inside the action itself, where the task is already
    /// completing and must not be cancelled.
    pub(crate) fn release(mut self) {
        self.task = None;
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                trace!("display timer cancelled");
            }
            task.abort();
        }
    }
}

impl Drop for DisplayTimer {
    fn drop(&mut self) {
        self.abort();
    }
}
