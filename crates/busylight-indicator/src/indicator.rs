//! Reference-counted busy indicator with a minimum display time.
//!
//! Many callers share one [`Indicator`]. Each [`Indicator::show`] must be
//! matched by one [`Indicator::hide`]; the indicator is visible while any
//! call is outstanding. Once the last caller hides, the indicator stays
//! visible until the minimum display time has elapsed since it appeared, so
//! a fast operation never produces a sub-perceptible flash.

use crate::DisplayTimer;
use busylight_types::{ConfigError, LoadingConfig};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace, warn};

/// Point-in-time view of an indicator, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSnapshot {
    /// Whether the indicator is currently shown.
    pub visible: bool,
    /// Number of outstanding `show` calls.
    pub pending: usize,
    /// Current label.
    pub text: String,
}

#[derive(Debug)]
struct IndicatorState {
    pending: usize,
    visible: bool,
    text: String,
    /// Set on the 0 -> 1 edge of `pending`, cleared when hidden.
    shown_at: Option<Instant>,
    /// Outstanding deferred hide, present only while `pending == 0 && visible`.
    hide_timer: Option<DisplayTimer>,
    /// Bumped whenever a deferred hide is superseded; a timer carrying an
    /// older epoch is stale.
    epoch: u64,
    /// Runtime that deferred hides are scheduled on when `hide` is called
    /// from a thread outside any runtime.
    runtime: Option<Handle>,
}

impl IndicatorState {
    fn snapshot(&self) -> IndicatorSnapshot {
        IndicatorSnapshot {
            visible: self.visible,
            pending: self.pending,
            text: self.text.clone(),
        }
    }

    fn cancel_hide_timer(&mut self) {
        if let Some(timer) = self.hide_timer.take() {
            timer.cancel();
        }
    }

    fn hide_now(&mut self) {
        self.cancel_hide_timer();
        self.shown_at = None;
        if self.visible {
            self.visible = false;
            debug!("indicator hidden");
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<IndicatorState>,
    min_display: Duration,
    default_text: String,
    snapshots: watch::Sender<IndicatorSnapshot>,
}

/// Shared, reference-counted busy indicator.
///
/// Cloning is cheap; clones observe and drive the same indicator.
///
/// # Example
///
/// ```
/// use busylight_indicator::Indicator;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let indicator = Indicator::default();
/// indicator.show(Some("Saving"));
/// assert!(indicator.is_visible());
/// indicator.hide();
/// // Still visible: the minimum display time has not elapsed.
/// assert!(indicator.is_visible());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Indicator {
    shared: Arc<Shared>,
}

impl Indicator {
    /// Creates an indicator from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: &LoadingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config.min_display_time(), config.default_text.clone()))
    }

    fn build(min_display: Duration, default_text: String) -> Self {
        let state = IndicatorState {
            pending: 0,
            visible: false,
            text: default_text.clone(),
            shown_at: None,
            hide_timer: None,
            epoch: 0,
            runtime: Handle::try_current().ok(),
        };
        let (snapshots, _) = watch::channel(state.snapshot());

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                min_display,
                default_text,
                snapshots,
            }),
        }
    }

    /// Returns the minimum display time.
    #[must_use]
    pub fn min_display_time(&self) -> Duration {
        self.shared.min_display
    }

    /// Registers one outstanding operation and shows the indicator.
    ///
    /// The label is always replaced by `text` (or the default label when
    /// `None`), so the most recent caller's text wins. On the first
    /// outstanding call the indicator appears, the display clock restarts and
    /// any deferred hide from a previous cycle is cancelled.
    pub fn show(&self, text: Option<&str>) {
        let mut state = self.lock();

        state.pending += 1;
        state.text = text.map_or_else(|| self.shared.default_text.clone(), str::to_owned);

        if state.pending == 1 {
            state.cancel_hide_timer();
            state.epoch = state.epoch.wrapping_add(1);
            state.shown_at = Some(Instant::now());
            if let Ok(handle) = Handle::try_current() {
                state.runtime = Some(handle);
            }
            if !state.visible {
                debug!(text = %state.text, "indicator shown");
            }
            state.visible = true;
        }

        self.publish(&state);
    }

    /// Releases one outstanding operation.
    ///
    /// When the last operation is released the indicator hides, immediately
    /// if it has been visible for the minimum display time, otherwise once
    /// that time is up. Calling `hide` with nothing outstanding is ignored.
    ///
    /// The deferred hide runs on the caller's runtime, or else on the last
    /// runtime the indicator was built or shown on, so `hide` may be called
    /// from plain threads. With no runtime at all it hides immediately.
    pub fn hide(&self) {
        let mut state = self.lock();

        if state.pending == 0 {
            warn!("hide called without a matching show; ignoring");
            return;
        }

        state.pending -= 1;
        if state.pending > 0 {
            self.publish(&state);
            return;
        }

        let runtime = Handle::try_current()
            .ok()
            .or_else(|| state.runtime.clone());
        let _context = runtime.as_ref().map(Handle::enter);

        let elapsed = state
            .shown_at
            .map_or(self.shared.min_display, |shown_at| shown_at.elapsed());
        let remaining = self
            .shared
            .min_display
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero());

        match remaining {
            None => state.hide_now(),
            Some(remaining) => {
                if let Some(handle) = &runtime {
                    let shared = Arc::downgrade(&self.shared);
                    let epoch = state.epoch;
                    let timer = DisplayTimer::schedule_on(handle, remaining, move || {
                        finish_deferred_hide(&shared, epoch);
                    });
                    trace!(remaining_ms = remaining.as_millis() as u64, "hide deferred");
                    state.hide_timer = Some(timer);
                } else {
                    warn!("no Tokio runtime to defer hide; hiding immediately");
                    state.hide_now();
                }
            }
        }

        self.publish(&state);
    }

    /// Hides the indicator unconditionally.
    ///
    /// Cancels any deferred hide, drops every outstanding count and skips the
    /// minimum display time. Meant for top-level failure recovery.
    pub fn force_hide(&self) {
        let mut state = self.lock();

        if state.pending > 0 {
            debug!(pending = state.pending, "force hiding indicator");
        }
        state.pending = 0;
        state.epoch = state.epoch.wrapping_add(1);
        state.hide_now();

        self.publish(&state);
    }

    /// Waits until the indicator has been visible for the minimum display time.
    ///
    /// Resolves immediately when the indicator is not shown.
    pub async fn await_min_display(&self) {
        let deadline = self
            .lock()
            .shown_at
            .map(|shown_at| shown_at + self.shared.min_display);

        if let Some(deadline) = deadline {
            sleep_until(deadline).await;
        }
    }

    /// Shows the indicator and returns a guard that hides it when dropped.
    pub fn acquire(&self, text: Option<&str>) -> IndicatorGuard {
        self.show(text);
        IndicatorGuard {
            indicator: self.clone(),
        }
    }

    /// Returns true if the indicator is shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// Returns the number of outstanding `show` calls.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().pending
    }

    /// Returns the current label.
    #[must_use]
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Returns true if a deferred hide is scheduled.
    #[must_use]
    pub fn has_pending_hide(&self) -> bool {
        self.lock().hide_timer.is_some()
    }

    /// Returns the current state.
    #[must_use]
    pub fn snapshot(&self) -> IndicatorSnapshot {
        self.lock().snapshot()
    }

    /// Subscribes to state changes.
    ///
    /// The receiver holds the latest snapshot and is notified whenever the
    /// visibility, count or label changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<IndicatorSnapshot> {
        self.shared.snapshots.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, IndicatorState> {
        self.shared.lock()
    }

    fn publish(&self, state: &IndicatorState) {
        self.shared.publish(state);
    }
}

impl Default for Indicator {
    fn default() -> Self {
        let config = LoadingConfig::default();
        Self::build(config.min_display_time(), config.default_text)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, IndicatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &IndicatorState) {
        let next = state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

/// Runs when a deferred hide comes due.
fn finish_deferred_hide(shared: &Weak<Shared>, epoch: u64) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut state = shared.lock();

    if state.epoch != epoch || state.pending > 0 {
        trace!("stale deferred hide ignored");
        return;
    }

    if let Some(timer) = state.hide_timer.take() {
        timer.release();
    }
    state.hide_now();
    shared.publish(&state);
}

/// Keeps one `show` outstanding on an [`Indicator`] until dropped.
#[derive(Debug)]
#[must_use = "the indicator hides as soon as the guard is dropped"]
pub struct IndicatorGuard {
    indicator: Indicator,
}

impl IndicatorGuard {
    /// Returns the indicator this guard holds open.
    #[must_use]
    pub const fn indicator(&self) -> &Indicator {
        &self.indicator
    }
}

impl Drop for IndicatorGuard {
    fn drop(&mut self) {
        self.indicator.hide();
    }
}
