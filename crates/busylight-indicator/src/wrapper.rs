//! Running asynchronous operations under an indicator.
//!
//! [`Indicator::with_loading`] keeps the indicator up for the later of the
//! operation finishing and the minimum display time elapsing, then hands the
//! outcome to an [`OutcomeHandler`]. Failures are absorbed: the handler sees
//! the error and the caller gets `None`.
//!
//! The wrapper holds exactly one reference on the indicator and releases
//! exactly that one, so it composes with other callers using `show`/`hide`
//! on the same indicator. It never forces the count to zero.

use crate::Indicator;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use tracing::debug;

/// Receives the outcome of an operation run by [`Indicator::with_loading`].
///
/// Both methods default to doing nothing, so `()` is a valid handler.
/// Handlers run while the indicator is still shown.
#[async_trait]
pub trait OutcomeHandler<T, E>: Send
where
    T: Sync,
    E: Send + 'static,
{
    /// Called with the operation's value.
    async fn on_success(&mut self, value: &T) {
        let _ = value;
    }

    /// Called with the operation's error.
    async fn on_error(&mut self, error: E) {
        drop(error);
    }
}

#[async_trait]
impl<T, E> OutcomeHandler<T, E> for ()
where
    T: Sync,
    E: Send + 'static,
{
}

/// An [`OutcomeHandler`] built from a pair of closures.
///
/// ```
/// use busylight_indicator::{Callbacks, Indicator};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let indicator = Indicator::default();
/// let mut rows = Vec::new();
/// let mut handler = Callbacks::new(
///     |value: &Vec<u32>| rows.extend_from_slice(value),
///     |error: std::io::Error| eprintln!("load failed: {error}"),
/// );
///
/// let result = indicator
///     .with_loading(Some("Loading rows"), async { Ok(vec![1, 2, 3]) }, &mut handler)
///     .await;
/// drop(handler);
///
/// assert_eq!(result, Some(vec![1, 2, 3]));
/// assert_eq!(rows, vec![1, 2, 3]);
/// # }
/// ```
pub struct Callbacks<S, F> {
    on_success: S,
    on_error: F,
}

impl<S, F> Callbacks<S, F> {
    /// Creates a handler from a success closure and an error closure.
    pub const fn new(on_success: S, on_error: F) -> Self {
        Self {
            on_success,
            on_error,
        }
    }
}

impl<S, F> fmt::Debug for Callbacks<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, E, S, F> OutcomeHandler<T, E> for Callbacks<S, F>
where
    T: Sync,
    E: Send + 'static,
    S: FnMut(&T) + Send,
    F: FnMut(E) + Send,
{
    async fn on_success(&mut self, value: &T) {
        (self.on_success)(value);
    }

    async fn on_error(&mut self, error: E) {
        (self.on_error)(error);
    }
}

impl Indicator {
    /// Runs `operation` with the indicator shown, absorbing failures.
    ///
    /// Shows the indicator with `text`, then waits for both the operation and
    /// the minimum display time. On success the handler's `on_success` runs
    /// and the value is returned; on failure `on_error` receives the error and
    /// `None` is returned. The indicator reference taken here is released on
    /// every exit path, including when the returned future is dropped.
    pub async fn with_loading<T, E, Fut, H>(
        &self,
        text: Option<&str>,
        operation: Fut,
        handler: &mut H,
    ) -> Option<T>
    where
        Fut: Future<Output = Result<T, E>>,
        H: OutcomeHandler<T, E> + ?Sized,
        T: Sync,
        E: Send + 'static,
    {
        let _guard = self.acquire(text);
        let (result, ()) = tokio::join!(operation, self.await_min_display());

        match result {
            Ok(value) => {
                handler.on_success(&value).await;
                Some(value)
            }
            Err(error) => {
                debug!("operation under indicator failed");
                handler.on_error(error).await;
                None
            }
        }
    }

    /// Runs `operation` with the indicator shown, returning its result.
    ///
    /// Same gating as [`with_loading`](Self::with_loading), but the outcome
    /// is returned to the caller instead of being dispatched to a handler.
    ///
    /// # Errors
    ///
    /// Returns the operation's error once the minimum display time is over.
    pub async fn with_loading_result<T, E, Fut>(
        &self,
        text: Option<&str>,
        operation: Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let _guard = self.acquire(text);
        let (result, ()) = tokio::join!(operation, self.await_min_display());
        result
    }
}
