//! Indicator command implementation.
//!
//! Runs overlapping simulated operations under one shared indicator and
//! reports how often it was shown and for how long.

use crate::display::{millis, spinner, spread};
use anyhow::Result;
use busylight_lib::{Callbacks, Indicator, IndicatorSnapshot, LoadingConfig};
use futures::future::join_all;
use indicatif::ProgressBar;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

/// Visibility statistics gathered while following the indicator.
#[derive(Debug, Default)]
struct Visibility {
    shows: usize,
    max_pending: usize,
    visible_for: Duration,
}

/// Run `ops` overlapping operations against one indicator.
pub(crate) async fn run(
    mut config: LoadingConfig,
    ops: usize,
    min_display_ms: Option<u64>,
    spread_ms: u64,
    fail_every: Option<usize>,
    quiet: bool,
) -> Result<()> {
    if let Some(ms) = min_display_ms {
        config = config.with_min_display_time(Duration::from_millis(ms));
    }
    let indicator = Indicator::new(&config)?;
    let progress = spinner(quiet, config.poll_interval());
    let renderer = tokio::spawn(follow(indicator.subscribe(), progress.clone()));

    info!(ops, spread_ms, min_display = ?indicator.min_display_time(), "starting operations");
    let started = Instant::now();

    let operations = (0..ops).map(|index| {
        let indicator = indicator.clone();
        let offset = spread(index, ops, spread_ms / 2);
        let duration = spread(index + 1, ops, spread_ms);
        let fails = fail_every.is_some_and(|k| k > 0 && (index + 1) % k == 0);

        async move {
            sleep(offset).await;
            let text = format!("Operation {index}");
            let mut handler = Callbacks::new(
                |took: &Duration| info!(index, took = ?took, "operation finished"),
                |error: String| warn!(index, %error, "operation failed"),
            );

            indicator
                .with_loading(
                    Some(text.as_str()),
                    async move {
                        sleep(duration).await;
                        if fails {
                            Err(format!("simulated failure after {}", millis(duration)))
                        } else {
                            Ok(duration)
                        }
                    },
                    &mut handler,
                )
                .await
        }
    });

    let outcomes = join_all(operations).await;
    let wall = started.elapsed();
    let succeeded = outcomes.iter().filter(|outcome| outcome.is_some()).count();

    // Every reference is released; dropping the last handle ends the renderer.
    drop(indicator);
    let visibility = renderer.await?;
    progress.finish_and_clear();

    if !quiet {
        println!("Operations:        {ops}");
        println!("Succeeded:         {succeeded}");
        println!("Failed:            {}", ops - succeeded);
        println!("Times shown:       {}", visibility.shows);
        println!("Peak concurrency:  {}", visibility.max_pending);
        println!("Visible for:       {}", millis(visibility.visible_for));
        println!("Wall time:         {}", millis(wall));
    }

    Ok(())
}

/// Mirror indicator snapshots onto the spinner until the indicator is gone.
async fn follow(mut rx: watch::Receiver<IndicatorSnapshot>, progress: ProgressBar) -> Visibility {
    let mut stats = Visibility::default();
    let mut shown_at: Option<Instant> = None;

    progress.set_message("idle");
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        stats.max_pending = stats.max_pending.max(snapshot.pending);

        match (snapshot.visible, shown_at) {
            (true, None) => {
                stats.shows += 1;
                shown_at = Some(Instant::now());
            }
            (false, Some(at)) => {
                stats.visible_for += at.elapsed();
                shown_at = None;
            }
            _ => {}
        }

        if snapshot.visible {
            progress.set_message(format!("{} ({} pending)", snapshot.text, snapshot.pending));
        } else {
            progress.set_message("idle");
        }
    }

    if let Some(at) = shown_at {
        stats.visible_for += at.elapsed();
    }
    stats
}
