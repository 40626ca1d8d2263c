//! Registry command implementation.
//!
//! Starts overlapping work in several namespaces of one registry, waits for
//! every key to go idle and prints per-namespace counts.

use crate::display::{millis, spinner, spread};
use anyhow::{Context, Result};
use busylight_lib::{LoadingConfig, LoadingMap, LoadingRegistry};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Spread of simulated operation durations.
const OPERATION_SPREAD_MS: u64 = 800;

/// Run `ops_per_region` operations in each of `regions` namespaces.
pub(crate) async fn run(
    config: LoadingConfig,
    regions: usize,
    ops_per_region: usize,
    timeout_ms: Option<u64>,
    quiet: bool,
) -> Result<()> {
    let starts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&starts);
    let registry = LoadingRegistry::builder()
        .config(config)
        .observer(move |key: &str, loading: bool| {
            if loading {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            debug!(key, loading, "observed");
        })
        .build()?;

    let progress = spinner(quiet, registry.poll_interval());
    let renderer = tokio::spawn(follow(registry.subscribe(), progress.clone()));

    let names: Vec<String> = (0..regions).map(|r| format!("region{r}")).collect();
    let total = regions * ops_per_region;
    let mut keys = Vec::with_capacity(total);
    let mut tasks = JoinSet::new();

    // Mark every key before any task runs so the wait below cannot see an
    // idle registry that has not started yet.
    for (r, name) in names.iter().enumerate() {
        let namespace = registry.namespace(name);
        for op in 0..ops_per_region {
            let key = format!("op{op}");
            let index = r * ops_per_region + op;
            let guard = namespace.acquire(&key);
            keys.push(guard.key().to_string());

            let duration = spread(index, total, OPERATION_SPREAD_MS);
            tasks.spawn(async move {
                sleep(duration).await;
                drop(guard);
                r
            });
        }
    }
    info!(regions, ops_per_region, "operations started");

    let started = Instant::now();
    match timeout_ms {
        Some(ms) => registry
            .wait_for_all_timeout(keys, Duration::from_millis(ms))
            .await
            .context("Registry did not go idle")?,
        None => registry.wait_for_all(keys).await,
    }
    let waited = started.elapsed();

    let mut completed = vec![0usize; regions];
    while let Some(result) = tasks.join_next().await {
        completed[result?] += 1;
    }

    let still_loading: Vec<usize> = names
        .iter()
        .map(|name| registry.namespace(name).loading_count())
        .collect();
    drop(registry);
    let peak = renderer.await?;
    progress.finish_and_clear();

    if !quiet {
        println!("{:<12} {:>10} {:>10}", "Namespace", "Completed", "Loading");
        for ((name, done), loading) in names.iter().zip(&completed).zip(&still_loading) {
            println!("{name:<12} {done:>10} {loading:>10}");
        }
        println!();
        println!("Flags raised:      {}", starts.load(Ordering::Relaxed));
        println!("Peak loading:      {peak}");
        println!("Waited:            {}", millis(waited));
    }

    Ok(())
}

/// Mirror registry updates onto the spinner, returning the peak loading count.
async fn follow(mut rx: watch::Receiver<LoadingMap>, progress: ProgressBar) -> usize {
    let mut peak = rx.borrow().loading_count();

    while rx.changed().await.is_ok() {
        let keys = rx.borrow_and_update().loading_keys();
        peak = peak.max(keys.len());

        if keys.is_empty() {
            progress.set_message("idle");
        } else {
            progress.set_message(format!("{} loading: {}", keys.len(), keys.join(", ")));
        }
    }
    peak
}
