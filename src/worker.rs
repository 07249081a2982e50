// Background sampling worker: one per check instance.
// Each tick moves the check into a blocking task, runs one cycle, and takes it back,
// so a cycle never starts before the previous one has finished.

use crate::check::IoCheck;
use crate::clock::Clock;
use crate::diskstats_repo::CounterSource;
use crate::sink::Aggregator;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio::time::{Duration, interval};
use tracing::Instrument;

/// Worker timing and logging config.
pub struct WorkerConfig {
    pub sample_interval_ms: u64,
    /// How often to log cycle stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Cycle counters, shared with the caller for stats logging and tests.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub cycles_ok: AtomicU64,
    pub cycles_failed: AtomicU64,
}

/// Values of one periodic stats line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub tracked_devices: usize,
    pub ws_clients: usize,
}

impl WorkerStats {
    pub fn snapshot(&self, tracked_devices: usize, ws_connections: &AtomicUsize) -> StatsSnapshot {
        StatsSnapshot {
            cycles_ok: self.cycles_ok.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            tracked_devices,
            ws_clients: ws_connections.load(Ordering::Relaxed),
        }
    }
}

/// Sink, counters and shutdown for the worker.
pub struct WorkerDeps {
    pub sinks: Arc<Aggregator>,
    pub stats: Arc<WorkerStats>,
    pub ws_connections: Arc<AtomicUsize>,
    pub shutdown_rx: watch::Receiver<bool>,
}

pub fn spawn<S, C>(
    mut check: IoCheck<S, C>,
    deps: WorkerDeps,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()>
where
    S: CounterSource + 'static,
    C: Clock + 'static,
{
    let WorkerDeps {
        sinks,
        stats,
        ws_connections,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        sample_interval_ms,
        stats_log_interval_secs,
    } = config;

    let worker_span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        check = %check.id(),
        sample_interval_ms
    );

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_millis(sample_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let sinks = sinks.clone();
                    let joined = tokio::task::spawn_blocking(move || {
                        let result = check.run(sinks.as_ref());
                        (check, result)
                    })
                    .await;
                    let result = match joined {
                        Ok((returned, result)) => {
                            check = returned;
                            result
                        }
                        Err(e) => {
                            tracing::error!(error = %e, operation = "run_cycle", "check task panicked; stopping worker");
                            break;
                        }
                    };
                    match result {
                        Ok(report) => {
                            stats.cycles_ok.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                devices = report.devices,
                                suppressed = report.suppressed,
                                derived = report.derived,
                                withheld = report.withheld,
                                "cycle complete"
                            );
                        }
                        Err(e) => {
                            stats.cycles_failed.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(error = %e, operation = "run_cycle", "cycle failed");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    let line = stats.snapshot(check.history().len(), &ws_connections);
                    tracing::info!(
                        cycles_ok = line.cycles_ok,
                        cycles_failed = line.cycles_failed,
                        tracked_devices = line.tracked_devices,
                        ws_clients = line.ws_clients,
                        "check stats"
                    );
                }
            }
        }
    }
    .instrument(worker_span))
}
