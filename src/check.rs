// IO check: one sampling cycle = fetch counters, filter, derive, emit, re-baseline, commit.

use crate::blacklist::Blacklist;
use crate::clock::{Clock, SystemClock};
use crate::diskstats_repo::{CounterSource, SourceError};
use crate::engine::{SkipReason, compute_device_metrics};
use crate::history::HistoryStore;
use crate::sink::{SinkError, SinkProvider};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("could not retrieve io stats: {0}")]
    Source(#[from] SourceError),

    #[error("could not get metrics sender: {0}")]
    Sink(#[from] SinkError),
}

/// What happened to the devices of one successful cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Devices returned by the counter source.
    pub devices: usize,
    /// Devices dropped by the blacklist (nothing emitted).
    pub suppressed: usize,
    /// Devices with rate counters and derived gauges.
    pub derived: usize,
    /// Devices with rate counters only.
    pub withheld: usize,
}

/// One check instance. Owns its history; `run` takes `&mut self`, so cycles never overlap.
pub struct IoCheck<S, C = SystemClock> {
    id: String,
    source: S,
    clock: C,
    blacklist: Blacklist,
    history: HistoryStore,
}

impl<S: CounterSource> IoCheck<S> {
    pub fn new(id: impl Into<String>, source: S, blacklist: Blacklist) -> Self {
        Self::with_clock(id, source, blacklist, SystemClock)
    }
}

impl<S: CounterSource, C: Clock> IoCheck<S, C> {
    pub fn with_clock(id: impl Into<String>, source: S, blacklist: Blacklist, clock: C) -> Self {
        Self {
            id: id.into(),
            source,
            clock,
            blacklist,
            history: HistoryStore::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Runs one cycle and commits the sink.
    ///
    /// On a sink or counter-source failure nothing is emitted, nothing is
    /// committed and the history is left as it was.
    #[instrument(skip_all, fields(check = %self.id))]
    pub fn run<P: SinkProvider + ?Sized>(&mut self, sinks: &P) -> Result<CycleReport, CheckError> {
        let sink = sinks.sink(&self.id)?;
        let now_ms = self.clock.now_ms();

        let counters = match self.source.io_counters() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, operation = "io_counters", "could not retrieve io stats");
                return Err(e.into());
            }
        };

        let is_first_cycle = self.history.is_cold();
        let elapsed_ms = self
            .history
            .previous_timestamp_ms()
            .map_or(0, |prev| now_ms.saturating_sub(prev));

        let mut report = CycleReport::default();
        for (name, snapshot) in &counters {
            report.devices += 1;
            if self.blacklist.is_blacklisted(name) {
                report.suppressed += 1;
                continue;
            }

            let metrics =
                compute_device_metrics(snapshot, self.history.get(name), elapsed_ms, is_first_cycle);
            for (metric, value) in metrics.rates.entries() {
                sink.rate(metric, value, &metrics.tags);
            }
            match metrics.derived {
                Ok(derived) => {
                    for (metric, value) in derived.entries() {
                        sink.gauge(metric, value, &metrics.tags);
                    }
                    report.derived += 1;
                }
                Err(SkipReason::CounterRegression) => {
                    tracing::warn!(
                        device = %name,
                        "counters went backwards (device reset?) - re-baselining, full stats unavailable this iteration"
                    );
                    report.withheld += 1;
                }
                Err(reason) => {
                    tracing::debug!(device = %name, %reason, elapsed_ms, "full stats unavailable this iteration");
                    report.withheld += 1;
                }
            }
        }

        self.history.replace_all(counters, now_ms);
        sink.commit();
        Ok(report)
    }
}
