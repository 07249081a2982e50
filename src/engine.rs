// Delta/rate engine: iostat-style metrics from two cumulative counter snapshots.
// Formulas follow sysstat's iostat (interval in 1/100 s for tput/util/svctm).

use crate::models::DeviceCounterSnapshot;
use std::fmt;

/// Bytes per kilobyte for `*kb_s` and `avg_q_sz`.
pub const KB: f64 = 1024.0;

/// Conventional disk sector size, used for `avg_rq_sz`.
pub const SECTOR_SIZE: u64 = 512;

pub const READS_PER_SEC: &str = "system.io.r_s";
pub const WRITES_PER_SEC: &str = "system.io.w_s";
pub const MERGED_READS_PER_SEC: &str = "system.io.rrqm_s";
pub const MERGED_WRITES_PER_SEC: &str = "system.io.wrqm_s";

pub const READ_KB_PER_SEC: &str = "system.io.rkb_s";
pub const WRITE_KB_PER_SEC: &str = "system.io.wkb_s";
pub const AVG_REQUEST_SIZE: &str = "system.io.avg_rq_sz";
pub const AWAIT: &str = "system.io.await";
pub const READ_AWAIT: &str = "system.io.r_await";
pub const WRITE_AWAIT: &str = "system.io.w_await";
pub const AVG_QUEUE_SIZE: &str = "system.io.avg_q_sz";
pub const SERVICE_TIME: &str = "system.io.svctm";
pub const UTILIZATION: &str = "system.io.util";

/// Round to 2 decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Raw cumulative counters, forwarded to the sink as rates. Available from the current sample alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCounters {
    pub reads: u64,
    pub writes: u64,
    pub merged_reads: u64,
    pub merged_writes: u64,
}

impl RateCounters {
    pub fn from_snapshot(s: &DeviceCounterSnapshot) -> Self {
        Self {
            reads: s.read_count,
            writes: s.write_count,
            merged_reads: s.merged_read_count,
            merged_writes: s.merged_write_count,
        }
    }

    /// `(metric name, raw counter)` pairs in emission order.
    pub fn entries(&self) -> [(&'static str, f64); 4] {
        [
            (READS_PER_SEC, self.reads as f64),
            (WRITES_PER_SEC, self.writes as f64),
            (MERGED_READS_PER_SEC, self.merged_reads as f64),
            (MERGED_WRITES_PER_SEC, self.merged_writes as f64),
        ]
    }
}

/// Metrics that need a baseline and a positive interval. Values are already rounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    pub read_kb_per_sec: f64,
    pub write_kb_per_sec: f64,
    pub avg_request_size_sectors: f64,
    pub await_ms: f64,
    pub read_await_ms: f64,
    pub write_await_ms: f64,
    pub avg_queue_size: f64,
    pub service_time_ms: f64,
    pub utilization_percent: f64,
}

impl DerivedMetrics {
    /// `(metric name, gauge value)` pairs in emission order.
    pub fn entries(&self) -> [(&'static str, f64); 9] {
        [
            (READ_KB_PER_SEC, self.read_kb_per_sec),
            (WRITE_KB_PER_SEC, self.write_kb_per_sec),
            (AVG_REQUEST_SIZE, self.avg_request_size_sectors),
            (AWAIT, self.await_ms),
            (READ_AWAIT, self.read_await_ms),
            (WRITE_AWAIT, self.write_await_ms),
            (AVG_QUEUE_SIZE, self.avg_queue_size),
            (SERVICE_TIME, self.service_time_ms),
            (UTILIZATION, self.utilization_percent),
        ]
    }
}

/// Why derived metrics were withheld for a device this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No previous sample exists for the check at all.
    ColdStart,
    /// Device absent from the previous sample (new or hot-plugged).
    NewDevice,
    /// Samples share a timestamp, or the clock went backwards.
    NonPositiveElapsed,
    /// A counter went down since the previous sample (device reset or replaced).
    CounterRegression,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::ColdStart => "no previous sample",
            SkipReason::NewDevice => "new device (possible hotplug)",
            SkipReason::NonPositiveElapsed => "no elapsed time",
            SkipReason::CounterRegression => "counter regression",
        };
        f.write_str(s)
    }
}

/// One device's output for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMetrics {
    pub tags: Vec<String>,
    pub rates: RateCounters,
    pub derived: Result<DerivedMetrics, SkipReason>,
}

/// Counter deltas between two snapshots of the same device.
#[derive(Debug, Clone, Copy)]
struct Deltas {
    read_count: u64,
    write_count: u64,
    read_bytes: u64,
    write_bytes: u64,
    read_time_ms: u64,
    write_time_ms: u64,
    io_time_ms: u64,
    weighted_io_time_ms: u64,
}

impl Deltas {
    /// `None` if any counter went backwards.
    fn between(cur: &DeviceCounterSnapshot, prev: &DeviceCounterSnapshot) -> Option<Self> {
        Some(Self {
            read_count: cur.read_count.checked_sub(prev.read_count)?,
            write_count: cur.write_count.checked_sub(prev.write_count)?,
            read_bytes: cur.read_bytes.checked_sub(prev.read_bytes)?,
            write_bytes: cur.write_bytes.checked_sub(prev.write_bytes)?,
            read_time_ms: cur.read_time_ms.checked_sub(prev.read_time_ms)?,
            write_time_ms: cur.write_time_ms.checked_sub(prev.write_time_ms)?,
            io_time_ms: cur.io_time_ms.checked_sub(prev.io_time_ms)?,
            weighted_io_time_ms: cur
                .weighted_io_time_ms
                .checked_sub(prev.weighted_io_time_ms)?,
        })
    }
}

/// Computes one device's metrics. Pure; total over all inputs.
///
/// Rate counters are always returned. Derived metrics are withheld on the
/// first cycle, for devices without a previous sample, when `elapsed_ms <= 0`,
/// and when a counter regressed.
pub fn compute_device_metrics(
    current: &DeviceCounterSnapshot,
    previous: Option<&DeviceCounterSnapshot>,
    elapsed_ms: i64,
    is_first_cycle_ever: bool,
) -> DeviceMetrics {
    DeviceMetrics {
        tags: current.tags(),
        rates: RateCounters::from_snapshot(current),
        derived: derive(current, previous, elapsed_ms, is_first_cycle_ever),
    }
}

fn derive(
    current: &DeviceCounterSnapshot,
    previous: Option<&DeviceCounterSnapshot>,
    elapsed_ms: i64,
    is_first_cycle_ever: bool,
) -> Result<DerivedMetrics, SkipReason> {
    if is_first_cycle_ever {
        return Err(SkipReason::ColdStart);
    }
    let previous = previous.ok_or(SkipReason::NewDevice)?;
    if elapsed_ms <= 0 {
        return Err(SkipReason::NonPositiveElapsed);
    }
    let d = Deltas::between(current, previous).ok_or(SkipReason::CounterRegression)?;

    let elapsed = elapsed_ms as f64;
    let elapsed_sec = elapsed / 1000.0;

    let rkbs = d.read_bytes as f64 / KB / elapsed_sec;
    let wkbs = d.write_bytes as f64 / KB / elapsed_sec;
    let avg_qu_sz = d.weighted_io_time_ms as f64 / KB / elapsed_sec;

    let diff_r = d.read_count as f64;
    let diff_w = d.write_count as f64;
    let r_await = if d.read_count != 0 {
        d.read_time_ms as f64 / diff_r
    } else {
        0.0
    };
    let w_await = if d.write_count != 0 {
        d.write_time_ms as f64 / diff_w
    } else {
        0.0
    };

    let diff_total = diff_r + diff_w;
    let (avg_rq_sz, await_ms) = if diff_total != 0.0 {
        let sectors = d.read_bytes.saturating_add(d.write_bytes) / SECTOR_SIZE;
        let time = d.read_time_ms.saturating_add(d.write_time_ms);
        (sectors as f64 / diff_total, time as f64 / diff_total)
    } else {
        (0.0, 0.0)
    };

    // interval in hundredths of a second
    let itv = elapsed / 10.0;
    let tput = diff_total * 100.0 / itv;
    let util = d.io_time_ms as f64 / itv * 100.0;
    let svctm = if tput != 0.0 { util / tput } else { 0.0 };

    Ok(DerivedMetrics {
        read_kb_per_sec: round2(rkbs),
        write_kb_per_sec: round2(wkbs),
        avg_request_size_sectors: round2(avg_rq_sz),
        await_ms: round2(await_ms),
        read_await_ms: round2(r_await),
        write_await_ms: round2(w_await),
        avg_queue_size: round2(avg_qu_sz),
        service_time_ms: round2(svctm),
        // single device, no group: util / 10 / devices_in_group would apply otherwise
        utilization_percent: round2(util / 10.0),
    })
}
