// Shared test helpers: scripted counter source, manual clock, recording sink
#![allow(dead_code)]

use iostats::clock::Clock;
use iostats::diskstats_repo::{CounterSource, SourceError};
use iostats::models::{DeviceCounterSnapshot, MetricKind};
use iostats::sink::{MetricsSink, SinkError, SinkProvider};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

pub type Frame = HashMap<String, DeviceCounterSnapshot>;

#[allow(clippy::too_many_arguments)]
pub fn device(
    name: &str,
    read_count: u64,
    write_count: u64,
    read_bytes: u64,
    write_bytes: u64,
    read_time_ms: u64,
    write_time_ms: u64,
    io_time_ms: u64,
) -> DeviceCounterSnapshot {
    DeviceCounterSnapshot {
        read_count,
        write_count,
        read_bytes,
        write_bytes,
        read_time_ms,
        write_time_ms,
        io_time_ms,
        ..DeviceCounterSnapshot::new(name)
    }
}

pub fn frame(devices: &[DeviceCounterSnapshot]) -> Frame {
    devices
        .iter()
        .map(|d| (d.device_name.clone(), d.clone()))
        .collect()
}

/// Clock handle whose time only moves when told to.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn at(ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(ms)))
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Returns queued frames in order; `None` entries (and an empty queue) fail like an unreadable /proc.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    frames: Arc<Mutex<VecDeque<Option<Frame>>>>,
    calls: Arc<AtomicI64>,
}

impl ScriptedSource {
    pub fn push(&self, frame: Frame) {
        self.frames.lock().unwrap().push_back(Some(frame));
    }

    pub fn push_failure(&self) {
        self.frames.lock().unwrap().push_back(None);
    }

    pub fn calls(&self) -> i64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CounterSource for ScriptedSource {
    fn io_counters(&self) -> Result<Frame, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.frames.lock().unwrap().pop_front().flatten() {
            Some(frame) => Ok(frame),
            None => Err(SourceError::Read {
                path: PathBuf::from("/proc/diskstats"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            }),
        }
    }
}

/// Always returns the same frame, with every counter bumped on each call.
pub struct GrowingSource {
    frame: Mutex<Frame>,
}

impl GrowingSource {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame: Mutex::new(frame),
        }
    }
}

impl CounterSource for GrowingSource {
    fn io_counters(&self) -> Result<Frame, SourceError> {
        let mut frame = self.frame.lock().unwrap();
        for d in frame.values_mut() {
            d.read_count += 10;
            d.write_count += 5;
            d.read_bytes += 40_960;
            d.write_bytes += 20_480;
            d.read_time_ms += 20;
            d.write_time_ms += 10;
            d.io_time_ms += 15;
        }
        Ok(frame.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub kind: MetricKind,
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
}

/// Records every call; also acts as its own provider.
#[derive(Default)]
pub struct RecordingSink {
    pub emissions: Mutex<Vec<Emission>>,
    pub commits: AtomicI64,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<Emission> {
        std::mem::take(&mut *self.emissions.lock().unwrap())
    }

    pub fn commits(&self) -> i64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn push(&self, kind: MetricKind, name: &str, value: f64, tags: &[String]) {
        self.emissions.lock().unwrap().push(Emission {
            kind,
            name: name.to_string(),
            value,
            tags: tags.to_vec(),
        });
    }
}

impl MetricsSink for RecordingSink {
    fn rate(&self, name: &str, value: f64, tags: &[String]) {
        self.push(MetricKind::Rate, name, value, tags);
    }

    fn gauge(&self, name: &str, value: f64, tags: &[String]) {
        self.push(MetricKind::Gauge, name, value, tags);
    }

    fn commit(&self) {
        self.commits.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct RecordingProvider {
    pub sink: Arc<RecordingSink>,
    pub available: bool,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(RecordingSink::default()),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }
}

impl SinkProvider for RecordingProvider {
    fn sink(&self, check_id: &str) -> Result<Arc<dyn MetricsSink>, SinkError> {
        if !self.available {
            return Err(SinkError::UnknownCheck(check_id.to_string()));
        }
        let sink: Arc<dyn MetricsSink> = self.sink.clone();
        Ok(sink)
    }
}

/// Emissions for one device tag.
pub fn for_device<'a>(emissions: &'a [Emission], tag: &str) -> Vec<&'a Emission> {
    emissions
        .iter()
        .filter(|e| e.tags.iter().any(|t| t == tag))
        .collect()
}

pub fn value_of(emissions: &[Emission], name: &str, tag: &str) -> Option<f64> {
    emissions
        .iter()
        .find(|e| e.name == name && e.tags.iter().any(|t| t == tag))
        .map(|e| e.value)
}
