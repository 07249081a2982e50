// In-process aggregator: per-check senders, counter-to-rate conversion on commit,
// latest batch per check kept for HTTP and every batch broadcast for WebSocket clients.

use super::{MetricsSink, SinkError, SinkProvider};
use crate::clock::{Clock, SystemClock};
use crate::models::{MetricKind, MetricPoint, MetricsBatch};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // sink state is plain data; a panicked holder leaves nothing half-written that matters
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared by the aggregator and all of its senders.
struct Published {
    tx: broadcast::Sender<MetricsBatch>,
    latest: Mutex<HashMap<String, MetricsBatch>>,
}

impl Published {
    fn publish(&self, batch: MetricsBatch) {
        lock(&self.latest).insert(batch.check_id.clone(), batch.clone());
        if self.tx.send(batch).is_err() {
            tracing::trace!(operation = "broadcast_batch", "no metrics subscribers");
        }
    }
}

pub struct Aggregator {
    senders: Mutex<HashMap<String, Arc<CheckSender>>>,
    published: Arc<Published>,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(tx: broadcast::Sender<MetricsBatch>) -> Self {
        Self::with_clock(tx, Arc::new(SystemClock))
    }

    pub fn with_clock(tx: broadcast::Sender<MetricsBatch>, clock: Arc<dyn Clock>) -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            published: Arc::new(Published {
                tx,
                latest: Mutex::new(HashMap::new()),
            }),
            clock,
        }
    }

    /// Creates the sender for `check_id`; registering twice keeps the existing sender.
    pub fn register(&self, check_id: &str) -> Arc<CheckSender> {
        lock(&self.senders)
            .entry(check_id.to_string())
            .or_insert_with(|| {
                Arc::new(CheckSender {
                    check_id: check_id.to_string(),
                    state: Mutex::new(SenderState::default()),
                    published: self.published.clone(),
                    clock: self.clock.clone(),
                })
            })
            .clone()
    }

    pub fn deregister(&self, check_id: &str) {
        lock(&self.senders).remove(check_id);
        lock(&self.published.latest).remove(check_id);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricsBatch> {
        self.published.tx.subscribe()
    }

    /// Last committed batch of `check_id`.
    pub fn latest(&self, check_id: &str) -> Option<MetricsBatch> {
        lock(&self.published.latest).get(check_id).cloned()
    }

    /// Last committed batch of every check, ordered by check id.
    pub fn latest_all(&self) -> Vec<MetricsBatch> {
        let mut all: Vec<MetricsBatch> = lock(&self.published.latest).values().cloned().collect();
        all.sort_by(|a, b| a.check_id.cmp(&b.check_id));
        all
    }
}

impl SinkProvider for Aggregator {
    fn sink(&self, check_id: &str) -> Result<Arc<dyn MetricsSink>, SinkError> {
        let sender: Arc<dyn MetricsSink> = lock(&self.senders)
            .get(check_id)
            .cloned()
            .ok_or_else(|| SinkError::UnknownCheck(check_id.to_string()))?;
        Ok(sender)
    }
}

type SeriesKey = (String, Vec<String>);

#[derive(Default)]
struct SenderState {
    pending: Vec<MetricPoint>,
    /// Last committed raw value and time per rate series. Holds only the
    /// series sampled in the latest commit.
    counters: HashMap<SeriesKey, (f64, i64)>,
}

impl SenderState {
    /// Converts the pending points into a batch. Rate series that were not
    /// sampled this cycle are dropped, so a device that comes back starts over.
    fn drain(&mut self, now_ms: i64) -> Vec<MetricPoint> {
        let pending = std::mem::take(&mut self.pending);
        let mut previous = std::mem::take(&mut self.counters);
        let mut points = Vec::with_capacity(pending.len());
        for point in pending {
            match point.kind {
                MetricKind::Gauge => points.push(point),
                MetricKind::Rate => {
                    let key = (point.name.clone(), point.tags.clone());
                    let prev = previous.remove(&key);
                    self.counters.insert(key, (point.value, now_ms));
                    if let Some(value) = prev.and_then(|p| per_second(p, point.value, now_ms)) {
                        points.push(MetricPoint { value, ..point });
                    }
                }
            }
        }
        points
    }
}

/// `None` on a non-positive interval or a counter that went down.
fn per_second((prev_value, prev_ms): (f64, i64), value: f64, now_ms: i64) -> Option<f64> {
    if now_ms <= prev_ms || value < prev_value {
        return None;
    }
    let secs = (now_ms - prev_ms) as f64 / 1000.0;
    Some((value - prev_value) / secs)
}

/// One check's sink.
pub struct CheckSender {
    check_id: String,
    state: Mutex<SenderState>,
    published: Arc<Published>,
    clock: Arc<dyn Clock>,
}

impl CheckSender {
    pub fn check_id(&self) -> &str {
        &self.check_id
    }

    fn push(&self, kind: MetricKind, name: &str, value: f64, tags: &[String]) {
        lock(&self.state).pending.push(MetricPoint {
            name: name.to_string(),
            kind,
            value,
            tags: tags.to_vec(),
        });
    }
}

impl MetricsSink for CheckSender {
    fn rate(&self, name: &str, value: f64, tags: &[String]) {
        self.push(MetricKind::Rate, name, value, tags);
    }

    fn gauge(&self, name: &str, value: f64, tags: &[String]) {
        self.push(MetricKind::Gauge, name, value, tags);
    }

    fn commit(&self) {
        let now_ms = self.clock.now_ms();
        let batch = MetricsBatch {
            check_id: self.check_id.clone(),
            timestamp_ms: now_ms,
            points: lock(&self.state).drain(now_ms),
        };
        tracing::debug!(
            check = %self.check_id,
            points = batch.points.len(),
            "metrics committed"
        );
        self.published.publish(batch);
    }
}
