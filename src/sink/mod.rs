// Metrics sink: where a check writes its per-cycle rates and gauges

mod aggregator;

pub use aggregator::{Aggregator, CheckSender};

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("no sender registered for check '{0}'")]
    UnknownCheck(String),
}

/// Per-check metric writer. Values stay buffered until `commit`.
pub trait MetricsSink: Send + Sync {
    /// Raw monotonic counter; converted to a per-second rate by the sink.
    fn rate(&self, name: &str, value: f64, tags: &[String]);
    /// Already-computed value.
    fn gauge(&self, name: &str, value: f64, tags: &[String]);
    /// Flushes everything emitted since the previous commit.
    fn commit(&self);
}

/// Hands out the sink belonging to a check.
pub trait SinkProvider: Send + Sync {
    fn sink(&self, check_id: &str) -> Result<Arc<dyn MetricsSink>, SinkError>;
}
