// Metric points as published by the sink (HTTP + WebSocket wire format)

use serde::{Deserialize, Serialize};

/// How the sink treats an emitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Raw monotonic counter; the sink turns it into a per-second rate.
    Rate,
    /// Already-computed value, published as is.
    Gauge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub tags: Vec<String>,
}

/// Everything one check committed in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBatch {
    pub check_id: String,
    pub timestamp_ms: i64,
    pub points: Vec<MetricPoint>,
}

impl MetricsBatch {
    /// First point named `name` carrying `tag`.
    pub fn find(&self, name: &str, tag: &str) -> Option<&MetricPoint> {
        self.points
            .iter()
            .find(|p| p.name == name && p.tags.iter().any(|t| t == tag))
    }
}
