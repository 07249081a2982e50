// Domain models: raw device counters in, published metric batches out

mod device;
mod metrics;

pub use device::DeviceCounterSnapshot;
pub use metrics::{MetricKind, MetricPoint, MetricsBatch};
