// Per-device cumulative I/O counters

use serde::{Deserialize, Serialize};

/// One point-in-time reading of a block device's cumulative counters.
///
/// Byte counters are already converted from sectors; time counters are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCounterSnapshot {
    pub device_name: String,
    /// Filesystem label; reported instead of `device_name` when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub read_count: u64,
    pub write_count: u64,
    pub merged_read_count: u64,
    pub merged_write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_time_ms: u64,
    pub write_time_ms: u64,
    pub io_time_ms: u64,
    pub weighted_io_time_ms: u64,
}

impl DeviceCounterSnapshot {
    /// Zeroed counters for `device_name`.
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ..Default::default()
        }
    }

    /// Name used in the `device:` tag: the label when set, else the kernel name.
    pub fn display_name(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.device_name,
        }
    }

    /// Tag set attached to every metric of this device.
    pub fn tags(&self) -> Vec<String> {
        vec![format!("device:{}", self.display_name())]
    }
}
