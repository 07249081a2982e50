// Counter source: cumulative block-device counters from /proc/diskstats.
// See https://www.kernel.org/doc/Documentation/iostats.txt

mod linux;

use crate::engine::SECTOR_SIZE;
use crate::models::DeviceCounterSnapshot;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::instrument;

pub const DEFAULT_DISKSTATS_PATH: &str = "/proc/diskstats";
pub const DEFAULT_LABEL_DIR: &str = "/dev/disk/by-label";

/// Fields per line up to and including the weighted I/O time.
const MIN_FIELDS: usize = 14;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: invalid {field} value '{value}'")]
    Parse {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// Supplies the current counter snapshot of every device, keyed by device name.
pub trait CounterSource: Send {
    fn io_counters(&self) -> Result<HashMap<String, DeviceCounterSnapshot>, SourceError>;
}

pub struct DiskstatsRepo {
    diskstats_path: PathBuf,
    label_dir: Option<PathBuf>,
}

impl Default for DiskstatsRepo {
    fn default() -> Self {
        Self::new(DEFAULT_DISKSTATS_PATH, Some(PathBuf::from(DEFAULT_LABEL_DIR)))
    }
}

impl DiskstatsRepo {
    /// `label_dir` is usually `/dev/disk/by-label`; `None` disables label lookup.
    pub fn new(diskstats_path: impl Into<PathBuf>, label_dir: Option<PathBuf>) -> Self {
        Self {
            diskstats_path: diskstats_path.into(),
            label_dir,
        }
    }

    pub fn diskstats_path(&self) -> &Path {
        &self.diskstats_path
    }
}

impl CounterSource for DiskstatsRepo {
    #[instrument(skip(self), fields(repo = "diskstats", operation = "io_counters"))]
    fn io_counters(&self) -> Result<HashMap<String, DeviceCounterSnapshot>, SourceError> {
        let content =
            std::fs::read_to_string(&self.diskstats_path).map_err(|source| SourceError::Read {
                path: self.diskstats_path.clone(),
                source,
            })?;
        let mut devices = parse_diskstats(&content)?;
        if let Some(dir) = &self.label_dir {
            let labels = linux::read_labels(dir);
            for (name, snapshot) in devices.iter_mut() {
                snapshot.label = labels.get(name).cloned();
            }
        }
        tracing::trace!(devices = devices.len(), "diskstats read");
        Ok(devices)
    }
}

/// Parses /proc/diskstats content.
///
/// ```text
/// major minor name rd_ios rd_merges rd_sectors rd_ticks wr_ios wr_merges wr_sectors wr_ticks in_flight io_ticks time_in_queue [...]
/// ```
/// Lines with fewer than 14 fields are skipped; extra (discard/flush) fields are ignored.
pub fn parse_diskstats(content: &str) -> Result<HashMap<String, DeviceCounterSnapshot>, SourceError> {
    let mut devices = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            continue;
        }
        let line_no = idx + 1;
        let num = |i: usize, field: &'static str| -> Result<u64, SourceError> {
            fields[i].parse().map_err(|_| SourceError::Parse {
                line: line_no,
                field,
                value: fields[i].to_string(),
            })
        };

        let name = fields[2].to_string();
        let snapshot = DeviceCounterSnapshot {
            device_name: name.clone(),
            label: None,
            read_count: num(3, "reads")?,
            merged_read_count: num(4, "merged reads")?,
            read_bytes: num(5, "sectors read")?.saturating_mul(SECTOR_SIZE),
            read_time_ms: num(6, "read time")?,
            write_count: num(7, "writes")?,
            merged_write_count: num(8, "merged writes")?,
            write_bytes: num(9, "sectors written")?.saturating_mul(SECTOR_SIZE),
            write_time_ms: num(10, "write time")?,
            io_time_ms: num(12, "io time")?,
            weighted_io_time_ms: num(13, "weighted io time")?,
        };
        devices.insert(name, snapshot);
    }
    Ok(devices)
}
