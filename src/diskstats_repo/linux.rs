// Linux-specific helpers: filesystem labels from udev's /dev/disk/by-label symlinks.

use std::collections::HashMap;
use std::path::Path;

/// Maps device name (e.g. "sda1") to filesystem label. A missing or unreadable directory yields no labels.
pub(super) fn read_labels(dir: &Path) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return labels;
    };
    for entry in entries.flatten() {
        let Ok(target) = std::fs::read_link(entry.path()) else {
            continue;
        };
        let Some(device) = target.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let label = unescape_udev(&entry.file_name().to_string_lossy());
        if !label.is_empty() {
            labels.insert(device.to_string(), label);
        }
    }
    labels
}

/// Decodes udev's `\xHH` escapes (e.g. "My\x20Disk" -> "My Disk").
pub(super) fn unescape_udev(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && bytes.get(i + 1) == Some(&b'x')
            && let Some(hex) = name.get(i + 2..i + 4)
            && let Ok(b) = u8::from_str_radix(hex, 16)
        {
            out.push(b);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
