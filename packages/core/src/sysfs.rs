//! Removability classification via the kernel's device-model hierarchy.
//!
//! This module answers two questions about a device path from the `DEVPATH`
//! property: does the governing disk advertise removable media, and is any
//! ancestor attached through an inherently removable bus.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

/// Default root of the device-model pseudo-filesystem.
pub const SYSFS_ROOT: &str = "/sys";

/// Buses whose devices count as removable regardless of the media flag.
pub const REMOVABLE_BUSES: &[&str] = &["usb", "firewire"];

/// Upper bound for a classified device-model path.
const SYSFS_PATH_MAX: usize = 256;

/// Reserve kept free for the attribute name appended to a node path.
const ATTRIBUTE_RESERVE: usize = 10;

/// Joins a kernel device path (the `DEVPATH` property) onto the
/// pseudo-filesystem root.
fn device_model_path(sysfs_root: &Path, devpath: &str) -> PathBuf {
    sysfs_root.join(devpath.trim_start_matches('/'))
}

/// Returns true while an attribute name still fits within the path bound.
/// Oversized paths classify as not removable rather than being truncated.
fn within_path_bound(path: &Path) -> bool {
    path.as_os_str().len() + ATTRIBUTE_RESERVE < SYSFS_PATH_MAX
}

/// Reads the removable-media flag governing `devpath`.
///
/// The flag lives in a `removable` attribute replacing the node's last path
/// segment; for a partition that sibling slot belongs to the disk. Returns
/// true only when the attribute's first byte is `'1'`. Unreadable attributes
/// and over-long paths read as not removable.
pub fn is_removable_disk(sysfs_root: &Path, devpath: &str) -> bool {
    let node = device_model_path(sysfs_root, devpath);
    if !within_path_bound(&node) {
        return false;
    }
    let Some(parent) = node.parent() else {
        return false;
    };

    let flag = parent.join("removable");
    let removable = matches!(fs::read(&flag), Ok(bytes) if bytes.first() == Some(&b'1'));
    trace!(
        "{} is{} removable",
        node.display(),
        if removable { "" } else { " not" }
    );
    removable
}

/// Walks `devpath`'s ancestors looking for a bus in the allow-list.
///
/// Starting at the node's parent and stopping above at the hierarchy's
/// `devices` root, each ancestor's `subsystem` symlink target names the bus
/// that ancestor belongs to; the first allow-listed bus wins. The walk exists
/// because the classification may receive a partition's path while the bus
/// attachment sits several levels up. Over-long paths classify as false.
pub fn is_on_removable_bus(sysfs_root: &Path, devpath: &str, buses: &[&str]) -> bool {
    let node = device_model_path(sysfs_root, devpath);
    if !within_path_bound(&node) {
        return false;
    }
    let boundary = sysfs_root.join("devices");

    for ancestor in node.ancestors().skip(1) {
        if ancestor == boundary || !ancestor.starts_with(&boundary) {
            break;
        }

        let Ok(target) = fs::read_link(ancestor.join("subsystem")) else {
            continue;
        };
        let Some(bus) = target.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        trace!("subsystem of {} is {}", ancestor.display(), bus);
        if buses.contains(&bus) {
            return true;
        }
    }

    false
}
