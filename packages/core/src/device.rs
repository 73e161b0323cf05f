//! Device catalog builder.
//!
//! This module assembles the canonical device catalog consumed by
//! presentation layers. It enumerates nodes under the stable-identifier
//! directory, queries each one's udev properties, applies the admission
//! policy, and derives the human-readable label and description fields.
//!
//! The catalog is rebuilt in full on every call; there is no incremental
//! update and no identity across refreshes beyond the `node` path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, trace};

use crate::mounts;
use crate::sysfs::{self, REMOVABLE_BUSES};
use crate::udev::{self, PropertySet};

/// Default stable device-identifier directory.
pub const DEVICE_ID_DIR: &str = "/dev/disk/by-id";

/// One mountable device, as offered to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    /// Path of the identifier-directory entry naming the device.
    pub node: PathBuf,
    /// Base name of the kernel device (e.g., "sdb1" for /dev/sdb1); used to
    /// build mount-point names.
    pub shortdev: String,
    /// Best-effort human label: filesystem label, else filesystem UUID, else
    /// the device base name.
    pub label: String,
    /// Label plus "(vendor model)" when both are known; for tooltips and
    /// dialogs only.
    pub description: String,
    /// True iff the kernel device name appeared in the live mount table at
    /// catalog-build time.
    pub mounted: bool,
    /// Last modification time of the device node, when it could be inspected.
    pub time: Option<SystemTime>,
}

/// Configuration for building the device catalog.
///
/// Defaults name the live system paths; tests point the fields at fixture
/// trees instead.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Stable device-identifier directory to enumerate.
    pub id_dir: PathBuf,
    /// Live mount table path.
    pub mtab_path: PathBuf,
    /// Fstab path, for the explicitly-allowed device list.
    pub fstab_path: PathBuf,
    /// Root of the device-model pseudo-filesystem.
    pub sysfs_root: PathBuf,
    /// Program used to query device properties.
    pub udev_program: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            id_dir: PathBuf::from(DEVICE_ID_DIR),
            mtab_path: PathBuf::from(mounts::MTAB_PATH),
            fstab_path: PathBuf::from(mounts::FSTAB_PATH),
            sysfs_root: PathBuf::from(sysfs::SYSFS_ROOT),
            udev_program: PathBuf::from(udev::UDEVADM_PROGRAM),
        }
    }
}

impl ScanConfig {
    /// Creates a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identifier directory.
    pub fn with_id_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.id_dir = path.into();
        self
    }

    /// Sets the live mount table path.
    pub fn with_mtab_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mtab_path = path.into();
        self
    }

    /// Sets the fstab path.
    pub fn with_fstab_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fstab_path = path.into();
        self
    }

    /// Sets the pseudo-filesystem root.
    pub fn with_sysfs_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.sysfs_root = path.into();
        self
    }

    /// Sets the property-query program.
    pub fn with_udev_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.udev_program = path.into();
        self
    }
}

/// Lists candidate device nodes in the identifier directory.
///
/// Each entry is dereferenced one level so that multiple symlink aliases to
/// one physical device can be recognized; only the first alias per resolved
/// target is kept. A missing directory yields no candidates.
fn list_device_nodes(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        debug!("cannot read identifier directory {}", dir.display());
        return Vec::new();
    };

    let mut nodes = Vec::new();
    let mut seen = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        // A non-symlink entry stands for itself.
        let target = fs::read_link(&path).unwrap_or_else(|_| path.clone());
        if seen.contains(&target) {
            debug!("device {} is a duplicate", path.display());
            continue;
        }
        seen.push(target);
        nodes.push(path);
    }
    nodes
}

/// The admission policy: decides whether a property set describes a device
/// that may be offered for mounting.
///
/// `allowed` holds kernel device names granted an unconditional pass (the
/// fstab user-mountable list). Optical devices with media inserted are
/// admitted even though they are not partitions; everything else must be a
/// partition on a removable disk or a removable bus.
pub fn can_mount(props: &PropertySet, allowed: &[String], sysfs_root: &Path) -> bool {
    if let Some(devname) = props.get("DEVNAME")
        && allowed.iter().any(|entry| entry == devname)
    {
        return true;
    }

    // CD devices are not partitions; only admit them with media inserted.
    if props.matches("ID_TYPE", Some("cd")) && props.matches("ID_CDROM_MEDIA", Some("1")) {
        return true;
    }

    // Only partitions beyond this point.
    if !props.matches("DEVTYPE", Some("partition")) {
        return false;
    }

    let Some(devpath) = props.get("DEVPATH") else {
        return false;
    };
    if sysfs::is_removable_disk(sysfs_root, devpath) {
        return true;
    }

    // Certain buses are removable by nature, but devices only advertise
    // themselves as removable if they take removable media, e.g. memory
    // card readers.
    if let Some(bus) = props.get("ID_BUS")
        && REMOVABLE_BUSES.contains(&bus)
    {
        return true;
    }

    sysfs::is_on_removable_bus(sysfs_root, devpath, REMOVABLE_BUSES)
}

/// Extracts the final path segment of a kernel device name.
fn base_name(devname: &str) -> &str {
    devname.rsplit('/').next().unwrap_or(devname)
}

/// Builds the device catalog.
///
/// Candidates with no obtainable properties or no `DEVNAME` are skipped
/// silently; a missing identifier directory yields an empty catalog. Catalog
/// order follows directory iteration order.
pub fn enumerate_devices(config: &ScanConfig) -> Vec<Device> {
    let nodes = list_device_nodes(&config.id_dir);
    let mounted = mounts::mounted_devices(&config.mtab_path).unwrap_or_default();
    let allowed = mounts::user_mountable_devices(&config.fstab_path).unwrap_or_default();

    let mut catalog = Vec::new();
    for node in nodes {
        debug!("examining device {}", node.display());

        let Some(props) = udev::fetch_device_properties(&config.udev_program, &node) else {
            debug!("no properties for {}", node.display());
            continue;
        };
        for property in props.iter() {
            trace!("  {} = {}", property.name, property.value);
        }

        let Some(devname) = props.get("DEVNAME") else {
            debug!("no DEVNAME for {}", node.display());
            continue;
        };

        if !can_mount(&props, &allowed, &config.sysfs_root) {
            debug!("rejecting device {}", node.display());
            continue;
        }
        debug!("using device {}", node.display());

        let shortdev = base_name(devname).to_string();
        let label = props
            .get("ID_FS_LABEL")
            .or_else(|| props.get("ID_FS_UUID"))
            .unwrap_or_else(|| base_name(devname))
            .to_string();
        let description = match (props.get("ID_VENDOR"), props.get("ID_MODEL")) {
            (Some(vendor), Some(model)) => format!("{label} ({vendor} {model})"),
            _ => label.clone(),
        };
        let mounted = mounted.iter().any(|source| source == devname);
        let time = fs::metadata(&node).and_then(|meta| meta.modified()).ok();

        catalog.push(Device {
            node,
            shortdev,
            label,
            description,
            mounted,
            time,
        });
    }
    catalog
}

/// Finds a device by its identifier-directory node path.
pub fn find_device_by_node<'a>(devices: &'a [Device], node: &Path) -> Option<&'a Device> {
    devices.iter().find(|device| device.node == node)
}

/// Finds a device by its short kernel device name.
pub fn find_device_by_shortdev<'a>(devices: &'a [Device], shortdev: &str) -> Option<&'a Device> {
    devices.iter().find(|device| device.shortdev == shortdev)
}
