//! removable-mount-core: discovery and mount orchestration for removable
//! storage devices on Linux.
//!
//! The library rebuilds a catalog of mountable devices from live system
//! state on demand and performs mount/unmount operations through the
//! pmount/pumount helper tools.
//!
//! # Modules
//!
//! - [`udev`]: device property queries (`udevadm` output parsing)
//! - [`mounts`]: mount-table reading (mtab/fstab)
//! - [`sysfs`]: removability classification via the device-model hierarchy
//! - [`device`]: device catalog building and the admission policy
//! - [`mount`]: mount/unmount orchestration through the external helpers
//! - [`error`]: error types
//!
//! # Example
//!
//! ```no_run
//! use removable_mount_core::device::{self, ScanConfig};
//! use removable_mount_core::mount::{self, MountConfig};
//!
//! // Build the catalog of mountable devices.
//! let catalog = device::enumerate_devices(&ScanConfig::default());
//! for device in &catalog {
//!     println!("{} ({})", device.label, device.description);
//! }
//!
//! // Toggle the first device's mount state.
//! if let Some(device) = catalog.first() {
//!     let config = MountConfig::default().with_feedback(true);
//!     let outcome = mount::set_mount_state(device, !device.mounted, &config).unwrap();
//!     if !outcome.succeeded {
//!         eprintln!("{}", outcome.output);
//!     }
//! }
//! ```

pub mod device;
pub mod error;
pub mod mount;
pub mod mounts;
pub mod sysfs;
pub mod udev;

// Re-export commonly used types
pub use device::{Device, ScanConfig};
pub use error::{Error, Result};
pub use mount::{MountConfig, MountOutcome};
pub use udev::{Property, PropertySet};
