//! Mount orchestration module.
//!
//! This module performs a single mount or unmount through the external
//! helper tools (pmount/pumount), draining the helper's output under a
//! bounded poll while watching for termination, and classifies the result
//! from the exit status. One helper runs per call; the caller serializes
//! calls.

use std::fs;
use std::io::Read;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use serde::Serialize;
use tracing::{debug, warn};

use crate::device::Device;
use crate::error::{IoResultExt, Result};

/// Default external mount helper.
pub const PMOUNT_PROGRAM: &str = "/usr/bin/pmount";

/// Default external unmount helper.
pub const PUMOUNT_PROGRAM: &str = "/usr/bin/pumount";

/// Default directory the helpers create mount points under.
pub const MEDIA_ROOT: &str = "/media";

/// Readiness-wait granularity while draining helper output.
const POLL_INTERVAL_MS: u16 = 200;

/// Configuration for mount and unmount operations.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Directory the helpers create mount points under.
    pub media_root: PathBuf,
    /// External mount helper, invoked as `<helper> <node> <mount-point-name>`.
    pub mount_helper: PathBuf,
    /// External unmount helper, invoked as `<helper> <node>`.
    pub unmount_helper: PathBuf,
    /// Companion application launched in the mount point after a successful
    /// mount.
    pub file_manager: Option<PathBuf>,
    /// Synthesize a confirmation message on success.
    pub feedback: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from(MEDIA_ROOT),
            mount_helper: PathBuf::from(PMOUNT_PROGRAM),
            unmount_helper: PathBuf::from(PUMOUNT_PROGRAM),
            file_manager: None,
            feedback: false,
        }
    }
}

impl MountConfig {
    /// Creates a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the media root directory.
    pub fn with_media_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.media_root = path.into();
        self
    }

    /// Sets the mount and unmount helper programs.
    pub fn with_helpers(mut self, mount: impl Into<PathBuf>, unmount: impl Into<PathBuf>) -> Self {
        self.mount_helper = mount.into();
        self.unmount_helper = unmount.into();
        self
    }

    /// Sets the companion application.
    pub fn with_file_manager(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_manager = Some(path.into());
        self
    }

    /// Enables or disables success feedback messages.
    pub fn with_feedback(mut self, feedback: bool) -> Self {
        self.feedback = feedback;
        self
    }
}

/// Result of one mount or unmount operation.
#[derive(Debug, Clone, Serialize)]
pub struct MountOutcome {
    /// True iff the helper exited normally with status zero.
    pub succeeded: bool,
    /// The helper's combined standard output and error text, verbatim.
    pub output: String,
    /// Confirmation message, when feedback is enabled and the operation
    /// succeeded.
    pub feedback: Option<String>,
}

/// Names the mount point the helper tools use for a device.
pub fn mount_point_name(device: &Device) -> String {
    format!("{}-{}", device.shortdev, device.label)
}

/// Drains the child's output streams, interleaving a bounded readiness wait
/// with a non-blocking check for termination.
///
/// Returns once both streams reach end-of-stream or the child is observed to
/// have exited during a quiet interval. The caller performs the final
/// blocking wait.
fn drain_child_output(child: &mut Child, command: &str) -> Result<Vec<u8>> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut captured = Vec::new();
    let mut chunk = [0u8; 1024];

    while stdout.is_some() || stderr.is_some() {
        let mut stdout_ready = false;
        let mut stderr_ready = false;
        {
            let mut fds = Vec::with_capacity(2);
            if let Some(out) = &stdout {
                fds.push(PollFd::new(out.as_fd(), PollFlags::POLLIN));
            }
            if let Some(err) = &stderr {
                fds.push(PollFd::new(err.as_fd(), PollFlags::POLLIN));
            }

            match poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS)) {
                Ok(0) => {
                    // Quiet interval; stop draining if the child is already
                    // gone, otherwise wait for output again.
                    if child.try_wait().wait_context(command)?.is_some() {
                        break;
                    }
                    continue;
                }
                Ok(_) => {
                    let mut ready = fds.iter();
                    if stdout.is_some() {
                        stdout_ready = ready
                            .next()
                            .is_some_and(|fd| fd.revents().is_some_and(|r| !r.is_empty()));
                    }
                    if stderr.is_some() {
                        stderr_ready = ready
                            .next()
                            .is_some_and(|fd| fd.revents().is_some_and(|r| !r.is_empty()));
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    return Err(std::io::Error::from(err)).capture_context(command);
                }
            }
        }

        if stdout_ready && let Some(out) = &mut stdout {
            match out.read(&mut chunk).capture_context(command)? {
                0 => stdout = None,
                len => captured.extend_from_slice(&chunk[..len]),
            }
        }
        if stderr_ready && let Some(err) = &mut stderr {
            match err.read(&mut chunk).capture_context(command)? {
                0 => stderr = None,
                len => captured.extend_from_slice(&chunk[..len]),
            }
        }
    }

    Ok(captured)
}

/// Mounts or unmounts a device and reports the helper's verdict.
///
/// Spawns the mount helper with `(node, <shortdev>-<label>)` or the unmount
/// helper with `(node)`, captures its combined output, and classifies
/// success as a normal exit with status zero. After a successful unmount the
/// mount-point directory is removed best-effort; after a successful mount
/// the configured companion application, if any, is launched fire-and-forget
/// in the new mount point.
///
/// Errors cover only resource failures (spawn, capture, reap); a helper that
/// ran and failed is a structured [`MountOutcome`] with `succeeded` false.
pub fn set_mount_state(
    device: &Device,
    want_mounted: bool,
    config: &MountConfig,
) -> Result<MountOutcome> {
    let point_name = mount_point_name(device);
    let mount_point = config.media_root.join(&point_name);

    let program = if want_mounted {
        &config.mount_helper
    } else {
        &config.unmount_helper
    };
    let command_name = program.display().to_string();

    let mut command = Command::new(program);
    command
        .arg(&device.node)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if want_mounted {
        command.arg(&point_name);
    }

    debug!(
        "running {command_name} for {} ({})",
        device.shortdev,
        if want_mounted { "mount" } else { "unmount" }
    );
    let mut child = command.spawn().command_context(&command_name)?;
    let drained = drain_child_output(&mut child, &command_name);
    // Reap even when draining failed part-way.
    let status = child.wait().wait_context(&command_name)?;
    let captured = drained?;

    let succeeded = status.success();
    debug!("helper {command_name} exited with {status}");

    if succeeded && !want_mounted {
        match fs::remove_dir(&mount_point) {
            Ok(()) => debug!("removed mount point {}", mount_point.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("cannot remove mount point {}: {err}", mount_point.display()),
        }
    }

    if succeeded
        && want_mounted
        && let Some(file_manager) = &config.file_manager
    {
        launch_file_manager(file_manager, &mount_point);
    }

    let feedback = (succeeded && config.feedback).then(|| {
        if want_mounted {
            format!("{} mounted ok {}", device.label, device.node.display())
        } else {
            format!("{} unmounted ok", device.label)
        }
    });

    Ok(MountOutcome {
        succeeded,
        output: String::from_utf8_lossy(&captured).into_owned(),
        feedback,
    })
}

/// Launches the companion application in the mount point, fire-and-forget.
fn launch_file_manager(program: &Path, mount_point: &Path) {
    match Command::new(program).current_dir(mount_point).spawn() {
        Ok(_) => debug!(
            "launched {} in {}",
            program.display(),
            mount_point.display()
        ),
        Err(err) => warn!("cannot launch {}: {err}", program.display()),
    }
}
