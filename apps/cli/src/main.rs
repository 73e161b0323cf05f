//! Removable-mount CLI - command line interface for device discovery and
//! mount operations.
//!
//! Lists the mountable removable devices found on the system and mounts or
//! unmounts one of them through the pmount/pumount helpers.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use removable_mount_core::device::{self, Device, ScanConfig};
use removable_mount_core::mount::{self, MountConfig};

/// Removable-device mount tool.
#[derive(Parser)]
#[command(name = "removable-mount")]
#[command(about = "Discover and mount removable storage devices", long_about = None)]
struct Cli {
    /// Full path of an application to open newly mounted media with.
    #[arg(short = 'f', long = "file-manager", value_name = "PATH")]
    file_manager: Option<PathBuf>,

    /// Print a confirmation message after a successful mount or unmount.
    #[arg(short = 'k', long = "feedback")]
    feedback: bool,

    /// Increase log verbosity (-v for device progress, -vv for per-property
    /// detail).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the mountable removable devices.
    List,
    /// Mount a device, named by node path or short device name.
    Mount {
        /// Device node path (e.g., /dev/disk/by-id/...) or short name (e.g., sdb1).
        device: String,
    },
    /// Unmount a device, named by node path or short device name.
    Unmount {
        /// Device node path or short name.
        device: String,
    },
    /// Flip a device's current mount state.
    Toggle {
        /// Device node path or short name.
        device: String,
    },
}

fn init_logging(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "removable_mount_core=debug",
        _ => "removable_mount_core=trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("JSON encoding failed: {err}"),
    }
}

fn list_devices(catalog: &[Device], json: bool) {
    if json {
        print_json(&catalog);
        return;
    }
    if catalog.is_empty() {
        eprintln!("No mountable devices found.");
        return;
    }
    for device in catalog {
        let marker = if device.mounted { "[*]" } else { "[ ]" };
        println!(
            "{marker} {} | {}\t{}",
            device.label, device.shortdev, device.description
        );
    }
}

fn toggle_device(cli: &Cli, catalog: &[Device], key: &str, want: Option<bool>) -> ExitCode {
    let Some(device) = device::find_device_by_node(catalog, Path::new(key))
        .or_else(|| device::find_device_by_shortdev(catalog, key))
    else {
        eprintln!("No mountable device matches '{key}'");
        return ExitCode::FAILURE;
    };

    let want_mounted = want.unwrap_or(!device.mounted);
    let mut config = MountConfig::default().with_feedback(cli.feedback);
    if let Some(file_manager) = &cli.file_manager {
        config = config.with_file_manager(file_manager);
    }

    match mount::set_mount_state(device, want_mounted, &config) {
        Ok(outcome) => {
            if cli.json {
                print_json(&outcome);
            } else if !outcome.succeeded {
                eprint!("{}", outcome.output);
            } else if let Some(message) = &outcome.feedback {
                println!("{message}");
            }
            if outcome.succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let catalog = device::enumerate_devices(&ScanConfig::default());

    match &cli.command {
        Commands::List => {
            list_devices(&catalog, cli.json);
            ExitCode::SUCCESS
        }
        Commands::Mount { device } => toggle_device(&cli, &catalog, device, Some(true)),
        Commands::Unmount { device } => toggle_device(&cli, &catalog, device, Some(false)),
        Commands::Toggle { device } => toggle_device(&cli, &catalog, device, None),
    }
}
