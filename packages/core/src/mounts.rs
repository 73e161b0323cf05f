//! Mount-table reading module.
//!
//! This module reads mount-table-format files (`/etc/mtab` for live mounts,
//! `/etc/fstab` for configured ones) and extracts the source-device field of
//! entries matching a caller-supplied predicate.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Default live mount table path.
pub const MTAB_PATH: &str = "/etc/mtab";

/// Default fstab path.
pub const FSTAB_PATH: &str = "/etc/fstab";

/// Mount option granting unprivileged mount permission.
const USER_OPTION: &str = "user";

/// Represents a single mount-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// The source device field (e.g., "/dev/sdb1" or "UUID=xxx").
    pub source: String,
    /// Mount point path.
    pub mount_point: String,
    /// Filesystem type (e.g., "vfat", "ext4").
    pub vfs_type: String,
    /// Mount options.
    pub options: Vec<String>,
}

impl MountEntry {
    /// Parses a single mount-table line into an entry.
    ///
    /// Returns None for comments, blank lines, and rows with fewer than the
    /// four mandatory fields; the dump and pass columns are ignored when
    /// present.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();

        // Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return None;
        }

        Some(Self {
            source: unescape_mount_path(parts[0]),
            mount_point: unescape_mount_path(parts[1]),
            vfs_type: parts[2].to_string(),
            options: parts[3].split(',').map(|s| s.to_string()).collect(),
        })
    }

    /// Returns true if the entry carries the given mount option.
    ///
    /// Matches whole comma-separated tokens including the `option=value`
    /// form: a check for "user" accepts `user` and `user=alice` but not
    /// `nouser` or `users`.
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|option| {
            option == name
                || option
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('='))
        })
    }
}

/// Unescapes octal sequences in mount-table fields.
///
/// Handles the encodings mount tables use for embedded whitespace: space
/// (\040), tab (\011), newline (\012), and backslash (\134).
fn unescape_mount_path(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            let digits: String = chars
                .clone()
                .take(3)
                .take_while(|digit| digit.is_ascii_digit())
                .collect();

            if digits.len() == 3
                && let Ok(byte) = u8::from_str_radix(&digits, 8)
            {
                result.push(byte as char);
                // Consume the digits
                chars.nth(2);
                continue;
            }
        }
        result.push(c);
    }
    result
}

/// Collects the source-device field of every entry in a mount-table file for
/// which `predicate` holds.
///
/// Returns `None` if the file cannot be opened, so callers can tell "no
/// table" apart from "table with zero matches".
pub fn read_mount_entries<P>(path: &Path, predicate: P) -> Option<Vec<String>>
where
    P: Fn(&MountEntry) -> bool,
{
    let file = fs::File::open(path).ok()?;
    let reader = BufReader::new(file);

    let mut sources = Vec::new();
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if let Some(entry) = MountEntry::from_line(&line)
            && predicate(&entry)
        {
            sources.push(entry.source);
        }
    }

    Some(sources)
}

/// Lists the source device of every entry in the live mount table.
pub fn mounted_devices(path: &Path) -> Option<Vec<String>> {
    read_mount_entries(path, |_| true)
}

/// Lists fstab sources carrying the option that grants unprivileged mounts.
pub fn user_mountable_devices(path: &Path) -> Option<Vec<String>> {
    read_mount_entries(path, |entry| entry.has_option(USER_OPTION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_MTAB: &str = "\
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
/dev/sdb1 /media/sdb1-Backup2TB vfat rw,nosuid,nodev 0 0
tmpfs /tmp tmpfs rw,nosuid,nodev 0 0
";

    const SAMPLE_FSTAB: &str = "\
# /etc/fstab: static file system information.
UUID=abc-123  /  ext4  defaults  0  1
/dev/sdc1  /media/usbstick  vfat  user,noauto  0  0
/dev/sr0  /media/cdrom  iso9660  ro,nouser,noauto  0  0
/dev/sdd1  /mnt/scratch  ext4  user=alice,noauto  0  2
";

    fn write_table(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_mount_entry() {
        let entry = MountEntry::from_line("/dev/sdb1 /media/stick vfat rw,user,noauto 0 0").unwrap();

        assert_eq!(entry.source, "/dev/sdb1");
        assert_eq!(entry.mount_point, "/media/stick");
        assert_eq!(entry.vfs_type, "vfat");
        assert_eq!(entry.options, vec!["rw", "user", "noauto"]);
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        assert!(MountEntry::from_line("# a comment").is_none());
        assert!(MountEntry::from_line("").is_none());
        assert!(MountEntry::from_line("   ").is_none());
    }

    #[test]
    fn test_parse_skips_short_rows() {
        assert!(MountEntry::from_line("/dev/sdb1 /media/stick vfat").is_none());
    }

    #[test]
    fn test_parse_tolerates_missing_dump_and_pass() {
        let entry = MountEntry::from_line("/dev/sdb1 /media/stick vfat rw").unwrap();
        assert_eq!(entry.source, "/dev/sdb1");
    }

    #[test]
    fn test_has_option_matches_whole_tokens() {
        let entry = MountEntry::from_line("/dev/sdc1 /media/usbstick vfat user,noauto 0 0").unwrap();
        assert!(entry.has_option("user"));
        assert!(entry.has_option("noauto"));
        assert!(!entry.has_option("use"));

        let entry = MountEntry::from_line("/dev/sr0 /media/cdrom iso9660 ro,nouser 0 0").unwrap();
        assert!(!entry.has_option("user"));

        let entry = MountEntry::from_line("/dev/sdd1 /mnt ext4 users,noauto 0 0").unwrap();
        assert!(!entry.has_option("user"));
    }

    #[test]
    fn test_has_option_matches_value_form() {
        let entry = MountEntry::from_line("/dev/sdd1 /mnt ext4 user=alice,noauto 0 0").unwrap();
        assert!(entry.has_option("user"));
    }

    #[test]
    fn test_unescape_octal_sequences() {
        // "My Disk" -> "My\040Disk"
        let entry = MountEntry::from_line("/dev/My\\040Disk /media/My\\040Disk vfat rw 0 0").unwrap();
        assert_eq!(entry.source, "/dev/My Disk");
        assert_eq!(entry.mount_point, "/media/My Disk");
    }

    #[test]
    fn test_unescape_leaves_invalid_sequences_alone() {
        assert_eq!(unescape_mount_path("/dev/a\\048b"), "/dev/a\\048b");
        assert_eq!(unescape_mount_path("/dev/a\\04"), "/dev/a\\04");
        assert_eq!(unescape_mount_path("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_missing_table_is_absent_not_empty() {
        assert!(mounted_devices(Path::new("/nonexistent/mtab")).is_none());

        let table = write_table("# only comments here\n");
        let sources = mounted_devices(table.path()).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_mounted_devices_lists_every_source() {
        let table = write_table(SAMPLE_MTAB);
        let sources = mounted_devices(table.path()).unwrap();
        assert_eq!(sources, vec!["/dev/nvme0n1p2", "/dev/sdb1", "tmpfs"]);
    }

    #[test]
    fn test_user_mountable_devices_filters_on_user_option() {
        let table = write_table(SAMPLE_FSTAB);
        let sources = user_mountable_devices(table.path()).unwrap();
        assert_eq!(sources, vec!["/dev/sdc1", "/dev/sdd1"]);
    }
}
