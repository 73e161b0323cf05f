//! Device property queries through the udev database.
//!
//! This module runs the external device-database query tool for a single
//! device node and parses its line-oriented `NAME=value` output into an
//! ordered property set.

use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

/// Default program used to query device properties, resolved via the search
/// path.
pub const UDEVADM_PROGRAM: &str = "udevadm";

/// A single `name=value` device attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Attribute name (e.g., "DEVNAME", "ID_BUS").
    pub name: String,
    /// Attribute value; may be empty, but never absent.
    pub value: String,
}

/// Parses one `name=value` record, splitting on the first `=`.
///
/// Yields nothing for a line without `=`.
pub fn parse_property(line: &str) -> Option<Property> {
    let (name, value) = line.split_once('=')?;
    Some(Property {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// The attribute set of one device, in query output order.
///
/// Names are not unique by construction; lookups return the first match.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    properties: Vec<Property>,
}

impl PropertySet {
    /// Parses a property set from query output text.
    ///
    /// The first line without `=` ends the parse; later lines are not
    /// consumed.
    pub fn from_text(text: &str) -> Self {
        Self {
            properties: text.lines().map_while(parse_property).collect(),
        }
    }

    /// Returns the value of the first property with the given name, or `None`
    /// if the device has no such attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .map(|property| property.value.as_str())
    }

    /// Returns true if the named property matches the expectation.
    ///
    /// An absent property matches only the `None` expectation; a present one
    /// compares by value equality. "No such attribute" and "expected absent"
    /// are deliberately the same thing here.
    pub fn matches(&self, name: &str, expected: Option<&str>) -> bool {
        self.get(name) == expected
    }

    /// Returns true if the set holds no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Number of properties in the set.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Iterates the properties in query output order.
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }
}

/// Queries the device database for one device node's attribute set.
///
/// Runs `<program> info -q property -n <node>` and consumes its standard
/// output incrementally, one newline-terminated record at a time. A record
/// without `=` ends the parse. The child is reaped no matter how the parse
/// loop exits.
///
/// Returns `None` if the query program could not be started or produced zero
/// valid properties.
pub fn fetch_device_properties(program: &Path, node: &Path) -> Option<PropertySet> {
    let mut child = match Command::new(program)
        .args(["info", "-q", "property", "-n"])
        .arg(node)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            debug!("property query for {} failed to start: {err}", node.display());
            return None;
        }
    };

    let mut properties = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                // A tail without a newline is not a complete record; the
                // stream ended mid-line and the fragment is discarded.
                Ok(_) if !line.ends_with(b"\n") => break,
                Ok(_) => {
                    line.pop();
                    let record = String::from_utf8_lossy(&line);
                    match parse_property(&record) {
                        Some(property) => properties.push(property),
                        // An unparsable record ends the stream.
                        None => break,
                    }
                }
                Err(err) => {
                    debug!("property query for {} failed: {err}", node.display());
                    break;
                }
            }
        }
    }

    // The reader going out of scope closed our end of the pipe; reap the
    // child even when the loop broke early.
    let _ = child.wait();

    if properties.is_empty() {
        None
    } else {
        Some(PropertySet { properties })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    const SAMPLE_QUERY_OUTPUT: &str = "DEVNAME=/dev/sdb1\n\
         DEVTYPE=partition\n\
         ID_BUS=usb\n\
         ID_FS_LABEL=Backup2TB\n";

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_parse_property_splits_on_first_equals() {
        let property = parse_property("ID_FS_LABEL_ENC=disk\\x20a=b").unwrap();
        assert_eq!(property.name, "ID_FS_LABEL_ENC");
        assert_eq!(property.value, "disk\\x20a=b");
    }

    #[test]
    fn test_parse_property_allows_empty_value() {
        let property = parse_property("ID_FS_LABEL=").unwrap();
        assert_eq!(property.name, "ID_FS_LABEL");
        assert_eq!(property.value, "");
    }

    #[test]
    fn test_parse_property_rejects_line_without_equals() {
        assert!(parse_property("P: /devices/pci0000:00").is_none());
        assert!(parse_property("").is_none());
    }

    #[test]
    fn test_lookup_round_trips_parsed_lines() {
        let set = PropertySet::from_text(SAMPLE_QUERY_OUTPUT);
        assert_eq!(set.get("DEVNAME"), Some("/dev/sdb1"));
        assert_eq!(set.get("DEVTYPE"), Some("partition"));
        assert_eq!(set.get("ID_FS_LABEL"), Some("Backup2TB"));
    }

    #[test]
    fn test_lookup_returns_first_match() {
        let set = PropertySet::from_text("NAME=first\nNAME=second\n");
        assert_eq!(set.get("NAME"), Some("first"));
    }

    #[test]
    fn test_unparsable_line_ends_the_stream() {
        let set = PropertySet::from_text("DEVNAME=/dev/sr0\ngarbage record\nID_BUS=usb\n");
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("DEVNAME"), Some("/dev/sr0"));
        assert_eq!(set.get("ID_BUS"), None);
    }

    #[test]
    fn test_matches_absent_iff_lookup_absent() {
        let set = PropertySet::from_text(SAMPLE_QUERY_OUTPUT);
        assert!(set.matches("ID_CDROM_MEDIA", None));
        assert!(!set.matches("DEVTYPE", None));
        assert!(set.matches("DEVTYPE", Some("partition")));
        assert!(!set.matches("DEVTYPE", Some("disk")));
    }

    #[test]
    fn test_fetch_collects_properties_from_query_output() {
        let dir = tempfile::tempdir().unwrap();
        let program = write_script(
            dir.path(),
            "udevadm",
            "#!/bin/sh\nprintf 'DEVNAME=/dev/sdz1\\nDEVTYPE=partition\\n'\n",
        );

        let set = fetch_device_properties(&program, Path::new("/dev/sdz1")).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("DEVNAME"), Some("/dev/sdz1"));
        assert_eq!(set.get("DEVTYPE"), Some("partition"));
    }

    #[test]
    fn test_fetch_stops_at_unparsable_record() {
        let dir = tempfile::tempdir().unwrap();
        let program = write_script(
            dir.path(),
            "udevadm",
            "#!/bin/sh\nprintf 'DEVNAME=/dev/sdz1\\nno equals here\\nID_BUS=usb\\n'\n",
        );

        let set = fetch_device_properties(&program, Path::new("/dev/sdz1")).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("ID_BUS"), None);
    }

    #[test]
    fn test_fetch_discards_partial_trailing_record() {
        let dir = tempfile::tempdir().unwrap();
        let program = write_script(
            dir.path(),
            "udevadm",
            "#!/bin/sh\nprintf 'DEVNAME=/dev/sdz1\\nDEVTYPE=partition'\n",
        );

        let set = fetch_device_properties(&program, Path::new("/dev/sdz1")).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("DEVTYPE"), None);
    }

    #[test]
    fn test_fetch_returns_none_when_program_cannot_start() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-tool");
        assert!(fetch_device_properties(&missing, Path::new("/dev/sdz1")).is_none());
    }

    #[test]
    fn test_fetch_returns_none_for_zero_properties() {
        let dir = tempfile::tempdir().unwrap();
        let program = write_script(dir.path(), "udevadm", "#!/bin/sh\nexit 0\n");
        assert!(fetch_device_properties(&program, Path::new("/dev/sdz1")).is_none());
    }
}
