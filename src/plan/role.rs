//! Partition role registry.
//!
//! Maps a symbolic partition role ("efi", "data", "root", ...) to its
//! canonical GPT type GUID. Extending the table is a data change only:
//! add a variant, a parse arm, and a GUID.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic purpose of a partition, selecting its GPT type GUID.
///
/// `Blank` marks a deliberate gap: no type GUID, no offset, no device,
/// no formatting, no validation. `Unknown` preserves an unrecognized
/// role string so it can be reported without aborting the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PartitionRole {
    Blank,
    Efi,
    Bios,
    Data,
    Root,
    Swap,
    Home,
    Reserved,
    Unknown(String),
}

impl PartitionRole {
    /// Canonical GPT type GUID for this role.
    ///
    /// `Blank` and `Unknown` carry no GUID; the caller decides whether
    /// that is a skip (blank) or a reportable condition (unknown).
    pub fn type_guid(&self) -> Option<&'static str> {
        match self {
            PartitionRole::Efi => Some("C12A7328-F81F-11D2-BA4B-00A0C93EC93B"),
            PartitionRole::Bios => Some("21686148-6449-6E6F-744E-656564454649"),
            PartitionRole::Data => Some("0FC63DAF-8483-4772-8E79-3D69D8477DE4"),
            PartitionRole::Root => Some("4F68BCE3-E8CD-4DB1-96E7-FBCAF984B709"),
            PartitionRole::Swap => Some("0657FD6D-A4AB-43C4-84E5-0933C84B4F4F"),
            PartitionRole::Home => Some("933AC7E1-2EB4-4F13-B844-0E14E2AEF915"),
            PartitionRole::Reserved => Some("8DA63339-0007-60C0-C436-083AC8230908"),
            PartitionRole::Blank | PartitionRole::Unknown(_) => None,
        }
    }

    /// True for the sentinel "blank" role (and the empty string form).
    pub fn is_blank(&self) -> bool {
        matches!(self, PartitionRole::Blank)
    }

    /// String form as written in plan files.
    pub fn as_str(&self) -> &str {
        match self {
            PartitionRole::Blank => "blank",
            PartitionRole::Efi => "efi",
            PartitionRole::Bios => "bios",
            PartitionRole::Data => "data",
            PartitionRole::Root => "root",
            PartitionRole::Swap => "swap",
            PartitionRole::Home => "home",
            PartitionRole::Reserved => "reserved",
            PartitionRole::Unknown(s) => s,
        }
    }
}

impl Default for PartitionRole {
    fn default() -> Self {
        PartitionRole::Blank
    }
}

impl From<String> for PartitionRole {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "blank" => PartitionRole::Blank,
            "efi" => PartitionRole::Efi,
            "bios" => PartitionRole::Bios,
            "data" => PartitionRole::Data,
            "root" => PartitionRole::Root,
            "swap" => PartitionRole::Swap,
            "home" => PartitionRole::Home,
            "reserved" => PartitionRole::Reserved,
            _ => PartitionRole::Unknown(s),
        }
    }
}

impl From<PartitionRole> for String {
    fn from(role: PartitionRole) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for PartitionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
