//! Partition plan model and loading.
//!
//! A plan is an ordered list of partition records read from a TOML
//! description. Two documents may be loaded per run: the authoritative
//! plan ("what to build") and an expected plan ("what to verify"),
//! reconciled by partition number via [`Plan::adopt_bindings`].

pub mod layout;
pub mod role;

pub use role::PartitionRole;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem to create on a partition.
///
/// `None` means reserved space, never formatted. `Unknown` preserves an
/// unrecognized kind string so formatting can report it and move on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilesystemKind {
    None,
    Vfat,
    Ext2,
    Ext4,
    Btrfs,
    Unknown(String),
}

impl FilesystemKind {
    pub fn is_none(&self) -> bool {
        matches!(self, FilesystemKind::None)
    }

    /// String form as written in plan files and reported by `df -T`.
    pub fn as_str(&self) -> &str {
        match self {
            FilesystemKind::None => "",
            FilesystemKind::Vfat => "vfat",
            FilesystemKind::Ext2 => "ext2",
            FilesystemKind::Ext4 => "ext4",
            FilesystemKind::Btrfs => "btrfs",
            FilesystemKind::Unknown(s) => s,
        }
    }
}

impl Default for FilesystemKind {
    fn default() -> Self {
        FilesystemKind::None
    }
}

impl From<String> for FilesystemKind {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "blank" => FilesystemKind::None,
            "vfat" => FilesystemKind::Vfat,
            "ext2" => FilesystemKind::Ext2,
            "ext4" => FilesystemKind::Ext4,
            "btrfs" => FilesystemKind::Btrfs,
            _ => FilesystemKind::Unknown(s),
        }
    }
}

impl From<FilesystemKind> for String {
    fn from(kind: FilesystemKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FilesystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file to seed onto a partition once it is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    pub name: String,
    /// Directory prefix below the mount point; may be empty.
    #[serde(default)]
    pub path: String,
    /// Text lines, joined with `\n` and no trailing newline on write.
    /// Absent means "create an empty file".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<String>>,
}

impl FileSpec {
    /// Full path of the file under `mount_path`, eliding empty segments.
    pub fn full_path(&self, mount_path: &Path) -> PathBuf {
        let mut p = mount_path.to_path_buf();
        if !self.path.is_empty() {
            p.push(&self.path);
        }
        p.push(&self.name);
        p
    }

    /// Expected on-disk bytes, if contents were specified.
    pub fn joined_contents(&self) -> Option<String> {
        self.contents.as_ref().map(|lines| lines.join("\n"))
    }
}

/// One planned partition slot.
///
/// `offset`, `type_guid`, `guid` are filled in by the layout planner;
/// `device` and `mount_path` are bound by the image builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Partition {
    /// Unique, 1-based row position used by sgdisk.
    pub number: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub role: PartitionRole,
    /// Derived from `role` when absent; immutable once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_guid: Option<String>,
    /// Partition GUID, generated once when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Block device path, bound after attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Start sector, assigned by the planner.
    #[serde(default)]
    pub offset: u64,
    /// Requested size in sectors.
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub filesystem: FilesystemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<PathBuf>,
    /// Include in the legacy hybrid MBR; at most 3 per plan.
    #[serde(default)]
    pub hybrid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "file")]
    pub files: Vec<FileSpec>,
}

impl Partition {
    /// A blank partition is a deliberate gap that no stage touches.
    pub fn is_blank(&self) -> bool {
        self.role.is_blank()
    }

    /// Occupies a row in the partition table: non-blank with real size.
    pub fn in_table(&self) -> bool {
        !self.is_blank() && self.length > 0
    }

    /// Gets a filesystem, a device, and a mount point.
    pub fn is_formatted(&self) -> bool {
        self.in_table() && !self.filesystem.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanDoc {
    #[serde(default, rename = "partition")]
    partitions: Vec<Partition>,
}

/// An ordered partition plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub partitions: Vec<Partition>,
}

impl Plan {
    /// Load a plan from a TOML description file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading plan '{}'", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("parsing plan '{}'", path.display()))
    }

    /// Parse a plan from TOML text and check its structural invariants.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let doc: PlanDoc = toml::from_str(text).context("malformed plan document")?;
        let plan = Plan {
            partitions: doc.partitions,
        };
        plan.check_numbers()?;
        Ok(plan)
    }

    /// Partition numbers must be positive and unique.
    fn check_numbers(&self) -> Result<()> {
        let mut seen = Vec::new();
        for p in &self.partitions {
            if p.number == 0 {
                bail!("partition number must be positive");
            }
            if seen.contains(&p.number) {
                bail!("duplicate partition number {}", p.number);
            }
            seen.push(p.number);
        }
        Ok(())
    }

    /// Look up a partition by number.
    pub fn by_number(&self, number: u32) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.number == number)
    }

    /// Copy resolved `device` and `mount_path` bindings from a built plan
    /// into this (expected) plan, matching by partition number.
    ///
    /// The verifier never re-derives devices; it uses these bindings so
    /// that verification order is decoupled from construction order.
    pub fn adopt_bindings(&mut self, built: &Plan) {
        for e in &mut self.partitions {
            if let Some(a) = built.partitions.iter().find(|a| a.number == e.number) {
                e.device = a.device.clone();
                e.mount_path = a.mount_path.clone();
            }
        }
    }

    /// Pretty JSON rendering of the resolved plan, for the build log.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.partitions).context("serializing plan")
    }
}
