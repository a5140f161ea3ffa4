//! Filesystem formatting dispatch.
//!
//! Each in-table partition with a filesystem kind is formatted on its
//! bound device. The ext family gets a tune2fs pass; the root role
//! additionally gets a fixed immutable profile so repeated builds
//! produce byte-stable superblock metadata.

use crate::plan::{FilesystemKind, Partition, PartitionRole};
use crate::process::Cmd;
use anyhow::{bail, Result};

/// Format one partition according to its filesystem kind.
///
/// `FilesystemKind::None` is a no-op. An unknown kind is reported by the
/// caller and must not reach this function's tool invocations.
pub fn format_partition(p: &Partition) -> Result<()> {
    if p.filesystem.is_none() {
        return Ok(());
    }
    let device = match p.device {
        Some(ref d) => d.as_str(),
        None => bail!("partition {} has no bound device", p.number),
    };
    match p.filesystem {
        FilesystemKind::None => Ok(()),
        FilesystemKind::Vfat => format_vfat(p, device),
        FilesystemKind::Ext2 | FilesystemKind::Ext4 => format_ext(p, device),
        FilesystemKind::Btrfs => format_btrfs(p, device),
        FilesystemKind::Unknown(ref kind) => {
            bail!("unknown filesystem '{}' on partition {}", kind, p.number)
        }
    }
}

fn format_vfat(p: &Partition, device: &str) -> Result<()> {
    let mut cmd = Cmd::new("mkfs.vfat");
    if !p.label.is_empty() {
        cmd = cmd.args(["-n", &p.label]);
    }
    cmd.arg(device).error_msg("mkfs.vfat failed").run()?;
    Ok(())
}

fn format_ext(p: &Partition, device: &str) -> Result<()> {
    Cmd::new("mke2fs")
        .args(["-q", "-t", p.filesystem.as_str()])
        .args(["-b", "4096", "-i", "4096", "-I", "128"])
        .arg(device)
        .error_msg("mke2fs failed")
        .run()?;

    let mut tune = Cmd::new("tune2fs").args(["-e", "remount-ro"]);
    if !p.label.is_empty() {
        tune = tune.args(["-L", &p.label]);
    }
    if p.role == PartitionRole::Root {
        tune = tune.args([
            "-U", "clear", "-T", "20091119110000", "-c", "0", "-i", "0", "-m", "0",
            "-r", "0",
        ]);
    }
    tune.arg(device).error_msg("tune2fs failed").run()?;
    Ok(())
}

fn format_btrfs(p: &Partition, device: &str) -> Result<()> {
    let mut cmd = Cmd::new("mkfs.btrfs");
    if !p.label.is_empty() {
        cmd = cmd.args(["--label", &p.label]);
    }
    cmd.arg(device).error_msg("mkfs.btrfs failed").run()?;
    Ok(())
}
