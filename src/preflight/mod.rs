//! Preflight checks for build validation.
//!
//! Validates that the host system has the partitioning and filesystem
//! tools before building. This prevents cryptic errors halfway through
//! an image build.

use anyhow::{bail, Result};

/// Required host tools for building and verifying disk images.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("sgdisk", "gptfdisk"),
    ("kpartx", "multipath-tools"),
    ("mkfs.vfat", "dosfstools"),
    ("mke2fs", "e2fsprogs"),
    ("tune2fs", "e2fsprogs"),
    ("mkfs.btrfs", "btrfs-progs"),
    ("uuidgen", "util-linux"),
    ("mount", "util-linux"),
    ("umount", "util-linux"),
    ("df", "coreutils"),
];

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Check that specific tools are available.
///
/// Returns an error listing every missing tool and its package, so one
/// run surfaces the whole install burden.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check that all standard image-building tools are available.
pub fn check_host_tools() -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)
}
