//! Boot configuration patching.
//!
//! Substitutes the built root device into a boot-config template so a
//! boot tool pointed at the output directory sees the real device path.

use crate::build::devices;
use crate::plan::Plan;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed output filename inside the boot-config directory.
pub const BOOT_CONFIG_NAME: &str = "boot.cfg";

/// Placeholder replaced with the root device path.
const DEVICE_PLACEHOLDER: &str = "$DEVICE";

/// Device path of the partition labeled `ROOT` on the attached image.
pub fn pick_root_device(plan: &Plan, image: &Path) -> Result<String> {
    let number = plan
        .partitions
        .iter()
        .find(|p| p.label == "ROOT")
        .map(|p| p.number);
    let number = match number {
        Some(n) => n,
        None => bail!("no partition labeled ROOT in the plan"),
    };
    let loop_name = devices::attached_loop_name(image)?;
    Ok(format!("/dev/mapper/{}p{}", loop_name, number))
}

/// Rewrite the template with the device substituted and write it to
/// `<out_dir>/boot.cfg`.
pub fn patch_boot_config(template: &Path, out_dir: &Path, device: &str) -> Result<PathBuf> {
    let text = fs::read_to_string(template)
        .with_context(|| format!("reading boot-config template '{}'", template.display()))?;
    let patched = substitute_device(&text, device);
    let out_path = out_dir.join(BOOT_CONFIG_NAME);
    fs::write(&out_path, patched)
        .with_context(|| format!("writing boot config '{}'", out_path.display()))?;
    Ok(out_path)
}

/// Replace every `$DEVICE` occurrence with the device string.
pub fn substitute_device(template: &str, device: &str) -> String {
    template.replace(DEVICE_PLACEHOLDER, device)
}
