//! Loop device attachment and per-partition device binding via kpartx.

use crate::plan::Plan;
use crate::process::Cmd;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Attach the image and bind each in-table partition's device path.
///
/// kpartx maps the image to `/dev/mapper/<loop>p<number>` entries; the
/// loop name is recovered from the tool's listing.
pub fn bind_devices(image: &Path, plan: &mut Plan) -> Result<()> {
    let result = Cmd::new("kpartx")
        .args(["-a", "-v"])
        .arg_path(image)
        .error_msg("kpartx failed to attach image")
        .run()?;
    let loop_name = parse_loop_name(&result.stdout)
        .context("parsing kpartx attach output")?;

    for p in &mut plan.partitions {
        if !p.in_table() || p.filesystem.is_none() {
            continue;
        }
        p.device = Some(format!("/dev/mapper/{}p{}", loop_name, p.number));
    }
    Ok(())
}

/// Recover the loop name for an already-attached image.
pub fn attached_loop_name(image: &Path) -> Result<String> {
    let result = Cmd::new("kpartx")
        .arg("-l")
        .arg_path(image)
        .error_msg("kpartx failed to list mappings")
        .run()?;
    parse_loop_name(&result.stdout).context("parsing kpartx listing")
}

/// Detach the image's device mappings.
pub fn detach_devices(image: &Path) -> Result<()> {
    Cmd::new("kpartx")
        .arg("-d")
        .arg_path(image)
        .error_msg("kpartx failed to detach image")
        .run()?;
    Ok(())
}

/// Extract the loop name ("loop0") from kpartx output.
///
/// Both `kpartx -av` and `kpartx -l` emit lines of the form
/// `add map loop0p1 (253:0): 0 262144 linear /dev/loop0 4096`; the
/// backing device is the 8th whitespace token.
pub fn parse_loop_name(output: &str) -> Result<String> {
    let token = output.split_whitespace().nth(7).ok_or_else(|| {
        anyhow::anyhow!("kpartx output too short: {:?}", output.trim())
    })?;
    let name = token.trim_start_matches("/dev/");
    if name.is_empty() {
        bail!("kpartx output carried no device token: {:?}", output.trim());
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{FilesystemKind, Partition, PartitionRole};

    const KPARTX_ADD: &str = "\
add map loop0p1 (253:0): 0 262144 linear /dev/loop0 4096
add map loop0p3 (253:1): 0 4194304 linear /dev/loop0 266240
";

    #[test]
    fn test_parse_loop_name_from_add_output() {
        assert_eq!(parse_loop_name(KPARTX_ADD).unwrap(), "loop0");
    }

    #[test]
    fn test_parse_loop_name_short_output_fails() {
        assert!(parse_loop_name("").is_err());
        assert!(parse_loop_name("add map\n").is_err());
    }

    #[test]
    fn test_device_template() {
        let mut plan = Plan {
            partitions: vec![
                Partition {
                    number: 3,
                    label: "ROOT".to_string(),
                    role: PartitionRole::Root,
                    type_guid: None,
                    guid: None,
                    device: None,
                    offset: 266240,
                    length: 4194304,
                    filesystem: FilesystemKind::Ext4,
                    mount_path: None,
                    hybrid: false,
                    files: Vec::new(),
                },
            ],
        };
        // binding applies the same template kpartx uses
        let loop_name = parse_loop_name(KPARTX_ADD).unwrap();
        for p in &mut plan.partitions {
            p.device = Some(format!("/dev/mapper/{}p{}", loop_name, p.number));
        }
        assert_eq!(
            plan.partitions[0].device.as_deref(),
            Some("/dev/mapper/loop0p3")
        );
    }
}
