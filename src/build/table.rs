//! Backing file creation and GPT table writing via sgdisk.

use crate::plan::{layout, Plan};
use crate::process::Cmd;
use anyhow::{bail, Result};
use std::fs;
use std::path::Path;

/// At most this many partitions may appear in the hybrid MBR.
pub const MAX_HYBRID_PARTITIONS: usize = 3;

/// Create the backing image file and set its length once.
///
/// The size comes from [`layout::image_size_bytes`]; the file is never
/// resized after this point.
pub fn create_image(image: &Path, plan: &Plan) -> Result<u64> {
    let size = layout::image_size_bytes(plan);
    let file = fs::File::create(image)?;
    file.set_len(size)?;
    Ok(size)
}

/// Build the full sgdisk argument list for a resolved plan.
///
/// Fails before any external call if the hybrid cap is exceeded; a bad
/// plan must never reach sgdisk.
pub fn sgdisk_args(image: &Path, plan: &Plan) -> Result<Vec<String>> {
    let mut args = vec![image.to_string_lossy().into_owned()];
    let mut hybrids: Vec<u32> = Vec::new();

    for p in &plan.partitions {
        if !p.in_table() {
            continue;
        }
        args.push(format!("--new={}:{}:+{}", p.number, p.offset, p.length));
        args.push(format!("--change-name={}:{}", p.number, p.label));
        if let Some(ref type_guid) = p.type_guid {
            args.push(format!("--typecode={}:{}", p.number, type_guid));
        }
        if let Some(ref guid) = p.guid {
            args.push(format!("--partition-guid={}:{}", p.number, guid));
        }
        if p.hybrid {
            hybrids.push(p.number);
        }
    }

    if !hybrids.is_empty() {
        if hybrids.len() > MAX_HYBRID_PARTITIONS {
            bail!(
                "{} partitions marked hybrid, the hybrid MBR holds at most {}",
                hybrids.len(),
                MAX_HYBRID_PARTITIONS
            );
        }
        let joined = hybrids
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(":");
        args.push(format!("-h={}", joined));
    }

    Ok(args)
}

/// Invoke sgdisk with a prebuilt argument list.
pub fn run_sgdisk(args: &[String]) -> Result<()> {
    println!("  sgdisk {}", args.join(" "));
    Cmd::new("sgdisk")
        .args(args)
        .error_msg("sgdisk failed to write partition table")
        .run()?;
    Ok(())
}
