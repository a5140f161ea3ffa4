//! Image builder orchestration.
//!
//! Translates a resolved plan into ordered external-tool invocations:
//! backing file creation, partition table writing, device attachment,
//! formatting, mounting, file seeding, unmounting. Tool failures are
//! reported and the run continues to the next step, so a single failure
//! does not hide later diagnostics. The only hard stop is a bad plan
//! (hybrid overflow), which must never reach sgdisk.

pub mod devices;
pub mod files;
pub mod format;
pub mod table;

use crate::plan::Plan;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Knobs for the build phase.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Detach the device mappings after unmounting. Off by default so
    /// the verify phase can reuse the attached devices.
    pub detach: bool,
}

/// Build the image described by a resolved plan.
///
/// Mutates the plan in place: device and mount path bindings are filled
/// in as the external tools report them.
pub fn build_image(plan: &mut Plan, image: &Path, opts: &BuildOptions) -> Result<()> {
    println!("=== Building Disk Image ===");

    let size = table::create_image(image, plan)
        .with_context(|| format!("creating image '{}'", image.display()))?;
    println!("  Image: {} ({} bytes)", image.display(), size);

    // A plan that cannot produce a valid argument list (hybrid overflow)
    // must fail before any external call.
    let sgdisk_args = table::sgdisk_args(image, plan)?;
    report_step("partition table", table::run_sgdisk(&sgdisk_args));

    report_step("device binding", devices::bind_devices(image, plan));
    report_step("mount points", files::assign_mount_paths(plan));

    for p in &plan.partitions {
        if !p.is_formatted() {
            continue;
        }
        report_step(
            &format!("formatting partition {}", p.number),
            format::format_partition(p),
        );
    }

    report_step("mounting", files::mount_partitions(plan));

    match plan.to_json() {
        Ok(json) => println!("Resolved plan:\n{}", json),
        Err(e) => println!("  plan dump failed: {}", e),
    }

    report_step("seeding files", files::create_files(plan));
    files::unmount_partitions(plan);

    if opts.detach {
        report_step("detaching devices", devices::detach_devices(image));
    }

    if let Ok(digest) = sha256_file(image) {
        println!("  Image sha256: {}", digest);
    }
    println!("=== Disk Image Built ===\n");
    Ok(())
}

/// Report a step failure and continue; the image may be half-built, but
/// later verification diagnostics are worth more than an early abort.
fn report_step<T>(step: &str, result: Result<T>) {
    if let Err(e) = result {
        println!("  {} failed: {:#}", step, e);
    }
}

/// Streaming SHA-256 of a file, hex encoded.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("opening '{}' for hashing", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 65536];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sha256_file_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"abc").unwrap();
        drop(f);

        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
