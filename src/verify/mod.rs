//! Verification of a built image against an expected plan.
//!
//! The verifier never trusts builder state: every tracked fact is
//! re-derived from the live image via sgdisk and df, then diffed
//! against the plan. Each partition is failed on its first mismatch,
//! but checking continues with the remaining partitions so one run
//! surfaces every partition's first problem. The only builder-supplied
//! state is the device/mount bindings adopted by partition number.

pub mod parse;

use crate::plan::{layout, FileSpec, Partition, Plan};
use crate::process::Cmd;
use anyhow::Result;
use parse::PartitionInfo;
use std::fs;
use std::path::Path;

/// Dump the live partition table, the mount table, and every non-blank
/// partition's information block before validation, so a mismatch
/// report always sits next to what the image really holds. Tool
/// failures are reported and skipped; this is diagnostics, not a check.
pub fn print_live_state(expected: &Plan, image: &Path) {
    match Cmd::new("sgdisk").arg("-p").arg_path(image).allow_fail().run() {
        Ok(r) => println!("{}", r.stdout),
        Err(e) => println!("  sgdisk -p failed: {:#}", e),
    }
    match read_mounts() {
        Ok(mounts) => println!("{}", mounts),
        Err(e) => println!("  reading mount table failed: {}", e),
    }
    for p in &expected.partitions {
        if p.is_blank() {
            continue;
        }
        match Cmd::new("sgdisk")
            .args(["-i", &p.number.to_string()])
            .arg_path(image)
            .allow_fail()
            .run()
        {
            Ok(r) => println!("{}", r.stdout),
            Err(e) => println!("  sgdisk -i {} failed: {:#}", p.number, e),
        }
    }
}

fn read_mounts() -> std::io::Result<String> {
    fs::read_to_string("/proc/mounts")
}

/// Check every non-blank partition of the expected plan against the
/// live partition table and filesystems. Returns overall success.
pub fn validate_partitions(expected: &Plan, image: &Path) -> bool {
    let mut ok = true;
    for p in &expected.partitions {
        if p.is_blank() {
            continue;
        }
        if !validate_partition(p, image) {
            ok = false;
        }
    }
    ok
}

fn validate_partition(p: &Partition, image: &Path) -> bool {
    let info = match query_partition(p.number, image) {
        Ok(info) => info,
        Err(e) => {
            println!("Could not verify partition {}: {:#}", p.number, e);
            return false;
        }
    };

    if let Some(mismatch) = first_mismatch(p, &info) {
        println!("Partition {}: {}", p.number, mismatch);
        return false;
    }

    if p.filesystem.is_none() {
        return true;
    }
    let device = match p.device {
        Some(ref d) => d.as_str(),
        None => {
            println!("Could not verify partition {}: no bound device", p.number);
            return false;
        }
    };
    match query_filesystem_type(device) {
        Ok(actual) if actual == p.filesystem.as_str() => true,
        Ok(actual) => {
            println!(
                "Partition {}: filesystem does not match! expected {} actual {}",
                p.number, p.filesystem, actual
            );
            false
        }
        Err(e) => {
            println!(
                "Could not verify filesystem of partition {}: {:#}",
                p.number, e
            );
            false
        }
    }
}

/// Query the live partition table for one row.
fn query_partition(number: u32, image: &Path) -> Result<PartitionInfo> {
    let result = Cmd::new("sgdisk")
        .args(["-i", &number.to_string()])
        .arg_path(image)
        .error_msg(format!("sgdisk -i {} failed", number))
        .run()?;
    parse::parse_sgdisk_info(&result.stdout)
}

/// Query the live filesystem type for a device.
fn query_filesystem_type(device: &str) -> Result<String> {
    let result = Cmd::new("df")
        .args(["-T", device])
        .error_msg(format!("df -T {} failed", device))
        .run()?;
    parse::parse_df_type(&result.stdout)
}

/// First tracked field that differs between plan and live table.
///
/// Sector counts are compared against the expected length realigned to
/// the sector size, the same alignment the planner applied; the stored
/// offset is deliberately not consulted.
pub fn first_mismatch(expected: &Partition, actual: &PartitionInfo) -> Option<String> {
    if let Some(ref type_guid) = expected.type_guid {
        if !type_guid.eq_ignore_ascii_case(&actual.type_guid) {
            return Some(format!(
                "type GUID does not match! expected {} actual {}",
                type_guid, actual.type_guid
            ));
        }
    }
    if expected.label != actual.label {
        return Some(format!(
            "label does not match! expected '{}' actual '{}'",
            expected.label, actual.label
        ));
    }
    let expected_sectors = layout::align(expected.length, layout::SECTOR_SIZE);
    if expected_sectors != actual.sectors {
        return Some(format!(
            "sector count does not match! expected {} actual {}",
            expected_sectors, actual.sectors
        ));
    }
    None
}

/// Check that every seeded file exists with its expected bytes.
pub fn validate_files(expected: &Plan) -> bool {
    file_failures(expected) == 0
}

/// Number of seeded files that failed their check. Every partition's
/// files are checked even after a failure, so one run reports them all.
fn file_failures(expected: &Plan) -> usize {
    let mut failures = 0;
    for p in &expected.partitions {
        if p.files.is_empty() {
            continue;
        }
        let mount = match p.mount_path {
            Some(ref m) => m.as_path(),
            None => {
                println!(
                    "Could not verify files of partition {}: no mount path",
                    p.number
                );
                failures += 1;
                continue;
            }
        };
        for file in &p.files {
            if !validate_file(mount, file) {
                failures += 1;
            }
        }
    }
    failures
}

fn validate_file(mount: &Path, file: &FileSpec) -> bool {
    let path = file.full_path(mount);
    if !path.exists() {
        println!("File does not exist! {}", path.display());
        return false;
    }
    let expected = match file.joined_contents() {
        Some(c) => c,
        None => return true,
    };
    let actual = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("Could not read file {}: {}", path.display(), e);
            return false;
        }
    };
    if actual != expected.as_bytes() {
        println!(
            "Contents of file {} do not match!\nexpected: {:?}\nactual:   {:?}",
            path.display(),
            expected,
            String::from_utf8_lossy(&actual)
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{FileSpec, FilesystemKind, PartitionRole};
    use std::path::PathBuf;

    fn expected_partition() -> Partition {
        Partition {
            number: 1,
            label: "ROOT".to_string(),
            role: PartitionRole::Data,
            type_guid: Some("0FC63DAF-8483-4772-8E79-3D69D8477DE4".to_string()),
            guid: None,
            device: None,
            offset: 4096,
            length: 4194304,
            filesystem: FilesystemKind::Ext4,
            mount_path: None,
            hybrid: false,
            files: Vec::new(),
        }
    }

    fn live_info() -> PartitionInfo {
        PartitionInfo {
            type_guid: "0FC63DAF-8483-4772-8E79-3D69D8477DE4".to_string(),
            unique_guid: "8F861524-D96E-47DC-B95D-E7E06F194E0E".to_string(),
            sectors: 4194304,
            label: "ROOT".to_string(),
        }
    }

    #[test]
    fn test_matching_partition_has_no_mismatch() {
        assert_eq!(first_mismatch(&expected_partition(), &live_info()), None);
    }

    #[test]
    fn test_type_guid_comparison_is_case_insensitive() {
        let mut expected = expected_partition();
        expected.type_guid =
            Some("0fc63daf-8483-4772-8e79-3d69d8477de4".to_string());
        assert_eq!(first_mismatch(&expected, &live_info()), None);
    }

    #[test]
    fn test_label_drift_is_named() {
        let mut info = live_info();
        info.label = "DRIFTED".to_string();
        let msg = first_mismatch(&expected_partition(), &info).unwrap();
        assert!(msg.contains("label does not match"));
        assert!(msg.contains("ROOT"));
        assert!(msg.contains("DRIFTED"));
    }

    #[test]
    fn test_sector_count_uses_realigned_length() {
        let mut expected = expected_partition();
        expected.length = 100; // not sector-aligned
        let mut info = live_info();
        info.sectors = 512;
        assert_eq!(first_mismatch(&expected, &info), None);

        info.sectors = 100;
        assert!(first_mismatch(&expected, &info)
            .unwrap()
            .contains("sector count"));
    }

    #[test]
    fn test_missing_expected_type_guid_is_unchecked() {
        let mut expected = expected_partition();
        expected.type_guid = None;
        assert_eq!(first_mismatch(&expected, &live_info()), None);
    }

    #[test]
    fn test_print_live_state_survives_missing_image_and_tools() {
        // diagnostics must never fail the run, whatever the host has
        let plan = Plan {
            partitions: vec![expected_partition()],
        };
        print_live_state(&plan, Path::new("/nonexistent/image.img"));
    }

    #[test]
    fn test_validate_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        std::fs::write(dir.path().join("etc/hello.txt"), "a\nb").unwrap();

        let mut p = expected_partition();
        p.mount_path = Some(PathBuf::from(dir.path()));
        p.files = vec![FileSpec {
            name: "hello.txt".to_string(),
            path: "etc".to_string(),
            contents: Some(vec!["a".to_string(), "b".to_string()]),
        }];
        let plan = Plan {
            partitions: vec![p],
        };
        assert!(validate_files(&plan));
    }

    #[test]
    fn test_validate_files_detects_content_drift() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "a\nb\n").unwrap();

        let mut p = expected_partition();
        p.mount_path = Some(PathBuf::from(dir.path()));
        p.files = vec![FileSpec {
            name: "hello.txt".to_string(),
            path: String::new(),
            contents: Some(vec!["a".to_string(), "b".to_string()]),
        }];
        let plan = Plan {
            partitions: vec![p],
        };
        // trailing newline on disk must fail the byte-for-byte check
        assert!(!validate_files(&plan));
    }

    #[test]
    fn test_validate_files_checks_every_partition_after_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        // partition 1's file is absent entirely
        let mut first = expected_partition();
        first.number = 1;
        first.mount_path = Some(PathBuf::from(dir.path()));
        first.files = vec![FileSpec {
            name: "absent.txt".to_string(),
            path: String::new(),
            contents: None,
        }];
        // partition 2's file exists with drifted bytes
        std::fs::write(dir.path().join("drifted.txt"), "a\nb\n").unwrap();
        let mut second = expected_partition();
        second.number = 2;
        second.mount_path = Some(PathBuf::from(dir.path()));
        second.files = vec![FileSpec {
            name: "drifted.txt".to_string(),
            path: String::new(),
            contents: Some(vec!["a".to_string(), "b".to_string()]),
        }];

        let plan = Plan {
            partitions: vec![first, second],
        };
        // both problems must surface in one run, not just the first
        assert_eq!(file_failures(&plan), 2);
        assert!(!validate_files(&plan));
    }

    #[test]
    fn test_validate_files_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = expected_partition();
        p.mount_path = Some(PathBuf::from(dir.path()));
        p.files = vec![FileSpec {
            name: "absent.txt".to_string(),
            path: String::new(),
            contents: None,
        }];
        let plan = Plan {
            partitions: vec![p],
        };
        assert!(!validate_files(&plan));
    }
}
