//! Layout planning: GUID fill-in, offset assignment, image sizing.
//!
//! Offsets are assigned by walking the partitions in ascending number
//! order with a running sector cursor. The cursor starts past the
//! primary GPT header and entry array and is aligned up before every
//! assignment; blank and zero-length partitions never advance it.

use super::{Partition, Plan};
use crate::process::Cmd;
use anyhow::{Context, Result};

/// Sector size in bytes.
pub const SECTOR_SIZE: u64 = 512;

/// First usable sector: 34 leaves room for the protective MBR, the
/// primary GPT header, and the 32-sector entry array.
pub const FIRST_USABLE_SECTOR: u64 = 34;

/// Partition starts are aligned to this many sectors (2 MiB).
pub const ALIGNMENT_SECTORS: u64 = 4096;

/// Sectors reserved at the front of the image before any partition data.
const RESERVED_SECTORS: u64 = 63;

/// Extra sectors at the end of the image to absorb alignment rounding.
const SLACK_SECTORS: u64 = 4096;

/// Round `value` up to the next multiple of `alignment`.
///
/// Already-aligned values are returned unchanged.
pub fn align(value: u64, alignment: u64) -> u64 {
    let rem = value % alignment;
    if rem == 0 {
        value
    } else {
        value + alignment - rem
    }
}

/// Resolve a plan in place: partition GUIDs, type GUIDs, offsets.
///
/// `gen` produces a fresh unique identifier per call; partitions that
/// already carry a GUID keep it, so resolving twice is a no-op.
pub fn resolve(plan: &mut Plan, mut gen: impl FnMut() -> Result<String>) -> Result<()> {
    for p in &mut plan.partitions {
        if p.guid.is_none() {
            p.guid = Some(gen().context("generating partition GUID")?);
        }
        resolve_type_guid(p);
    }
    assign_offsets(plan);
    Ok(())
}

/// Resolve a plan using `uuidgen` for identifier generation.
pub fn resolve_with_uuidgen(plan: &mut Plan) -> Result<()> {
    resolve(plan, generate_uuid)
}

/// Resolve an expected (verification) plan: type GUIDs and offsets only.
///
/// Expected plans never generate partition GUIDs; an absent GUID simply
/// goes unchecked by the verifier.
pub fn resolve_expected(plan: &mut Plan) {
    for p in &mut plan.partitions {
        resolve_type_guid(p);
    }
    assign_offsets(plan);
}

/// Generate a random UUID using uuidgen.
pub fn generate_uuid() -> Result<String> {
    let result = Cmd::new("uuidgen").error_msg("uuidgen failed").run()?;
    Ok(result.stdout_trimmed().to_string())
}

/// Derive the type GUID from the role, once.
///
/// Blank roles derive nothing and stay out of every downstream step.
/// Unknown roles are reported and skipped, not fatal.
fn resolve_type_guid(p: &mut Partition) {
    if p.type_guid.is_some() || p.role.is_blank() {
        return;
    }
    match p.role.type_guid() {
        Some(guid) => p.type_guid = Some(guid.to_string()),
        None => println!("Unknown role '{}' on partition {}", p.role, p.number),
    }
}

/// Assign start sectors with an aligned running cursor.
fn assign_offsets(plan: &mut Plan) {
    let mut cursor = FIRST_USABLE_SECTOR;
    let mut ordered: Vec<&mut Partition> = plan.partitions.iter_mut().collect();
    ordered.sort_by_key(|p| p.number);
    for p in ordered {
        if !p.in_table() {
            continue;
        }
        cursor = align(cursor, ALIGNMENT_SECTORS);
        p.offset = cursor;
        cursor += p.length;
    }
}

/// Total backing file size in bytes.
///
/// Computed once, before the image file is created; the file is never
/// resized afterward.
pub fn image_size_bytes(plan: &Plan) -> u64 {
    let mut size = RESERVED_SECTORS * SECTOR_SIZE;
    for p in &plan.partitions {
        size += align(p.length, SECTOR_SIZE) * SECTOR_SIZE;
    }
    size + SLACK_SECTORS * SECTOR_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{FilesystemKind, PartitionRole};

    fn part(number: u32, role: PartitionRole, length: u64) -> Partition {
        Partition {
            number,
            label: format!("P{}", number),
            role,
            type_guid: None,
            guid: None,
            device: None,
            offset: 0,
            length,
            filesystem: FilesystemKind::None,
            mount_path: None,
            hybrid: false,
            files: Vec::new(),
        }
    }

    fn counter_gen() -> impl FnMut() -> anyhow::Result<String> {
        let mut n = 0u32;
        move || {
            n += 1;
            Ok(format!("00000000-0000-0000-0000-{:012}", n))
        }
    }

    #[test]
    fn test_align_is_idempotent() {
        assert_eq!(align(0, 4096), 0);
        assert_eq!(align(34, 4096), 4096);
        assert_eq!(align(4096, 4096), 4096);
        assert_eq!(align(align(34, 4096), 4096), 4096);
        assert_eq!(align(4097, 4096), 8192);
    }

    #[test]
    fn test_offsets_aligned_and_non_overlapping() {
        let mut plan = Plan {
            partitions: vec![
                part(1, PartitionRole::Efi, 262144),
                part(2, PartitionRole::Data, 100),
                part(3, PartitionRole::Root, 4194304),
            ],
        };
        resolve(&mut plan, counter_gen()).unwrap();

        let table: Vec<&Partition> =
            plan.partitions.iter().filter(|p| p.in_table()).collect();
        for p in &table {
            assert_eq!(p.offset % ALIGNMENT_SECTORS, 0, "partition {}", p.number);
        }
        for pair in table.windows(2) {
            assert!(
                pair[0].offset + pair[0].length <= pair[1].offset,
                "partitions {} and {} overlap",
                pair[0].number,
                pair[1].number
            );
        }
    }

    #[test]
    fn test_blank_and_zero_length_skip_cursor() {
        let mut with_gap = Plan {
            partitions: vec![
                part(1, PartitionRole::Efi, 262144),
                part(2, PartitionRole::Blank, 0),
                part(3, PartitionRole::Data, 0),
                part(4, PartitionRole::Root, 4194304),
            ],
        };
        let mut without_gap = Plan {
            partitions: vec![
                part(1, PartitionRole::Efi, 262144),
                part(4, PartitionRole::Root, 4194304),
            ],
        };
        resolve(&mut with_gap, counter_gen()).unwrap();
        resolve(&mut without_gap, counter_gen()).unwrap();

        assert_eq!(with_gap.by_number(2).unwrap().offset, 0);
        assert_eq!(with_gap.by_number(3).unwrap().offset, 0);
        assert_eq!(
            with_gap.by_number(4).unwrap().offset,
            without_gap.by_number(4).unwrap().offset
        );
    }

    #[test]
    fn test_guid_stability_across_reruns() {
        let mut plan = Plan {
            partitions: vec![part(1, PartitionRole::Data, 4096)],
        };
        resolve(&mut plan, counter_gen()).unwrap();
        let first = plan.partitions[0].guid.clone().unwrap();

        // a second resolve must not regenerate the identifier
        let mut failing_gen = || -> anyhow::Result<String> {
            panic!("generator called for an already-resolved partition")
        };
        resolve(&mut plan, &mut failing_gen).unwrap();
        assert_eq!(plan.partitions[0].guid.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn test_planning_is_idempotent() {
        let mut plan = Plan {
            partitions: vec![
                part(1, PartitionRole::Efi, 262144),
                part(2, PartitionRole::Root, 4194304),
            ],
        };
        resolve(&mut plan, counter_gen()).unwrap();
        let first: Vec<u64> = plan.partitions.iter().map(|p| p.offset).collect();
        resolve(&mut plan, counter_gen()).unwrap();
        let second: Vec<u64> = plan.partitions.iter().map(|p| p.offset).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_type_guid_derived_once() {
        let mut plan = Plan {
            partitions: vec![part(1, PartitionRole::Efi, 4096)],
        };
        resolve(&mut plan, counter_gen()).unwrap();
        assert_eq!(
            plan.partitions[0].type_guid.as_deref(),
            Some("C12A7328-F81F-11D2-BA4B-00A0C93EC93B")
        );

        // an explicit type GUID is never overwritten
        plan.partitions[0].type_guid = Some("deadbeef".to_string());
        resolve(&mut plan, counter_gen()).unwrap();
        assert_eq!(plan.partitions[0].type_guid.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn test_image_size_counts_all_lengths_plus_slack() {
        let plan = Plan {
            partitions: vec![
                part(1, PartitionRole::Efi, 100),
                part(2, PartitionRole::Blank, 0),
            ],
        };
        let expected = (63 + 4096) * SECTOR_SIZE + align(100, SECTOR_SIZE) * SECTOR_SIZE;
        assert_eq!(image_size_bytes(&plan), expected);
    }
}
