//! Parsers for the structured text output of sgdisk and df.
//!
//! Pure functions; malformed tool output becomes an error the verifier
//! reports as "could not verify", never a panic.

use anyhow::{bail, Context, Result};

/// Facts about one live partition, per `sgdisk -i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    /// GPT type GUID, as printed (uppercase).
    pub type_guid: String,
    /// Partition unique GUID. Parsed but not compared today.
    pub unique_guid: String,
    /// Partition size in sectors.
    pub sectors: u64,
    /// Partition name, without the surrounding quotes.
    pub label: String,
}

/// Parse one `sgdisk -i <n>` information block.
///
/// The block is a fixed set of `Label: value` lines:
///
/// ```text
/// Partition GUID code: C12A7328-F81F-11D2-BA4B-00A0C93EC93B (EFI System)
/// Partition unique GUID: 8F861524-D96E-47DC-B95D-E7E06F194E0E
/// First sector: 4096 (at 2.0 MiB)
/// Last sector: 266239 (at 130.0 MiB)
/// Partition size: 262144 sectors (128.0 MiB)
/// Attribute flags: 0000000000000000
/// Partition name: 'EFI-SYSTEM'
/// ```
pub fn parse_sgdisk_info(output: &str) -> Result<PartitionInfo> {
    let type_guid = labeled_value(output, "Partition GUID code:")?
        .split_whitespace()
        .next()
        .context("empty type GUID line")?
        .to_uppercase();
    let unique_guid = labeled_value(output, "Partition unique GUID:")?
        .split_whitespace()
        .next()
        .context("empty unique GUID line")?
        .to_uppercase();
    let sectors_field = labeled_value(output, "Partition size:")?;
    let sectors: u64 = sectors_field
        .split_whitespace()
        .next()
        .context("empty partition size line")?
        .parse()
        .with_context(|| format!("bad sector count in {:?}", sectors_field))?;
    let name_field = labeled_value(output, "Partition name:")?;
    let label = name_field
        .split('\'')
        .nth(1)
        .with_context(|| format!("unquoted partition name in {:?}", name_field))?
        .to_string();

    Ok(PartitionInfo {
        type_guid,
        unique_guid,
        sectors,
        label,
    })
}

fn labeled_value<'a>(output: &'a str, label: &str) -> Result<&'a str> {
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix(label) {
            return Ok(rest.trim());
        }
    }
    bail!("no '{}' line in sgdisk output", label.trim_end_matches(':'));
}

/// Parse the filesystem type column from `df -T <device>` output.
///
/// Fewer than two lines of output means the device could not be
/// inspected, which is itself a verification failure.
pub fn parse_df_type(output: &str) -> Result<String> {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() < 2 {
        bail!("df output too short to carry a filesystem type");
    }
    lines[1]
        .split_whitespace()
        .nth(1)
        .map(|s| s.to_string())
        .context("df output missing the Type column")
}
