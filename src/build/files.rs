//! Mount point management and file seeding.

use crate::plan::{FileSpec, Plan};
use crate::process::Cmd;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Mount points live under this prefix, one per partition number.
const MOUNT_ROOT: &str = "/mnt";

/// Mount point path for a partition: `/mnt/hd1p<number>`.
pub fn mount_path_for(number: u32) -> PathBuf {
    Path::new(MOUNT_ROOT).join(format!("hd1p{}", number))
}

/// Create and record mount points for every formatted partition.
pub fn assign_mount_paths(plan: &mut Plan) -> Result<()> {
    for p in &mut plan.partitions {
        if !p.is_formatted() {
            continue;
        }
        let path = mount_path_for(p.number);
        fs::create_dir_all(&path)
            .with_context(|| format!("creating mount point '{}'", path.display()))?;
        p.mount_path = Some(path);
    }
    Ok(())
}

/// Mount every partition that has a device and a mount point.
pub fn mount_partitions(plan: &Plan) -> Result<()> {
    for p in &plan.partitions {
        if p.filesystem.is_none() {
            continue;
        }
        let (device, mount) = match (&p.device, &p.mount_path) {
            (Some(d), Some(m)) => (d, m),
            _ => continue,
        };
        Cmd::new("mount")
            .arg(device)
            .arg_path(mount)
            .error_msg(format!("mount failed for partition {}", p.number))
            .run()?;
    }
    Ok(())
}

/// Unmount every mounted partition. Failures are reported, not fatal,
/// so the remaining partitions still get unmounted.
pub fn unmount_partitions(plan: &Plan) {
    for p in &plan.partitions {
        if p.filesystem.is_none() {
            continue;
        }
        let device = match &p.device {
            Some(d) => d,
            None => continue,
        };
        if let Err(e) = Cmd::new("umount")
            .arg(device)
            .error_msg(format!("umount failed for partition {}", p.number))
            .run()
        {
            println!("  {}", e);
        }
    }
}

/// Seed every planned file on its mounted partition.
pub fn create_files(plan: &Plan) -> Result<()> {
    for p in &plan.partitions {
        if p.files.is_empty() {
            continue;
        }
        let mount = p
            .mount_path
            .as_deref()
            .with_context(|| format!("partition {} has files but no mount path", p.number))?;
        for file in &p.files {
            write_file(mount, file)?;
        }
    }
    Ok(())
}

fn write_file(mount: &Path, file: &FileSpec) -> Result<()> {
    let path = file.full_path(mount);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    // lines joined with a single newline, no trailing terminator
    let contents = file.joined_contents().unwrap_or_default();
    fs::write(&path, contents)
        .with_context(|| format!("writing '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::FileSpec;

    #[test]
    fn test_mount_path_template() {
        assert_eq!(mount_path_for(3), PathBuf::from("/mnt/hd1p3"));
    }

    #[test]
    fn test_write_file_joins_lines_without_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileSpec {
            name: "hello.txt".to_string(),
            path: "etc".to_string(),
            contents: Some(vec!["a".to_string(), "b".to_string()]),
        };
        write_file(dir.path(), &file).unwrap();
        let bytes = fs::read(dir.path().join("etc/hello.txt")).unwrap();
        assert_eq!(bytes, b"a\nb");
    }

    #[test]
    fn test_write_file_without_contents_creates_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileSpec {
            name: "empty".to_string(),
            path: String::new(),
            contents: None,
        };
        write_file(dir.path(), &file).unwrap();
        let bytes = fs::read(dir.path().join("empty")).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_write_file_creates_intermediate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileSpec {
            name: "deep.txt".to_string(),
            path: "a/b/c".to_string(),
            contents: Some(vec!["x".to_string()]),
        };
        write_file(dir.path(), &file).unwrap();
        assert!(dir.path().join("a/b/c/deep.txt").exists());
    }
}
