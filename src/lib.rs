//! Build and verify raw GPT disk images from declarative partition plans.
//!
//! A plan is a TOML list of partitions (sizes, labels, roles, filesystems,
//! seeded files). The crate resolves it into a geometrically valid layout,
//! drives the external disk tools to construct the image, and then re-reads
//! the constructed artifact to diff every tracked field against the plan.
//!
//! # Architecture
//!
//! ```text
//! plan        partition model, TOML loading, role registry, layout planner
//!    │
//! build       sgdisk/kpartx/mkfs orchestration, file seeding
//!    │
//! verify      re-derives facts from the live image and diffs them
//! ```
//!
//! The verifier never trusts builder state directly: it re-queries the
//! partition table and filesystems so that verification catches builder
//! bugs. The only state carried across is the device/mount bindings,
//! reconciled into the expected plan by partition number.
//!
//! # Example
//!
//! ```rust,ignore
//! use volbuild::plan::{layout, Plan};
//! use volbuild::build::{build_image, BuildOptions};
//!
//! let mut plan = Plan::load("disk.toml".as_ref())?;
//! layout::resolve_with_uuidgen(&mut plan)?;
//! build_image(&mut plan, "test.img".as_ref(), &BuildOptions::default())?;
//! ```

pub mod bootcfg;
pub mod build;
pub mod plan;
pub mod preflight;
pub mod process;
pub mod verify;

pub use plan::{FileSpec, FilesystemKind, Partition, PartitionRole, Plan};
