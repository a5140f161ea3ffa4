use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use volbuild::build::{self, BuildOptions};
use volbuild::plan::{layout, Plan};
use volbuild::{bootcfg, preflight, verify};

/// Positional argument defaults, in order.
const DEFAULT_PLAN: &str = "disk.toml";
const DEFAULT_EXPECTED: &str = "disk-out.toml";
const DEFAULT_BOOTCFG_DIR: &str = "bootcfg";
const DEFAULT_BOOTCFG_TEMPLATE: &str = "boot.cfg.in";
const DEFAULT_IMAGE: &str = "test.img";

fn usage() -> &'static str {
    "Usage:\n  volbuild [--detach] [plan.toml] [expected.toml] [bootcfg-dir] [bootcfg-template] [image]"
}

struct Args {
    plan: String,
    expected: String,
    bootcfg_dir: String,
    bootcfg_template: String,
    image: String,
    detach: bool,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut detach = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--detach" => detach = true,
            "-h" | "--help" => anyhow::bail!(usage()),
            _ => positional.push(arg),
        }
    }
    if positional.len() > 5 {
        anyhow::bail!(usage());
    }
    let mut next = positional.into_iter();
    Ok(Args {
        plan: next.next().unwrap_or_else(|| DEFAULT_PLAN.to_string()),
        expected: next.next().unwrap_or_else(|| DEFAULT_EXPECTED.to_string()),
        bootcfg_dir: next
            .next()
            .unwrap_or_else(|| DEFAULT_BOOTCFG_DIR.to_string()),
        bootcfg_template: next
            .next()
            .unwrap_or_else(|| DEFAULT_BOOTCFG_TEMPLATE.to_string()),
        image: next.next().unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        detach,
    })
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            println!("Validation failed");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<bool> {
    let args = parse_args()?;
    let image = Path::new(&args.image);

    preflight::check_host_tools()?;

    let mut plan = Plan::load(Path::new(&args.plan))?;
    let mut expected = Plan::load(Path::new(&args.expected))?;

    layout::resolve_with_uuidgen(&mut plan)?;
    build::build_image(
        &mut plan,
        image,
        &BuildOptions {
            detach: args.detach,
        },
    )?;

    // Boot config: substitute the built root device into the template.
    match bootcfg::pick_root_device(&plan, image) {
        Ok(device) => {
            let template = Path::new(&args.bootcfg_template);
            let out_dir = Path::new(&args.bootcfg_dir);
            match bootcfg::patch_boot_config(template, out_dir, &device) {
                Ok(out) => println!("Boot config written to {}", out.display()),
                Err(e) => println!("Boot config patching failed: {:#}", e),
            }
        }
        Err(e) => println!("Root device selection failed: {:#}", e),
    }

    // The expected plan is resolved independently and adopts only the
    // device/mount bindings from the build, matched by number.
    layout::resolve_expected(&mut expected);
    expected.adopt_bindings(&plan);

    println!("=== Validating Disk Image ===");
    if let Err(e) = build::files::mount_partitions(&expected) {
        println!("  remounting for validation failed: {:#}", e);
    }

    verify::print_live_state(&expected, image);

    let partitions_ok = verify::validate_partitions(&expected, image);
    let files_ok = verify::validate_files(&expected);

    build::files::unmount_partitions(&expected);

    Ok(partitions_ok && files_ok)
}
