mod rootfs;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Clap;
use log::debug;

use stage1_common::{errors, syscall};

#[derive(Clap, Debug)]
#[clap(about = "Prepares a stage2 rootfs skeleton before it is entered")]
struct Opts {
    /// Path to the stage2 root filesystem
    root: PathBuf,
}

fn run(opts: Opts) -> anyhow::Result<()> {
    debug!("preparing rootfs at {:?}", opts.root);
    let syscall = syscall::create_syscall();
    rootfs::prepare(&opts.root, syscall.as_ref())
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    let _ = stage1_common::logger::init(None);

    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(errors::report(&e) as u8),
    }
}
