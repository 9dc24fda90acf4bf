mod diagnose;

use std::ffi::CString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{AppSettings, Clap};
use log::debug;
use nix::errno::Errno;
use nix::unistd::{Gid, Uid};

use stage1_common::{errors, numeric, syscall};

#[derive(Clap, Debug)]
#[clap(about = "Chroots, drops privileges, execs the app, and diagnoses common exec failures")]
#[clap(setting = AppSettings::TrailingVarArg)]
struct Opts {
    /// stage2 rootfs to chroot into
    root: PathBuf,
    /// working directory inside the rootfs, relative to the new root
    workdir: PathBuf,
    /// NUL-delimited KEY=VALUE environment blob
    envfile: PathBuf,
    /// uid to drop to, "0" to stay root
    uid: String,
    /// gid to drop to, "0" to stay root
    gid: String,
    /// the app's entrypoint
    exe: String,
    /// arguments forwarded to the app
    args: Vec<String>,
}

fn apply_env(pairs: Vec<(String, String)>) {
    for (key, _) in std::env::vars() {
        std::env::remove_var(key);
    }
    for (k, v) in pairs {
        std::env::set_var(k, v);
    }
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let pairs = stage1_common::env::load_env_file(&opts.envfile)?;
    apply_env(pairs);

    let syscall = syscall::create_syscall();
    syscall
        .chroot(&opts.root)
        .map_err(|e| anyhow::anyhow!("Chroot {:?} failed: {}", opts.root, e))?;
    syscall
        .chdir(&opts.workdir)
        .map_err(|e| anyhow::anyhow!("Chdir {:?} failed: {}", opts.workdir, e))?;

    let gid = numeric::atoi(&opts.gid);
    if gid > 0 {
        syscall
            .setresgid(Gid::from_raw(gid as u32))
            .map_err(|e| anyhow::anyhow!("Setresgid \"{}\" failed: {}", opts.gid, e))?;
    }
    let uid = numeric::atoi(&opts.uid);
    if uid > 0 {
        syscall
            .setresuid(Uid::from_raw(uid as u32))
            .map_err(|e| anyhow::anyhow!("Setresuid \"{}\" failed: {}", opts.uid, e))?;
    }

    debug!("exec'ing {:?}", opts.exe);
    let mut argv = vec![opts.exe.clone()];
    argv.extend(opts.args.iter().cloned());
    let cargv: Vec<CString> = argv.iter().map(|s| CString::new(s.as_str()).unwrap()).collect();
    let cexe = CString::new(opts.exe.as_str())?;

    match nix::unistd::execvp(&cexe, &cargv) {
        Ok(_) => unreachable!("execvp only returns on failure"),
        Err(Errno::ENOENT) | Err(Errno::EACCES) => {
            diagnose::diagnose(std::path::Path::new(&opts.exe), 0)
        }
        Err(e) => anyhow::bail!("Exec of \"{}\" failed: {}", opts.exe, e),
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    let _ = stage1_common::logger::init(None);

    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(errors::record_fatal() as u8)
        }
    }
}
