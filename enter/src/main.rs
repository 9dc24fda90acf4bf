mod argv;
mod namespaces;

use std::process::ExitCode;

use clap::{AppSettings, Clap};
use log::debug;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use stage1_common::{errors, syscall};

#[derive(Clap, Debug)]
#[clap(about = "Joins a running pod's namespaces and execs diagexec inside it")]
#[clap(setting = AppSettings::TrailingVarArg)]
struct Opts {
    /// pid of a process already inside the target pod's namespaces
    pid: String,
    /// pod image id, used to derive the stage2 rootfs and env file paths
    imageid: String,
    /// command to exec inside the pod
    cmd: String,
    /// arguments forwarded to `cmd`
    args: Vec<String>,
}

fn run(opts: Opts) -> anyhow::Result<i32> {
    let pid = stage1_common::numeric::atoi(&opts.pid) as i32;

    let root_fd = namespaces::open_proc_path(pid, "root")?;

    let syscall = syscall::create_syscall();
    namespaces::enter_namespaces(pid, syscall.as_ref())?;

    syscall
        .fchdir(root_fd)
        .map_err(|e| anyhow::anyhow!("Unable to chdir to pod root: {}", e))?;
    syscall
        .chroot(std::path::Path::new("."))
        .map_err(|e| anyhow::anyhow!("Unable to chroot: {}", e))?;
    unistd::close(root_fd).map_err(|e| anyhow::anyhow!("Unable to close root_fd: {}", e))?;

    let mut cmd_and_args = vec![opts.cmd.clone()];
    cmd_and_args.extend(opts.args.iter().cloned());
    let diagexec_argv = argv::build_diagexec_argv(&opts.imageid, &cmd_and_args)?;

    debug!("forking to realize pid namespace");
    match unsafe { unistd::fork() }.map_err(|e| anyhow::anyhow!("Unable to fork: {}", e))? {
        ForkResult::Child => {
            let path = std::ffi::CString::new(argv::diagexec_path()).unwrap();
            let _ = unistd::execv(&path, &diagexec_argv);
            // execv only returns on failure
            std::process::exit(errors::report(&anyhow::anyhow!("Exec failed")));
        }
        ForkResult::Parent { child } => wait_for_child(child),
    }
}

fn wait_for_child(child: Pid) -> anyhow::Result<i32> {
    loop {
        match waitpid(child, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Stopped(_, _)) => {
                let _ = kill(unistd::getpid(), Signal::SIGSTOP);
                let _ = kill(child, Signal::SIGCONT);
            }
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                let _ = kill(unistd::getpid(), sig);
                return Ok(128 + sig as i32);
            }
            Ok(_) => continue,
            Err(e) => anyhow::bail!("waitpid failed: {}", e),
        }
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    let _ = stage1_common::logger::init(None);

    match run(opts) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => ExitCode::from(errors::report(&e) as u8),
    }
}
