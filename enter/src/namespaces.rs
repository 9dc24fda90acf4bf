//! Namespace-entry order and the magic `/proc/<pid>/ns/*` and
//! `/proc/<pid>/root` symlinks used to reach them. Grounded on `enter.c`'s
//! `openpidfd`/`ns` macro.

use std::os::unix::io::RawFd;

use anyhow::{Context, Result};
use nix::fcntl::{self, OFlag};
use nix::sched::CloneFlags;
use nix::sys::stat::Mode;

use stage1_common::syscall::Syscall;

/// Namespaces entered, in the fixed order the reference helper uses. The
/// user namespace is deliberately absent: nspawn-style pods never set
/// `CLONE_NEWUSER`, so entering it would be meaningless.
const NAMESPACE_ORDER: &[(CloneFlags, &str)] = &[
    (CloneFlags::CLONE_NEWIPC, "ns/ipc"),
    (CloneFlags::CLONE_NEWUTS, "ns/uts"),
    (CloneFlags::CLONE_NEWNET, "ns/net"),
    (CloneFlags::CLONE_NEWPID, "ns/pid"),
    (CloneFlags::CLONE_NEWNS, "ns/mnt"),
];

pub fn open_proc_path(pid: i32, which: &str) -> Result<RawFd> {
    let path = format!("/proc/{}/{}", pid, which);
    fcntl::open(path.as_str(), OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())
        .with_context(|| format!("Unable to open \"{}\"", path))
}

/// Enter every namespace of `pid`, in order. Each failure is fatal.
pub fn enter_namespaces(pid: i32, syscall: &dyn Syscall) -> Result<()> {
    for (flag, which) in NAMESPACE_ORDER {
        let fd = open_proc_path(pid, which)?;
        let result = syscall
            .setns(fd, *flag)
            .with_context(|| format!("Unable to enter {} namespace", which));
        let _ = nix::unistd::close(fd);
        result?;
    }
    Ok(())
}
