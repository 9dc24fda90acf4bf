//! Real implementation of [`super::Syscall`] for Linux.

use std::any::Any;
use std::os::unix::io::RawFd;
use std::path::Path;

use nix::errno::Errno;
use nix::mount::{mount, MsFlags};
use nix::sched::CloneFlags;
use nix::unistd::{self, Gid, Uid};

use super::Syscall;

#[derive(Clone)]
pub struct LinuxSyscall;

impl Syscall for LinuxSyscall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<(), Errno> {
        mount(source, target, fstype, flags, data)
    }

    fn chroot(&self, path: &Path) -> Result<(), Errno> {
        unistd::chroot(path)
    }

    fn chdir(&self, path: &Path) -> Result<(), Errno> {
        unistd::chdir(path)
    }

    fn fchdir(&self, fd: RawFd) -> Result<(), Errno> {
        unistd::fchdir(fd)
    }

    fn setns(&self, fd: RawFd, nstype: CloneFlags) -> Result<(), Errno> {
        nix::sched::setns(fd, nstype)
    }

    fn setresuid(&self, uid: Uid) -> Result<(), Errno> {
        unistd::setresuid(uid, uid, uid)
    }

    fn setresgid(&self, gid: Gid) -> Result<(), Errno> {
        unistd::setresgid(gid, gid, gid)
    }
}
