//! An interface trait over the syscalls that are privileged or otherwise
//! impractical to exercise for real inside unit tests, so that the rootfs
//! preparation and namespace-join call sequences can be tested without root.
//!
//! Plain, test-safe filesystem operations (mkdirat/unlinkat/symlinkat on a
//! directory descriptor, opening placeholder files) are called directly via
//! `nix`/`libc` at the call site instead of going through this trait.

pub mod linux;
pub mod test;

use std::any::Any;
use std::os::unix::io::RawFd;
use std::path::Path;

use nix::errno::Errno;
use nix::mount::MsFlags;
use nix::sched::CloneFlags;
use nix::unistd::{Gid, Uid};

pub trait Syscall {
    fn as_any(&self) -> &dyn Any;

    fn mount(
        &self,
        source: Option<&Path>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> Result<(), Errno>;

    fn chroot(&self, path: &Path) -> Result<(), Errno>;
    fn chdir(&self, path: &Path) -> Result<(), Errno>;
    fn fchdir(&self, fd: RawFd) -> Result<(), Errno>;
    fn setns(&self, fd: RawFd, nstype: CloneFlags) -> Result<(), Errno>;
    fn setresuid(&self, uid: Uid) -> Result<(), Errno>;
    fn setresgid(&self, gid: Gid) -> Result<(), Errno>;
}

pub fn create_syscall() -> Box<dyn Syscall> {
    if cfg!(test) {
        Box::new(test::TestHelperSyscall::default())
    } else {
        Box::new(linux::LinuxSyscall)
    }
}
