//! Fake [`super::Syscall`] used under `cfg(test)` so call sequences can be
//! asserted without performing real mounts/chroots/namespace switches.

use std::any::Any;
use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::mount::MsFlags;
use nix::sched::CloneFlags;
use nix::unistd::{Gid, Uid};

use super::Syscall;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MountArgs {
    pub source: Option<PathBuf>,
    pub target: PathBuf,
    pub fstype: Option<String>,
    pub flags: MsFlags,
    pub data: Option<String>,
}

#[derive(Clone, Default)]
pub struct TestHelperSyscall {
    mount_args: RefCell<Vec<MountArgs>>,
    chroot_args: RefCell<Vec<PathBuf>>,
    chdir_args: RefCell<Vec<PathBuf>>,
    fchdir_args: RefCell<Vec<RawFd>>,
    setns_args: RefCell<Vec<(RawFd, CloneFlags)>>,
    setresuid_args: RefCell<Vec<Uid>>,
    setresgid_args: RefCell<Vec<Gid>>,
}

impl Syscall for TestHelperSyscall {
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
        self.mount_args.borrow_mut().push(MountArgs {
            source: source.map(|p| p.to_owned()),
            target: target.to_owned(),
            fstype: fstype.map(|s| s.to_owned()),
            flags,
            data: data.map(|s| s.to_owned()),
        });
        Ok(())
    }

    fn chroot(&self, path: &Path) -> Result<(), Errno> {
        self.chroot_args.borrow_mut().push(path.to_owned());
        Ok(())
    }

    fn chdir(&self, path: &Path) -> Result<(), Errno> {
        self.chdir_args.borrow_mut().push(path.to_owned());
        Ok(())
    }

    fn fchdir(&self, fd: RawFd) -> Result<(), Errno> {
        self.fchdir_args.borrow_mut().push(fd);
        Ok(())
    }

    fn setns(&self, fd: RawFd, nstype: CloneFlags) -> Result<(), Errno> {
        self.setns_args.borrow_mut().push((fd, nstype));
        Ok(())
    }

    fn setresuid(&self, uid: Uid) -> Result<(), Errno> {
        self.setresuid_args.borrow_mut().push(uid);
        Ok(())
    }

    fn setresgid(&self, gid: Gid) -> Result<(), Errno> {
        self.setresgid_args.borrow_mut().push(gid);
        Ok(())
    }
}

impl TestHelperSyscall {
    pub fn get_mount_args(&self) -> Vec<MountArgs> {
        self.mount_args.borrow().clone()
    }

    pub fn get_chroot_args(&self) -> Vec<PathBuf> {
        self.chroot_args.borrow().clone()
    }

    pub fn get_setns_args(&self) -> Vec<(RawFd, CloneFlags)> {
        self.setns_args.borrow().clone()
    }

    pub fn get_setresuid_args(&self) -> Vec<Uid> {
        self.setresuid_args.borrow().clone()
    }

    pub fn get_setresgid_args(&self) -> Vec<Gid> {
        self.setresgid_args.borrow().clone()
    }
}
