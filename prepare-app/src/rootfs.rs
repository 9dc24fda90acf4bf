//! Builds the stage2 rootfs skeleton: self bind-mount, directory tree,
//! mirrored device nodes, bind-mounted host directories, the `ptmx`
//! symlink. Grounded on `prepare-app.c`'s `main`.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::mount::MsFlags;
use nix::sys::stat::{mkdirat, Mode};
use nix::unistd::{self, unlinkat, UnlinkatFlags};

use stage1_common::devices::{self, DirSpec};
use stage1_common::syscall::Syscall;

/// Strip the leading `/` from an absolute path so it can be joined onto the
/// rootfs root with [`Path::join`].
fn relativize(absolute: &str) -> &str {
    absolute.strip_prefix('/').unwrap_or(absolute)
}

pub fn prepare(root: &Path, syscall: &dyn Syscall) -> Result<()> {
    debug!("making {:?} a mount point", root);
    syscall
        .mount(Some(root), root, Some("bind"), MsFlags::MS_BIND | MsFlags::MS_REC, None)
        .with_context(|| format!("Make {:?} a mount point failed", root))?;

    let rootfd = fcntl::open(root, OFlag::O_DIRECTORY | OFlag::O_CLOEXEC, Mode::empty())
        .with_context(|| format!("Failed to open directory {:?}", root))?;

    prepare_inner(root, rootfd, syscall)
}

fn prepare_inner(root: &Path, rootfd: i32, syscall: &dyn Syscall) -> Result<()> {
    unlink_stale_symlinks(rootfd)?;
    let result = create_dirs(rootfd);
    let _ = unistd::close(rootfd);
    result?;

    mirror_devnodes(root, syscall)?;
    bind_host_dirs(root, syscall)?;
    symlink_ptmx(root)?;
    Ok(())
}

fn unlink_stale_symlinks(rootfd: i32) -> Result<()> {
    for path in devices::STALE_SYMLINKS {
        match unlinkat(Some(rootfd), *path, UnlinkatFlags::NoRemoveDir) {
            Ok(()) | Err(Errno::ENOENT) | Err(Errno::EISDIR) => {}
            Err(e) => bail!("Failed to unlink \"{}\": {}", path, e),
        }
    }
    Ok(())
}

fn create_dirs(rootfd: i32) -> Result<()> {
    let _umask = unistd::umask(Mode::empty());
    for DirSpec { path, mode } in devices::canonical_dirs() {
        match mkdirat(Some(rootfd), path, mode) {
            Ok(()) | Err(Errno::EEXIST) => {}
            Err(e) => bail!("Failed to create directory \"{}\": {}", path, e),
        }
    }
    Ok(())
}

fn mirror_devnodes(root: &Path, syscall: &dyn Syscall) -> Result<()> {
    for from in devices::DEVICE_NODES {
        if !Path::new(from).exists() {
            continue;
        }
        let to = join_checked(root, relativize(from))?;

        if let Ok(file) = OpenOptions::new()
            .write(true)
            .create(true)
            .custom_flags(libc::O_CLOEXEC | libc::O_NOCTTY)
            .mode(0o644)
            .open(&to)
        {
            drop(file);
        }

        syscall
            .mount(Some(Path::new(from)), &to, Some("bind"), MsFlags::MS_BIND, None)
            .with_context(|| format!("Mounting \"{}\" on {:?} failed", from, to))?;
    }
    Ok(())
}

fn bind_host_dirs(root: &Path, syscall: &dyn Syscall) -> Result<()> {
    for from in devices::BIND_DIRS {
        let to = join_checked(root, relativize(from))?;
        syscall
            .mount(Some(Path::new(from)), &to, Some("bind"), MsFlags::MS_BIND, None)
            .with_context(|| format!("Mounting \"{}\" on {:?} failed", from, to))?;
    }
    Ok(())
}

fn symlink_ptmx(root: &Path) -> Result<()> {
    let to = join_checked(root, "dev/ptmx")?;
    match unistd::symlinkat("/dev/pts/ptmx", None, &to) {
        Ok(()) => Ok(()),
        Err(e) => bail!("Failed to create /dev/ptmx symlink: {}", e),
    }
}

fn join_checked(root: &Path, rel: &str) -> Result<PathBuf> {
    let joined = root.join(rel);
    if joined.as_os_str().len() >= 4096 {
        bail!("Path too long: {:?}", joined);
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage1_common::syscall::test::TestHelperSyscall;

    #[test]
    fn relativize_strips_leading_slash() {
        assert_eq!(relativize("/dev/null"), "dev/null");
        assert_eq!(relativize("already/relative"), "already/relative");
    }

    #[test]
    fn self_bind_mount_is_issued_first() {
        let syscall = TestHelperSyscall::default();
        let dir = tempfile::tempdir().unwrap();
        prepare(dir.path(), &syscall).unwrap();
        let mounts = syscall.get_mount_args();
        assert_eq!(mounts[0].source.as_deref(), Some(dir.path()));
        assert_eq!(mounts[0].target, dir.path());
        assert!(mounts[0].flags.contains(MsFlags::MS_BIND | MsFlags::MS_REC));
    }

    #[test]
    fn canonical_directories_are_created_under_root() {
        let syscall = TestHelperSyscall::default();
        let dir = tempfile::tempdir().unwrap();
        prepare(dir.path(), &syscall).unwrap();
        for DirSpec { path, .. } in devices::canonical_dirs() {
            assert!(dir.path().join(path).is_dir(), "{} missing", path);
        }
    }

    #[test]
    fn ptmx_symlink_points_at_dev_pts_ptmx() {
        let syscall = TestHelperSyscall::default();
        let dir = tempfile::tempdir().unwrap();
        prepare(dir.path(), &syscall).unwrap();
        let target = std::fs::read_link(dir.path().join("dev/ptmx")).unwrap();
        assert_eq!(target, Path::new("/dev/pts/ptmx"));
    }

    #[test]
    fn rerunning_prepare_tolerates_existing_directories() {
        let syscall = TestHelperSyscall::default();
        let dir = tempfile::tempdir().unwrap();
        prepare(dir.path(), &syscall).unwrap();
        prepare(dir.path(), &syscall).unwrap();
    }
}
