//! Atomic pid-file persistence: write-then-rename so a reader never observes
//! a truncated file. Used by the `shim` clone/fork interceptor to record the
//! child pid for the supervisor to pick up.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::{Context, Result};
use nix::unistd::{fsync, Pid};

/// Write `pid` as decimal text into `path`, atomically. The write goes to
/// `<path>.tmp` first (created, truncated, `fsync`ed), then renamed over
/// `path` -- the rename is the atomic publish point.
pub fn write_pid_file(path: &Path, pid: Pid) -> Result<()> {
    let tmp_path = tmp_path_for(path);

    let mut tmp = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .with_context(|| format!("Unable to open {:?}", tmp_path))?;

    writeln!(tmp, "{}", pid).with_context(|| format!("Unable to write {:?}", tmp_path))?;
    tmp.flush().with_context(|| format!("Unable to flush {:?}", tmp_path))?;
    fsync(tmp.as_raw_fd()).with_context(|| format!("Unable to fsync {:?}", tmp_path))?;
    drop(tmp);

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Unable to rename {:?} to {:?}", tmp_path, path))?;

    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_decimal_pid_with_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid");
        write_pid_file(&path, Pid::from_raw(4242)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "4242\n");
    }

    #[test]
    fn no_tmp_file_left_behind_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid");
        write_pid_file(&path, Pid::from_raw(1)).unwrap();
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn overwrites_an_existing_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pid");
        write_pid_file(&path, Pid::from_raw(1)).unwrap();
        write_pid_file(&path, Pid::from_raw(2)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "2\n");
    }
}
