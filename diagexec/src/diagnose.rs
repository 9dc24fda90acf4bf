//! Diagnostic walk run when exec of the app fails with `ENOENT`/`EACCES`:
//! figure out why by following the shebang or ELF interpreter chain and
//! report the first thing that looks wrong. Grounded on `diagexec.c`'s
//! `diag()`.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use nix::sys::stat::fstat;

use stage1_common::elf;

const MAX_DIAG_DEPTH: u32 = 10;
const SHEBANG: &[u8] = b"#!";

struct MappedFile {
    ptr: *mut libc::c_void,
    len: usize,
    mode: u32,
}

impl MappedFile {
    fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr as *const u8, self.len) }
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        if self.len > 0 {
            unsafe {
                let _ = munmap(self.ptr, self.len);
            }
        }
    }
}

fn map_file(path: &Path) -> Result<MappedFile> {
    let file = File::open(path).with_context(|| format!("Unable to open {:?}", path))?;
    let st = fstat(file.as_raw_fd()).with_context(|| format!("Cannot stat {:?}", path))?;
    if st.st_mode & libc::S_IFMT as u32 != libc::S_IFREG as u32 {
        bail!("{:?} is not a regular file", path);
    }
    let len = st.st_size as usize;
    if len == 0 {
        bail!("Mmap of {:?} failed: file is empty", path);
    }

    let ptr = unsafe {
        mmap(
            std::ptr::null_mut(),
            len,
            ProtFlags::PROT_READ,
            MapFlags::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    }
    .with_context(|| format!("Mmap of {:?} failed", path))?;

    Ok(MappedFile { ptr, len, mode: st.st_mode })
}

/// The interpreter path indicated by a shebang or ELF `PT_INTERP` entry.
fn find_interpreter(mm: &[u8], exe: &Path) -> Result<Option<Vec<u8>>> {
    if mm.len() >= SHEBANG.len() && &mm[..SHEBANG.len()] == SHEBANG {
        let maxlen = std::cmp::min(libc::PATH_MAX as usize, mm.len() - SHEBANG.len());
        let rest = &mm[SHEBANG.len()..SHEBANG.len() + maxlen];
        let nl = rest
            .iter()
            .position(|&b| b == b'\n')
            .with_context(|| "Shebang line too long")?;
        Ok(Some(rest[..nl].to_vec()))
    } else if mm.len() >= elf::ELF_MAGIC.len() && mm[..elf::ELF_MAGIC.len()] == elf::ELF_MAGIC {
        match elf::find_pt_interp(mm)? {
            Some(slice) => Ok(Some(slice.to_vec())),
            None => Ok(None),
        }
    } else {
        bail!("Unsupported file type");
    }
    .with_context(|| format!("while diagnosing {:?}", exe))
}

/// Follow the interpreter chain starting at `exe`, reporting the first
/// problem found. `depth` counts recursive hops; exceeding
/// [`MAX_DIAG_DEPTH`] is itself a fatal diagnostic.
pub fn diagnose(exe: &Path, depth: u32) -> Result<()> {
    let mapped = map_file(exe)?;

    if mapped.mode & 0o111 == 0 {
        bail!("{:?} is not executable", exe);
    }

    let itrp = match find_interpreter(mapped.as_slice(), exe)? {
        Some(path) => path,
        None => return Ok(()),
    };

    let itrp = PathBuf::from(std::str::from_utf8(&itrp).unwrap_or_default());

    if !itrp.is_absolute() {
        bail!("Path must be absolute: {:?}", itrp);
    }

    let next_depth = depth + 1;
    if next_depth > MAX_DIAG_DEPTH {
        bail!("Excessive interpreter recursion, giving up");
    }

    diagnose(&itrp, next_depth)
}
