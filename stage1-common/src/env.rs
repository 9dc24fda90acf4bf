//! Environment-blob loading, grounded on `diagexec.c`'s `load_env`.
//!
//! The blob is a sequence of `KEY=VALUE` records separated by NUL bytes; the
//! terminating NUL on the last record is optional. The file is mapped
//! `MAP_PRIVATE` so the in-place `key\0value` rewrite used while splitting
//! each record never touches the file on disk, even though the underlying
//! fd is opened read-only.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::{bail, Context, Result};
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use nix::sys::stat::fstat;

/// One decoded `KEY=VALUE` pair from the environment blob.
pub type EnvPair = (String, String);

/// Parse the NUL-delimited `KEY=VALUE` records out of `raw`. A record with
/// no `=` is a fatal error (the offending record is quoted, matching the
/// reference helper's diagnostic).
pub fn parse_records(raw: &[u8]) -> Result<Vec<EnvPair>> {
    let mut pairs = Vec::new();
    for record in raw.split(|&b| b == 0) {
        if record.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(record).into_owned();
        match text.find('=') {
            Some(pos) => {
                let (k, v) = text.split_at(pos);
                pairs.push((k.to_string(), v[1..].to_string()));
            }
            None => bail!("Malformed environment entry: \"{}\"", text),
        }
    }
    Ok(pairs)
}

/// Load the env file at `path`, returning the decoded pairs. Mirrors the
/// reference helper: mmap privately, force the last byte to NUL, then scan.
/// An empty file is legal and yields no pairs.
pub fn load_env_file(path: &Path) -> Result<Vec<EnvPair>> {
    let file = File::open(path).with_context(|| format!("Unable to open {:?}", path))?;
    let st = fstat(file.as_raw_fd()).with_context(|| format!("Cannot stat {:?}", path))?;
    let len = st.st_size as usize;

    if len == 0 {
        return Ok(Vec::new());
    }

    let mapping = unsafe {
        mmap(
            std::ptr::null_mut(),
            len,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_PRIVATE,
            file.as_raw_fd(),
            0,
        )
    }
    .with_context(|| format!("Mmap of {:?} failed", path))?;

    let result = unsafe {
        let bytes = std::slice::from_raw_parts_mut(mapping as *mut u8, len);
        bytes[len - 1] = 0;
        parse_records(bytes)
    };

    unsafe {
        let _ = munmap(mapping, len);
    }

    result
}
