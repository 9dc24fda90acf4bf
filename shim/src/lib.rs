//! Preloaded into the container manager process to patch three of its
//! assumptions: that `/run/systemd/system/` exists, that it owns the pod
//! lock fd, and that it can be fork-tracked by pid. Grounded on the
//! `__lxstat`/`close` pair in `shim.c`; the `clone`-interception and
//! pid-file behavior is new, specified rather than inherited verbatim.
//!
//! Never writes to stderr: this library's stderr belongs to the host
//! program, not to us.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_long};
use std::path::Path;

use once_cell::sync::OnceCell;

use stage1_common::numeric::atoi;
use stage1_common::pidfile::write_pid_file;

const ENV_LOCK_FD: &str = "RKT_LOCK_FD";
const SYSTEMD_SYSTEM_DIR: &str = "/run/systemd/system/";

type LxstatFn = unsafe extern "C" fn(c_int, *const c_char, *mut libc::stat) -> c_int;
type CloseFn = unsafe extern "C" fn(c_int) -> c_int;
type SyscallFn =
    unsafe extern "C" fn(c_long, c_long, c_long, c_long, c_long, c_long, c_long) -> c_long;

static LOCK_FD: OnceCell<c_int> = OnceCell::new();
static REAL_LXSTAT: OnceCell<LxstatFn> = OnceCell::new();
static REAL_CLOSE: OnceCell<CloseFn> = OnceCell::new();
static REAL_SYSCALL: OnceCell<SyscallFn> = OnceCell::new();

unsafe fn resolve<T>(name: &[u8]) -> Option<T> {
    let ptr = libc::dlsym(libc::RTLD_NEXT, name.as_ptr() as *const c_char);
    if ptr.is_null() {
        None
    } else {
        Some(std::mem::transmute_copy(&ptr))
    }
}

#[ctor::ctor]
fn init() {
    let lock_fd = std::env::var(ENV_LOCK_FD)
        .map(|v| atoi(&v) as c_int)
        .unwrap_or(-1);
    let _ = LOCK_FD.set(lock_fd);

    unsafe {
        if let Some(f) = resolve::<LxstatFn>(b"__lxstat\0") {
            let _ = REAL_LXSTAT.set(f);
        }
        if let Some(f) = resolve::<CloseFn>(b"close\0") {
            let _ = REAL_CLOSE.set(f);
        }
        if let Some(f) = resolve::<SyscallFn>(b"syscall\0") {
            let _ = REAL_SYSCALL.set(f);
        }
    }
}

/// Forward to the real `__lxstat`, then paper over a missing
/// `/run/systemd/system/` by synthesizing a directory result.
#[no_mangle]
pub unsafe extern "C" fn __lxstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int {
    let real = match REAL_LXSTAT.get() {
        Some(f) => *f,
        None => return -1,
    };
    let ret = real(ver, path, buf);

    if ret == -1 && std::io::Error::last_os_error().raw_os_error() == Some(libc::ENOENT) {
        let path_str = CStr::from_ptr(path).to_string_lossy();
        if path_str == SYSTEMD_SYSTEM_DIR {
            std::ptr::write_bytes(buf, 0, 1);
            (*buf).st_mode = libc::S_IFDIR;
            return 0;
        }
    }
    ret
}

/// The host program must never close the pod lock fd; set it
/// close-on-exec instead and otherwise delegate.
#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    if let Some(&lock_fd) = LOCK_FD.get() {
        if lock_fd != -1 && fd == lock_fd {
            return libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
        }
    }
    match REAL_CLOSE.get() {
        Some(real) => real(fd),
        None => -1,
    }
}

/// Only `clone` is handled; everything else is refused. On the parent
/// branch of a successful clone, persist the child pid to `pid`.
#[no_mangle]
pub unsafe extern "C" fn syscall(
    number: c_long,
    a1: c_long,
    _a2: c_long,
    _a3: c_long,
    _a4: c_long,
    _a5: c_long,
    _a6: c_long,
) -> c_long {
    if number != libc::SYS_clone {
        return -1;
    }
    let real = match REAL_SYSCALL.get() {
        Some(f) => *f,
        None => return -1,
    };

    let flags = a1;
    let ret = real(number, flags, 0, 0, 0, 0, 0);

    if ret > 0 {
        let _ = write_pid_file(Path::new("pid"), nix::unistd::Pid::from_raw(ret as i32));
    }

    ret
}
