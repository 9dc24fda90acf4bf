//! The fixed rootfs skeleton: canonical directories, device-node mirrors,
//! and bind-mounted host directories. Grounded on the static tables in
//! `prepare-app.c` (`dirs`, `devnodes`, `bind_dirs`).

use nix::sys::stat::Mode;

/// A directory to create relative to the opened rootfs descriptor, with its
/// mode. Order matters: parents before children.
pub struct DirSpec {
    pub path: &'static str,
    pub mode: Mode,
}

pub fn canonical_dirs() -> Vec<DirSpec> {
    vec![
        DirSpec {
            path: "dev",
            mode: Mode::from_bits_truncate(0o755),
        },
        DirSpec {
            path: "dev/net",
            mode: Mode::from_bits_truncate(0o755),
        },
        DirSpec {
            path: "dev/shm",
            mode: Mode::from_bits_truncate(0o755),
        },
        DirSpec {
            path: "proc",
            mode: Mode::from_bits_truncate(0o755),
        },
        DirSpec {
            path: "sys",
            mode: Mode::from_bits_truncate(0o755),
        },
        DirSpec {
            path: "tmp",
            mode: Mode::from_bits_truncate(0o1777),
        },
        DirSpec {
            path: "dev/pts",
            mode: Mode::from_bits_truncate(0o755),
        },
    ]
}

/// Dangling symlinks some stock images ship that must be removed before the
/// directory skeleton is (re-)created.
pub const STALE_SYMLINKS: &[&str] = &["dev/shm", "dev/ptmx"];

/// Host device nodes mirrored into the rootfs, in order. Each is optional:
/// absence on the host means skip, not fail.
pub const DEVICE_NODES: &[&str] = &[
    "/dev/null",
    "/dev/zero",
    "/dev/full",
    "/dev/random",
    "/dev/urandom",
    "/dev/tty",
    "/dev/net/tun",
    "/dev/console",
];

/// Host directories bind-mounted wholesale into the rootfs.
pub const BIND_DIRS: &[&str] = &["/proc", "/sys", "/dev/shm", "/dev/pts"];
