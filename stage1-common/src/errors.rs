//! Exit-code convention shared by the binaries: each fatal call site gets a
//! distinct, increasing exit code rather than a flat "1", so a bare exit
//! status still tells you roughly where the process died -- the same
//! property the reference helpers got from numbering their `exit_if` sites.
//!
//! Binaries don't hand-number call sites; instead every `bail!`/`Err` that
//! reaches `main` is funneled through [`record_fatal`], which hands out the
//! next counter value process-wide. Call order is therefore the only thing
//! that determines the code, which is enough to distinguish "died early
//! setting up namespaces" from "died late execing the app" across runs of
//! the same binary.

use std::io::Write;
use std::sync::atomic::{AtomicI32, Ordering};

static FATAL_COUNT: AtomicI32 = AtomicI32::new(0);

/// Bump and return the next fatal-site counter value. Never returns 0: the
/// first call yields 1, matching the reference convention that a zero exit
/// means success.
pub fn record_fatal() -> i32 {
    FATAL_COUNT.fetch_add(1, Ordering::SeqCst) + 1
}

/// Print `err` to stderr with the `Error: ` prefix the reference helpers
/// use, then return the exit code `main` should use.
pub fn report(err: &anyhow::Error) -> i32 {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "Error: {:#}", err);
    record_fatal()
}
