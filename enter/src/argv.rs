//! Builds the argv handed to `/diagexec`. Grounded on `enter.c`'s
//! `ENTER_ARGV_FWD_OFFSET`/`DIAGEXEC_ARGV_FWD_OFFSET` bookkeeping, expressed
//! as a plain `Vec` build instead of index arithmetic over a shared array.

use std::ffi::CString;

use anyhow::{bail, Result};

const PATH_MAX: usize = 4096;

pub fn diagexec_path() -> &'static str {
    "/diagexec"
}

/// `cmd_and_args[0]` is the app's entrypoint, the rest its arguments.
pub fn build_diagexec_argv(imageid: &str, cmd_and_args: &[String]) -> Result<Vec<CString>> {
    let root = format!("/opt/stage2/{}/rootfs", imageid);
    if root.len() >= PATH_MAX {
        bail!("Root path overflow");
    }
    let env = format!("/rkt/env/{}", imageid);
    if env.len() >= PATH_MAX {
        bail!("Env path overflow");
    }

    let mut argv = vec![
        diagexec_path().to_string(),
        root,
        "/".to_string(),
        env,
        "0".to_string(),
        "0".to_string(),
    ];
    argv.extend(cmd_and_args.iter().cloned());

    argv.into_iter()
        .map(|s| CString::new(s).map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_layout_matches_diagexec_calling_convention() {
        let argv = build_diagexec_argv(
            "deadbeef",
            &["/bin/sh".to_string(), "-c".to_string(), "echo hi".to_string()],
        )
        .unwrap();
        let argv: Vec<String> = argv.into_iter().map(|c| c.into_string().unwrap()).collect();
        assert_eq!(
            argv,
            vec![
                "/diagexec",
                "/opt/stage2/deadbeef/rootfs",
                "/",
                "/rkt/env/deadbeef",
                "0",
                "0",
                "/bin/sh",
                "-c",
                "echo hi",
            ]
        );
    }

    #[test]
    fn app_with_no_extra_arguments_still_has_fixed_prefix() {
        let argv = build_diagexec_argv("abc", &["/bin/true".to_string()]).unwrap();
        assert_eq!(argv.len(), 7);
    }
}
