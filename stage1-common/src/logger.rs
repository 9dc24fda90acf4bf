//! A minimal `log::Log` implementation shared by the stage1 binaries.
//!
//! Unlike the host container manager, `diagexec` and the preload shim must
//! not let this logger's output land on the application's or the manager's
//! stderr (see spec §7), so only `prepare-app` and `enter` call [`init`].

use std::env;
use std::fs::OpenOptions;
use std::io::{stderr, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

static STAGE1_LOGGER: OnceCell<Stage1Logger> = OnceCell::new();
static LOG_FILE: OnceCell<Option<std::fs::File>> = OnceCell::new();

/// Initialize the global logger. Level is taken from `STAGE1_LOG_LEVEL`,
/// defaulting to `Warn`. If `log_file` is given, records are appended there
/// instead of stderr.
pub fn init(log_file: Option<PathBuf>) -> Result<()> {
    LOG_FILE.get_or_init(|| -> Option<std::fs::File> {
        let level_filter = env::var("STAGE1_LOG_LEVEL")
            .ok()
            .and_then(|s| LevelFilter::from_str(&s).ok())
            .unwrap_or(LevelFilter::Warn);

        let logger = STAGE1_LOGGER.get_or_init(|| Stage1Logger::new(level_filter.to_level()));
        log::set_logger(logger)
            .map(|()| log::set_max_level(level_filter))
            .expect("set logger failed");

        log_file.as_ref().map(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .expect("failed opening log file")
        })
    });
    Ok(())
}

pub struct Stage1Logger {
    level: Option<log::Level>,
}

impl Stage1Logger {
    pub fn new(level: Option<log::Level>) -> Self {
        Self { level }
    }
}

impl Log for Stage1Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.level {
            Some(level) => metadata.level() <= level,
            None => false,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = match (record.file(), record.line()) {
            (Some(file), Some(line)) => format!(
                "[{} {}:{}] {} {}",
                record.level(),
                file,
                line,
                chrono::Local::now().to_rfc3339(),
                record.args()
            ),
            _ => format!(
                "[{}] {} {}",
                record.level(),
                chrono::Local::now().to_rfc3339(),
                record.args()
            ),
        };

        if let Some(mut log_file) = LOG_FILE.get().and_then(|f| f.as_ref()) {
            let _ = writeln!(log_file, "{}", msg);
        } else {
            let _ = writeln!(stderr(), "{}", msg);
        }
    }

    fn flush(&self) {
        if let Some(mut log_file) = LOG_FILE.get().and_then(|f| f.as_ref()) {
            let _ = log_file.flush();
        } else {
            let _ = stderr().flush();
        }
    }
}
