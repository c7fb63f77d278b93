use crate::error::{ChronosError, Result};
use simplelog::*;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Once;

static INIT: Once = Once::new();

/// Directory the file logger writes to
pub fn log_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| ChronosError::Logger("HOME environment variable not set".to_string()))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("chronosrs")
        .join("logs"))
}

/// Installs the file logger at `~/.local/share/chronosrs/logs/app.log`.
///
/// Only the first call installs anything; later calls report whether that first one succeeded.
pub fn init_logger() -> Result<()> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("app.log"))?;

    install_once(|| {
        CombinedLogger::init(vec![WriteLogger::new(
            LevelFilter::Debug,
            Config::default(),
            log_file,
        )])
        .is_ok()
    })
}

/// Installs an `env_logger` on stderr, filtered by `RUST_LOG` (default `info`)
pub fn init_stderr_logger() -> Result<()> {
    install_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init()
            .is_ok()
    })
}

fn install_once<F>(install: F) -> Result<()>
where
    F: FnOnce() -> bool,
{
    let mut installed = false;
    INIT.call_once(|| {
        installed = install();
    });

    if installed || log::max_level() != LevelFilter::Off {
        log::info!(
            "chronosrs session started at {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        Ok(())
    } else {
        Err(ChronosError::Logger(
            "Logger initialization failed".to_string(),
        ))
    }
}
