//! Logger setup: colored level-tagged stdout plus daily rotating log files.

use std::fs;

use colored::*;
use log::Level;

/// Initializes the global logger for `app_name` at the given verbosity
/// (0 = errors only, 4+ = trace). Writes `log/<app_name>/<app_name>.<date>.log`
/// (this app's own records) and a `.full.log` sibling (everything, for
/// cross-crate debugging), in addition to colored stdout output.
pub fn init(app_name: impl AsRef<str>, verbosity: u64) -> Result<(), fern::InitError> {
    let log_root = format!("log/{}", app_name.as_ref());
    fs::create_dir_all(&log_root).expect("failed to create log directory");

    let level = match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let stdout_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                match record.level() {
                    Level::Error => format!("{}", record.level()).red(),
                    Level::Warn => format!("{}", record.level()).yellow(),
                    Level::Info => format!("{}", record.level()).cyan(),
                    Level::Debug => format!("{}", record.level()).purple(),
                    Level::Trace => format!("{}", record.level()).normal(),
                },
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for(app_name.as_ref().to_string(), log::LevelFilter::Trace)
        .chain(std::io::stdout());

    let log_file_root = format!(
        "{}/{}.{}",
        log_root,
        app_name.as_ref(),
        chrono::Utc::now().format("%Y_%m_%d")
    );

    let app_file_dispatch = fern::Dispatch::new()
        .level(log::LevelFilter::Off)
        .level_for(app_name.as_ref().to_string(), log::LevelFilter::Trace)
        .chain(fern::log_file(format!("{log_file_root}.log"))?);

    let full_file_dispatch =
        fern::Dispatch::new().chain(fern::log_file(format!("{log_file_root}.full.log"))?);

    let files_dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(app_file_dispatch)
        .chain(full_file_dispatch);

    fern::Dispatch::new()
        .chain(stdout_dispatch)
        .chain(files_dispatch)
        .apply()?;

    Ok(())
}
