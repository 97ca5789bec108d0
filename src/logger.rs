use crate::{clock, config::LogConfig};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::Level;
use std::{fs::OpenOptions, io::Write};

/// Route all `log` records to the append-only log file.
///
/// Every line looks like `2024-01-01 01:02:03 PM [WARN]   message`. Levels
/// listed in `IGNORED_LOG_LEVELS` are dropped entirely.
pub fn init(config: &LogConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .context(format!("failed to open log file: {:?}", config.file))?;

    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter()));

    let ignored_levels = config.ignored_levels.clone();

    builder.format(move |f, record| {
        if is_ignored(record.level(), &ignored_levels) {
            return Ok(());
        }
        writeln!(
            f,
            "{}",
            format_line(&clock::format(&clock::now()), record.level(), record.args())
        )
    });

    builder
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .context("failed to initialize logger")
}

/// Everything this crate logs passes; `IGNORED_LOG_LEVELS` is the level switch
fn default_filter() -> String {
    format!("warn,{}=debug", env!("CARGO_CRATE_NAME"))
}

fn is_ignored(level: Level, ignored_levels: &[String]) -> bool {
    ignored_levels
        .iter()
        .any(|ignored| ignored.eq_ignore_ascii_case(level.as_str()))
}

fn format_line(timestamp: &str, level: Level, message: impl std::fmt::Display) -> String {
    let level = format!("[{level}]");
    format!("{timestamp} {level:<8} {message}")
}
