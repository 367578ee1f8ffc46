use std::collections::HashSet;
use std::path::PathBuf;

use fern::colors::{Color, ColoredLevelConfig};

pub use log::LevelFilter;

lazy_static::lazy_static! {
    static ref GLOBAL_MUTE_MODULE_NAMES: HashSet<&'static str> = HashSet::from([
        "raven_thread::thread_pool::worker",
    ]);
}

/// Log configuration.
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// Also write uncolored records to this file, truncating it first.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Debug,
            file: None,
        }
    }
}

/// Parse a console log level (trace, debug, info, warn, error, off).
pub fn level_from_str(level: &str) -> anyhow::Result<LevelFilter> {
    let level = match level.to_lowercase().trim() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        other => anyhow::bail!("Unknown log level: {:?}", other),
    };

    Ok(level)
}

/// Initialize the global logger. Fails if a logger is already installed.
pub fn init_log(config: LogConfig) -> anyhow::Result<()> {
    setup_logger(&config)?;

    log::trace!("log initialized!");
    Ok(())
}

fn is_muted(target: &str) -> bool {
    GLOBAL_MUTE_MODULE_NAMES.contains(target)
}

fn setup_logger(config: &LogConfig) -> anyhow::Result<()> {
    // setup colors
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Magenta)
        .info(Color::Cyan)
        .warn(Color::Yellow)
        .error(Color::Red);

    // standard output dispatch, for trace, debug and info messages.
    let stdout = fern::Dispatch::new()
        .filter(|meta| meta.level() >= log::Level::Info && !is_muted(meta.target()))
        .chain(std::io::stdout());

    // standard error dispatch, for warn and error messages.
    let stderr = fern::Dispatch::new()
        .level(LevelFilter::Warn)
        .filter(|meta| !is_muted(meta.target()))
        .chain(std::io::stderr());

    // console output with the colors
    let console_output = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .chain(stdout)
        .chain(stderr);

    let mut dispatch = fern::Dispatch::new()
        .level(config.level) // setup base log level from user
        .chain(console_output);

    if let Some(path) = &config.file {
        let file_output = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{}[{}][{}] {}",
                    chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                    record.target(),
                    record.level(),
                    message
                ))
            })
            .chain(std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?);

        dispatch = dispatch.chain(file_output);
    }

    dispatch.apply()?;
    Ok(())
}
