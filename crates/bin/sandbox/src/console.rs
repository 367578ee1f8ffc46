use std::path::PathBuf;

use structopt::StructOpt;

use raven_rg::{ExecutorConfig, RecordingMode};

/// Console variables collect from console commands.
pub struct ConsoleVars {
    pub level: log::LevelFilter,
    pub log_file: Option<PathBuf>,
    pub frames: u32,
    pub executor: ExecutorConfig,
    pub dot: Option<PathBuf>,
    pub debug_vis: bool,
}

#[derive(Debug, StructOpt)]
#[structopt(name = "raven render graph sandbox", about = "Builds and runs a deferred frame graph on a null device.")]
struct ConsoleVarsImpl {
    /// log level (please choose from trace, debug, info, warn, error)
    #[structopt(short, long, default_value = "debug")]
    level: String,

    /// also write the log to this file
    #[structopt(long, parse(from_os_str))]
    log_file: Option<PathBuf>,

    /// number of frames to build and execute
    #[structopt(short, long, default_value = "3")]
    frames: u32,

    /// record pass callbacks on worker threads
    #[structopt(short, long)]
    parallel: bool,

    /// worker threads used by --parallel
    #[structopt(short, long, default_value = "4")]
    workers: usize,

    /// frames a cached transient survives unused
    #[structopt(long, default_value = "2")]
    max_unused_frames: u64,

    /// write the first frame's graph to this Graphviz file
    #[structopt(long, parse(from_os_str))]
    dot: Option<PathBuf>,

    /// add a debug visualization pass nothing consumes
    #[structopt(long)]
    debug_vis: bool,
}

/// Collect console configuration into a struct.
pub fn from_args() -> anyhow::Result<ConsoleVars> {
    let console_var = ConsoleVarsImpl::from_args();

    let recording = if console_var.parallel {
        RecordingMode::Parallel {
            workers: console_var.workers,
        }
    } else {
        RecordingMode::Serial
    };

    Ok(ConsoleVars {
        level: raven_log::level_from_str(&console_var.level)?,
        log_file: console_var.log_file,
        frames: console_var.frames,
        executor: ExecutorConfig {
            recording,
            max_unused_frames: console_var.max_unused_frames,
        },
        dot: console_var.dot,
        debug_vis: console_var.debug_vis,
    })
}
