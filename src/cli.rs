// ENA Webin-CLI Launcher
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # Launcher CLI
//!
//! Entry point for the `ena-webin-cli` binary. Every argument belongs to the
//! JVM or to Webin-CLI itself, so the launcher takes its own settings from the
//! environment instead of flags:
//! - `WEBIN_CLI_LAUNCHER_LOG`: log level (trace, debug, info, warn, error)
//! - `WEBIN_CLI_LAUNCHER_CONFIG`: path to a JSON [`LauncherConfig`] file

use std::{env, ffi::OsString, io::Write, iter, path::Path};

use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use log::{debug, info, LevelFilter};

use crate::{Launcher, LauncherConfig, LauncherResult};

/// Variable selecting the launcher's log level
pub const LOG_LEVEL_VAR: &str = "WEBIN_CLI_LAUNCHER_LOG";

/// Variable naming an optional launcher configuration file
pub const CONFIG_VAR: &str = "WEBIN_CLI_LAUNCHER_CONFIG";

/// ENA Webin-CLI launcher
#[derive(Parser, Debug)]
#[command(name = "ena-webin-cli")]
#[command(about = "Runs the bundled Webin-CLI jar on the Java runtime", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// JVM options (-D*, -XX*, -Xm*), --exec_dir=<path> and Webin-CLI arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

impl Cli {
    /// Parse a full argument vector, forwarding every token after the
    /// program name verbatim (including `--` and non UTF-8 bytes).
    fn parse_raw<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next().unwrap_or_else(|| OsString::from("ena-webin-cli"));

        // Our own end-of-options marker, so clap never consumes a caller's `--`.
        let escaped = iter::once(program)
            .chain(iter::once(OsString::from("--")))
            .chain(argv);
        Self::try_parse_from(escaped)
    }
}

fn log_level(value: Option<&str>) -> LevelFilter {
    match value.map(|level| level.trim().to_lowercase()).as_deref() {
        Some("trace") => LevelFilter::Trace,
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

fn init_logging(level: LevelFilter) {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter(None, level)
        .init();
}

fn load_config() -> LauncherResult<LauncherConfig> {
    match env::var_os(CONFIG_VAR) {
        Some(path) if !path.is_empty() => {
            debug!("Loading configuration from {}", Path::new(&path).display());
            LauncherConfig::load(Path::new(&path))
        }
        _ => Ok(LauncherConfig::default()),
    }
}

/// Main entry point for the CLI. Returns the exit code of Webin-CLI.
pub fn run() -> LauncherResult<i32> {
    let cli = Cli::parse_raw(env::args_os()).unwrap_or_else(|e| e.exit());

    init_logging(log_level(env::var(LOG_LEVEL_VAR).ok().as_deref()));
    info!("Webin-CLI launcher starting");

    let config = load_config()?;
    debug!("Launcher configuration: {:?}", config);

    let launcher = Launcher::from_process(config)?;
    debug!("Launcher directory: {}", launcher.home_dir().display());

    launcher.launch(cli.args)
}
