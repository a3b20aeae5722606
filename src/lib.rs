// ENA Webin-CLI Launcher
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # ENA Webin-CLI Launcher Library
//!
//! Locates the single `webin-cli-*.jar` shipped next to the launcher (or in an
//! execution directory chosen with `--exec_dir=`) and runs it on the Java
//! runtime. Command-line tokens are routed to the JVM or to Webin-CLI:
//! - `-D*` / `-XX*` property options and `-Xm*` memory options go to the JVM
//! - default heap bounds are applied when no memory option is given and
//!   `_JAVA_OPTIONS` is unset
//! - all other tokens are forwarded to Webin-CLI unchanged
//!
//! The library can be driven directly through [`Launcher`] or through the
//! provided CLI entry point.

// Re-export the launcher module contents
pub use crate::launcher::*;

pub mod launcher;

// CLI module (not public)
mod cli;

// Export the CLI run function for bin usage
pub use cli::run;
