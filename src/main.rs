// ENA Webin-CLI Launcher
// Copyright (c) 2024-2025 The Mapleseed Inc.
// Licensed under GPL-3.0 License

//! # ENA Webin-CLI Launcher
//!
//! Runs the bundled Webin-CLI jar and exits with its exit code.

fn main() {
    match ena_webin_cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
