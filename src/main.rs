// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # ScribeFlow CLI
//!
//! This is the main entry point for the ScribeFlow command-line interface.
//! It loads the configuration, initialises the logger and runs the build.

use anyhow::Context;
use log::info;
use scribeflow::cli::{self, BuildArgs};

/// Loads the configuration and builds the site.
///
/// # Errors
///
/// Fails when the configuration cannot be loaded, the source directory is
/// missing, a page fails to compile or the output cannot be written.
fn run(args: &BuildArgs) -> anyhow::Result<()> {
    let config = args
        .to_config()
        .context("Failed to load ScribeFlow configuration")?;

    env_logger::Builder::new()
        .filter_level(args.level_filter(&config))
        .init();
    info!("Starting ScribeFlow v{}", cli::VERSION);

    let written = cli::execute(args, &config).with_context(|| {
        format!("Failed to build {}", config.build.source_dir.display())
    })?;

    println!(
        "Built {} pages into {}",
        written.len(),
        config.build.output_dir.display()
    );
    Ok(())
}

/// The main entry point for the ScribeFlow CLI.
fn main() {
    let matches = cli::build().get_matches();

    let result = match BuildArgs::from_matches(&matches) {
        Some(args) => run(&args),
        None => {
            println!("No command provided. Use --help for more information.");
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
