// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-line interface for ScribeFlow
//!
//! This module builds the `clap` command, turns matches into a
//! [`Config`] and runs the requested subcommand.
//!
//! # Examples
//!
//! Parsing a `build` command:
//!
//! ```
//! use scribeflow::cli;
//!
//! let matches = cli::build().get_matches_from(vec![
//!     "scribeflow",
//!     "build",
//!     "--source",
//!     "site",
//!     "--minify",
//! ]);
//!
//! let build_cmd = matches.subcommand_matches("build").unwrap();
//! assert!(build_cmd.get_flag("minify"));
//! ```

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{debug, LevelFilter};

use crate::core::config::{Config, ConfigBuilder};
use crate::core::error::{Result, ScribeFlowError};
use crate::process;

/// The current version of ScribeFlow, as defined in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default source directory.
pub const DEFAULT_SOURCE_DIR: &str = ".";
/// Default output directory for compiled pages.
pub const DEFAULT_OUTPUT_DIR: &str = "_site";
/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "SCRIBEFLOW_";

/// Builds and configures the ScribeFlow command-line interface.
pub fn build() -> Command {
    Command::new("scribeflow")
        .author("ScribeFlow Contributors")
        .about("Compiles blogs and sites from Markdown, HTML and front matter.")
        .version(VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log output (-v, -vv, -vvv)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("build")
                .about("Build the site")
                .arg(
                    Arg::new("source")
                        .short('s')
                        .long("source")
                        .help("Source directory")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(DEFAULT_SOURCE_DIR),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Output directory")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(DEFAULT_OUTPUT_DIR),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("TOML build configuration")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("minify")
                        .short('m')
                        .long("minify")
                        .help("Minify output")
                        .action(ArgAction::SetTrue),
                ),
        )
        .after_help(
            "\x1b[1;4mLicense:\x1b[0m\n  The project is licensed under the terms of \
             both the MIT license and the Apache License (Version 2.0).",
        )
}

/// Arguments of the `build` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    /// Source directory.
    pub source: PathBuf,
    /// Output directory.
    pub output: PathBuf,
    /// Optional TOML build configuration.
    pub config: Option<PathBuf>,
    /// Minify written HTML.
    pub minify: bool,
    /// Number of `-v` flags.
    pub verbose: u8,
}

impl BuildArgs {
    /// Extracts the `build` arguments from top-level matches.
    pub fn from_matches(matches: &ArgMatches) -> Option<Self> {
        let sub = matches.subcommand_matches("build")?;
        Some(Self {
            source: sub.get_one::<PathBuf>("source")?.clone(),
            output: sub.get_one::<PathBuf>("output")?.clone(),
            config: sub.get_one::<PathBuf>("config").cloned(),
            minify: sub.get_flag("minify"),
            verbose: sub.get_count("verbose"),
        })
    }

    /// Loads the build configuration.
    ///
    /// The TOML file is applied first, then `SCRIBEFLOW_*` variables, then
    /// the command-line directories. `--minify` only ever turns minification
    /// on.
    pub fn to_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new().with_env_prefix(ENV_PREFIX);
        if let Some(file) = &self.config {
            builder = builder.with_file(file);
        }

        builder = builder
            .with_override("build.source_dir", path_value(&self.source)?)
            .with_override("build.output_dir", path_value(&self.output)?);
        if self.minify {
            builder = builder.with_override("build.minify", true);
        }
        builder.build()
    }

    /// Log level: `-v` flags win over the configured level.
    pub fn level_filter(&self, config: &Config) -> LevelFilter {
        match self.verbose {
            0 => config.level_filter().unwrap_or(LevelFilter::Warn),
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn path_value(path: &std::path::Path) -> Result<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        ScribeFlowError::config_error(
            format!("Path is not valid UTF-8: {}", path.display()),
            Some(path.to_path_buf()),
        )
    })
}

/// Runs the `build` subcommand and returns the files written.
pub fn execute(args: &BuildArgs, config: &Config) -> Result<Vec<PathBuf>> {
    debug!("Executing build with {:?}", args);
    process::build_site(config)
}
