// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build script for ScribeFlow.
//!
//! Refuses to build on a toolchain older than the minimum supported
//! Rust version declared in `Cargo.toml`.

use std::process;

/// Minimum supported Rust version.
const MIN_VERSION: &str = "1.74.0";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    match version_check::is_min_version(MIN_VERSION) {
        Some(true) => {}
        Some(false) => {
            eprintln!(
                "ScribeFlow requires rustc >= {}. Please update your toolchain.",
                MIN_VERSION
            );
            process::exit(1);
        }
        None => {
            eprintln!(
                "Unable to determine the rustc version; assuming >= {}.",
                MIN_VERSION
            );
        }
    }
}
