// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Output Generators
//!
//! Writers for compiled pages.
//!
//! - [`html`]: writes HTML beneath an output directory, optionally minified

/// HTML output generation.
pub mod html;

pub use html::HtmlGenerator;
