// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Content Processors Module
//!
//! Body transformations applied between template passes.
//!
//! ## Available Processors
//!
//! - [`markdown`]: Markdown to HTML with highlighted fenced code
//! - [`highlight`]: The built-in span highlighter and `<pre><code>` wrapping
//!
//! ## Implementing Custom Processors
//!
//! A processor that keeps the part of a post above its `<!--more-->`
//! marker:
//!
//! ```rust
//! use scribeflow::core::error::Result;
//! use scribeflow::core::traits::Processor;
//!
//! #[derive(Debug)]
//! struct Excerpt;
//!
//! impl Processor for Excerpt {
//!     type Input = String;
//!     type Output = String;
//!     type Context = ();
//!
//!     fn process(&self, body: String, _: Option<&()>) -> Result<String> {
//!         Ok(body.split("<!--more-->").next().unwrap_or_default().to_string())
//!     }
//! }
//!
//! let excerpt = Excerpt.process("Intro<!--more-->Rest".into(), None).unwrap();
//! assert_eq!(excerpt, "Intro");
//! ```

/// Syntax highlighting for code blocks and snippets.
pub mod highlight;

/// Markdown to HTML conversion.
pub mod markdown;

pub use highlight::SpanHighlighter;
pub use markdown::MarkdownProcessor;
