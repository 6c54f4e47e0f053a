// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Core Traits Module
//!
//! The seams of the build pipeline. Each trait has a built-in
//! implementation and can be replaced by callers.
//!
//! ## Key Traits
//!
//! - [`Processor`]: Core trait for content processing implementations
//! - [`Generator`]: Trait for output generation
//! - [`ByteStore`]: Source of partials that are not yet cached
//! - [`Highlighter`]: Syntax highlighting for code blocks and snippets

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{Result, ScribeFlowError};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

/// Core trait for implementing content processors.
///
/// # Type Parameters
///
/// * `Input`: The type of content being processed
/// * `Output`: The type of content produced
/// * `Context`: Additional context or configuration for processing
pub trait Processor: Send + Sync + fmt::Debug {
    /// The type of input content for the processor.
    type Input;
    /// The type of output content produced by the processor.
    type Output;
    /// The type of context or configuration used by the processor.
    type Context;

    /// Processes the input content using optional context information.
    fn process(
        &self,
        input: Self::Input,
        context: Option<&Self::Context>,
    ) -> Result<Self::Output>;
}

/// Trait for implementing output generation.
pub trait Generator: Send + Sync + fmt::Debug {
    /// Generates output from the given content.
    ///
    /// # Arguments
    ///
    /// * `content` - The content to generate output from
    /// * `path` - The path where the output should be written
    /// * `options` - Optional configuration for the generation process
    fn generate(
        &self,
        content: &str,
        path: &Path,
        options: Option<&JsonValue>,
    ) -> Result<()>;

    /// Validates the generation parameters without performing the generation.
    fn validate(
        &self,
        path: &Path,
        options: Option<&JsonValue>,
    ) -> Result<()>;
}

/// Read access to partial sources by short key.
///
/// Consulted by the template resolver when a layout, include or snippet
/// is not in the content store yet.
pub trait ByteStore: Send + Sync + fmt::Debug {
    /// Reads the text stored under `key` (e.g. `includes/head.html`).
    fn read(&self, key: &str) -> Result<String>;
}

/// Syntax highlighting for code blocks.
pub trait Highlighter: Send + Sync + fmt::Debug {
    /// Returns `code` as HTML-escaped markup, optionally decorated with
    /// highlighting spans. The result is placed inside `<code>`.
    fn highlight(&self, code: &str, lang: Option<&str>) -> String;
}

/// Byte store backed by a site directory.
///
/// Short keys map to underscore-prefixed folders, so `includes/head.html`
/// is read from `<root>/_includes/head.html`.
#[derive(Debug, Clone)]
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    /// Creates a byte store rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Filesystem location for a short key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("_{}", key.trim_start_matches('/')))
    }
}

impl ByteStore for FsByteStore {
    fn read(&self, key: &str) -> Result<String> {
        let path = self.path_for(key);
        fs::read_to_string(&path)
            .map_err(|e| ScribeFlowError::io_error(path, e))
    }
}

/// In-memory byte store, used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryByteStore {
    files: RwLock<HashMap<String, String>>,
}

impl MemoryByteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file and returns the store.
    pub fn with_file<K, V>(self, key: K, content: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.insert(key, content);
        self
    }

    /// Adds or replaces a file.
    pub fn insert<K, V>(&self, key: K, content: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        _ = self.files.write().insert(key.into(), content.into());
    }
}

impl ByteStore for MemoryByteStore {
    fn read(&self, key: &str) -> Result<String> {
        self.files.read().get(key).cloned().ok_or_else(|| {
            ScribeFlowError::io_error(
                PathBuf::from(key),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "not in memory store",
                ),
            )
        })
    }
}
