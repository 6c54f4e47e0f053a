// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Error Handling for ScribeFlow
//!
//! This module defines the error type shared by every stage of the
//! ScribeFlow build pipeline. The `thiserror` crate is used to keep the
//! variants declarative and their messages consistent.

use std::path::PathBuf;
use thiserror::Error;

/// A unified result type for the ScribeFlow library.
///
/// This type alias simplifies function signatures by defining a result type that always uses `ScribeFlowError` as the error variant.
pub type Result<T> = std::result::Result<T, ScribeFlowError>;

/// The main error type for ScribeFlow, encompassing all potential error cases.
#[derive(Error, Debug)]
pub enum ScribeFlowError {
    /// Error related to configuration initialisation or validation.
    #[error("Configuration error: {message}.")]
    ConfigError {
        /// Detailed description of the configuration error.
        message: String,
        /// Optional path of the configuration file that caused the error.
        path: Option<PathBuf>,
    },

    /// Error encountered while turning raw sources into entities.
    #[error("Content processing error: {message}.")]
    ContentProcessingError {
        /// Detailed description of the content processing error.
        message: String,
        /// Optional source error providing additional context, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error in HTML output generation.
    ///
    /// Raised when a compiled page cannot be written beneath the output directory.
    #[error("Output generation error: {message} at {path:?}.")]
    OutputGenerationError {
        /// Description of the output generation error.
        message: String,
        /// Path associated with the error.
        path: PathBuf,
        /// Optional source error providing additional context, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error raised by the template engine while compiling or rendering.
    #[error(
        "Template rendering error: {message} in template `{template}`."
    )]
    TemplateRenderingError {
        /// Description of the template rendering error.
        message: String,
        /// The specific template file or identifier associated with the error.
        template: String,
        /// Optional source error providing additional context, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A layout, include or snippet could not be found in the cache or
    /// the byte store.
    #[error("Template Not Found: {path}")]
    TemplateNotFound {
        /// The derived path that was looked up, e.g. `includes/button.html`.
        path: String,
    },

    /// A compile target key matched neither a post nor a page.
    #[error("Entity not found: {key}")]
    EntityNotFound {
        /// The key that was requested.
        key: String,
    },

    /// IO error encountered during file operations.
    #[error("File IO error at `{path:?}`: {source}")]
    IOError {
        /// Path associated with the IO error.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl From<std::io::Error> for ScribeFlowError {
    /// Converts a standard IO error into a `ScribeFlowError::IOError`
    /// with an empty path.
    fn from(source: std::io::Error) -> Self {
        ScribeFlowError::IOError {
            path: PathBuf::new(),
            source,
        }
    }
}

impl ScribeFlowError {
    /// Creates a `ConfigError` with a specific message.
    ///
    /// # Parameters
    /// - `message`: A description of the configuration error.
    /// - `path`: Optional path of the configuration file causing the error.
    pub fn config_error<S: Into<String>>(
        message: S,
        path: Option<PathBuf>,
    ) -> Self {
        ScribeFlowError::ConfigError {
            message: message.into(),
            path,
        }
    }

    /// Creates a `ContentProcessingError` with a specific message and optional source.
    pub fn content_processing_error<S: Into<String>>(
        message: S,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ScribeFlowError::ContentProcessingError {
            message: message.into(),
            source,
        }
    }

    /// Creates an `OutputGenerationError` with a specific message, path, and optional source.
    pub fn output_generation_error<S: Into<String>>(
        message: S,
        path: PathBuf,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ScribeFlowError::OutputGenerationError {
            message: message.into(),
            path,
            source,
        }
    }

    /// Creates a `TemplateRenderingError` with a message, template name, and optional source.
    ///
    /// # Parameters
    /// - `message`: A description of the template rendering error.
    /// - `template`: The template associated with the error.
    /// - `source`: An optional source error providing additional context.
    pub fn template_rendering_error<S: Into<String>>(
        message: S,
        template: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ScribeFlowError::TemplateRenderingError {
            message: message.into(),
            template,
            source,
        }
    }

    /// Creates a `TemplateNotFound` error for the given derived path.
    pub fn template_not_found<S: Into<String>>(path: S) -> Self {
        ScribeFlowError::TemplateNotFound { path: path.into() }
    }

    /// Creates an `EntityNotFound` error for the given key.
    pub fn entity_not_found<S: Into<String>>(key: S) -> Self {
        ScribeFlowError::EntityNotFound { key: key.into() }
    }

    /// Wraps an IO error as an `IOError` variant with the specified path.
    pub fn io_error(path: PathBuf, source: std::io::Error) -> Self {
        ScribeFlowError::IOError { path, source }
    }

    /// Returns `true` when the error reports a missing template.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScribeFlowError::TemplateNotFound { .. })
    }
}
