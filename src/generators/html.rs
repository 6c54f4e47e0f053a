// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # HTML Output Generation
//!
//! Writes compiled pages beneath an output directory, implementing the
//! [`Generator`] trait. Output can be minified with `minify-html`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use scribeflow::generators::html::HtmlGenerator;
//! use scribeflow::CompiledPage;
//!
//! let generator = HtmlGenerator::new("_site").with_minification(true);
//! let page = CompiledPage {
//!     file_path: "blog/hello/index.html".to_string(),
//!     url: "/blog/hello".to_string(),
//!     compiled: "<h1>Hello</h1>".to_string(),
//! };
//! let written = generator.write_page(&page).unwrap();
//! assert!(written.ends_with("blog/hello/index.html"));
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::debug;
use minify_html::{minify, Cfg};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::core::error::{Result, ScribeFlowError};
use crate::core::traits::Generator;
use crate::render::CompiledPage;

/// Options for HTML output.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Minify HTML, inline CSS and inline JS.
    pub minify: bool,
}

/// Writes HTML files beneath an output directory.
#[derive(Clone)]
pub struct HtmlGenerator {
    output_dir: PathBuf,
    config: Arc<RwLock<OutputConfig>>,
}

impl HtmlGenerator {
    /// Creates a generator writing beneath `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            config: Arc::new(RwLock::new(OutputConfig::default())),
        }
    }

    /// Enables or disables HTML minification.
    pub fn with_minification(self, enable: bool) -> Self {
        self.config.write().minify = enable;
        self
    }

    /// The output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Current output options.
    pub fn get_config(&self) -> OutputConfig {
        *self.config.read()
    }

    /// Writes a compiled page to `<output_dir>/<file_path>` and returns
    /// the path written.
    pub fn write_page(&self, page: &CompiledPage) -> Result<PathBuf> {
        let path = self.output_path(&page.file_path)?;
        self.generate(&page.compiled, &path, None)?;
        debug!("Wrote {} ({})", path.display(), page.url);
        Ok(path)
    }

    /// Output location of a relative file path. Paths escaping the output
    /// directory are rejected.
    pub fn output_path(&self, file_path: &str) -> Result<PathBuf> {
        let relative = Path::new(file_path.trim_start_matches('/'));
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

        if escapes || file_path.is_empty() {
            return Err(ScribeFlowError::output_generation_error(
                "File path leaves the output directory",
                relative.to_path_buf(),
                None,
            ));
        }
        Ok(self.output_dir.join(relative))
    }

    fn process_html(&self, content: &str, options: Option<&JsonValue>) -> Result<String> {
        let minify_requested = options
            .and_then(|opts| opts.get("minify"))
            .and_then(JsonValue::as_bool)
            .unwrap_or(self.config.read().minify);

        if minify_requested {
            self.minify_html(content)
        } else {
            Ok(content.to_string())
        }
    }

    /// Minifies HTML content using the `minify-html` crate.
    fn minify_html(&self, content: &str) -> Result<String> {
        let cfg = Cfg {
            minify_css: true,
            minify_js: true,
            ..Cfg::default()
        };
        String::from_utf8(minify(content.as_bytes(), &cfg)).map_err(|e| {
            ScribeFlowError::output_generation_error(
                "HTML minification failed",
                PathBuf::new(),
                Some(Box::new(e)),
            )
        })
    }
}

impl Generator for HtmlGenerator {
    fn generate(
        &self,
        content: &str,
        path: &Path,
        options: Option<&JsonValue>,
    ) -> Result<()> {
        self.validate(path, options)?;
        let processed = self.process_html(content, options)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ScribeFlowError::io_error(parent.to_path_buf(), e)
            })?;
        }
        let file = File::create(path)
            .map_err(|e| ScribeFlowError::io_error(path.to_path_buf(), e))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(processed.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn validate(
        &self,
        path: &Path,
        options: Option<&JsonValue>,
    ) -> Result<()> {
        if path.extension().and_then(|s| s.to_str()) != Some("html") {
            return Err(ScribeFlowError::output_generation_error(
                "Invalid file extension - expected .html",
                path.to_path_buf(),
                None,
            ));
        }

        if let Some(opts) = options {
            let Some(obj) = opts.as_object() else {
                return Err(ScribeFlowError::output_generation_error(
                    "Invalid options format - expected JSON object",
                    path.to_path_buf(),
                    None,
                ));
            };
            for (key, value) in obj {
                match key.as_str() {
                    "minify" if !value.is_boolean() => {
                        return Err(ScribeFlowError::output_generation_error(
                            "minify option must be a boolean",
                            path.to_path_buf(),
                            None,
                        ));
                    }
                    "minify" => {}
                    _ => log::warn!("Unknown option key: {}", key),
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HtmlGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlGenerator")
            .field("output_dir", &self.output_dir)
            .field("config", &*self.config.read())
            .finish()
    }
}
