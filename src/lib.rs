// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # ScribeFlow Library
//!
//! ScribeFlow compiles blogs and sites from Markdown and HTML sources with
//! YAML front matter. Posts, pages, layouts, includes, snippets and data
//! are cached in a content store; templates are rendered with Handlebars
//! and bodies converted with `pulldown-cmark`.
//!
//! For more information, visit the [ScribeFlow documentation](https://docs.rs/scribeflow).

#![doc = include_str!("../README.md")]
#![doc(html_root_url = "https://docs.rs/scribeflow")]
#![crate_name = "scribeflow"]
#![crate_type = "lib"]

use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use crate::content::Item;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::traits::{ByteStore, Highlighter};
use crate::processors::markdown::MarkdownProcessor;
use crate::render::{CompileOutput, CompileTarget, Orchestrator};
use crate::store::{CacheSnapshot, ContentStore};
use crate::template::{TemplateEngine, TemplateResolver};

/// Core utilities: configuration, errors and extension traits.
pub mod core;

/// Provides command-line interface utilities.
pub mod cli;

/// Posts, pages, partials and data entries.
pub mod content;

/// Render scopes and include sandboxes.
pub mod context;

/// Provides output generation utilities.
pub mod generators;

/// Short keys and lookup paths.
pub mod keys;

/// Splits collections into listing pages.
pub mod paginator;

/// Source discovery for site directories.
pub mod process;

/// Markdown and syntax highlighting.
pub mod processors;

/// The render pipeline.
pub mod render;

/// The content store.
pub mod store;

/// Template resolution and the Handlebars engine.
pub mod template;

pub use crate::core::error::ScribeFlowError;
pub use crate::render::CompiledPage;

/// Where [`ScribeFlow::populate_cache`] files a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheKind {
    /// A layout, include or snippet.
    #[default]
    Partial,
    /// A YAML or JSON data file.
    Data,
}

/// A site compiler: one content store, one template engine.
#[derive(Debug)]
pub struct ScribeFlow {
    store: Arc<RwLock<ContentStore>>,
    engine: TemplateEngine,
    markdown: MarkdownProcessor,
}

impl ScribeFlow {
    /// Creates a compiler that reads uncached partials from `bytes`.
    pub fn new(bytes: Arc<dyn ByteStore>) -> Self {
        let store = Arc::new(RwLock::new(ContentStore::new()));
        let resolver =
            Arc::new(TemplateResolver::new(Arc::clone(&store), bytes));

        Self {
            store,
            engine: TemplateEngine::new(resolver),
            markdown: MarkdownProcessor::new()
                .with_tables(true)
                .with_strikethrough(true)
                .with_footnotes(true),
        }
    }

    /// Replaces the highlighter for fenced code, snippets and `highlight`.
    pub fn with_highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.engine.resolver().set_highlighter(Arc::clone(&highlighter));
        self.markdown = self.markdown.with_highlighter(Some(highlighter));
        self
    }

    /// Adds a post, returning the cached one when the key is known.
    pub fn add_post(&self, key: &str, raw: &str, config: &Config) -> Arc<Item> {
        self.store.write().insert_post(Item::post(key, raw, config))
    }

    /// Adds a page, returning the cached one when the key is known.
    pub fn add_page(&self, key: &str, raw: &str, config: &Config) -> Arc<Item> {
        self.store.write().insert_page(Item::page(key, raw, config))
    }

    /// Caches a partial (and compiles it) or a data file.
    pub fn populate_cache(&self, key: &str, raw: &str, kind: CacheKind) -> Result<()> {
        match kind {
            CacheKind::Partial => self.engine.populate_cache(key, raw),
            CacheKind::Data => {
                self.add_data(key, JsonValue::String(raw.to_string()));
                Ok(())
            }
        }
    }

    /// Adds a data value. Text under YAML or JSON keys is parsed.
    pub fn add_data(&self, key: &str, value: JsonValue) {
        _ = self.store.write().add_data(key, value);
    }

    /// Compiles a post or page.
    ///
    /// Keys are looked up in posts, then pages. Paginated items yield
    /// [`CompileOutput::Paginated`].
    pub fn compile_one<T>(&self, target: T, config: &Config) -> Result<CompileOutput>
    where
        T: Into<CompileTarget>,
    {
        if let Some(level) = config.level_filter() {
            log::set_max_level(level);
        }

        let site = config.load_site();
        Orchestrator::new(&self.engine, &self.store, &self.markdown, config, site)
            .compile(target.into())
    }

    /// Compiles a target and hands the result to `callback`, once.
    pub fn compile_with<T, F>(&self, target: T, config: &Config, callback: F)
    where
        T: Into<CompileTarget>,
        F: FnOnce(Result<CompileOutput>),
    {
        callback(self.compile_one(target, config));
    }

    /// Empties the content store and the compiled template table.
    pub fn clear_cache(&self) {
        debug!("Clearing all caches (posts, pages, partials, data)");
        _ = self.store.write().reset();
        self.engine.clear();
    }

    /// A copy of the cached collections.
    pub fn cache(&self) -> CacheSnapshot {
        self.store.read().snapshot()
    }

    /// The shared content store.
    pub fn store(&self) -> &Arc<RwLock<ContentStore>> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MemoryByteStore;
    use serde_json::json;

    fn site() -> (ScribeFlow, Config) {
        let flow = ScribeFlow::new(Arc::new(MemoryByteStore::new()));
        flow.populate_cache("_layouts/default.html", "{{{content}}}", CacheKind::Partial)
            .unwrap();
        let config = Config {
            site: Some(json!({"sitename": "Blog"})),
            ..Default::default()
        };
        (flow, config)
    }

    #[test]
    fn test_add_post_is_idempotent() {
        let (flow, config) = site();
        let first = flow.add_post("_posts/a.md", "---\ntitle: A\n---\n", &config);
        let second = flow.add_post("_posts/a.md", "---\ntitle: B\n---\n", &config);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(flow.cache().posts.len(), 1);
    }

    #[test]
    fn test_populate_cache_data() {
        let (flow, config) = site();
        flow.populate_cache("_data/team.yml", "lead: Kim\n", CacheKind::Data)
            .unwrap();
        _ = flow.add_page("team.html", "{{data.team.lead}}", &config);

        let output = flow.compile_one("team.html", &config).unwrap();
        assert_eq!(output.pages()[0].compiled, "Kim");
    }

    #[test]
    fn test_compile_with_calls_back_once() {
        let (flow, config) = site();
        _ = flow.add_page("index.html", "{{site.sitename}}", &config);

        let mut calls = Vec::new();
        flow.compile_with("index.html", &config, |result| {
            calls.push(result.map(CompileOutput::into_pages));
        });

        assert_eq!(calls.len(), 1);
        let pages = calls.remove(0).unwrap();
        assert_eq!(pages[0].compiled, "Blog");
        assert_eq!(pages[0].file_path, "index.html");
    }

    #[test]
    fn test_clear_cache() {
        let (flow, config) = site();
        _ = flow.add_page("index.html", "Home", &config);
        flow.clear_cache();

        let snapshot = flow.cache();
        assert!(snapshot.pages.is_empty());
        assert!(snapshot.partials.is_empty());
        assert!(flow.compile_one("index.html", &config).is_err());
    }
}
