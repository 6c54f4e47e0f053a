// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Source Discovery
//!
//! Walks a site directory, classifies every file and feeds it into a
//! [`ScribeFlow`] instance. [`build_site`] runs a complete build: discover,
//! feed, compile every post and page, write the output and clear the cache.
//!
//! | Location                                   | Kind    |
//! |--------------------------------------------|---------|
//! | `_includes/`, `_layouts/`, `_snippets/`    | partial |
//! | `*.json`, `*.yml`, `*.yaml`                | data    |
//! | `_posts/*.md`, `_posts/*.html`             | post    |
//! | any other `*.html` or `*.md`               | page    |
//!
//! Hidden entries, the output directory, the site configuration file and
//! other underscore folders are skipped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::content::Item;
use crate::core::config::Config;
use crate::core::error::{Result, ScribeFlowError};
use crate::core::traits::FsByteStore;
use crate::generators::html::HtmlGenerator;
use crate::{CacheKind, ScribeFlow};

/// Folders whose files are registered as partials.
const PARTIAL_FOLDERS: &[&str] = &["_includes", "_layouts", "_snippets"];

/// What a source file becomes in the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A layout, include or snippet.
    Partial,
    /// A YAML or JSON data file.
    Data,
    /// A blog post.
    Post,
    /// A flat page.
    Page,
}

/// A file read from the source directory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the source directory, with forward slashes.
    pub key: String,
    /// How the file is registered.
    pub kind: SourceKind,
    /// File contents.
    pub content: String,
}

/// Classifies a path relative to the source directory.
///
/// ```
/// use scribeflow::process::{classify, SourceKind};
/// use std::path::Path;
///
/// assert_eq!(classify(Path::new("_layouts/default.html")), Some(SourceKind::Partial));
/// assert_eq!(classify(Path::new("_posts/2013-11-13-hello.md")), Some(SourceKind::Post));
/// assert_eq!(classify(Path::new("_data/team.yml")), Some(SourceKind::Data));
/// assert_eq!(classify(Path::new("blog/index.html")), Some(SourceKind::Page));
/// assert_eq!(classify(Path::new("css/site.css")), None);
/// ```
pub fn classify(relative: &Path) -> Option<SourceKind> {
    let folders: Vec<&str> = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect()
        })
        .unwrap_or_default();
    let extension = relative
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    if folders.iter().any(|f| PARTIAL_FOLDERS.contains(f)) {
        return Some(SourceKind::Partial);
    }

    match extension.as_deref() {
        Some("json" | "yml" | "yaml") => Some(SourceKind::Data),
        Some("md" | "markdown" | "html") if folders.contains(&"_posts") => {
            Some(SourceKind::Post)
        }
        Some("md" | "markdown" | "html")
            if !folders.iter().any(|f| f.starts_with('_')) =>
        {
            Some(SourceKind::Page)
        }
        _ => None,
    }
}

/// Reads every classifiable file beneath `source_dir`.
///
/// `skip` lists paths (files or directories) left out of the walk, such as
/// the output directory. Entries are returned in path order.
pub fn discover(source_dir: &Path, skip: &[PathBuf]) -> Result<Vec<SourceFile>> {
    if !source_dir.is_dir() {
        return Err(ScribeFlowError::config_error(
            "Source directory does not exist",
            Some(source_dir.to_path_buf()),
        ));
    }

    let skip: Vec<PathBuf> =
        skip.iter().filter_map(|p| fs::canonicalize(p).ok()).collect();
    let walker = WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !(hidden(entry) || skipped(entry, &skip))
        });

    let mut sources = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(source_dir, e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(source_dir) else {
            continue;
        };
        let Some(kind) = classify(relative) else {
            continue;
        };

        let content = fs::read_to_string(entry.path())
            .map_err(|e| ScribeFlowError::io_error(entry.path().to_path_buf(), e))?;
        let key = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");

        sources.push(SourceFile { key, kind, content });
    }
    sources.sort_by(|a, b| a.key.cmp(&b.key));

    debug!(
        "Discovered {} sources in {}",
        sources.len(),
        source_dir.display()
    );
    Ok(sources)
}

fn hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map_or(true, |name| name.starts_with('.'))
}

fn skipped(entry: &DirEntry, skip: &[PathBuf]) -> bool {
    let skip_it = fs::canonicalize(entry.path()).is_ok_and(|p| skip.contains(&p));
    if skip_it {
        debug!("Skipping {}", entry.path().display());
    }
    skip_it
}

fn walk_error(source_dir: &Path, err: walkdir::Error) -> ScribeFlowError {
    let path = err
        .path()
        .map_or_else(|| source_dir.to_path_buf(), Path::to_path_buf);
    let io = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop"));
    ScribeFlowError::io_error(path, io)
}

/// Registers sources with `flow`: partials and data first, then posts,
/// then pages.
///
/// Returns the posts and pages to compile, in that order.
pub fn feed(
    flow: &ScribeFlow,
    sources: &[SourceFile],
    config: &Config,
) -> Result<Vec<Arc<Item>>> {
    let of_kind = |kind: SourceKind| sources.iter().filter(move |s| s.kind == kind);

    for source in of_kind(SourceKind::Partial) {
        flow.populate_cache(&source.key, &source.content, CacheKind::Partial)?;
    }
    for source in of_kind(SourceKind::Data) {
        flow.populate_cache(&source.key, &source.content, CacheKind::Data)?;
    }

    let mut items: Vec<_> = of_kind(SourceKind::Post)
        .map(|s| flow.add_post(&s.key, &s.content, config))
        .collect();
    items.extend(
        of_kind(SourceKind::Page).map(|s| flow.add_page(&s.key, &s.content, config)),
    );
    Ok(items)
}

/// Builds the site described by `config.build` and returns the files
/// written.
///
/// A relative `config_file` is resolved against the source directory. The
/// first failing compile aborts the build.
pub fn build_site(config: &Config) -> Result<Vec<PathBuf>> {
    let source_dir = &config.build.source_dir;
    let output_dir = &config.build.output_dir;
    info!(
        "Building {} into {}",
        source_dir.display(),
        output_dir.display()
    );

    let mut config = config.clone();
    if config.config_file.is_relative() {
        config.config_file = source_dir.join(&config.config_file);
    }

    let sources = discover(
        source_dir,
        &[output_dir.clone(), config.config_file.clone()],
    )?;

    let flow = ScribeFlow::new(Arc::new(FsByteStore::new(source_dir)));
    let items = feed(&flow, &sources, &config)?;
    let generator =
        HtmlGenerator::new(output_dir).with_minification(config.build.minify);

    let mut written = Vec::new();
    for item in items {
        let output = flow.compile_one(item, &config)?;
        for page in output.pages() {
            written.push(generator.write_page(page)?);
        }
    }
    flow.clear_cache();

    info!("Wrote {} pages to {}", written.len(), output_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_classify_rules() {
        let kind = |p: &str| classify(Path::new(p));

        assert_eq!(kind("_includes/head.html"), Some(SourceKind::Partial));
        assert_eq!(kind("_snippets/demo.rs"), Some(SourceKind::Partial));
        assert_eq!(kind("_layouts/data.json"), Some(SourceKind::Partial));
        assert_eq!(kind("_data/nav/main.json"), Some(SourceKind::Data));
        assert_eq!(kind("_posts/2014/a.markdown"), Some(SourceKind::Post));
        assert_eq!(kind("about.md"), Some(SourceKind::Page));
        assert_eq!(kind("_drafts/idea.md"), None);
        assert_eq!(kind("_posts/image.png"), None);
    }

    #[test]
    fn test_discover_skips_hidden_and_output() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "index.html", "Home");
        write(root, ".git/HEAD.html", "ignored");
        write(root, "_site/index.html", "old output");
        write(root, "_layouts/default.html", "{{{content}}}");

        let sources = discover(root, &[root.join("_site")]).unwrap();
        let keys: Vec<&str> = sources.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["_layouts/default.html", "index.html"]);
    }

    #[test]
    fn test_discover_walks_nested_folders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "blog/deep/notes.md", "Notes");
        write(root, "blog/.cache/stale.md", "ignored");
        write(root, "_posts/2014/2014-01-01-a.md", "A");
        write(root, "css/site.css", "body {}");

        let sources = discover(root, &[]).unwrap();
        let found: Vec<(&str, SourceKind)> =
            sources.iter().map(|s| (s.key.as_str(), s.kind)).collect();
        assert_eq!(
            found,
            vec![
                ("_posts/2014/2014-01-01-a.md", SourceKind::Post),
                ("blog/deep/notes.md", SourceKind::Page),
            ]
        );
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(discover(&dir.path().join("nope"), &[]).is_err());
    }

    #[test]
    fn test_build_site_writes_pages() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "_config.yml", "sitename: Notes\n");
        write(root, "_layouts/default.html", "<title>{{site.sitename}}</title>{{{content}}}");
        write(root, "_posts/2013-11-13-hello.md", "---\ntitle: Hello\n---\n# Hi\n");
        write(root, "about.html", "About {{page.url}}");

        let config = Config {
            build: crate::core::config::BuildConfig {
                source_dir: root.to_path_buf(),
                output_dir: root.join("_site"),
                minify: false,
            },
            ..Default::default()
        };

        let written = build_site(&config).unwrap();
        assert_eq!(written.len(), 2);

        let about = fs::read_to_string(root.join("_site/about/index.html")).unwrap();
        assert_eq!(about, "<title>Notes</title>About /about");

        let post = fs::read_to_string(root.join("_site/hello.html")).unwrap();
        assert!(post.contains("<h1>Hi</h1>"));
    }
}
