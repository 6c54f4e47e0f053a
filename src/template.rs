// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Template Rendering Module
//!
//! Handlebars integration for layouts, includes and snippets.
//!
//! ## Features
//!
//! - [`TemplateResolver`]: finds layout, include and snippet text in the
//!   content store, falling back to the byte store
//! - [`TemplateEngine`]: the compiled template table plus the `include`,
//!   `snippet` and `highlight` helpers
//! - Partials read during a render are queued and compiled once the
//!   render has finished
//!
//! ## Helpers
//!
//! ```text
//! {{include "head" title="Blog"}}     {{inc "nav.html"}}
//! {{snippet "code.js" lang="js"}}     {{#hl lang="rust"}}fn main() {}{{/hl}}
//! ```
//!
//! Includes and snippets are rendered against a sandbox in which the inline
//! parameters shadow the caller's scope. Shadowed values stay reachable
//! under an underscore-prefixed name.

use std::fmt;
use std::io;
use std::sync::Arc;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output,
    RenderContext, RenderError, RenderErrorReason, Renderable,
};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value as JsonValue};

use crate::content::Partial;
use crate::context::{ScopedContext, MAX_INCLUDE_DEPTH};
use crate::core::error::{Result, ScribeFlowError};
use crate::core::traits::{ByteStore, Highlighter};
use crate::keys;
use crate::processors::highlight::{wrap_code, SpanHighlighter};
use crate::store::{CollectionKind, ContentStore, Entity};

/// The kinds of partial a template can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartialKind {
    /// `layouts/<name>.html`
    Layout,
    /// `includes/<name>.html`
    Include,
    /// `snippets/<name>`
    Snippet,
}

impl PartialKind {
    /// Lookup path for `name`.
    pub fn path(self, name: &str) -> String {
        match self {
            PartialKind::Layout => keys::layout_path(Some(name)),
            PartialKind::Include => keys::include_path(name),
            PartialKind::Snippet => keys::snippet_path(name),
        }
    }
}

/// Outcome of [`TemplateResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The text and the key it is stored under.
    Found {
        /// Short key of the matching partial.
        key: String,
        /// Template text.
        content: String,
    },
    /// An include or snippet that does not exist.
    Empty,
    /// A layout that does not exist, with the path that was looked up.
    NotFound(String),
}

/// Looks up partial text in the content store and the byte store.
#[derive(Debug)]
pub struct TemplateResolver {
    store: Arc<RwLock<ContentStore>>,
    bytes: Arc<dyn ByteStore>,
    highlighter: RwLock<Arc<dyn Highlighter>>,
    pending: Mutex<Vec<Arc<Partial>>>,
}

impl TemplateResolver {
    /// Creates a resolver over `store`, reading misses from `bytes`.
    pub fn new(
        store: Arc<RwLock<ContentStore>>,
        bytes: Arc<dyn ByteStore>,
    ) -> Self {
        Self {
            store,
            bytes,
            highlighter: RwLock::new(Arc::new(SpanHighlighter)),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the highlighter used by `snippet` and `highlight`.
    pub fn set_highlighter(&self, highlighter: Arc<dyn Highlighter>) {
        *self.highlighter.write() = highlighter;
    }

    /// Resolves `name` as a partial of the given kind.
    ///
    /// The content store is searched first (substring match on the derived
    /// path). Otherwise the byte store is read; text found there is added
    /// to the content store and queued for compilation.
    pub fn resolve(&self, name: &str, kind: PartialKind) -> Resolution {
        let path = kind.path(name);

        let cached = self
            .store
            .read()
            .find(&path, Some(CollectionKind::Partials));
        if let Some(Entity::Partial(partial)) = cached {
            debug!("Cache access for: {}", path);
            return Resolution::Found {
                key: partial.short_key.clone(),
                content: partial.content.clone(),
            };
        }
        debug!("Not found in cache: {}", path);

        match self.bytes.read(&path) {
            Ok(content) => {
                debug!("Byte store access for: {}", path);
                let partial = self
                    .store
                    .write()
                    .insert_partial(Partial::new(&path, &content));
                self.pending.lock().push(partial);
                Resolution::Found { key: path, content }
            }
            Err(e) => {
                warn!("Could not access {}: {}", path, e);
                match kind {
                    PartialKind::Layout => Resolution::NotFound(path),
                    PartialKind::Include | PartialKind::Snippet => {
                        Resolution::Empty
                    }
                }
            }
        }
    }

    /// Highlights `code` and wraps it in `<pre><code>`.
    pub fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        let highlighted = self.highlighter.read().highlight(code, lang);
        wrap_code(&highlighted, lang)
    }

    /// Partials read from the byte store since the last call.
    pub fn take_pending(&self) -> Vec<Arc<Partial>> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Drops queued registrations.
    pub fn clear(&self) {
        self.pending.lock().clear();
    }
}

/// The compiled template table and its helpers.
pub struct TemplateEngine {
    registry: RwLock<Handlebars<'static>>,
    resolver: Arc<TemplateResolver>,
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl TemplateEngine {
    /// Creates an engine with the `include`/`inc`, `snippet` and
    /// `highlight`/`hl` helpers registered.
    pub fn new(resolver: Arc<TemplateResolver>) -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::html_escape);

        let include = IncludeHelper {
            resolver: Arc::clone(&resolver),
        };
        let highlight = HighlightHelper {
            resolver: Arc::clone(&resolver),
        };
        registry.register_helper("include", Box::new(include.clone()));
        registry.register_helper("inc", Box::new(include));
        registry.register_helper(
            "snippet",
            Box::new(SnippetHelper {
                resolver: Arc::clone(&resolver),
            }),
        );
        registry.register_helper("highlight", Box::new(highlight.clone()));
        registry.register_helper("hl", Box::new(highlight));
        registry.register_helper("raw", Box::new(RawHelper));

        Self {
            registry: RwLock::new(registry),
            resolver,
        }
    }

    /// The resolver shared with the helpers.
    pub fn resolver(&self) -> &Arc<TemplateResolver> {
        &self.resolver
    }

    /// Compiles a partial under its short key.
    ///
    /// The short key is always re-registered. Includes are also registered
    /// under their partial key, unless that name is already taken.
    pub fn register(&self, partial: &Partial) -> Result<()> {
        let mut registry = self.registry.write();
        compile(&mut registry, &partial.short_key, &partial.content)?;

        if keys::is_include(&partial.short_key) {
            if let Some(alias) = &partial.partial_key {
                if !registry.has_template(alias) {
                    compile(&mut registry, alias, &partial.content)?;
                }
            }
        }
        Ok(())
    }

    /// Adds a partial to the content store and compiles it.
    pub fn populate_cache(&self, key: &str, text: &str) -> Result<()> {
        let partial = Partial::new(key, text);
        debug!("Adding to cache: {}", partial.short_key);
        _ = self
            .resolver
            .store
            .write()
            .insert_partial(partial.clone());
        self.register(&partial)
    }

    /// Returns `true` when a template is compiled under `name`.
    pub fn has_template(&self, name: &str) -> bool {
        self.registry.read().has_template(name)
    }

    /// Renders template text against `context`. `name` is used in errors.
    pub fn render(
        &self,
        template: &str,
        context: &JsonValue,
        name: &str,
    ) -> Result<String> {
        let result = self.registry.read().render_template(template, context);
        self.flush();
        result.map_err(|e| self.render_error(e, name))
    }

    /// Renders the template compiled under `name`.
    pub fn render_named(
        &self,
        name: &str,
        context: &JsonValue,
    ) -> Result<String> {
        let result = self.registry.read().render(name, context);
        self.flush();
        result.map_err(|e| self.render_error(e, name))
    }

    /// Renders a layout, `default` when none is named.
    ///
    /// A layout that cannot be found fails with
    /// [`ScribeFlowError::TemplateNotFound`].
    pub fn render_layout(
        &self,
        layout: Option<&str>,
        context: &JsonValue,
    ) -> Result<String> {
        let path = keys::layout_path(layout);
        if self.has_template(&path) {
            return self.render_named(&path, context);
        }

        match self
            .resolver
            .resolve(layout.unwrap_or_default(), PartialKind::Layout)
        {
            Resolution::Found { content, .. } => {
                self.render(&content, context, &path)
            }
            Resolution::Empty | Resolution::NotFound(_) => {
                Err(ScribeFlowError::template_not_found(path))
            }
        }
    }

    /// Compiles partials that were read during a render.
    pub fn flush(&self) {
        for partial in self.resolver.take_pending() {
            if let Err(e) = self.register(&partial) {
                warn!("Could not compile {}: {}", partial.short_key, e);
            }
        }
    }

    /// Drops every compiled template. Helpers stay registered.
    pub fn clear(&self) {
        self.registry.write().clear_templates();
        self.resolver.clear();
    }

    fn render_error(&self, err: RenderError, name: &str) -> ScribeFlowError {
        match missing_template(&err) {
            Some(path) => ScribeFlowError::template_not_found(path),
            None => ScribeFlowError::template_rendering_error(
                format!("Template rendering failed: {}", err),
                name.to_string(),
                Some(Box::new(err)),
            ),
        }
    }
}

/// Path of the template a failed render was missing, if any. Causes are
/// searched too, since helpers may wrap the error of a nested render.
fn missing_template(err: &RenderError) -> Option<String> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        let reason = e
            .downcast_ref::<RenderError>()
            .map(RenderError::reason)
            .or_else(|| e.downcast_ref::<RenderErrorReason>());
        if let Some(
            RenderErrorReason::TemplateNotFound(path)
            | RenderErrorReason::PartialNotFound(path),
        ) = reason
        {
            return Some(path.clone());
        }
        current = e.source();
    }
    None
}

fn not_found(path: String) -> RenderError {
    RenderErrorReason::TemplateNotFound(path).into()
}

fn compile(
    registry: &mut Handlebars<'static>,
    name: &str,
    text: &str,
) -> Result<()> {
    registry.register_template_string(name, text).map_err(|e| {
        ScribeFlowError::template_rendering_error(
            format!("Failed to compile template: {}", e),
            name.to_string(),
            Some(Box::new(e)),
        )
    })
}

/// Collects rendered block content.
#[derive(Debug, Default)]
struct CaptureOutput(String);

impl Output for CaptureOutput {
    fn write(&mut self, seg: &str) -> io::Result<()> {
        self.0.push_str(seg);
        Ok(())
    }
}

/// Name of the partial: the first parameter or a `src` hash value.
fn source_name(
    h: &Helper<'_>,
    helper: &'static str,
) -> std::result::Result<String, RenderError> {
    h.param(0)
        .or_else(|| h.hash_get("src"))
        .and_then(|p| p.value().as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RenderErrorReason::ParamNotFoundForIndex(helper, 0).into()
        })
}

/// Builds the sandbox an include or snippet is rendered against.
fn sandbox_for(
    h: &Helper<'_>,
    ctx: &Context,
) -> std::result::Result<JsonValue, RenderError> {
    let local: Map<String, JsonValue> = h
        .hash()
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.value().clone()))
        .collect();

    let scope = ScopedContext::new(local, ctx.data());
    if scope.depth() >= MAX_INCLUDE_DEPTH {
        return Err(RenderErrorReason::Other(format!(
            "Includes nested deeper than {} levels",
            MAX_INCLUDE_DEPTH
        ))
        .into());
    }
    Ok(scope.into_value())
}

fn lang_param(h: &Helper<'_>) -> Option<String> {
    h.hash_get("lang")
        .and_then(|v| v.value().as_str())
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
}

/// `{{include "name" key=value}}`, also registered as `inc`.
#[derive(Debug, Clone)]
struct IncludeHelper {
    resolver: Arc<TemplateResolver>,
}

impl HelperDef for IncludeHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = source_name(h, "include")?;
        let sandbox = sandbox_for(h, ctx)?;
        let path = keys::include_path(&name);
        debug!("Looking for '{}' in the cache", name);

        let rendered = if r.has_template(&path) {
            r.render(&path, &sandbox)?
        } else {
            match self.resolver.resolve(&name, PartialKind::Include) {
                Resolution::Found { content, .. } => {
                    r.render_template(&content, &sandbox)?
                }
                Resolution::Empty | Resolution::NotFound(_) => {
                    match keys::partial_key(&name)
                        .filter(|alias| r.has_template(alias))
                    {
                        Some(alias) => r.render(&alias, &sandbox)?,
                        None => return Err(not_found(path)),
                    }
                }
            }
        };

        out.write(&rendered)?;
        Ok(())
    }
}

/// `{{snippet "file.js"}}` or `{{#snippet lang="js"}}…{{/snippet}}`.
#[derive(Debug, Clone)]
struct SnippetHelper {
    resolver: Arc<TemplateResolver>,
}

impl HelperDef for SnippetHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let lang = lang_param(h);

        if let Some(block) = h.template() {
            let mut capture = CaptureOutput::default();
            block.render(r, ctx, rc, &mut capture)?;
            out.write(&self.resolver.highlight(&capture.0, lang.as_deref()))?;
            return Ok(());
        }

        let name = source_name(h, "snippet")?;
        let sandbox = sandbox_for(h, ctx)?;
        let path = keys::snippet_path(&name);
        let lang = lang.or_else(|| keys::extension(&name).map(str::to_string));

        let compiled = if r.has_template(&path) {
            r.render(&path, &sandbox).ok()
        } else {
            None
        };

        let code = match compiled {
            Some(code) => code,
            None => match self.resolver.resolve(&name, PartialKind::Snippet) {
                Resolution::Found { content, .. } => {
                    r.render_template(&content, &sandbox).unwrap_or_else(|e| {
                        debug!("Snippet {} used verbatim: {}", path, e);
                        content
                    })
                }
                Resolution::Empty | Resolution::NotFound(_) => {
                    return Err(not_found(path));
                }
            },
        };

        out.write(&self.resolver.highlight(&code, lang.as_deref()))?;
        Ok(())
    }
}

/// `{{#highlight lang="js"}}…{{/highlight}}` or `{{hl code lang="js"}}`,
/// also registered as `hl`.
#[derive(Debug, Clone)]
struct HighlightHelper {
    resolver: Arc<TemplateResolver>,
}

impl HelperDef for HighlightHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let lang = lang_param(h);

        let code = match h.template() {
            Some(block) => {
                let mut capture = CaptureOutput::default();
                block.render(r, ctx, rc, &mut capture)?;
                capture.0
            }
            None => h
                .param(0)
                .and_then(|p| p.value().as_str())
                .map(str::to_string)
                .ok_or(RenderErrorReason::ParamNotFoundForIndex(
                    "highlight",
                    0,
                ))?,
        };

        out.write(&self.resolver.highlight(&code, lang.as_deref()))?;
        Ok(())
    }
}

/// `{{{{raw}}}}…{{{{/raw}}}}`: writes the block without evaluating it.
#[derive(Debug, Clone, Copy)]
struct RawHelper;

impl HelperDef for RawHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        if let Some(block) = h.template() {
            block.render(r, ctx, rc, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MemoryByteStore;
    use serde_json::json;

    fn engine_with(bytes: MemoryByteStore) -> (TemplateEngine, Arc<RwLock<ContentStore>>) {
        let store = Arc::new(RwLock::new(ContentStore::new()));
        let resolver = Arc::new(TemplateResolver::new(
            Arc::clone(&store),
            Arc::new(bytes),
        ));
        (TemplateEngine::new(resolver), store)
    }

    #[test]
    fn test_partial_kind_paths() {
        assert_eq!(PartialKind::Layout.path("post"), "layouts/post.html");
        assert_eq!(PartialKind::Include.path("head"), "includes/head.html");
        assert_eq!(PartialKind::Snippet.path("a.js"), "snippets/a.js");
    }

    #[test]
    fn test_resolve_prefers_store_then_byte_store() {
        let (engine, store) = engine_with(
            MemoryByteStore::new().with_file("includes/nav.html", "<nav/>"),
        );
        engine.populate_cache("_includes/head.html", "<head/>").unwrap();

        let resolver = engine.resolver();
        assert_eq!(
            resolver.resolve("head", PartialKind::Include),
            Resolution::Found {
                key: "includes/head.html".into(),
                content: "<head/>".into(),
            }
        );

        assert!(matches!(
            resolver.resolve("nav", PartialKind::Include),
            Resolution::Found { .. }
        ));
        assert_eq!(store.read().partials().len(), 2);
        assert_eq!(resolver.take_pending().len(), 1);
    }

    #[test]
    fn test_resolve_misses() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        let resolver = engine.resolver();
        assert_eq!(
            resolver.resolve("nope", PartialKind::Include),
            Resolution::Empty
        );
        assert_eq!(
            resolver.resolve("nope", PartialKind::Layout),
            Resolution::NotFound("layouts/nope.html".into())
        );
    }

    #[test]
    fn test_partial_key_alias_first_wins() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        engine.populate_cache("includes/a/head.html", "A").unwrap();
        engine.populate_cache("includes/b/head.html", "B").unwrap();

        let out = engine.render("{{> head}}|{{inc \"head\"}}", &json!({}), "t").unwrap();
        assert_eq!(out, "A|A");
    }

    #[test]
    fn test_full_key_last_wins() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        engine.populate_cache("includes/x.html", "one").unwrap();
        engine.populate_cache("includes/x.html", "two").unwrap();
        assert_eq!(
            engine.render_named("includes/x.html", &json!({})).unwrap(),
            "two"
        );
    }

    #[test]
    fn test_include_sandbox_shadows_caller_scope() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        engine
            .populate_cache(
                "includes/title.html",
                "{{title}}/{{_title}}/{{params.title}}",
            )
            .unwrap();

        let out = engine
            .render("{{include \"title\" title=\"X\"}}", &json!({"title": "Y"}), "t")
            .unwrap();
        assert_eq!(out, "X/Y/X");
    }

    #[test]
    fn test_missing_include_is_template_not_found() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        let err = engine
            .render("{{include \"missing\"}}", &json!({}), "page")
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Template Not Found"));
        assert!(err.to_string().contains("includes/missing.html"));
    }

    #[test]
    fn test_byte_store_includes_are_compiled_after_render() {
        let (engine, _) = engine_with(
            MemoryByteStore::new().with_file("includes/nav.html", "<nav>{{site}}</nav>"),
        );
        let out = engine
            .render("{{inc \"nav\"}}", &json!({"site": "S"}), "t")
            .unwrap();
        assert_eq!(out, "<nav>S</nav>");
        assert!(engine.has_template("includes/nav.html"));
        assert!(engine.has_template("nav"));
    }

    #[test]
    fn test_recursive_includes_are_bounded() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        engine
            .populate_cache("includes/loop.html", "{{include \"loop\"}}")
            .unwrap();
        let err = engine
            .render("{{include \"loop\"}}", &json!({}), "t")
            .unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_does_not_leak_into_later_errors() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        engine
            .populate_cache("includes/loop.html", "{{include \"loop\"}}")
            .unwrap();

        let missing = engine
            .render("{{include \"missing\"}}", &json!({}), "a")
            .unwrap_err();
        assert!(missing.is_not_found());

        let looping = engine
            .render("{{include \"loop\"}}", &json!({}), "b")
            .unwrap_err();
        assert!(!looping.is_not_found());
    }

    #[test]
    fn test_raw_blocks_are_verbatim() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        let out = engine
            .render("{{{{raw}}}}\\{{a}} {{b}}{{{{/raw}}}}{{c}}", &json!({"c": "C"}), "t")
            .unwrap();
        assert_eq!(out, "\\{{a}} {{b}}C");
    }

    #[test]
    fn test_snippet_from_byte_store() {
        let (engine, _) = engine_with(
            MemoryByteStore::new().with_file("snippets/code.js", "var a = 1;"),
        );
        let out = engine.render("{{snippet \"code.js\"}}", &json!({}), "t").unwrap();
        assert!(out.starts_with("<pre><code class=\"lang-js\">"));
        assert!(out.contains("<span class=\"hl-keyword\">var</span>"));
    }

    #[test]
    fn test_missing_snippet_is_template_not_found() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        let err = engine
            .render("{{snippet \"none.js\"}}", &json!({}), "t")
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("snippets/none.js"));
    }

    #[test]
    fn test_highlight_block() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        let out = engine
            .render("{{#hl lang=\"js\"}}\nlet x = 1;{{/hl}}", &json!({}), "t")
            .unwrap();
        assert_eq!(
            out,
            "<pre><code class=\"lang-js\"><span class=\"hl-keyword\">let</span> x = <span class=\"hl-number\">1</span>;</code></pre>"
        );
    }

    #[test]
    fn test_missing_layout() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        let err = engine.render_layout(Some("post"), &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Template Not Found: layouts/post.html");
    }

    #[test]
    fn test_clear_drops_compiled_templates() {
        let (engine, _) = engine_with(MemoryByteStore::new());
        engine.populate_cache("layouts/default.html", "{{{content}}}").unwrap();
        assert!(engine.has_template("layouts/default.html"));
        engine.clear();
        assert!(!engine.has_template("layouts/default.html"));
    }
}
