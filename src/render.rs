// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Render Orchestration
//!
//! Turns a post or page into a [`CompiledPage`]:
//!
//! ```text
//! Start -> ContentRendered -> MarkdownApplied -> LayoutRendered -> Done
//!   \__________________________ Failed __________________________/
//! ```
//!
//! 1. the body is rendered through the template engine, with template
//!    delimiters inside code fences and inline code escaped
//! 2. Markdown is applied to posts and Markdown pages
//! 3. the result is bound to `content` and wrapped in the item's layout
//!
//! Items with a `paginate` directive fan out into one render per slice,
//! run in parallel with `rayon`. The first failing slice fails the batch.

use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::content::Item;
use crate::context::build_context;
use crate::core::config::Config;
use crate::core::error::{Result, ScribeFlowError};
use crate::core::traits::Processor;
use crate::keys;
use crate::paginator::{paginate, PaginateSpec};
use crate::processors::markdown::MarkdownProcessor;
use crate::store::{CollectionKind, ContentStore};
use crate::template::TemplateEngine;

/// What to compile.
#[derive(Debug, Clone)]
pub enum CompileTarget {
    /// A key looked up in posts, then pages.
    Key(String),
    /// An item that may not be in the store.
    Item(Arc<Item>),
}

impl From<&str> for CompileTarget {
    fn from(key: &str) -> Self {
        CompileTarget::Key(key.to_string())
    }
}

impl From<String> for CompileTarget {
    fn from(key: String) -> Self {
        CompileTarget::Key(key)
    }
}

impl From<Arc<Item>> for CompileTarget {
    fn from(item: Arc<Item>) -> Self {
        CompileTarget::Item(item)
    }
}

impl From<Item> for CompileTarget {
    fn from(item: Item) -> Self {
        CompileTarget::Item(Arc::new(item))
    }
}

/// A fully rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPage {
    /// Output path relative to the output directory.
    pub file_path: String,
    /// Public URL.
    pub url: String,
    /// Final HTML.
    pub compiled: String,
}

/// Result of compiling one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutput {
    /// An ordinary post or page.
    Single(CompiledPage),
    /// One page per pagination slice, in slice order.
    Paginated(Vec<CompiledPage>),
}

impl CompileOutput {
    /// The compiled pages, one for a single render.
    pub fn pages(&self) -> &[CompiledPage] {
        match self {
            CompileOutput::Single(page) => std::slice::from_ref(page),
            CompileOutput::Paginated(pages) => pages,
        }
    }

    /// Consumes the output into its pages.
    pub fn into_pages(self) -> Vec<CompiledPage> {
        match self {
            CompileOutput::Single(page) => vec![page],
            CompileOutput::Paginated(pages) => pages,
        }
    }
}

/// Progress of a single render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Nothing rendered yet.
    Start,
    /// The body went through the template engine.
    ContentRendered,
    /// Markdown was applied, or skipped.
    MarkdownApplied,
    /// The layout wrapped the body.
    LayoutRendered,
    /// The page is complete.
    Done,
    /// A stage failed.
    Failed,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderState::Start => "start",
            RenderState::ContentRendered => "content rendered",
            RenderState::MarkdownApplied => "markdown applied",
            RenderState::LayoutRendered => "layout rendered",
            RenderState::Done => "done",
            RenderState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Compiles items against a store, an engine and a configuration.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    engine: &'a TemplateEngine,
    store: &'a RwLock<ContentStore>,
    markdown: &'a MarkdownProcessor,
    config: &'a Config,
    site: JsonValue,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator. `site` is exposed to templates as `site`.
    pub fn new(
        engine: &'a TemplateEngine,
        store: &'a RwLock<ContentStore>,
        markdown: &'a MarkdownProcessor,
        config: &'a Config,
        site: JsonValue,
    ) -> Self {
        Self {
            engine,
            store,
            markdown,
            config,
            site,
        }
    }

    /// Compiles a target, fanning out over pagination slices when the item
    /// asks for them.
    pub fn compile(&self, target: CompileTarget) -> Result<CompileOutput> {
        let item = self.resolve_target(target)?;

        let Some(spec) = item.front.get("paginate").and_then(PaginateSpec::from_value)
        else {
            return self.render_item(&item, None).map(CompileOutput::Single);
        };

        let items = {
            let store = self.store.read();
            match spec.collection {
                CollectionKind::Pages => store.pages().to_vec(),
                _ => store.posts().to_vec(),
            }
        };
        let pagination = paginate(&items, spec.per_page, &item);
        debug!(
            "Paginating {} into {} pages of {}",
            item.short_key,
            pagination.len(),
            pagination.per_page()
        );

        let date_format = self.config.date_format.as_str();
        let pages = pagination
            .slices()
            .par_iter()
            .map(|slice| {
                let paged = pagination.paged_value(slice.index, date_format);
                self.render_item(&slice.page, Some(paged))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompileOutput::Paginated(pages))
    }

    fn resolve_target(&self, target: CompileTarget) -> Result<Arc<Item>> {
        match target {
            CompileTarget::Item(item) => Ok(item),
            CompileTarget::Key(key) => {
                let store = self.store.read();
                store
                    .find(&key, Some(CollectionKind::Posts))
                    .or_else(|| store.find(&key, Some(CollectionKind::Pages)))
                    .and_then(|entity| entity.as_item().cloned())
                    .ok_or_else(|| ScribeFlowError::entity_not_found(key))
            }
        }
    }

    /// Renders one item, logging the stage it failed in.
    pub fn render_item(
        &self,
        item: &Item,
        paged: Option<JsonValue>,
    ) -> Result<CompiledPage> {
        let mut state = RenderState::Start;
        let result = self.run(item, paged, &mut state);

        if let Err(e) = &result {
            debug!(
                "Render of {} failed after '{}': {}",
                item.short_key, state, e
            );
            advance(item, &mut state, RenderState::Failed);
        }
        result
    }

    fn run(
        &self,
        item: &Item,
        paged: Option<JsonValue>,
        state: &mut RenderState,
    ) -> Result<CompiledPage> {
        let mut context = {
            let store = self.store.read();
            build_context(item, &self.site, self.config, &store, paged)
        };

        let body = protect_code(&item.content);
        let rendered = self.engine.render(&body, &context, &item.short_key)?;
        advance(item, state, RenderState::ContentRendered);

        let fragment = if wants_markdown(item, self.config) {
            self.markdown.process(
                rendered,
                Some(&json!({ "highlight": self.config.highlight })),
            )?
        } else {
            rendered
        };
        advance(item, state, RenderState::MarkdownApplied);

        if let Some(scope) = context.as_object_mut() {
            _ = scope.insert("content".into(), fragment.into());
        }
        let compiled = self
            .engine
            .render_layout(item.front_str("layout"), &context)?;
        advance(item, state, RenderState::LayoutRendered);

        let page = CompiledPage {
            file_path: item.file_path.clone(),
            url: item.url.clone(),
            compiled,
        };
        advance(item, state, RenderState::Done);
        Ok(page)
    }
}

fn advance(item: &Item, state: &mut RenderState, next: RenderState) {
    debug!("{}: {} -> {}", item.short_key, state, next);
    *state = next;
}

/// Whether Markdown applies to `item`.
///
/// Disabled globally by `markdown: false` in the configuration. Front
/// matter can force it either way; otherwise posts and `.md`/`.markdown`
/// pages are converted.
pub fn wants_markdown(item: &Item, config: &Config) -> bool {
    if !config.markdown {
        return false;
    }
    match item.front.get("markdown").and_then(JsonValue::as_bool) {
        Some(enabled) => enabled,
        None => {
            item.is_post()
                || matches!(
                    keys::extension(&item.short_key)
                        .map(str::to_ascii_lowercase)
                        .as_deref(),
                    Some("md" | "markdown")
                )
        }
    }
}

const RAW_OPEN: &str = "{{{{raw}}}}";
const RAW_CLOSE: &str = "{{{{/raw}}}}";

/// Fence character and run length of a line opening a fenced code block.
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    let fence = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = trimmed.chars().take_while(|&c| c == fence).count();
    if len < 3 || (fence == '`' && trimmed[len..].contains('`')) {
        return None;
    }
    Some((fence, len))
}

fn closes_fence(line: &str, (fence, len): (char, usize)) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= len && trimmed.chars().all(|c| c == fence)
}

/// Wraps the `{{`-bearing spans of a line outside fenced blocks.
fn protect_inline(line: &str, out: &mut String) {
    if !line.contains('`') || !line.contains("{{") {
        out.push_str(line);
        return;
    }

    let parts: Vec<&str> = line.split('`').collect();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push('`');
        }
        let inside = i % 2 == 1 && i + 1 < parts.len();
        if inside && part.contains("{{") {
            out.push_str(RAW_OPEN);
            out.push_str(part);
            out.push_str(RAW_CLOSE);
        } else {
            out.push_str(part);
        }
    }
}

/// Wraps fenced code blocks and inline code spans in raw blocks so the
/// template engine passes them through verbatim.
///
/// Both backtick and tilde fences are recognised. An unclosed fence runs
/// to the end of the text. Unmatched backticks are left alone.
///
/// ```
/// use scribeflow::render::protect_code;
///
/// assert_eq!(
///     protect_code("{{a}}\n~~~\n{{b}}\n~~~\n"),
///     "{{a}}\n{{{{raw}}}}~~~\n{{b}}\n~~~{{{{/raw}}}}\n"
/// );
/// assert_eq!(protect_code("use `{{x}}`"), "use `{{{{raw}}}}{{x}}{{{{/raw}}}}`");
/// ```
pub fn protect_code(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut fence = None;

    for line in content.split_inclusive('\n') {
        match fence {
            None => match fence_marker(line) {
                Some(marker) => {
                    fence = Some(marker);
                    out.push_str(RAW_OPEN);
                    out.push_str(line);
                }
                None => protect_inline(line, &mut out),
            },
            Some(marker) if closes_fence(line, marker) => {
                fence = None;
                let text = line.trim_end_matches(['\r', '\n']);
                out.push_str(text);
                out.push_str(RAW_CLOSE);
                out.push_str(&line[text.len()..]);
            }
            Some(_) => out.push_str(line),
        }
    }

    if fence.is_some() {
        out.push_str(RAW_CLOSE);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MemoryByteStore;
    use crate::template::TemplateResolver;

    struct Fixture {
        store: Arc<RwLock<ContentStore>>,
        engine: TemplateEngine,
        markdown: MarkdownProcessor,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(RwLock::new(ContentStore::new()));
            let resolver = Arc::new(TemplateResolver::new(
                Arc::clone(&store),
                Arc::new(MemoryByteStore::new()),
            ));
            let engine = TemplateEngine::new(resolver);
            engine
                .populate_cache("_layouts/default.html", "<main>{{{content}}}</main>")
                .unwrap();
            Self {
                store,
                engine,
                markdown: MarkdownProcessor::new(),
                config: Config::default(),
            }
        }

        fn compile(&self, target: impl Into<CompileTarget>) -> Result<CompileOutput> {
            Orchestrator::new(
                &self.engine,
                &self.store,
                &self.markdown,
                &self.config,
                json!({"sitename": "Blog"}),
            )
            .compile(target.into())
        }
    }

    #[test]
    fn test_compile_post_with_markdown_and_layout() {
        let fixture = Fixture::new();
        _ = fixture.store.write().add_post(Item::post(
            "_posts/hello.md",
            "---\ntitle: Hello\n---\n# {{page.title}} on {{site.sitename}}",
            &fixture.config,
        ));

        let output = fixture.compile("posts/hello.md").unwrap();
        let page = &output.pages()[0];
        assert_eq!(page.compiled, "<main><h1>Hello on Blog</h1>\n</main>");
        assert_eq!(page.url, "/hello.html");
    }

    #[test]
    fn test_html_pages_skip_markdown() {
        let fixture = Fixture::new();
        _ = fixture
            .store
            .write()
            .add_page(Item::page("about.html", "# not a heading", &fixture.config));

        let output = fixture.compile("about.html").unwrap();
        assert_eq!(output.pages()[0].compiled, "<main># not a heading</main>");
    }

    #[test]
    fn test_unknown_key() {
        let fixture = Fixture::new();
        let err = fixture.compile("posts/none.md").unwrap_err();
        assert!(matches!(err, ScribeFlowError::EntityNotFound { .. }));
    }

    #[test]
    fn test_missing_layout_fails() {
        let fixture = Fixture::new();
        let item = Item::page("x.html", "---\nlayout: nope\n---\nX", &fixture.config);
        let err = fixture.compile(item).unwrap_err();
        assert_eq!(err.to_string(), "Template Not Found: layouts/nope.html");
    }

    #[test]
    fn test_wants_markdown() {
        let config = Config::default();
        assert!(wants_markdown(&Item::post("_posts/a.html", "", &config), &config));
        assert!(wants_markdown(&Item::page("a.md", "", &config), &config));
        assert!(!wants_markdown(&Item::page("a.html", "", &config), &config));
        assert!(wants_markdown(
            &Item::page("a.html", "---\nmarkdown: true\n---\n", &config),
            &config
        ));
        assert!(!wants_markdown(
            &Item::post("_posts/a.md", "---\nmarkdown: false\n---\n", &config),
            &config
        ));

        let off = Config {
            markdown: false,
            ..Default::default()
        };
        assert!(!wants_markdown(&Item::post("_posts/a.md", "", &off), &off));
    }

    #[test]
    fn test_protect_code() {
        assert_eq!(
            protect_code("use `{{x}}` or {{y}}"),
            "use `{{{{raw}}}}{{x}}{{{{/raw}}}}` or {{y}}"
        );
        assert_eq!(protect_code("a ` b {{c}}"), "a ` b {{c}}");
        assert_eq!(
            protect_code("```\n`{{x}}`\n```\n"),
            "{{{{raw}}}}```\n`{{x}}`\n```{{{{/raw}}}}\n"
        );
        assert_eq!(
            protect_code("````md\n```\n{{x}}\n````\n{{y}}"),
            "{{{{raw}}}}````md\n```\n{{x}}\n````{{{{/raw}}}}\n{{y}}"
        );
        assert_eq!(
            protect_code("~~~\n{{open}}"),
            "{{{{raw}}}}~~~\n{{open}}{{{{/raw}}}}"
        );
    }

    #[test]
    fn test_code_renders_verbatim() {
        let fixture = Fixture::new();
        _ = fixture.store.write().add_page(Item::page(
            "code.html",
            "`\\{{a}}` ```{{b}}```\n~~~\n\\{{c}} {{d}}\n~~~\n{{site.sitename}}",
            &fixture.config,
        ));

        let output = fixture.compile("code.html").unwrap();
        assert_eq!(
            output.pages()[0].compiled,
            "<main>`\\{{a}}` ```{{b}}```\n~~~\n\\{{c}} {{d}}\n~~~\nBlog</main>"
        );
    }

    #[test]
    fn test_render_state_display() {
        assert_eq!(RenderState::MarkdownApplied.to_string(), "markdown applied");
    }
}
