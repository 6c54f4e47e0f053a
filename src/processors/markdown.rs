// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Markdown Processing Module
//!
//! Converts rendered post and page bodies from Markdown to HTML with
//! `pulldown-cmark`. Fenced code blocks are passed through a
//! [`Highlighter`] and wrapped as `<pre><code class="lang-…">` when
//! highlighting is enabled.
//!
//! ## Example Usage
//!
//! ```rust
//! use scribeflow::processors::markdown::MarkdownProcessor;
//! use scribeflow::core::traits::Processor;
//!
//! let processor = MarkdownProcessor::new()
//!     .with_tables(true)
//!     .with_footnotes(true)
//!     .with_strikethrough(true);
//!
//! let html = processor
//!     .process("# Hello World\n\nThis is **markdown**.".to_string(), None)
//!     .unwrap();
//! assert!(html.contains("<h1>Hello World</h1>"));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::core::{
    error::{Result, ScribeFlowError},
    traits::{Highlighter, Processor},
};
use crate::processors::highlight::{wrap_code, SpanHighlighter};
use pulldown_cmark::{
    html, CodeBlockKind, Event, Options as MarkdownOptions, Parser, Tag,
    TagEnd,
};
use serde_json::Value as JsonValue;

/// Maximum allowed size for Markdown content in bytes (10MB)
const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;

/// Processor for Markdown content.
///
/// The processing context may carry `{"highlight": false}` to leave fenced
/// code blocks to `pulldown-cmark`'s plain rendering for one call.
#[derive(Clone)]
pub struct MarkdownProcessor {
    options: MarkdownOptions,
    highlighter: Option<Arc<dyn Highlighter>>,
}

impl fmt::Debug for MarkdownProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkdownProcessor")
            .field("options", &self.options)
            .field("highlighter", &self.highlighter)
            .finish()
    }
}

impl MarkdownProcessor {
    /// Creates a new MarkdownProcessor highlighting with [`SpanHighlighter`].
    pub fn new() -> Self {
        Self {
            options: MarkdownOptions::empty(),
            highlighter: Some(Arc::new(SpanHighlighter)),
        }
    }

    /// Enables table support in Markdown processing.
    pub fn with_tables(mut self, enable: bool) -> Self {
        if enable {
            self.options.insert(MarkdownOptions::ENABLE_TABLES);
        } else {
            self.options.remove(MarkdownOptions::ENABLE_TABLES);
        }
        self
    }

    /// Enables strikethrough support in Markdown processing.
    pub fn with_strikethrough(mut self, enable: bool) -> Self {
        if enable {
            self.options.insert(MarkdownOptions::ENABLE_STRIKETHROUGH);
        } else {
            self.options.remove(MarkdownOptions::ENABLE_STRIKETHROUGH);
        }
        self
    }

    /// Enables footnote support in Markdown processing.
    pub fn with_footnotes(mut self, enable: bool) -> Self {
        if enable {
            self.options.insert(MarkdownOptions::ENABLE_FOOTNOTES);
        } else {
            self.options.remove(MarkdownOptions::ENABLE_FOOTNOTES);
        }
        self
    }

    /// Replaces the highlighter. `None` disables fence highlighting.
    pub fn with_highlighter(
        mut self,
        highlighter: Option<Arc<dyn Highlighter>>,
    ) -> Self {
        self.highlighter = highlighter;
        self
    }

    /// Validates that the content is safe to process.
    fn validate(&self, content: &str) -> Result<()> {
        if content.len() > MAX_CONTENT_SIZE {
            return Err(ScribeFlowError::content_processing_error(
                format!(
                    "Content exceeds maximum size of {} bytes",
                    MAX_CONTENT_SIZE
                ),
                None,
            ));
        }
        Ok(())
    }

    /// Renders Markdown to HTML, highlighting fenced code with `highlighter`.
    fn render(
        &self,
        content: &str,
        highlighter: Option<&dyn Highlighter>,
    ) -> String {
        let parser = Parser::new_ext(content, self.options);
        let mut html_output = String::with_capacity(content.len() * 2);

        let Some(highlighter) = highlighter else {
            html::push_html(&mut html_output, parser);
            return html_output;
        };

        let mut events = Vec::new();
        let mut fence: Option<(Option<String>, String)> = None;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    let lang = info
                        .split_whitespace()
                        .next()
                        .map(str::to_string);
                    fence = Some((lang, String::new()));
                }
                Event::Text(text) if fence.is_some() => {
                    if let Some((_, code)) = fence.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) if fence.is_some() => {
                    if let Some((lang, code)) = fence.take() {
                        let highlighted =
                            highlighter.highlight(&code, lang.as_deref());
                        events.push(Event::Html(
                            wrap_code(&highlighted, lang.as_deref()).into(),
                        ));
                    }
                }
                other => events.push(other),
            }
        }

        html::push_html(&mut html_output, events.into_iter());
        html_output
    }
}

impl Default for MarkdownProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for MarkdownProcessor {
    type Input = String;
    type Output = String;
    type Context = JsonValue;

    fn process(
        &self,
        content: String,
        context: Option<&Self::Context>,
    ) -> Result<Self::Output> {
        self.validate(&content)?;

        let highlight = context
            .and_then(|ctx| ctx.get("highlight"))
            .and_then(JsonValue::as_bool)
            .unwrap_or(true);

        let highlighter = if highlight {
            self.highlighter.as_deref()
        } else {
            None
        };

        Ok(self.render(&content, highlighter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_markdown_processor_basic() {
        let processor = MarkdownProcessor::new();
        let input = "# Test\n\nThis is a **test**.";
        let result = processor.process(input.to_owned(), None).unwrap();
        assert!(result.contains("<h1>"));
        assert!(result.contains("<strong>"));
    }

    #[test]
    fn test_markdown_processor_with_options() {
        let processor = MarkdownProcessor::new()
            .with_tables(true)
            .with_strikethrough(true);

        let input =
            "# Test\n\n| A | B |\n|---|---|\n| 1 | 2 |\n\n~~strike~~";
        let result = processor.process(input.to_owned(), None).unwrap();
        assert!(result.contains("<table>"));
        assert!(result.contains("<del>"));
    }

    #[test]
    fn test_fenced_code_is_highlighted() {
        let processor = MarkdownProcessor::new();
        let input = "Intro\n\n```js\nvar a = 1;\n```\n";
        let result = processor.process(input.to_owned(), None).unwrap();
        assert!(result.contains("<pre><code class=\"lang-js\">"));
        assert!(result.contains("<span class=\"hl-keyword\">var</span>"));
    }

    #[test]
    fn test_highlighting_disabled_by_context() {
        let processor = MarkdownProcessor::new();
        let input = "```js\nvar a = 1;\n```\n";
        let result = processor
            .process(input.to_owned(), Some(&json!({"highlight": false})))
            .unwrap();
        assert!(result.contains("<pre><code class=\"language-js\">"));
        assert!(!result.contains("hl-keyword"));
    }

    #[test]
    fn test_indented_code_is_left_alone() {
        let processor = MarkdownProcessor::new();
        let result = processor
            .process("    var a = 1;\n".to_owned(), None)
            .unwrap();
        assert!(result.contains("<pre><code>var a = 1;"));
    }

    #[test]
    fn test_validation() {
        let processor = MarkdownProcessor::new();
        let large_content = "a".repeat(MAX_CONTENT_SIZE + 1);
        assert!(processor.validate(&large_content).is_err());
        assert!(processor.validate("").is_ok());
    }
}
