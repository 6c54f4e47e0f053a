// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Syntax Highlighting
//!
//! A small span-based highlighter used for fenced code blocks and
//! snippets. It recognises comments, strings, numbers, keywords and
//! literals for a handful of language families and emits
//! `<span class="hl-…">` markup. Unknown languages are escaped only.
//!
//! ```
//! use scribeflow::core::traits::Highlighter;
//! use scribeflow::processors::highlight::SpanHighlighter;
//!
//! let html = SpanHighlighter.highlight("let x = 1;", Some("js"));
//! assert_eq!(
//!     html,
//!     "<span class=\"hl-keyword\">let</span> x = <span class=\"hl-number\">1</span>;"
//! );
//! ```

use crate::core::traits::Highlighter;

const C_LIKE_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const",
    "continue", "default", "delete", "do", "else", "export", "extends",
    "finally", "for", "function", "if", "import", "in", "instanceof",
    "interface", "let", "new", "of", "return", "static", "switch",
    "this", "throw", "try", "typeof", "var", "void", "while", "yield",
];

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn",
    "else", "enum", "extern", "fn", "for", "if", "impl", "in", "let",
    "loop", "match", "mod", "move", "mut", "pub", "ref", "return",
    "self", "Self", "static", "struct", "super", "trait", "type",
    "unsafe", "use", "where", "while",
];

const HASH_KEYWORDS: &[&str] = &[
    "and", "as", "case", "class", "def", "do", "done", "elif", "else",
    "end", "esac", "export", "fi", "for", "from", "function", "if",
    "import", "in", "is", "lambda", "local", "module", "not", "or",
    "pass", "raise", "require", "return", "then", "while", "with",
    "yield",
];

const LITERALS: &[&str] = &[
    "true", "false", "null", "undefined", "None", "True", "False", "nil",
    "NaN",
];

/// Lexical rules for one language family.
#[derive(Debug, Clone, Copy)]
struct Syntax {
    keywords: &'static [&'static str],
    line_comment: Option<&'static str>,
    block_comments: bool,
    single_quotes: bool,
    backticks: bool,
}

impl Syntax {
    fn for_lang(lang: &str) -> Option<Self> {
        let c_like = Syntax {
            keywords: C_LIKE_KEYWORDS,
            line_comment: Some("//"),
            block_comments: true,
            single_quotes: true,
            backticks: true,
        };

        match lang.to_ascii_lowercase().as_str() {
            "js" | "javascript" | "ts" | "typescript" | "jsx" | "tsx"
            | "json" | "java" | "c" | "cpp" | "cs" | "go" | "css"
            | "scss" | "php" | "swift" | "kotlin" => Some(c_like),
            "rust" | "rs" => Some(Syntax {
                keywords: RUST_KEYWORDS,
                single_quotes: false,
                backticks: false,
                ..c_like
            }),
            "py" | "python" | "rb" | "ruby" | "sh" | "bash" | "shell"
            | "zsh" | "yaml" | "yml" | "toml" | "perl" => Some(Syntax {
                keywords: HASH_KEYWORDS,
                line_comment: Some("#"),
                block_comments: false,
                single_quotes: true,
                backticks: false,
            }),
            _ => None,
        }
    }
}

/// Built-in highlighter producing `hl-*` spans.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanHighlighter;

impl Highlighter for SpanHighlighter {
    fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        match lang.and_then(Syntax::for_lang) {
            Some(syntax) => tokenize(code, &syntax),
            None => escape_html(code),
        }
    }
}

/// Escapes text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        push_escaped(&mut out, c);
    }
    out
}

/// Wraps highlighted markup in `<pre><code>`, dropping one leading newline.
///
/// ```
/// use scribeflow::processors::highlight::wrap_code;
///
/// assert_eq!(
///     wrap_code("\nx", Some("js")),
///     "<pre><code class=\"lang-js\">x</code></pre>"
/// );
/// assert_eq!(wrap_code("x", None), "<pre><code>x</code></pre>");
/// ```
pub fn wrap_code(content: &str, lang: Option<&str>) -> String {
    let content = content.strip_prefix('\n').unwrap_or(content);
    match lang.filter(|l| !l.is_empty()) {
        Some(lang) => format!(
            "<pre><code class=\"lang-{}\">{}</code></pre>",
            escape_html(lang),
            content
        ),
        None => format!("<pre><code>{}</code></pre>", content),
    }
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        _ => out.push(c),
    }
}

fn push_span(out: &mut String, class: &str, chars: &[char]) {
    out.push_str("<span class=\"hl-");
    out.push_str(class);
    out.push_str("\">");
    for c in chars {
        push_escaped(out, *c);
    }
    out.push_str("</span>");
}

fn starts_with(chars: &[char], at: usize, marker: &str) -> bool {
    let mut i = at;
    for m in marker.chars() {
        if chars.get(i) != Some(&m) {
            return false;
        }
        i += 1;
    }
    true
}

fn tokenize(code: &str, syntax: &Syntax) -> String {
    let chars: Vec<char> = code.chars().collect();
    let len = chars.len();
    let mut out = String::with_capacity(code.len() * 2);
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if let Some(marker) = syntax.line_comment {
            if starts_with(&chars, i, marker) {
                let end = chars[i..]
                    .iter()
                    .position(|&c| c == '\n')
                    .map_or(len, |p| i + p);
                push_span(&mut out, "comment", &chars[i..end]);
                i = end;
                continue;
            }
        }

        if syntax.block_comments && starts_with(&chars, i, "/*") {
            let mut end = len;
            let mut j = i + 2;
            while j + 1 < len {
                if chars[j] == '*' && chars[j + 1] == '/' {
                    end = j + 2;
                    break;
                }
                j += 1;
            }
            push_span(&mut out, "comment", &chars[i..end]);
            i = end;
            continue;
        }

        let quoted = c == '"'
            || (c == '\'' && syntax.single_quotes)
            || (c == '`' && syntax.backticks);
        if quoted {
            let mut j = i + 1;
            while j < len {
                match chars[j] {
                    '\\' => j += 2,
                    q if q == c => {
                        j += 1;
                        break;
                    }
                    '\n' if c != '`' => break,
                    _ => j += 1,
                }
            }
            let end = j.min(len);
            push_span(&mut out, "string", &chars[i..end]);
            i = end;
            continue;
        }

        if c.is_ascii_digit() {
            let end = chars[i..]
                .iter()
                .position(|&c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
                .map_or(len, |p| i + p);
            push_span(&mut out, "number", &chars[i..end]);
            i = end;
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let end = chars[i..]
                .iter()
                .position(|&c| !(c.is_alphanumeric() || c == '_' || c == '$'))
                .map_or(len, |p| i + p);
            let word: String = chars[i..end].iter().collect();

            if syntax.keywords.contains(&word.as_str()) {
                push_span(&mut out, "keyword", &chars[i..end]);
            } else if LITERALS.contains(&word.as_str()) {
                push_span(&mut out, "literal", &chars[i..end]);
            } else {
                out.push_str(&escape_html(&word));
            }
            i = end;
            continue;
        }

        push_escaped(&mut out, c);
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_language_is_only_escaped() {
        let html = SpanHighlighter.highlight("<b>&</b>", Some("brainfuck"));
        assert_eq!(html, "&lt;b&gt;&amp;&lt;/b&gt;");
        assert_eq!(SpanHighlighter.highlight("a < b", None), "a &lt; b");
    }

    #[test]
    fn test_strings_and_comments() {
        let html = SpanHighlighter
            .highlight("var s = \"<x>\"; // done", Some("javascript"));
        assert!(html.contains("<span class=\"hl-keyword\">var</span>"));
        assert!(html.contains("<span class=\"hl-string\">&quot;&lt;x&gt;&quot;</span>"));
        assert!(html.contains("<span class=\"hl-comment\">// done</span>"));
    }

    #[test]
    fn test_hash_comments() {
        let html = SpanHighlighter.highlight("def f(): # note\n  return None", Some("py"));
        assert!(html.contains("<span class=\"hl-keyword\">def</span>"));
        assert!(html.contains("<span class=\"hl-comment\"># note</span>"));
        assert!(html.contains("<span class=\"hl-literal\">None</span>"));
    }

    #[test]
    fn test_rust_lifetimes_are_not_strings() {
        let html = SpanHighlighter.highlight("fn a<'a>(x: &'a str)", Some("rust"));
        assert!(html.contains("<span class=\"hl-keyword\">fn</span>"));
        assert!(!html.contains("hl-string"));
    }

    #[test]
    fn test_block_comment_unterminated() {
        let html = SpanHighlighter.highlight("/* open", Some("js"));
        assert_eq!(html, "<span class=\"hl-comment\">/* open</span>");
    }

    #[test]
    fn test_wrap_code_escapes_language() {
        assert_eq!(
            wrap_code("x", Some("a\"b")),
            "<pre><code class=\"lang-a&quot;b\">x</code></pre>"
        );
    }
}
