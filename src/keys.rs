// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Key Normalisation
//!
//! Every entity in the content store is addressed by a *short key*: the
//! path of its source file, trimmed down to the kind folder it lives in.
//!
//! ```text
//! /home/me/site/_posts/2013-11-13-hello.md  ->  posts/2013-11-13-hello.md
//! _includes/blog/head.html                  ->  includes/blog/head.html
//! ```
//!
//! Includes additionally get a *partial key* (the basename without its
//! extension, `head` above) so templates can refer to them by their bare
//! name. The helpers in this module also derive the lookup paths used for
//! layouts, includes and snippets.

/// Folder names that mark the start of a short key.
pub const KIND_FOLDERS: &[&str] =
    &["includes", "layouts", "snippets", "posts", "pages", "data"];

/// Layout used when an item does not name one.
pub const DEFAULT_LAYOUT: &str = "default";

/// Canonicalises a raw path into a short key.
///
/// Backslashes become forward slashes. The leftmost segment that names a
/// kind folder (with or without a leading underscore) and is followed by a
/// non-empty remainder becomes the start of the key; everything before it
/// is dropped along with the underscore. Keys without a kind folder are
/// returned unchanged. Applying `normalize` twice yields the same key.
pub fn normalize(raw: &str) -> String {
    let path = raw.replace('\\', "/");

    let mut offset = 0;
    for segment in path.split('/') {
        let rest_start = offset + segment.len() + 1;
        let folder = segment.strip_prefix('_').unwrap_or(segment);

        if KIND_FOLDERS.contains(&folder) && rest_start < path.len() {
            return format!("{}/{}", folder, &path[rest_start..]);
        }
        offset = rest_start;
    }

    path
}

/// Returns the basename of `key` without its extension.
pub fn base_name(key: &str) -> String {
    let name = key.rsplit('/').next().unwrap_or(key);
    strip_extension(name)
}

/// Alias key for includes: the basename without its extension.
///
/// Returns `None` when the key has no usable basename.
pub fn partial_key(short_key: &str) -> Option<String> {
    let key = base_name(short_key);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Removes the extension of the final path segment, if any.
///
/// Dot-files such as `.hidden` are treated as having no extension.
pub fn strip_extension(key: &str) -> String {
    let name_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[name_start..].rfind('.') {
        Some(dot) if dot > 0 => key[..name_start + dot].to_string(),
        _ => key.to_string(),
    }
}

/// Returns the extension of the final path segment without the dot.
pub fn extension(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => {
            Some(&name[dot + 1..])
        }
        _ => None,
    }
}

/// Lookup path of a layout. An empty or missing name selects `default`.
pub fn layout_path(name: Option<&str>) -> String {
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_LAYOUT);
    format!("layouts/{}.html", name)
}

/// Lookup path of an include.
///
/// HTML includes may be named without their extension, and the
/// `includes/` prefix is optional.
pub fn include_path(name: &str) -> String {
    let prefix = if name.starts_with("includes") {
        ""
    } else {
        "includes/"
    };

    if name.ends_with("html") {
        format!("{}{}", prefix, name)
    } else {
        format!("{}{}.html", prefix, name)
    }
}

/// Lookup path of a snippet.
pub fn snippet_path(name: &str) -> String {
    format!("snippets/{}", name)
}

/// Returns `true` for YAML keys (`.yml` / `.yaml`, any case).
pub fn is_yaml(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.ends_with("yml") || lower.ends_with("yaml")
}

/// Returns `true` for JSON keys.
pub fn is_json(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with(".json")
}

/// Returns `true` when the short key addresses an include.
pub fn is_include(short_key: &str) -> bool {
    short_key.starts_with("includes")
}

/// Returns `true` when the short key addresses a post.
pub fn is_post(short_key: &str) -> bool {
    short_key.starts_with("posts/")
}

/// Splits a leading `YYYY-MM-DD-` prefix off a file name.
///
/// ```
/// use scribeflow::keys::split_date_prefix;
///
/// assert_eq!(
///     split_date_prefix("2014-06-21-post1"),
///     (Some("2014-06-21"), "post1")
/// );
/// assert_eq!(split_date_prefix("post1"), (None, "post1"));
/// ```
pub fn split_date_prefix(name: &str) -> (Option<&str>, &str) {
    let bytes = name.as_bytes();
    if bytes.len() <= 11 {
        return (None, name);
    }

    let shape_ok = bytes[..10].iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    });

    if shape_ok && bytes[10] == b'-' {
        (Some(&name[..10]), &name[11..])
    } else {
        (None, name)
    }
}

/// Prefixes a forward slash unless one is already present.
pub fn complete_url(url: &str) -> String {
    if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

/// Strips a single leading forward slash from a file path.
pub fn complete_path(path: &str) -> String {
    path.strip_prefix('/').unwrap_or(path).to_string()
}
