// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Pagination
//!
//! Splits an ordered collection into fixed-size slices and synthesises one
//! page per slice from the page that asked for pagination (the *anchor*).
//!
//! ```text
//! blog/index.html          slice 1, the anchor itself
//! blog/page2/index.html    slice 2, title "Blog - Page 2"
//! blog/page3/index.html    slice 3, title "Blog - Page 3"
//! ```
//!
//! Pagination is requested in front matter with `paginate: posts:3`,
//! `paginate: 3` or `paginate: true`.

use std::sync::Arc;

use log::warn;
use serde_json::{json, Value as JsonValue};

use crate::content::Item;
use crate::keys;
use crate::store::CollectionKind;

/// Items per slice when the directive does not give a size.
pub const DEFAULT_PER_PAGE: usize = 2;

/// A parsed `paginate` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginateSpec {
    /// Collection to paginate, posts or pages.
    pub collection: CollectionKind,
    /// Items per slice, at least one.
    pub per_page: usize,
}

impl PaginateSpec {
    /// Parses `name:size`, `name` or `size`.
    ///
    /// ```
    /// use scribeflow::paginator::PaginateSpec;
    /// use scribeflow::store::CollectionKind;
    ///
    /// let spec = PaginateSpec::parse("posts:3").unwrap();
    /// assert_eq!(spec.collection, CollectionKind::Posts);
    /// assert_eq!(spec.per_page, 3);
    ///
    /// assert_eq!(PaginateSpec::parse("pages").unwrap().per_page, 2);
    /// assert!(PaginateSpec::parse("widgets:3").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(size) = text.parse::<usize>() {
            return Some(Self::posts(size));
        }

        let (name, size): (&str, Option<usize>) = match text.split_once(':') {
            Some((name, size)) => (name.trim(), size.trim().parse().ok()),
            None => (text, None),
        };

        match CollectionKind::from_name(name) {
            Some(kind @ (CollectionKind::Posts | CollectionKind::Pages)) => {
                Some(Self {
                    collection: kind,
                    per_page: size.filter(|s| *s > 0).unwrap_or(DEFAULT_PER_PAGE),
                })
            }
            _ => {
                warn!("Cannot paginate '{}'", text);
                None
            }
        }
    }

    /// Reads a front-matter `paginate` value.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(true) => Some(Self::posts(DEFAULT_PER_PAGE)),
            JsonValue::Number(n) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Self::posts),
            JsonValue::String(text) => Self::parse(text),
            _ => None,
        }
    }

    fn posts(per_page: usize) -> Self {
        Self {
            collection: CollectionKind::Posts,
            per_page: if per_page == 0 { DEFAULT_PER_PAGE } else { per_page },
        }
    }
}

/// One page of a pagination.
#[derive(Debug, Clone)]
pub struct PageSlice {
    /// Zero-based position.
    pub index: usize,
    /// The synthesised page.
    pub page: Arc<Item>,
    /// Items shown on this page.
    pub items: Vec<Arc<Item>>,
}

/// The slices of a paginated collection.
#[derive(Debug, Clone)]
pub struct Pagination {
    per_page: usize,
    slices: Vec<PageSlice>,
}

impl Pagination {
    /// Items per slice.
    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// All slices in order.
    pub fn slices(&self) -> &[PageSlice] {
        &self.slices
    }

    /// Number of slices.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Returns `true` when there are no slices.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// The slice after `index`.
    pub fn next(&self, index: usize) -> Option<&PageSlice> {
        self.slices.get(index + 1)
    }

    /// The slice before `index`.
    pub fn prev(&self, index: usize) -> Option<&PageSlice> {
        index.checked_sub(1).and_then(|i| self.slices.get(i))
    }

    /// The `paged` render value for slice `index`.
    pub fn paged_value(&self, index: usize, date_format: &str) -> JsonValue {
        let page_value = |slice: Option<&PageSlice>| {
            slice.map_or(JsonValue::Null, |s| s.page.to_value(date_format))
        };
        let items: Vec<JsonValue> = self
            .slices
            .get(index)
            .map(|s| s.items.iter().map(|i| i.to_value(date_format)).collect())
            .unwrap_or_default();

        json!({
            "items": items,
            "per_page": self.per_page,
            "current": index + 1,
            "total": self.slices.len(),
            "next": page_value(self.next(index)),
            "prev": page_value(self.prev(index)),
        })
    }
}

/// Chunks `items` into slices of `per_page`.
///
/// Slice 0 keeps the anchor's URL and file path. Later slices live at
/// `<base>/pageN/index.html` with the title suffixed `" - Page N"`. An empty
/// collection still yields the anchor as a single, empty slice.
pub fn paginate(items: &[Arc<Item>], per_page: usize, anchor: &Item) -> Pagination {
    let per_page = per_page.max(1);
    let base = base_path(&anchor.url);

    let mut chunks: Vec<Vec<Arc<Item>>> =
        items.chunks(per_page).map(<[Arc<Item>]>::to_vec).collect();
    if chunks.is_empty() {
        chunks.push(Vec::new());
    }

    let slices = chunks
        .into_iter()
        .enumerate()
        .map(|(index, items)| PageSlice {
            index,
            page: Arc::new(slice_page(anchor, &base, index)),
            items,
        })
        .collect();

    Pagination { per_page, slices }
}

/// URL base for later slices: the anchor URL without slashes, a trailing
/// `.html` or a root `index.html`.
fn base_path(url: &str) -> String {
    let base = url.trim_matches('/');
    if base == "index.html" || base == "index" {
        return String::new();
    }
    base.strip_suffix(".html").unwrap_or(base).to_string()
}

fn slice_page(anchor: &Item, base: &str, index: usize) -> Item {
    if index == 0 {
        return anchor.clone();
    }

    let number = index + 1;
    let folder = if base.is_empty() {
        format!("page{}", number)
    } else {
        format!("{}/page{}", base, number)
    };

    anchor.clone().transform(|page| {
        page.file_path = keys::complete_path(&format!("{}/index.html", folder));
        page.url = keys::complete_url(&folder);

        let title = match page.title() {
            Some(title) => format!("{} - Page {}", title, number),
            None => format!("Page {}", number),
        };
        _ = page.front.insert("title".into(), title.into());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;

    fn posts(count: usize) -> Vec<Arc<Item>> {
        (0..count)
            .map(|i| {
                Arc::new(Item::post(
                    &format!("_posts/post{}.md", i),
                    "",
                    &Config::default(),
                ))
            })
            .collect()
    }

    fn blog() -> Item {
        Item::page("blog.html", "---\ntitle: Blog\n---\n", &Config::default())
    }

    fn sizes(pagination: &Pagination) -> Vec<usize> {
        pagination.slices().iter().map(|s| s.items.len()).collect()
    }

    #[test]
    fn test_even_and_uneven_chunks() {
        assert_eq!(sizes(&paginate(&posts(6), 3, &blog())), vec![3, 3]);
        assert_eq!(sizes(&paginate(&posts(7), 3, &blog())), vec![3, 3, 1]);
    }

    #[test]
    fn test_slice_paths_and_titles() {
        let anchor = blog();
        let pagination = paginate(&posts(5), 2, &anchor);

        let first = &pagination.slices()[0].page;
        assert_eq!(first.url, anchor.url);
        assert_eq!(first.file_path, anchor.file_path);
        assert_eq!(first.title(), Some("Blog"));

        let second = &pagination.slices()[1].page;
        assert_eq!(second.url, "/blog/page2");
        assert_eq!(second.file_path, "blog/page2/index.html");
        assert_eq!(second.title(), Some("Blog - Page 2"));

        let third = &pagination.slices()[2].page;
        assert_eq!(third.url, "/blog/page3");
    }

    #[test]
    fn test_root_anchor_and_missing_title() {
        let index = Item::page("index.html", "", &Config::default());
        let pagination = paginate(&posts(3), 2, &index);
        let second = &pagination.slices()[1].page;
        assert_eq!(second.url, "/page2");
        assert_eq!(second.file_path, "page2/index.html");
        assert_eq!(second.title(), Some("Page 2"));
    }

    #[test]
    fn test_empty_collection_yields_anchor() {
        let pagination = paginate(&[], 3, &blog());
        assert_eq!(pagination.len(), 1);
        assert!(pagination.slices()[0].items.is_empty());
    }

    #[test]
    fn test_paged_value_threads_neighbours() {
        let pagination = paginate(&posts(5), 2, &blog());
        let paged = pagination.paged_value(1, "%Y");

        assert_eq!(paged["current"], 2);
        assert_eq!(paged["total"], 3);
        assert_eq!(paged["per_page"], 2);
        assert_eq!(paged["items"].as_array().unwrap().len(), 2);
        assert_eq!(paged["next"]["url"], "/blog/page3");
        assert_eq!(paged["prev"]["url"], "/blog");

        let last = pagination.paged_value(2, "%Y");
        assert!(last["next"].is_null());
    }

    #[test]
    fn test_spec_from_front_matter() {
        assert_eq!(
            PaginateSpec::from_value(&JsonValue::from(4)),
            Some(PaginateSpec {
                collection: CollectionKind::Posts,
                per_page: 4,
            })
        );
        assert_eq!(
            PaginateSpec::from_value(&JsonValue::Bool(true)).map(|s| s.per_page),
            Some(DEFAULT_PER_PAGE)
        );
        assert_eq!(
            PaginateSpec::parse("posts:0").map(|s| s.per_page),
            Some(DEFAULT_PER_PAGE)
        );
        assert!(PaginateSpec::from_value(&JsonValue::Bool(false)).is_none());
        assert!(PaginateSpec::parse("partials:2").is_none());
    }
}
