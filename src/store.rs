// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Content Store
//!
//! Four independent, append-only collections:
//!
//! | Collection | Order                                   | Lookup                 |
//! |------------|-----------------------------------------|------------------------|
//! | posts      | timestamp descending, undated last      | exact short key        |
//! | pages      | insertion                               | exact short key        |
//! | partials   | insertion                               | substring of short key |
//! | data       | insertion                               | exact short key        |
//!
//! Short keys are unique within a collection; adding a duplicate keeps the
//! entity that was stored first. The store remembers the collection that
//! was touched last, and [`ContentStore::find`] searches it when no
//! collection is named.

use std::cmp::Ordering;
use std::sync::Arc;

use log::debug;
use serde_json::{Map, Value as JsonValue};

use crate::content::{DataEntry, Item, Partial};
use crate::keys;

/// Selects one of the store's collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Posts, newest first.
    Posts,
    /// Pages.
    Pages,
    /// Layouts, includes and snippets.
    #[default]
    Partials,
    /// Structured data.
    Data,
}

impl CollectionKind {
    /// Name of the collection.
    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::Posts => "posts",
            CollectionKind::Pages => "pages",
            CollectionKind::Partials => "partials",
            CollectionKind::Data => "data",
        }
    }

    /// Parses a collection name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "posts" => Some(CollectionKind::Posts),
            "pages" => Some(CollectionKind::Pages),
            "partials" => Some(CollectionKind::Partials),
            "data" => Some(CollectionKind::Data),
            _ => None,
        }
    }
}

/// Any stored entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A post.
    Post(Arc<Item>),
    /// A page.
    Page(Arc<Item>),
    /// A layout, include or snippet.
    Partial(Arc<Partial>),
    /// A data entry.
    Data(Arc<DataEntry>),
}

impl Entity {
    /// Canonical key of the entity.
    pub fn short_key(&self) -> &str {
        match self {
            Entity::Post(item) | Entity::Page(item) => &item.short_key,
            Entity::Partial(partial) => &partial.short_key,
            Entity::Data(entry) => &entry.short_key,
        }
    }

    /// Text content, for posts, pages and partials.
    pub fn content(&self) -> Option<&str> {
        match self {
            Entity::Post(item) | Entity::Page(item) => Some(&item.content),
            Entity::Partial(partial) => Some(&partial.content),
            Entity::Data(_) => None,
        }
    }

    /// The item behind a post or page.
    pub fn as_item(&self) -> Option<&Arc<Item>> {
        match self {
            Entity::Post(item) | Entity::Page(item) => Some(item),
            _ => None,
        }
    }

    /// The partial behind a partial entity.
    pub fn as_partial(&self) -> Option<&Arc<Partial>> {
        match self {
            Entity::Partial(partial) => Some(partial),
            _ => None,
        }
    }
}

/// Point-in-time copy of the store's collections.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    /// Posts, newest first.
    pub posts: Vec<Arc<Item>>,
    /// Pages in insertion order.
    pub pages: Vec<Arc<Item>>,
    /// Partials in insertion order.
    pub partials: Vec<Arc<Partial>>,
    /// Data entries in insertion order.
    pub data: Vec<Arc<DataEntry>>,
}

/// Indexed collections of posts, pages, partials and data.
#[derive(Debug, Default)]
pub struct ContentStore {
    posts: Vec<Arc<Item>>,
    pages: Vec<Arc<Item>>,
    partials: Vec<Arc<Partial>>,
    data: Vec<Arc<DataEntry>>,
    active: CollectionKind,
}

impl ContentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a post and re-sorts the posts.
    pub fn add_post(&mut self, item: Item) -> &mut Self {
        _ = self.insert_post(item);
        self
    }

    /// Adds several posts.
    pub fn add_posts<I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = Item>,
    {
        for item in items {
            _ = self.insert_post(item);
        }
        self
    }

    /// Adds a post and returns the stored one, which is the existing post
    /// when the short key is already present.
    pub fn insert_post(&mut self, item: Item) -> Arc<Item> {
        self.active = CollectionKind::Posts;
        if let Some(existing) = find_item(&self.posts, &item.short_key) {
            debug!("Post already cached: {}", item.short_key);
            return existing;
        }

        let item = Arc::new(item);
        self.posts.push(Arc::clone(&item));
        self.posts.sort_by(|a, b| by_timestamp_desc(a, b));
        item
    }

    /// Adds a page.
    pub fn add_page(&mut self, item: Item) -> &mut Self {
        _ = self.insert_page(item);
        self
    }

    /// Adds several pages.
    pub fn add_pages<I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = Item>,
    {
        for item in items {
            _ = self.insert_page(item);
        }
        self
    }

    /// Adds a page and returns the stored one.
    pub fn insert_page(&mut self, item: Item) -> Arc<Item> {
        self.active = CollectionKind::Pages;
        if let Some(existing) = find_item(&self.pages, &item.short_key) {
            debug!("Page already cached: {}", item.short_key);
            return existing;
        }

        let item = Arc::new(item);
        self.pages.push(Arc::clone(&item));
        item
    }

    /// Adds a partial.
    pub fn add_partial(&mut self, partial: Partial) -> &mut Self {
        _ = self.insert_partial(partial);
        self
    }

    /// Adds several partials.
    pub fn add_partials<I>(&mut self, partials: I) -> &mut Self
    where
        I: IntoIterator<Item = Partial>,
    {
        for partial in partials {
            _ = self.insert_partial(partial);
        }
        self
    }

    /// Adds a partial and returns the stored one.
    pub fn insert_partial(&mut self, partial: Partial) -> Arc<Partial> {
        self.active = CollectionKind::Partials;
        if let Some(existing) = self
            .partials
            .iter()
            .find(|p| p.short_key == partial.short_key)
        {
            return Arc::clone(existing);
        }

        let partial = Arc::new(partial);
        self.partials.push(Arc::clone(&partial));
        partial
    }

    /// Adds a data entry. Values that fail to parse are skipped.
    pub fn add_data(&mut self, key: &str, value: JsonValue) -> &mut Self {
        self.active = CollectionKind::Data;
        if let Some(entry) = DataEntry::parse(key, value) {
            if self.data.iter().any(|d| d.short_key == entry.short_key) {
                debug!("Data already cached: {}", entry.short_key);
            } else {
                self.data.push(Arc::new(entry));
            }
        }
        self
    }

    /// Merges the nested data view into `target`.
    ///
    /// `data/sub/file.json` is placed at `target.sub.file`. Entries are
    /// visited in insertion order and existing values are never replaced.
    pub fn convert_keys(&self, target: &mut Map<String, JsonValue>) {
        for entry in &self.data {
            let path = entry.property_path();
            if !merge_at(target, &path, &entry.value) {
                debug!("Data key collision for {}", entry.short_key);
            }
        }
    }

    /// The nested data view as a fresh object.
    pub fn nested_data(&self) -> JsonValue {
        let mut target = Map::new();
        self.convert_keys(&mut target);
        JsonValue::Object(target)
    }

    /// Looks up an entity.
    ///
    /// Partials match when `key` is a substring of their short key; the
    /// other collections compare `normalize(key)` for equality. Without a
    /// `kind`, the last-touched collection is searched.
    pub fn find(&self, key: &str, kind: Option<CollectionKind>) -> Option<Entity> {
        match kind.unwrap_or(self.active) {
            CollectionKind::Posts => {
                find_item(&self.posts, &keys::normalize(key)).map(Entity::Post)
            }
            CollectionKind::Pages => {
                find_item(&self.pages, &keys::normalize(key)).map(Entity::Page)
            }
            CollectionKind::Partials => self
                .partials
                .iter()
                .find(|p| p.short_key.contains(key))
                .cloned()
                .map(Entity::Partial),
            CollectionKind::Data => {
                let key = keys::normalize(key);
                self.data
                    .iter()
                    .find(|d| d.short_key == key)
                    .cloned()
                    .map(Entity::Data)
            }
        }
    }

    /// The newer neighbour of a post.
    pub fn next_post(&self, item: &Item) -> Option<Arc<Item>> {
        let index = self.post_index(item)?;
        index.checked_sub(1).and_then(|i| self.posts.get(i)).cloned()
    }

    /// The older neighbour of a post.
    pub fn prev_post(&self, item: &Item) -> Option<Arc<Item>> {
        let index = self.post_index(item)?;
        self.posts.get(index + 1).cloned()
    }

    fn post_index(&self, item: &Item) -> Option<usize> {
        self.posts.iter().position(|p| p.short_key == item.short_key)
    }

    /// Posts, newest first.
    pub fn posts(&self) -> &[Arc<Item>] {
        &self.posts
    }

    /// Pages in insertion order.
    pub fn pages(&self) -> &[Arc<Item>] {
        &self.pages
    }

    /// Partials in insertion order.
    pub fn partials(&self) -> &[Arc<Partial>] {
        &self.partials
    }

    /// Data entries in insertion order.
    pub fn data(&self) -> &[Arc<DataEntry>] {
        &self.data
    }

    /// All entities of a collection.
    pub fn collection(&self, kind: CollectionKind) -> Vec<Entity> {
        match kind {
            CollectionKind::Posts => {
                self.posts.iter().cloned().map(Entity::Post).collect()
            }
            CollectionKind::Pages => {
                self.pages.iter().cloned().map(Entity::Page).collect()
            }
            CollectionKind::Partials => {
                self.partials.iter().cloned().map(Entity::Partial).collect()
            }
            CollectionKind::Data => {
                self.data.iter().cloned().map(Entity::Data).collect()
            }
        }
    }

    /// All entities of a collection selected by name.
    pub fn collection_by_name(&self, name: &str) -> Option<Vec<Entity>> {
        CollectionKind::from_name(name).map(|kind| self.collection(kind))
    }

    /// The last-touched collection.
    pub fn active(&self) -> CollectionKind {
        self.active
    }

    /// Copies the current collections.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            posts: self.posts.clone(),
            pages: self.pages.clone(),
            partials: self.partials.clone(),
            data: self.data.clone(),
        }
    }

    /// Empties all four collections. The active collection is kept.
    pub fn reset(&mut self) -> &mut Self {
        debug!("Clearing posts, pages, partials and data");
        self.posts.clear();
        self.pages.clear();
        self.partials.clear();
        self.data.clear();
        self
    }
}

/// Places `value` at `path` unless something is already there. Returns
/// `false` when a non-object blocks the path.
fn merge_at(
    node: &mut Map<String, JsonValue>,
    path: &[String],
    value: &JsonValue,
) -> bool {
    match path {
        [] => false,
        [leaf] => {
            if !node.contains_key(leaf) {
                _ = node.insert(leaf.clone(), value.clone());
            }
            true
        }
        [head, rest @ ..] => match node
            .entry(head.clone())
            .or_insert_with(|| JsonValue::Object(Map::new()))
        {
            JsonValue::Object(child) => merge_at(child, rest, value),
            _ => false,
        },
    }
}

fn find_item(items: &[Arc<Item>], short_key: &str) -> Option<Arc<Item>> {
    items.iter().find(|i| i.short_key == short_key).cloned()
}

/// Newest first; undated items after all dated ones.
fn by_timestamp_desc(a: &Item, b: &Item) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use serde_json::json;

    fn post(key: &str, front: &str) -> Item {
        Item::post(key, &format!("---\n{}\n---\nBody", front), &Config::default())
    }

    #[test]
    fn test_posts_sorted_newest_first_undated_last() {
        let mut store = ContentStore::new();
        _ = store
            .add_post(post("_posts/undated.md", "title: Undated"))
            .add_post(post("_posts/old.md", "date: 2013-01-01"))
            .add_post(post("_posts/new.md", "date: 2014-01-01"))
            .add_post(post("_posts/mid.md", "date: 2013-06-01"));

        let keys: Vec<_> =
            store.posts().iter().map(|p| p.short_key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["posts/new.md", "posts/mid.md", "posts/old.md", "posts/undated.md"]
        );
    }

    #[test]
    fn test_duplicate_add_returns_original() {
        let mut store = ContentStore::new();
        let first = store.insert_post(post("_posts/a.md", "title: First"));
        let second = store.insert_post(post("/other/_posts/a.md", "title: Second"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.posts().len(), 1);
        assert_eq!(second.title(), Some("First"));
    }

    #[test]
    fn test_find_uses_active_collection() {
        let mut store = ContentStore::new();
        _ = store.add_page(Item::page("about.html", "About", &Config::default()));
        assert_eq!(store.active(), CollectionKind::Pages);

        let found = store.find("about.html", None).unwrap();
        assert_eq!(found.short_key(), "about.html");
        assert!(store.find("about.html", Some(CollectionKind::Posts)).is_none());
    }

    #[test]
    fn test_find_partials_by_substring() {
        let mut store = ContentStore::new();
        _ = store
            .add_partial(Partial::new("_includes/a/head.html", "A"))
            .add_partial(Partial::new("_includes/b/head.html", "B"));

        let found = store.find("head.html", Some(CollectionKind::Partials)).unwrap();
        assert_eq!(found.content(), Some("A"));
        assert!(store.find("includes/head.html", None).is_none());
    }

    #[test]
    fn test_next_and_prev_post() {
        let mut store = ContentStore::new();
        _ = store
            .add_post(post("_posts/one.md", "date: 2013-01-01"))
            .add_post(post("_posts/two.md", "date: 2013-02-01"))
            .add_post(post("_posts/three.md", "date: 2013-03-01"));

        let middle = store.find("posts/two.md", Some(CollectionKind::Posts)).unwrap();
        let middle = middle.as_item().unwrap();

        assert_eq!(store.next_post(middle).unwrap().short_key, "posts/three.md");
        assert_eq!(store.prev_post(middle).unwrap().short_key, "posts/one.md");

        let newest = Arc::clone(&store.posts()[0]);
        assert!(store.next_post(&newest).is_none());
    }

    #[test]
    fn test_nested_data_view() {
        let mut store = ContentStore::new();
        _ = store
            .add_data("_data/members.yml", json!("- name: Parker\n- name: Liu\n"))
            .add_data("_data/subdir/level2/animals.json", json!({"name": "kittie"}))
            .add_data("_data/subdir/animals.json", json!({"name": "cat"}));

        let data = store.nested_data();
        assert_eq!(data["members"].as_array().unwrap().len(), 2);
        assert_eq!(data["subdir"]["level2"]["animals"]["name"], "kittie");
        assert_eq!(data["subdir"]["animals"]["name"], "cat");
    }

    #[test]
    fn test_convert_keys_first_wins() {
        let mut store = ContentStore::new();
        _ = store
            .add_data("data/site.json", json!({"v": 1}))
            .add_data("data/site.yml", json!("v: 2\n"));

        let mut target = Map::new();
        store.convert_keys(&mut target);
        assert_eq!(target["site"]["v"], 1);
    }

    #[test]
    fn test_collections_and_reset() {
        let mut store = ContentStore::new();
        _ = store
            .add_post(post("_posts/a.md", "title: A"))
            .add_page(Item::page("b.html", "", &Config::default()))
            .add_partial(Partial::new("_layouts/default.html", "{{{content}}}"))
            .add_data("data/x.json", json!(1));

        assert_eq!(store.collection(CollectionKind::Posts).len(), 1);
        assert_eq!(store.collection_by_name("partials").unwrap().len(), 1);
        assert!(store.collection_by_name("widgets").is_none());
        assert_eq!(store.snapshot().data.len(), 1);

        _ = store.reset();
        assert!(store.posts().is_empty());
        assert!(store.pages().is_empty());
        assert!(store.partials().is_empty());
        assert!(store.data().is_empty());
        assert_eq!(store.active(), CollectionKind::Data);
    }
}
