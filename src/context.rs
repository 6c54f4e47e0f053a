// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Render Context
//!
//! Builds the values templates are rendered against.
//!
//! A page render sees:
//!
//! | Key       | Value                                                |
//! |-----------|------------------------------------------------------|
//! | `site`    | the site configuration                               |
//! | `config`  | the build configuration                              |
//! | `page`    | the item being rendered (also bound as `post`)       |
//! | `posts`   | every post, newest first                             |
//! | `pages`   | every page, in insertion order                       |
//! | `data`    | the nested data view                                 |
//! | `next`    | the newer neighbour of a post                        |
//! | `prev`    | the older neighbour of a post                        |
//! | `paged`   | the current slice of a paginated render              |
//! | `content` | the item body                                        |
//!
//! Includes and snippets render against a [`ScopedContext`] derived from
//! the scope of their caller.

use serde_json::{Map, Value as JsonValue};

use crate::content::Item;
use crate::core::config::Config;
use crate::store::ContentStore;

/// Sandbox key tracking how deeply includes are nested.
pub const INCLUDE_DEPTH_KEY: &str = "__include_depth";

/// Maximum include nesting before rendering fails.
pub const MAX_INCLUDE_DEPTH: u64 = 32;

/// Sandbox key mirroring an include's inline parameters.
const PARAMS_KEY: &str = "params";

/// Assembles the render scope for `item`.
///
/// Posts also get `next`/`prev` on the top level and on `page`/`post`.
pub fn build_context(
    item: &Item,
    site: &JsonValue,
    config: &Config,
    store: &ContentStore,
    paged: Option<JsonValue>,
) -> JsonValue {
    let date_format = config.date_format.as_str();
    let mut page = item.to_value(date_format);
    let mut scope = Map::new();

    if item.is_post() {
        let next = store
            .next_post(item)
            .map_or(JsonValue::Null, |p| p.to_value(date_format));
        let prev = store
            .prev_post(item)
            .map_or(JsonValue::Null, |p| p.to_value(date_format));

        if let Some(fields) = page.as_object_mut() {
            _ = fields.insert("next".into(), next.clone());
            _ = fields.insert("prev".into(), prev.clone());
        }
        _ = scope.insert("next".into(), next);
        _ = scope.insert("prev".into(), prev);
    }

    _ = scope.insert("site".into(), site.clone());
    _ = scope.insert(
        "config".into(),
        serde_json::to_value(config).unwrap_or_default(),
    );
    _ = scope.insert("content".into(), item.content.clone().into());
    _ = scope.insert(
        "posts".into(),
        store
            .posts()
            .iter()
            .map(|p| p.to_value(date_format))
            .collect(),
    );
    _ = scope.insert(
        "pages".into(),
        store
            .pages()
            .iter()
            .map(|p| p.to_value(date_format))
            .collect(),
    );
    _ = scope.insert("data".into(), store.nested_data());
    _ = scope.insert("post".into(), page.clone());
    _ = scope.insert("page".into(), page);

    if let Some(paged) = paged {
        _ = scope.insert("paged".into(), paged);
    }

    JsonValue::Object(scope)
}

/// Two-layer scope for an include or snippet invocation.
///
/// `local` holds the inline parameters and always wins. Inherited keys
/// that collide with a parameter stay reachable with a leading underscore.
/// The parameters are mirrored under `params`, so an enclosing include's
/// `params` always moves to `_params`.
///
/// ```
/// use scribeflow::context::ScopedContext;
/// use serde_json::json;
///
/// let local = json!({"title": "X"}).as_object().cloned().unwrap();
/// let inherited = json!({"title": "Y", "site": {"name": "Blog"}});
/// let sandbox = ScopedContext::new(local, &inherited).into_value();
///
/// assert_eq!(sandbox["title"], "X");
/// assert_eq!(sandbox["_title"], "Y");
/// assert_eq!(sandbox["params"]["title"], "X");
/// assert_eq!(sandbox["site"]["name"], "Blog");
/// ```
#[derive(Debug, Clone)]
pub struct ScopedContext<'a> {
    local: Map<String, JsonValue>,
    inherited: &'a JsonValue,
}

impl<'a> ScopedContext<'a> {
    /// Layers `local` over the caller's scope.
    pub fn new(local: Map<String, JsonValue>, inherited: &'a JsonValue) -> Self {
        Self { local, inherited }
    }

    /// Include depth of the caller.
    pub fn depth(&self) -> u64 {
        self.inherited
            .get(INCLUDE_DEPTH_KEY)
            .and_then(JsonValue::as_u64)
            .unwrap_or(0)
    }

    /// Looks a key up, local layer first.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.local.get(key).or_else(|| self.inherited.get(key))
    }

    /// Flattens both layers into a fresh sandbox one level deeper.
    pub fn into_value(self) -> JsonValue {
        let depth = self.depth() + 1;
        let mut sandbox = Map::new();

        if let JsonValue::Object(inherited) = self.inherited {
            for (key, value) in inherited {
                let collides = self.local.contains_key(key) || key == PARAMS_KEY;
                if collides && key != INCLUDE_DEPTH_KEY {
                    _ = sandbox.insert(format!("_{}", key), value.clone());
                }
                _ = sandbox.insert(key.clone(), value.clone());
            }
        }

        for (key, value) in &self.local {
            _ = sandbox.insert(key.clone(), value.clone());
        }
        _ = sandbox.insert(PARAMS_KEY.into(), JsonValue::Object(self.local));
        _ = sandbox.insert(INCLUDE_DEPTH_KEY.into(), depth.into());

        JsonValue::Object(sandbox)
    }
}
