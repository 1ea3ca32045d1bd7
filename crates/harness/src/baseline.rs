//! Baseline snapshot of the `/posts` collection.
//!
//! The baseline is the canonical seed state: the fixture synchronizer
//! recreates it before every scenario and scenarios compare responses
//! against it. Order is significant, so "the 2nd post" always means
//! `baseline.get(1)`.
//!
//! A default snapshot is embedded in the crate; a different one can be
//! loaded from a JSON file of the same shape:
//!
//! ```json
//! { "posts": [ { "id": 1, "title": "...", "author": "..." } ] }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::BaselineError;
use crate::model::Post;

const DEFAULT_DATA: &str = include_str!("../fixtures/default_data.json");

#[derive(Debug, Deserialize)]
struct BaselineDocument {
    posts: Vec<Post>,
}

/// Immutable, ordered snapshot of the expected collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    posts: Vec<Post>,
}

impl Baseline {
    /// Returns the snapshot embedded in the crate (5 posts, ids 1 to 5).
    pub fn embedded() -> Result<Self, BaselineError> {
        Self::from_json_str(DEFAULT_DATA)
    }

    /// Parses a baseline document.
    pub fn from_json_str(json: &str) -> Result<Self, BaselineError> {
        let document: BaselineDocument =
            serde_json::from_str(json).map_err(BaselineError::Parse)?;
        Self::from_posts(document.posts)
    }

    /// Loads a baseline document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BaselineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| BaselineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Builds a baseline from posts, rejecting duplicate ids.
    pub fn from_posts(posts: Vec<Post>) -> Result<Self, BaselineError> {
        let mut seen = HashSet::with_capacity(posts.len());
        for post in &posts {
            if !seen.insert(post.id) {
                return Err(BaselineError::DuplicateId(post.id));
            }
        }
        Ok(Self { posts })
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Returns the post at `index` in snapshot order.
    pub fn get(&self, index: usize) -> Result<&Post, BaselineError> {
        self.posts.get(index).ok_or(BaselineError::MissingIndex {
            index,
            len: self.posts.len(),
        })
    }

    /// Finds a post by id.
    pub fn find(&self, id: u64) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.find(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.posts.iter().map(|post| post.id)
    }

    /// Returns the posts whose id is in `ids`, in snapshot order.
    ///
    /// This is what a filtered `GET /posts?id=..&id=..` is expected to return,
    /// whatever order the ids were requested in.
    pub fn select(&self, ids: &[u64]) -> Vec<Post> {
        self.posts
            .iter()
            .filter(|post| ids.contains(&post.id))
            .cloned()
            .collect()
    }

    /// Returns `preferred` if no baseline post uses it, otherwise the first id
    /// above the largest baseline id, or the lowest free id when the largest
    /// is `u64::MAX`.
    pub fn unused_id(&self, preferred: u64) -> u64 {
        if !self.contains(preferred) {
            return preferred;
        }
        self.ids()
            .max()
            .and_then(|max| max.checked_add(1))
            .or_else(|| (0..=u64::MAX).find(|id| !self.contains(*id)))
            .unwrap_or(preferred)
    }

    /// Returns the snapshot as a JSON array.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.posts).unwrap_or(Value::Array(Vec::new()))
    }

    /// Compares an observed collection with the snapshot.
    pub fn diff(&self, actual: &[Post]) -> BaselineDiff {
        let items: Vec<Value> = actual
            .iter()
            .filter_map(|post| serde_json::to_value(post).ok())
            .collect();
        self.diff_items(&items)
    }

    /// Compares raw collection items with the snapshot.
    ///
    /// Items that do not decode as a [`Post`] are reported as malformed
    /// instead of failing the comparison. A malformed item that still has an
    /// integer id counts as changed (baseline id) or unexpected (other id).
    pub fn diff_items(&self, items: &[Value]) -> BaselineDiff {
        let mut diff = BaselineDiff::default();
        let mut actual_ids = Vec::with_capacity(items.len());
        let mut decoded = Vec::with_capacity(items.len());

        for item in items {
            match Post::deserialize(item) {
                Ok(post) => {
                    actual_ids.push(post.id);
                    decoded.push(post);
                }
                Err(_) => {
                    if let Some(id) = item.get("id").and_then(Value::as_u64) {
                        actual_ids.push(id);
                    }
                    diff.malformed.push(item.clone());
                }
            }
        }

        for expected in &self.posts {
            if !actual_ids.contains(&expected.id) {
                diff.missing.push(expected.id);
            } else if decoded.iter().find(|post| post.id == expected.id) != Some(expected) {
                diff.changed.push(expected.id);
            }
        }
        diff.unexpected = actual_ids
            .iter()
            .copied()
            .filter(|id| !self.contains(*id))
            .collect();

        let expected_ids: Vec<u64> = self.ids().collect();
        diff.order_matches = actual_ids == expected_ids;

        diff
    }
}

/// Differences between an observed collection and the baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineDiff {
    /// Baseline ids absent from the collection.
    pub missing: Vec<u64>,
    /// Collection ids absent from the baseline.
    pub unexpected: Vec<u64>,
    /// Ids present in both whose fields differ.
    pub changed: Vec<u64>,
    /// Items that are not well-formed posts.
    pub malformed: Vec<Value>,
    /// Whether the ids appear in exactly baseline order.
    pub order_matches: bool,
}

impl BaselineDiff {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.unexpected.is_empty()
            && self.changed.is_empty()
            && self.malformed.is_empty()
            && self.order_matches
    }

    /// One-line summary for logs and error messages.
    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "matches baseline".to_string();
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing ids {:?}", self.missing));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!("unexpected ids {:?}", self.unexpected));
        }
        if !self.changed.is_empty() {
            parts.push(format!("changed ids {:?}", self.changed));
        }
        if !self.malformed.is_empty() {
            let items: Vec<String> = self.malformed.iter().map(Value::to_string).collect();
            parts.push(format!("malformed entries [{}]", items.join(", ")));
        }
        if !self.order_matches {
            parts.push("order differs".to_string());
        }
        parts.join(", ")
    }
}
