//! Direct reads of the resource server's persisted store.
//!
//! The store is a JSON document with top-level `posts` and `users` keys that
//! the server rewrites on every mutation. The reader keeps no cache: every
//! call reads the file again, so a value always reflects the latest state on
//! disk, including changes made by a resync or by the scenario itself.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::LiveStateError;
use crate::model::Post;

/// Typed view of the persisted store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreDocument {
    pub posts: Vec<Post>,
    #[serde(default)]
    pub users: Vec<Value>,
    /// Any other collections the server keeps.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A read of the store together with the file's modification time.
#[derive(Debug, Clone)]
pub struct Observation {
    pub modified: Option<SystemTime>,
    pub value: Value,
}

impl Observation {
    /// Whether the file was modified after `earlier` was taken.
    ///
    /// Returns `true` when either timestamp is unavailable.
    pub fn is_newer_than(&self, earlier: &Observation) -> bool {
        match (self.modified, earlier.modified) {
            (Some(now), Some(then)) => now > then,
            _ => true,
        }
    }
}

/// Reads the store file, bypassing HTTP.
#[derive(Debug, Clone)]
pub struct LiveStateReader {
    path: PathBuf,
}

impl LiveStateReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current contents of the store as a plain JSON value.
    pub fn read(&self) -> Result<Value, LiveStateError> {
        let bytes = std::fs::read(&self.path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                LiveStateError::NotFound(self.path.clone())
            } else {
                LiveStateError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Read live store");

        serde_json::from_slice(&bytes).map_err(|source| LiveStateError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Reads the store together with its modification time.
    pub fn observe(&self) -> Result<Observation, LiveStateError> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok();
        let value = self.read()?;
        Ok(Observation { modified, value })
    }

    /// Reads and decodes the whole store.
    pub fn document(&self) -> Result<StoreDocument, LiveStateError> {
        let value = self.read()?;
        if value.get("posts").is_none() {
            return Err(LiveStateError::MissingPosts(self.path.clone()));
        }
        serde_json::from_value(value).map_err(|source| LiveStateError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Returns the persisted `posts` collection in stored order.
    ///
    /// Fails on any item that is not a well-formed post; see
    /// [`post_items`](Self::post_items) for a tolerant read.
    pub fn posts(&self) -> Result<Vec<Post>, LiveStateError> {
        Ok(self.document()?.posts)
    }

    /// Returns the raw `posts` items in stored order, whatever their shape.
    pub fn post_items(&self) -> Result<Vec<Value>, LiveStateError> {
        match self.read()? {
            Value::Object(mut store) => match store.remove("posts") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(LiveStateError::MissingPosts(self.path.clone())),
            },
            _ => Err(LiveStateError::MissingPosts(self.path.clone())),
        }
    }
}
