//! Fixture synchronization.
//!
//! Drives the remote `/posts` collection back to the baseline before every
//! scenario with a two-phase reset:
//!
//! 1. **drain**: list the collection and delete every post by id;
//! 2. **seed**: recreate every baseline post, in snapshot order.
//!
//! Requests are issued strictly one after another; the server only
//! guarantees consistency for non-overlapping mutations. A failing request
//! stops the phase at once and the returned [`SyncError`] records how far it
//! got. Nothing is retried: after a failure the collection is indeterminate
//! and no later assertion can trust it.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::baseline::Baseline;
use crate::client::ApiClient;
use crate::error::{SyncCause, SyncError, SyncPhase};
use crate::model::Credential;

/// Counts reported by a successful resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncReport {
    /// Posts deleted by the drain phase.
    pub drained: usize,
    /// Posts created by the seed phase.
    pub seeded: usize,
}

/// Resets the remote collection to a baseline.
#[derive(Debug, Clone)]
pub struct FixtureSynchronizer {
    client: ApiClient,
    baseline: Arc<Baseline>,
}

impl FixtureSynchronizer {
    pub fn new(client: ApiClient, baseline: Arc<Baseline>) -> Self {
        Self { client, baseline }
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Deletes every post currently in the collection.
    ///
    /// Only the `id` of each listed item is read, so items of any other
    /// shape are drained too. An item without an integer id stops the drain
    /// before anything is deleted. Returns the number of posts removed.
    pub async fn drain(&self, credential: &Credential) -> Result<usize, SyncError> {
        let items = self
            .client
            .list_post_items(credential)
            .await
            .map_err(|e| SyncError {
                phase: SyncPhase::Fetch,
                completed: 0,
                total: 1,
                id: None,
                cause: e.into(),
            })?;
        let ids = item_ids(&items).map_err(|item| SyncError {
            phase: SyncPhase::Fetch,
            completed: 0,
            total: items.len(),
            id: None,
            cause: SyncCause::MissingId(item.to_string()),
        })?;
        let total = ids.len();

        for (completed, id) in ids.iter().copied().enumerate() {
            self.client
                .delete_post(credential, id)
                .await
                .map_err(|e| SyncError {
                    phase: SyncPhase::Drain,
                    completed,
                    total,
                    id: Some(id),
                    cause: e.into(),
                })?;
        }

        debug!(drained = total, "Drained remote collection");
        Ok(total)
    }

    /// Creates every baseline post, in snapshot order.
    ///
    /// Returns the number of posts inserted.
    pub async fn seed(&self, credential: &Credential) -> Result<usize, SyncError> {
        let total = self.baseline.len();

        for (completed, post) in self.baseline.posts().iter().enumerate() {
            self.client
                .create_post(credential, post)
                .await
                .map_err(|e| SyncError {
                    phase: SyncPhase::Seed,
                    completed,
                    total,
                    id: Some(post.id),
                    cause: e.into(),
                })?;
        }

        debug!(seeded = total, "Seeded remote collection");
        Ok(total)
    }

    /// Drains the collection, then seeds it from the baseline.
    ///
    /// On success `GET /posts` yields exactly the baseline, in order.
    /// Calling it again from any state converges to the same collection.
    pub async fn resync(&self, credential: &Credential) -> Result<ResyncReport, SyncError> {
        let drained = self.drain(credential).await?;
        let seeded = self.seed(credential).await?;
        info!(drained, seeded, "Remote collection resynchronized");
        Ok(ResyncReport { drained, seeded })
    }

    /// Checks that the remote collection equals the baseline.
    ///
    /// Items that are not well-formed posts are reported as divergence.
    pub async fn verify(&self, credential: &Credential) -> Result<(), SyncError> {
        let total = self.baseline.len();
        let items = self
            .client
            .list_post_items(credential)
            .await
            .map_err(|e| SyncError {
                phase: SyncPhase::Verify,
                completed: 0,
                total,
                id: None,
                cause: e.into(),
            })?;

        let diff = self.baseline.diff_items(&items);
        if diff.is_clean() {
            return Ok(());
        }

        let expected = self.baseline.to_value();
        let matching = expected
            .as_array()
            .map(|expected| {
                expected
                    .iter()
                    .zip(items.iter())
                    .take_while(|(expected, actual)| expected == actual)
                    .count()
            })
            .unwrap_or(0);
        Err(SyncError {
            phase: SyncPhase::Verify,
            completed: matching,
            total,
            id: None,
            cause: SyncCause::Diverged(diff.summary()),
        })
    }
}

/// Extracts the integer id of every item, or returns the first item
/// without one.
fn item_ids(items: &[Value]) -> Result<Vec<u64>, &Value> {
    items
        .iter()
        .map(|item| item.get("id").and_then(Value::as_u64).ok_or(item))
        .collect()
}
