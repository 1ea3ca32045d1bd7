//! Verification scenarios for the `/posts` endpoint.
//!
//! Every scenario assumes the collection was just resynchronized, issues its
//! requests and asserts status, content type and body against the baseline
//! or, when a store file is configured, the live state.
//!
//! | Method | Path | Success | Missing post |
//! |--------|------|---------|--------------|
//! | GET | `/posts` | 200, baseline in order | n/a |
//! | GET | `/posts/:id` | 200, the post | 404, `{}` |
//! | POST | `/posts` | 201, echo | n/a (500 on duplicate id) |
//! | PUT | `/posts/:id` | 200, echo | empty body, see [`MissingUpdatePolicy`] |
//! | PATCH | `/posts/:id` | 200, merged post | 404, empty body |
//! | DELETE | `/posts/:id` | 200, empty body | 404, empty body |

use serde_json::json;
use tracing::warn;

use crate::baseline::Baseline;
use crate::client::{ApiClient, ApiResponse, POSTS_PATH, post_path};
use crate::config::MissingUpdatePolicy;
use crate::error::{ContractViolation, HarnessResult};
use crate::live_state::LiveStateReader;
use crate::model::{Credential, Post, PostPatch};
use crate::sync::FixtureSynchronizer;
use crate::verify::{
    decode_list, expect_body_contains, expect_contains_all, expect_empty_body, expect_eq,
    expect_json_content_type, expect_json_eq, expect_len, expect_status, expected_patch_result,
};

/// Diagnostic the server emits when a POST reuses an existing id.
pub const DUPLICATE_ID_DIAGNOSTIC: &str = "Error: Insert failed, duplicate id";

/// Everything a scenario needs, borrowed from the suite.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioContext<'a> {
    pub client: &'a ApiClient,
    pub credential: &'a Credential,
    pub baseline: &'a Baseline,
    pub live_state: Option<&'a LiveStateReader>,
    pub synchronizer: &'a FixtureSynchronizer,
    pub missing_update: MissingUpdatePolicy,
}

impl ScenarioContext<'_> {
    /// Posts the store currently holds: the live state when configured,
    /// otherwise the baseline.
    fn oracle_posts(&self) -> HarnessResult<Vec<Post>> {
        match self.live_state {
            Some(reader) => Ok(reader.posts()?),
            None => Ok(self.baseline.posts().to_vec()),
        }
    }

    async fn list(&self) -> HarnessResult<ApiResponse> {
        Ok(self
            .client
            .get(POSTS_PATH)?
            .bearer(self.credential)
            .send()
            .await?)
    }

    async fn get(&self, id: u64) -> HarnessResult<ApiResponse> {
        Ok(self
            .client
            .get(&post_path(id))?
            .bearer(self.credential)
            .send()
            .await?)
    }

    async fn create(&self, post: &Post) -> HarnessResult<ApiResponse> {
        Ok(self
            .client
            .post(POSTS_PATH)?
            .bearer(self.credential)
            .json(post)
            .send()
            .await?)
    }

    async fn replace(&self, id: u64, post: &Post) -> HarnessResult<ApiResponse> {
        Ok(self
            .client
            .put(&post_path(id))?
            .bearer(self.credential)
            .json(post)
            .send()
            .await?)
    }

    async fn patch(&self, id: u64, patch: &PostPatch) -> HarnessResult<ApiResponse> {
        Ok(self
            .client
            .patch(&post_path(id))?
            .bearer(self.credential)
            .json(patch)
            .send()
            .await?)
    }

    async fn delete(&self, id: u64) -> HarnessResult<ApiResponse> {
        Ok(self
            .client
            .delete(&post_path(id))?
            .bearer(self.credential)
            .send()
            .await?)
    }
}

/// A single verification scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    ListPostsReturnsJson,
    ListPostsMatchesBaseline,
    ListPostsFilteredById,
    GetPostReturnsJson,
    GetPostMatchesBaseline,
    GetMissingPostReturns404,
    CreatePostReturnsJson,
    CreatePostEchoesBody,
    CreateDuplicatePostFails,
    UpdatePostReturnsJson,
    UpdatePostEchoesBody,
    UpdateMissingPostIsEmpty,
    PatchPostReturnsJson,
    PatchPostMergesFields,
    PatchMissingPostReturns404,
    DeletePostReturnsJson,
    DeletePostReturnsEmptyBody,
    DeleteMissingPostReturns404,
    ResyncRestoresBaseline,
    ResyncIsIdempotent,
}

impl Scenario {
    /// The catalogue, in execution order.
    pub const ALL: [Scenario; 20] = [
        Scenario::ListPostsReturnsJson,
        Scenario::ListPostsMatchesBaseline,
        Scenario::ListPostsFilteredById,
        Scenario::GetPostReturnsJson,
        Scenario::GetPostMatchesBaseline,
        Scenario::GetMissingPostReturns404,
        Scenario::CreatePostReturnsJson,
        Scenario::CreatePostEchoesBody,
        Scenario::CreateDuplicatePostFails,
        Scenario::UpdatePostReturnsJson,
        Scenario::UpdatePostEchoesBody,
        Scenario::UpdateMissingPostIsEmpty,
        Scenario::PatchPostReturnsJson,
        Scenario::PatchPostMergesFields,
        Scenario::PatchMissingPostReturns404,
        Scenario::DeletePostReturnsJson,
        Scenario::DeletePostReturnsEmptyBody,
        Scenario::DeleteMissingPostReturns404,
        Scenario::ResyncRestoresBaseline,
        Scenario::ResyncIsIdempotent,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::ListPostsReturnsJson => "list_posts_returns_json",
            Scenario::ListPostsMatchesBaseline => "list_posts_matches_baseline",
            Scenario::ListPostsFilteredById => "list_posts_filtered_by_id",
            Scenario::GetPostReturnsJson => "get_post_returns_json",
            Scenario::GetPostMatchesBaseline => "get_post_matches_baseline",
            Scenario::GetMissingPostReturns404 => "get_missing_post_returns_404",
            Scenario::CreatePostReturnsJson => "create_post_returns_json",
            Scenario::CreatePostEchoesBody => "create_post_echoes_body",
            Scenario::CreateDuplicatePostFails => "create_duplicate_post_fails",
            Scenario::UpdatePostReturnsJson => "update_post_returns_json",
            Scenario::UpdatePostEchoesBody => "update_post_echoes_body",
            Scenario::UpdateMissingPostIsEmpty => "update_missing_post_is_empty",
            Scenario::PatchPostReturnsJson => "patch_post_returns_json",
            Scenario::PatchPostMergesFields => "patch_post_merges_fields",
            Scenario::PatchMissingPostReturns404 => "patch_missing_post_returns_404",
            Scenario::DeletePostReturnsJson => "delete_post_returns_json",
            Scenario::DeletePostReturnsEmptyBody => "delete_post_returns_empty_body",
            Scenario::DeleteMissingPostReturns404 => "delete_missing_post_returns_404",
            Scenario::ResyncRestoresBaseline => "resync_restores_baseline",
            Scenario::ResyncIsIdempotent => "resync_is_idempotent",
        }
    }

    /// The endpoint a scenario exercises, e.g. `GET /posts/:id`.
    pub fn endpoint(self) -> &'static str {
        match self {
            Scenario::ListPostsReturnsJson
            | Scenario::ListPostsMatchesBaseline
            | Scenario::ListPostsFilteredById => "GET /posts",
            Scenario::GetPostReturnsJson
            | Scenario::GetPostMatchesBaseline
            | Scenario::GetMissingPostReturns404 => "GET /posts/:id",
            Scenario::CreatePostReturnsJson
            | Scenario::CreatePostEchoesBody
            | Scenario::CreateDuplicatePostFails => "POST /posts",
            Scenario::UpdatePostReturnsJson
            | Scenario::UpdatePostEchoesBody
            | Scenario::UpdateMissingPostIsEmpty => "PUT /posts/:id",
            Scenario::PatchPostReturnsJson
            | Scenario::PatchPostMergesFields
            | Scenario::PatchMissingPostReturns404 => "PATCH /posts/:id",
            Scenario::DeletePostReturnsJson
            | Scenario::DeletePostReturnsEmptyBody
            | Scenario::DeleteMissingPostReturns404 => "DELETE /posts/:id",
            Scenario::ResyncRestoresBaseline | Scenario::ResyncIsIdempotent => "resync",
        }
    }

    /// Looks a scenario up by its exact name.
    pub fn find(name: &str) -> Option<Scenario> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Selects scenarios whose name equals or starts with any pattern.
    ///
    /// An empty pattern list selects the whole catalogue. Catalogue order is
    /// kept regardless of pattern order.
    pub fn select(patterns: &[String]) -> Vec<Scenario> {
        if patterns.is_empty() {
            return Self::ALL.to_vec();
        }
        Self::ALL
            .into_iter()
            .filter(|s| patterns.iter().any(|p| s.name().starts_with(p.as_str())))
            .collect()
    }

    /// Runs the scenario against a synchronized collection.
    pub async fn run(self, ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
        match self {
            Scenario::ListPostsReturnsJson => list_posts_returns_json(ctx).await,
            Scenario::ListPostsMatchesBaseline => list_posts_matches_baseline(ctx).await,
            Scenario::ListPostsFilteredById => list_posts_filtered_by_id(ctx).await,
            Scenario::GetPostReturnsJson => get_post_returns_json(ctx).await,
            Scenario::GetPostMatchesBaseline => get_post_matches_baseline(ctx).await,
            Scenario::GetMissingPostReturns404 => get_missing_post_returns_404(ctx).await,
            Scenario::CreatePostReturnsJson => create_post_returns_json(ctx).await,
            Scenario::CreatePostEchoesBody => create_post_echoes_body(ctx).await,
            Scenario::CreateDuplicatePostFails => create_duplicate_post_fails(ctx).await,
            Scenario::UpdatePostReturnsJson => update_post_returns_json(ctx).await,
            Scenario::UpdatePostEchoesBody => update_post_echoes_body(ctx).await,
            Scenario::UpdateMissingPostIsEmpty => update_missing_post_is_empty(ctx).await,
            Scenario::PatchPostReturnsJson => patch_post_returns_json(ctx).await,
            Scenario::PatchPostMergesFields => patch_post_merges_fields(ctx).await,
            Scenario::PatchMissingPostReturns404 => patch_missing_post_returns_404(ctx).await,
            Scenario::DeletePostReturnsJson => delete_post_returns_json(ctx).await,
            Scenario::DeletePostReturnsEmptyBody => delete_post_returns_empty_body(ctx).await,
            Scenario::DeleteMissingPostReturns404 => delete_missing_post_returns_404(ctx).await,
            Scenario::ResyncRestoresBaseline => resync_restores_baseline(ctx).await,
            Scenario::ResyncIsIdempotent => resync_is_idempotent(ctx).await,
        }
    }
}

fn numbered_post(id: u64) -> Post {
    Post::new(
        id,
        format!("Title of the {} post", ordinal(id)),
        format!("{} Author", ordinal(id)),
    )
}

fn replacement_for(post: &Post) -> Post {
    Post::new(
        post.id,
        format!("Title of the new updated {} post", ordinal(post.id)),
        format!("New Updated {} Author", ordinal(post.id)),
    )
}

fn author_patch_for(id: u64) -> PostPatch {
    PostPatch::default()
        .with_id(id)
        .with_author(format!("New Updated {} Author", ordinal(id)))
}

/// `1` -> `1st`, `12` -> `12th`, `102` -> `102nd`.
fn ordinal(n: u64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

// =============================================================================
// GET /posts
// =============================================================================

async fn list_posts_returns_json(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let res = ctx.list().await?;
    expect_status(&res, 200)?;
    expect_json_content_type(&res)?;
    Ok(())
}

async fn list_posts_matches_baseline(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let res = ctx.list().await?;
    expect_status(&res, 200)?;
    let items = decode_list(&res)?;
    expect_len(&res.request(), &items, ctx.baseline.len())?;
    expect_json_eq(&res, ctx.baseline.posts())?;
    if ctx.live_state.is_some() {
        expect_json_eq(&res, &ctx.oracle_posts()?)?;
    }
    Ok(())
}

async fn list_posts_filtered_by_id(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let oracle = ctx.oracle_posts()?;
    let second = ctx.baseline.get(1)?.id;
    let fourth = ctx.baseline.get(3)?.id;

    // Requested in reverse; the server answers in collection order.
    let res = ctx
        .client
        .get(POSTS_PATH)?
        .query(&[("id", fourth), ("id", second)])
        .bearer(ctx.credential)
        .send()
        .await?;
    expect_status(&res, 200)?;
    expect_json_content_type(&res)?;

    let items = decode_list(&res)?;
    let expected: Vec<Post> = oracle
        .into_iter()
        .filter(|post| post.id == second || post.id == fourth)
        .collect();
    let expected_values = serde_json::to_value(&expected)
        .ok()
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();

    expect_len(&res.request(), &items, 2)?;
    expect_contains_all(&res.request(), &items, &expected_values)?;
    expect_json_eq(&res, &ctx.baseline.select(&[second, fourth]))?;
    Ok(())
}

// =============================================================================
// GET /posts/:id
// =============================================================================

async fn get_post_returns_json(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let first = ctx.baseline.get(0)?;
    let res = ctx.get(first.id).await?;
    expect_status(&res, 200)?;
    expect_json_content_type(&res)?;
    Ok(())
}

async fn get_post_matches_baseline(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    for post in ctx.baseline.posts() {
        let res = ctx.get(post.id).await?;
        expect_status(&res, 200)?;
        expect_json_eq(&res, post)?;
    }
    Ok(())
}

async fn get_missing_post_returns_404(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let res = ctx.get(ctx.baseline.unused_id(100)).await?;
    expect_status(&res, 404)?;
    expect_json_content_type(&res)?;
    expect_json_eq(&res, &json!({}))?;
    Ok(())
}

// =============================================================================
// POST /posts
// =============================================================================

async fn create_post_returns_json(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let post = numbered_post(ctx.baseline.unused_id(100));
    let res = ctx.create(&post).await?;
    expect_status(&res, 201)?;
    expect_json_content_type(&res)?;
    Ok(())
}

async fn create_post_echoes_body(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let post = numbered_post(ctx.baseline.unused_id(101));
    let res = ctx.create(&post).await?;
    expect_status(&res, 201)?;
    expect_json_eq(&res, &post)?;
    Ok(())
}

async fn create_duplicate_post_fails(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let post = numbered_post(ctx.baseline.unused_id(102));

    let first = ctx.create(&post).await?;
    expect_status(&first, 201)?;

    let res = ctx.create(&post).await?;
    expect_status(&res, 500)?;
    expect_body_contains(&res, DUPLICATE_ID_DIAGNOSTIC)?;

    let list = ctx.list().await?;
    let items = decode_list(&list)?;
    expect_len(&list.request(), &items, ctx.baseline.len() + 1)?;
    Ok(())
}

// =============================================================================
// PUT /posts/:id
// =============================================================================

async fn update_post_returns_json(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let first = ctx.baseline.get(0)?;
    let res = ctx.replace(first.id, &replacement_for(first)).await?;
    expect_status(&res, 200)?;
    expect_json_content_type(&res)?;
    Ok(())
}

async fn update_post_echoes_body(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let first = ctx.baseline.get(0)?;
    let updated = replacement_for(first);

    let res = ctx.replace(first.id, &updated).await?;
    expect_status(&res, 200)?;
    expect_json_eq(&res, &updated)?;

    let read_back = ctx.get(first.id).await?;
    expect_json_eq(&read_back, &updated)?;
    Ok(())
}

async fn update_missing_post_is_empty(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let post = replacement_for(&numbered_post(ctx.baseline.unused_id(101)));
    let res = ctx.replace(post.id, &post).await?;

    let expected_status = match ctx.missing_update {
        MissingUpdatePolicy::Compatible => 200,
        MissingUpdatePolicy::Strict => 404,
    };
    expect_status(&res, expected_status)?;
    expect_json_content_type(&res)?;
    expect_empty_body(&res)?;

    if res.status_code() == 200 {
        warn!(
            request = %res.request(),
            "PUT on a missing post answered 200 with an empty body, unlike PATCH and DELETE"
        );
    }
    Ok(())
}

// =============================================================================
// PATCH /posts/:id
// =============================================================================

async fn patch_post_returns_json(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let first = ctx.baseline.get(0)?;
    let res = ctx.patch(first.id, &author_patch_for(first.id)).await?;
    expect_status(&res, 200)?;
    expect_json_content_type(&res)?;
    Ok(())
}

async fn patch_post_merges_fields(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let first = ctx.baseline.get(0)?;
    let patch = author_patch_for(first.id);
    let expected = expected_patch_result(first, &patch).map_err(|e| {
        ContractViolation::new(
            format!("PATCH {}", post_path(first.id)),
            format!("cannot compute expected merge: {e}"),
        )
    })?;

    let res = ctx.patch(first.id, &patch).await?;
    expect_status(&res, 200)?;
    expect_json_eq(&res, &expected)?;

    let merged: Post = res.json()?;
    expect_eq(&res.request(), "retained title", &merged.title, &first.title)?;
    Ok(())
}

async fn patch_missing_post_returns_404(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let id = ctx.baseline.unused_id(101);
    let res = ctx.patch(id, &author_patch_for(id)).await?;
    expect_status(&res, 404)?;
    expect_json_content_type(&res)?;
    expect_empty_body(&res)?;
    Ok(())
}

// =============================================================================
// DELETE /posts/:id
// =============================================================================

async fn delete_post_returns_json(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let first = ctx.baseline.get(0)?;
    let res = ctx.delete(first.id).await?;
    expect_status(&res, 200)?;
    expect_json_content_type(&res)?;
    Ok(())
}

async fn delete_post_returns_empty_body(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let first = ctx.baseline.get(0)?;
    let res = ctx.delete(first.id).await?;
    expect_status(&res, 200)?;
    expect_empty_body(&res)?;

    let gone = ctx.get(first.id).await?;
    expect_status(&gone, 404)?;
    Ok(())
}

async fn delete_missing_post_returns_404(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let res = ctx.delete(ctx.baseline.unused_id(100)).await?;
    expect_status(&res, 404)?;
    expect_json_content_type(&res)?;
    expect_empty_body(&res)?;
    Ok(())
}

// =============================================================================
// Resync
// =============================================================================

async fn resync_restores_baseline(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    let post = numbered_post(ctx.baseline.unused_id(100));
    let created = ctx.create(&post).await?;
    expect_status(&created, 201)?;
    expect_json_eq(&created, &post)?;

    let report = ctx.synchronizer.resync(ctx.credential).await?;
    let label = "resync";
    expect_eq(label, "drained", &report.drained, &(ctx.baseline.len() + 1))?;
    expect_eq(label, "seeded", &report.seeded, &ctx.baseline.len())?;

    let res = ctx.list().await?;
    expect_json_eq(&res, ctx.baseline.posts())?;
    Ok(())
}

async fn resync_is_idempotent(ctx: &ScenarioContext<'_>) -> HarnessResult<()> {
    ctx.synchronizer.resync(ctx.credential).await?;
    let first: Vec<Post> = ctx.list().await?.json()?;

    let report = ctx.synchronizer.resync(ctx.credential).await?;
    let second: Vec<Post> = ctx.list().await?.json()?;

    let label = "resync";
    expect_eq(label, "collection after second resync", &second, &first)?;
    expect_eq(label, "collection", &first, &ctx.baseline.posts().to_vec())?;
    expect_eq(label, "drained", &report.drained, &ctx.baseline.len())?;
    Ok(())
}
