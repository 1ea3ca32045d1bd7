//! Fixture synchronizer behavior: drain, seed, resync, verify.

mod common;

use common::harness::TestEnv;
use common::stub_server::Faults;
use postcheck_harness::error::SyncCause;
use postcheck_harness::{Credential, LiveStateReader, Post, SyncPhase};
use serde_json::json;

#[tokio::test]
async fn test_seed_then_drain_counts() {
    let env = TestEnv::start().await;
    let credential = env.credential().await;
    let sync = env.suite.synchronizer();

    assert_eq!(sync.seed(&credential).await.unwrap(), 5);
    assert_eq!(env.server.state.post_ids(), vec![1, 2, 3, 4, 5]);

    assert_eq!(sync.drain(&credential).await.unwrap(), 5);
    assert!(env.server.state.post_ids().is_empty());

    // Draining an empty collection is a no-op
    assert_eq!(sync.drain(&credential).await.unwrap(), 0);
}

#[tokio::test]
async fn test_resync_from_arbitrary_state() {
    let env = TestEnv::start().await;
    let credential = env.credential().await;

    env.server.state.put_posts(vec![
        json!({"id": 3, "title": "stale", "author": "someone"}),
        json!({"id": 100, "title": "left over", "author": "x"}),
        json!({"id": 7, "title": "another", "author": "y", "extra": true}),
    ]);

    let report = env.suite.synchronizer().resync(&credential).await.unwrap();
    assert_eq!(report.drained, 3);
    assert_eq!(report.seeded, 5);

    let posts = env.suite.client().list_posts(&credential).await.unwrap();
    assert_eq!(posts, env.suite.baseline().posts());
    env.suite.synchronizer().verify(&credential).await.unwrap();
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let env = TestEnv::start().await;
    let credential = env.credential().await;
    let sync = env.suite.synchronizer();
    let client = env.suite.client();

    sync.resync(&credential).await.unwrap();
    let first = client.list_posts(&credential).await.unwrap();

    let report = sync.resync(&credential).await.unwrap();
    let second = client.list_posts(&credential).await.unwrap();

    assert_eq!(report.drained, 5);
    assert_eq!(first, second);
    assert_eq!(second, env.suite.baseline().posts());
}

#[tokio::test]
async fn test_resync_removes_created_post() {
    let env = TestEnv::start().await;
    let credential = env.synchronized().await;
    let client = env.suite.client();

    let created = client
        .create_post(&credential, &Post::new(100, "Title of the 100th post", "100th Author"))
        .await
        .unwrap();
    assert_eq!(created.id, 100);
    assert_eq!(client.list_posts(&credential).await.unwrap().len(), 6);

    env.suite.synchronizer().resync(&credential).await.unwrap();
    let posts = client.list_posts(&credential).await.unwrap();
    assert_eq!(posts.len(), 5);
    assert!(posts.iter().all(|post| post.id != 100));
}

#[tokio::test]
async fn test_resync_updates_store_file() {
    let env = TestEnv::start().await;
    let credential = env.synchronized().await;

    let reader = LiveStateReader::new(&env.server.db_path);
    assert_eq!(reader.posts().unwrap(), env.suite.baseline().posts());

    env.suite.client().delete_post(&credential, 2).await.unwrap();
    let ids: Vec<u64> = reader.posts().unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 3, 4, 5]);
}

#[tokio::test]
async fn test_drain_failure_reports_progress() {
    let env = TestEnv::start().await;
    let credential = env.synchronized().await;
    env.server.state.set_faults(Faults {
        fail_delete_post: Some(3),
        ..Default::default()
    });

    let err = env
        .suite
        .synchronizer()
        .resync(&credential)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::Drain);
    assert_eq!(err.completed, 2);
    assert_eq!(err.total, 5);
    assert_eq!(err.id, Some(3));
    assert!(matches!(err.cause, SyncCause::Client(_)));
    // Nothing after the failing delete was attempted
    assert_eq!(env.server.state.post_ids(), vec![3, 4, 5]);
}

#[tokio::test]
async fn test_seed_failure_reports_progress() {
    let env = TestEnv::start().await;
    let credential = env.credential().await;
    env.server.state.set_faults(Faults {
        fail_create_post: Some(4),
        ..Default::default()
    });

    let err = env
        .suite
        .synchronizer()
        .resync(&credential)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::Seed);
    assert_eq!(err.completed, 3);
    assert_eq!(err.total, 5);
    assert_eq!(err.id, Some(4));
    assert_eq!(env.server.state.post_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_fetch_failure_without_valid_credential() {
    let env = TestEnv::start().await;
    env.credential().await;

    let err = env
        .suite
        .synchronizer()
        .resync(&Credential::new("not-a-token"))
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::Fetch);
    assert_eq!(err.completed, 0);
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_verify_detects_divergence() {
    let env = TestEnv::start().await;
    let credential = env.synchronized().await;
    env.suite.synchronizer().verify(&credential).await.unwrap();

    env.suite.client().delete_post(&credential, 5).await.unwrap();
    let err = env
        .suite
        .synchronizer()
        .verify(&credential)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::Verify);
    assert_eq!(err.completed, 4);
    match err.cause {
        SyncCause::Diverged(summary) => assert!(summary.contains("missing ids [5]")),
        other => panic!("unexpected cause: {other:?}"),
    }
}

#[tokio::test]
async fn test_resync_converges_from_partial_posts() {
    let env = TestEnv::start().await;
    let credential = env.credential().await;

    env.server.state.put_posts(vec![
        json!({"id": 9, "title": "no author"}),
        json!({"id": 2}),
        json!({"id": 11, "author": "x", "tags": ["a"]}),
    ]);

    let report = env.suite.synchronizer().resync(&credential).await.unwrap();
    assert_eq!(report.drained, 3);
    assert_eq!(report.seeded, 5);
    assert_eq!(env.server.state.post_ids(), vec![1, 2, 3, 4, 5]);
    env.suite.synchronizer().verify(&credential).await.unwrap();
}

#[tokio::test]
async fn test_drain_stops_on_item_without_integer_id() {
    let env = TestEnv::start().await;
    let credential = env.credential().await;

    env.server.state.put_posts(vec![
        json!({"id": 1, "title": "t", "author": "a"}),
        json!({"id": "abc", "title": "t", "author": "a"}),
    ]);

    let err = env
        .suite
        .synchronizer()
        .drain(&credential)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::Fetch);
    assert_eq!(err.completed, 0);
    assert_eq!(err.total, 2);
    match err.cause {
        SyncCause::MissingId(item) => assert!(item.contains("\"abc\"")),
        other => panic!("unexpected cause: {other:?}"),
    }
    // Nothing was deleted
    assert_eq!(env.server.state.post_ids(), vec![1]);
}

#[tokio::test]
async fn test_verify_reports_malformed_item() {
    let env = TestEnv::start().await;
    let credential = env.synchronized().await;

    let mut items: Vec<serde_json::Value> = env
        .suite
        .baseline()
        .posts()
        .iter()
        .map(|post| serde_json::to_value(post).unwrap())
        .collect();
    items[4] = json!({"id": 5, "title": "Title of the 5th post"});
    env.server.state.put_posts(items);

    let err = env
        .suite
        .synchronizer()
        .verify(&credential)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::Verify);
    assert_eq!(err.completed, 4);
    match err.cause {
        SyncCause::Diverged(summary) => {
            assert!(summary.contains("changed ids [5]"));
            assert!(summary.contains("malformed entries"));
        }
        other => panic!("unexpected cause: {other:?}"),
    }
}
