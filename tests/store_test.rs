//! SQLite store behavior: due selection, idempotent appends, upserts.

use chrono::Duration;

use spotwatch::model::ActivityData;
use spotwatch::model::ActivityKind;
use spotwatch::model::LATEST_ACTIVITY_ID;
use spotwatch::model::NewSubscription;
use spotwatch::model::TrackMetadata;
use spotwatch::repository::Store;

mod common;

fn new_subscription(user_id: &str, playlist_id: &str) -> NewSubscription {
    NewSubscription {
        user_id: user_id.to_string(),
        playlist_id: playlist_id.to_string(),
        playlist_owner_id: "owner_1".to_string(),
        playlist_name: format!("Playlist {playlist_id}"),
        playlist_version: "v1".to_string(),
        playlist_tracks: "a,b".to_string(),
        next_check_at: Some(common::epoch()),
    }
}

fn activity_data(track_id: &str, actor: &str) -> ActivityData {
    ActivityData {
        kind: ActivityKind::TrackAdded,
        playlist_id: "p1".to_string(),
        playlist_owner_id: "owner_1".to_string(),
        track_metadata: TrackMetadata {
            track_id: track_id.to_string(),
            name: format!("Track {track_id}"),
            ..TrackMetadata::default()
        },
        actor_user_id: actor.to_string(),
        occurred_at: common::epoch(),
    }
}

#[tokio::test]
async fn test_list_due_is_oldest_first_and_limited() {
    let clock = common::manual_clock();
    let (store, db_path) = common::setup_store(clock).await;
    let now = common::epoch();

    for (playlist, offset) in [("p3", 30), ("p1", 10), ("p2", 20)] {
        let mut sub = new_subscription("user_1", playlist);
        sub.next_check_at = Some(now - Duration::seconds(offset));
        store.create_subscription(&sub).await.unwrap();
    }

    let due = store.list_due(now, 2).await.unwrap();
    let playlists: Vec<&str> = due.iter().map(|s| s.playlist_id.as_str()).collect();
    assert_eq!(playlists, vec!["p3", "p2"]);

    let all = store.list_due(now, 10).await.unwrap();
    assert_eq!(all.len(), 3);

    common::teardown_store(db_path);
}

#[tokio::test]
async fn test_dormant_subscription_is_never_due() {
    let clock = common::manual_clock();
    let (store, db_path) = common::setup_store(clock).await;
    let now = common::epoch();

    let mut sub = store
        .create_subscription(&new_subscription("user_1", "p1"))
        .await
        .unwrap();

    sub.next_check_at = None;
    store.update_watermark(&sub).await.unwrap();

    let due = store.list_due(now + Duration::days(365), 10).await.unwrap();
    assert!(due.is_empty());

    common::teardown_store(db_path);
}

#[tokio::test]
async fn test_append_activities_is_idempotent() {
    let clock = common::manual_clock();
    let (store, db_path) = common::setup_store(clock).await;

    let sub = store
        .create_subscription(&new_subscription("user_1", "p1"))
        .await
        .unwrap();

    let first = store
        .append_activities(&sub, vec![activity_data("c", "user_2")])
        .await
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].unique_id, "track_added:c");

    // A retried cycle appends the same payload again.
    let second = store
        .append_activities(&sub, vec![activity_data("c", "user_2")])
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);

    let stored = store
        .list_activity_for_user("user_1", LATEST_ACTIVITY_ID, 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);

    common::teardown_store(db_path);
}

#[tokio::test]
async fn test_activity_ids_are_monotonic_in_append_order() {
    let clock = common::manual_clock();
    let (store, db_path) = common::setup_store(clock).await;

    let sub = store
        .create_subscription(&new_subscription("user_1", "p1"))
        .await
        .unwrap();

    let appended = store
        .append_activities(
            &sub,
            vec![
                activity_data("c", "user_2"),
                activity_data("d", "user_2"),
                activity_data("e", "user_3"),
            ],
        )
        .await
        .unwrap();
    assert!(appended[0].id < appended[1].id);
    assert!(appended[1].id < appended[2].id);

    // Feed reads newest first.
    let feed = store
        .list_activity_for_user("user_1", LATEST_ACTIVITY_ID, 10)
        .await
        .unwrap();
    let ids: Vec<i64> = feed.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![appended[2].id, appended[1].id, appended[0].id]);

    common::teardown_store(db_path);
}

#[tokio::test]
async fn test_create_subscription_duplicate_returns_existing() {
    let clock = common::manual_clock();
    let (store, db_path) = common::setup_store(clock).await;

    let first = store
        .create_subscription(&new_subscription("user_1", "p1"))
        .await
        .unwrap();
    let second = store
        .create_subscription(&new_subscription("user_1", "p1"))
        .await
        .unwrap();
    assert_eq!(first.token, second.token);

    let subs = store.list_subscriptions_for_user("user_1").await.unwrap();
    assert_eq!(subs.len(), 1);

    common::teardown_store(db_path);
}

#[tokio::test]
async fn test_upsert_user_merges_credentials() {
    let clock = common::manual_clock();
    let (store, db_path) = common::setup_store(clock).await;

    let user = common::make_user("user_1", "one@example.com");
    let created = store.upsert_user(&user).await.unwrap();
    assert_eq!(created.email, "one@example.com");

    let mut refreshed = user.clone();
    refreshed.access_token = "new-access".to_string();
    refreshed.refresh_token = "new-refresh".to_string();
    refreshed.expires_at = user.expires_at + Duration::hours(1);
    // Profile fields on the incoming row must not clobber the stored ones.
    refreshed.email = "ignored@example.com".to_string();

    let merged = store.upsert_user(&refreshed).await.unwrap();
    assert_eq!(merged.access_token, "new-access");
    assert_eq!(merged.refresh_token, "new-refresh");
    assert_eq!(merged.email, "one@example.com");

    common::teardown_store(db_path);
}

#[tokio::test]
async fn test_delete_subscription_cascades_activities() {
    let clock = common::manual_clock();
    let (store, db_path) = common::setup_store(clock).await;

    let sub = store
        .create_subscription(&new_subscription("user_1", "p1"))
        .await
        .unwrap();
    store
        .append_activities(&sub, vec![activity_data("c", "user_2")])
        .await
        .unwrap();

    assert!(store.delete_subscription(&sub.token).await.unwrap());
    assert!(!store.delete_subscription(&sub.token).await.unwrap());

    let remaining = store
        .list_activity_for_user("user_1", LATEST_ACTIVITY_ID, 10)
        .await
        .unwrap();
    assert!(remaining.is_empty());

    common::teardown_store(db_path);
}

#[tokio::test]
async fn test_update_watermark_touches_single_row() {
    let clock = common::manual_clock();
    let (store, db_path) = common::setup_store(clock).await;

    let first = store
        .create_subscription(&new_subscription("user_1", "p1"))
        .await
        .unwrap();
    let second = store
        .create_subscription(&new_subscription("user_1", "p2"))
        .await
        .unwrap();

    let mut updated = first.clone();
    updated.playlist_version = "v2".to_string();
    updated.playlist_tracks = "a,b,c".to_string();
    updated.next_check_at = Some(common::epoch() + Duration::seconds(10));
    store.update_watermark(&updated).await.unwrap();

    let subs = store.list_subscriptions_for_user("user_1").await.unwrap();
    let reloaded_first = subs.iter().find(|s| s.token == first.token).unwrap();
    let reloaded_second = subs.iter().find(|s| s.token == second.token).unwrap();
    assert_eq!(reloaded_first.playlist_version, "v2");
    assert_eq!(reloaded_first.playlist_tracks, "a,b,c");
    assert_eq!(reloaded_second.playlist_version, "v1");

    common::teardown_store(db_path);
}
