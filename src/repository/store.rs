//! Durable store contract for users, subscriptions, and activities.

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::model::Activity;
use crate::model::ActivityData;
use crate::model::NewSubscription;
use crate::model::Subscription;
use crate::model::User;
use crate::repository::error::StoreError;

/// Persistence gateway consumed by the sync pipeline and the web layer.
///
/// Implementations must make `upsert_user` and `update_watermark` atomic per
/// row, and must assign strictly increasing activity ids in append order so
/// that ascending id is chronological order.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Insert-or-merge on the user's primary key. A merge updates the
    /// credential fields and `updated_at`, leaving everything else alone.
    async fn upsert_user(&self, user: &User) -> Result<User, StoreError>;

    /// Creates a subscription, minting its token. If the user already
    /// subscribes to the playlist, returns the existing row instead.
    async fn create_subscription(
        &self,
        sub: &NewSubscription,
    ) -> Result<Subscription, StoreError>;

    /// Deletes a subscription and its activities. Returns whether a row
    /// existed.
    async fn delete_subscription(&self, token: &str) -> Result<bool, StoreError>;

    async fn list_subscriptions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Subscription>, StoreError>;

    /// Active subscriptions due at `now`, oldest due time first. Dormant
    /// subscriptions (`next_check_at` null) are never returned.
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Subscription>, StoreError>;

    /// Single-row update of the subscription's watermark fields
    /// (`playlist_version`, `playlist_tracks`, `next_check_at`).
    async fn update_watermark(&self, sub: &Subscription) -> Result<(), StoreError>;

    /// Appends activities, idempotent on the dedup key: a payload whose key
    /// already exists within the subscription is a no-op, and the previously
    /// stored row is returned in its place.
    async fn append_activities(
        &self,
        sub: &Subscription,
        data: Vec<ActivityData>,
    ) -> Result<Vec<Activity>, StoreError>;

    /// Activities for a user's feed, newest first, starting at `to_id`
    /// (inclusive; pass [`crate::model::LATEST_ACTIVITY_ID`] for the newest).
    async fn list_activity_for_user(
        &self,
        user_id: &str,
        to_id: i64,
        limit: i64,
    ) -> Result<Vec<Activity>, StoreError>;
}
